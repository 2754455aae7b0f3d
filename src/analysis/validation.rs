//! Required-column checks for loaded records.

use crate::models::{Record, Table, TableCell};
use serde::Serialize;

/// A row missing one or more required values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// 1-based row number in the source.
    pub row: usize,
    pub missing: Vec<String>,
}

/// Lists, per row, the required fields that are absent, blank or `nan`.
pub fn validate(records: &[Record], required: &[String]) -> Vec<ValidationIssue> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let missing: Vec<String> = required
                .iter()
                .filter(|field| record.value(field).is_absent())
                .cloned()
                .collect();
            (!missing.is_empty()).then(|| ValidationIssue {
                row: index + 1,
                missing,
            })
        })
        .collect()
}

/// Renders issues as a `(Row, Missing_Columns)` table.
pub fn issues_table(name: impl Into<String>, issues: &[ValidationIssue]) -> Table {
    let mut table = Table::new(name, vec!["Row".to_string(), "Missing_Columns".to_string()]);
    for issue in issues {
        table.rows.push(vec![
            TableCell::Integer(issue.row),
            TableCell::List(issue.missing.clone()),
        ]);
    }
    table
}
