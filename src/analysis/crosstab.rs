//! Two-factor cross tabulation.
//!
//! Builds dense contingency tables over two categorical fields, with the
//! record filtering and per-group splitting the acceptance reports use.

use crate::models::{ContingencyTable, Record};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Selects records whose `field` equals `equals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub equals: String,
}

impl Filter {
    pub fn new(field: impl Into<String>, equals: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            equals: equals.into(),
        }
    }

    pub fn accepts(&self, record: &Record) -> bool {
        record.value(&self.field).matches(&self.equals)
    }
}

/// Applies an optional filter, borrowing the matching records.
pub fn select<'a>(records: &'a [Record], filter: Option<&Filter>) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|record| filter.map_or(true, |f| f.accepts(record)))
        .collect()
}

fn position_or_push(labels: &mut Vec<String>, label: String) -> usize {
    match labels.iter().position(|existing| *existing == label) {
        Some(index) => index,
        None => {
            labels.push(label);
            labels.len() - 1
        }
    }
}

/// Counts records per `(factor_a, factor_b)` pair.
///
/// Rows and columns appear in first-seen order. Records missing either
/// factor are left out of the table entirely.
pub fn cross_tab<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    factor_a: &str,
    factor_b: &str,
) -> ContingencyTable {
    let mut table = ContingencyTable {
        row_factor: factor_a.to_string(),
        column_factor: factor_b.to_string(),
        ..Default::default()
    };
    let mut excluded = 0usize;

    for record in records {
        let (Some(a), Some(b)) = (record.value(factor_a).key(), record.value(factor_b).key()) else {
            excluded += 1;
            continue;
        };

        let row = position_or_push(&mut table.rows, a);
        let column = position_or_push(&mut table.columns, b);

        if row == table.counts.len() {
            table.counts.push(vec![0; table.columns.len()]);
        }
        for counts in table.counts.iter_mut() {
            counts.resize(table.columns.len(), 0);
        }
        table.counts[row][column] += 1;
    }

    if excluded > 0 {
        debug!(
            "Cross tab {} x {}: {} records missing a factor were excluded",
            factor_a, factor_b, excluded
        );
    }

    table
}

/// Splits records by `split_by` and cross-tabulates each subset.
///
/// Subsets appear in first-seen order; records without a `split_by` value
/// belong to no subset.
pub fn per_group_cross_tab(
    records: &[Record],
    split_by: &str,
    factor_a: &str,
    factor_b: &str,
) -> Vec<(String, ContingencyTable)> {
    let mut groups: Vec<(String, Vec<&Record>)> = Vec::new();

    for record in records {
        let Some(key) = record.value(split_by).key() else {
            continue;
        };
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(record),
            None => groups.push((key, vec![record])),
        }
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let table = cross_tab(members, factor_a, factor_b);
            (key, table)
        })
        .collect()
}
