//! Vocabulary canonicalization.
//!
//! The submission platform renames its export columns from year to year and
//! mixes spaces and underscores in the same header. This module rewrites raw
//! records into the stable internal vocabulary using a caller-supplied
//! [`AliasTable`]. The table is consulted twice: once for field names and
//! once for text values.

use crate::models::{AliasTable, Record, Value};
use tracing::debug;

/// Replaces every whitespace character in a field name with an underscore.
pub fn normalize_field_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Translates a field name: whitespace normalization, then alias lookup.
pub fn translate_field_name(name: &str, aliases: &AliasTable) -> String {
    let normalized = normalize_field_name(name);
    match aliases.get(&normalized) {
        Some(internal) => internal.to_string(),
        None => normalized,
    }
}

/// Translates a cell value. Only text cells that exactly match a table key change.
pub fn translate_value(value: &Value, aliases: &AliasTable) -> Value {
    match value {
        Value::Text(text) => match aliases.get(text) {
            Some(internal) => Value::Text(internal.to_string()),
            None => value.clone(),
        },
        other => other.clone(),
    }
}

/// Canonicalizes one record.
///
/// When two raw columns collapse onto the same internal name the first
/// column keeps its position; a later column only supplies the value when
/// the earlier one is missing or `nan`.
pub fn canonicalize_record(record: &Record, aliases: &AliasTable) -> Record {
    let mut canonical = Record::new();

    for (name, value) in record.iter() {
        let field = translate_field_name(name, aliases);
        let value = translate_value(value, aliases);

        match canonical.get(&field) {
            Some(existing) if !existing.is_absent() => {
                debug!("Duplicate column '{}' after renaming, keeping first", field);
            }
            _ => canonical.insert(field, value),
        }
    }

    canonical
}

/// Canonicalizes a full record set. Unknown fields and values pass through.
pub fn canonicalize(records: &[Record], aliases: &AliasTable) -> Vec<Record> {
    debug!(
        "Canonicalizing {} records with {} aliases",
        records.len(),
        aliases.len()
    );
    records
        .iter()
        .map(|record| canonicalize_record(record, aliases))
        .collect()
}

/// Normalizes header whitespace only, leaving names and values otherwise intact.
pub fn normalize_headers(records: &[Record]) -> Vec<Record> {
    canonicalize(records, &AliasTable::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases(pairs: &[(&str, &str)]) -> AliasTable {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_rename_field() {
        let table = aliases(&[("Old_Name", "New_Name")]);
        let record = Record::from_pairs([("Old_Name", "5")]);

        let out = canonicalize(&[record], &table);

        assert_eq!(out[0], Record::from_pairs([("New_Name", "5")]));
    }

    #[test]
    fn test_whitespace_becomes_underscore_before_lookup() {
        let table = aliases(&[("Primary_Contact_-_Country", "Origin_Country")]);
        let record = Record::from_pairs([("Primary Contact - Country", "Canada"), ("Review Notes", "ok")]);

        let out = canonicalize_record(&record, &table);

        assert_eq!(out.field_names(), vec!["Origin_Country", "Review_Notes"]);
        assert_eq!(out.value("Origin_Country"), &Value::from("Canada"));
    }

    #[test]
    fn test_each_whitespace_character_is_replaced() {
        assert_eq!(normalize_field_name("Alignment:  How"), "Alignment:__How");
        assert_eq!(normalize_field_name("a\tb"), "a_b");
    }

    #[test]
    fn test_values_translated_with_same_table() {
        let table = aliases(&[
            ("Review_Status", "Abstract_Accept_Reject"),
            ("Initial Acceptance at Abstract Stage", "Abstract_Accepted"),
        ]);
        let record = Record::from_pairs([("Review Status", "Initial Acceptance at Abstract Stage")]);

        let out = canonicalize_record(&record, &table);

        assert_eq!(
            out.value("Abstract_Accept_Reject"),
            &Value::from("Abstract_Accepted")
        );
    }

    #[test]
    fn test_unmapped_fields_and_numbers_pass_through() {
        let table = aliases(&[("5", "five")]);
        let record = Record::from_pairs([("Score", Value::Number(5.0)), ("Extra", Value::Missing)]);

        let out = canonicalize_record(&record, &table);

        assert_eq!(out.value("Score"), &Value::Number(5.0));
        assert!(out.contains("Extra"));
    }

    #[test]
    fn test_colliding_columns_keep_first_non_missing() {
        let table = aliases(&[
            ("Comments/Remarks", "Comments"),
            ("Reviewer_Comments", "Comments"),
        ]);
        let filled_later = Record::from_pairs([
            ("Comments/Remarks", Value::Missing),
            ("Reviewer_Comments", Value::from("great")),
        ]);
        let filled_first = Record::from_pairs([
            ("Comments/Remarks", Value::from("first")),
            ("Reviewer_Comments", Value::from("second")),
        ]);

        assert_eq!(
            canonicalize_record(&filled_later, &table).value("Comments"),
            &Value::from("great")
        );
        let filled_after_nan = Record::from_pairs([
            ("Comments/Remarks", Value::from("nan")),
            ("Reviewer_Comments", Value::from("late")),
        ]);
        assert_eq!(
            canonicalize_record(&filled_after_nan, &table).value("Comments"),
            &Value::from("late")
        );
        let out = canonicalize_record(&filled_first, &table);
        assert_eq!(out.value("Comments"), &Value::from("first"));
        assert_eq!(out.field_names().len(), 1);
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let table = aliases(&[
            ("Main_Subcommittee_Category", "Assigned_Subcommittee"),
            ("Training", "TR"),
            ("Final Accept", "PDW_Accepted"),
        ]);
        let records = vec![
            Record::from_pairs([
                ("Main Subcommittee Category", "Training"),
                ("Status", "Final Accept"),
                ("ID", "24001"),
            ]),
            Record::from_pairs([
                ("Main_Subcommittee_Category", "Simulation"),
                ("Status", "Final Reject"),
                ("ID", "24002"),
            ]),
        ];

        let once = canonicalize(&records, &table);
        let twice = canonicalize(&once, &table);

        assert_eq!(once, twice);
        assert_eq!(once[0].value("Assigned_Subcommittee"), &Value::from("TR"));
    }

    #[test]
    fn test_normalize_headers_only() {
        let records = vec![Record::from_pairs([("First Name", "Jo"), ("Last Name", "Lee")])];
        let out = normalize_headers(&records);
        assert_eq!(out[0].field_names(), vec!["First_Name", "Last_Name"]);
    }
}
