//! Per-entity aggregation.
//!
//! Raw exports carry one row per reviewer response. This module partitions
//! canonicalized records by an entity key (usually the submission ID) and
//! reduces each partition to a single [`SummaryRecord`] by applying an
//! ordered list of [`NamedRule`]s.

use crate::error::{ReportError, Result};
use crate::models::{AggregateValue, Record, SummaryRecord, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How one summary column is computed from the members of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AggregationRule {
    /// Value of `field` taken from the member at position `index`.
    Representative {
        field: String,
        #[serde(default)]
        index: usize,
    },
    /// Number of members whose `field` equals `equals`.
    CountWhere { field: String, equals: String },
    /// Mean of the numeric values of `field`, rounded to 2 decimals.
    Mean { field: String },
    /// Every non-missing value of `field`, in member order.
    FilteredList { field: String },
    /// For members whose `where_field` equals `equals`, the values of
    /// `fields` joined by `separator`.
    ConcatWhere {
        fields: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
        where_field: String,
        equals: String,
    },
}

fn default_separator() -> String {
    ",".to_string()
}

/// A rule bound to its output column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRule {
    pub output: String,
    #[serde(flatten)]
    pub rule: AggregationRule,
}

impl NamedRule {
    pub fn new(output: impl Into<String>, rule: AggregationRule) -> Self {
        Self {
            output: output.into(),
            rule,
        }
    }
}

/// All records sharing one entity key, in input order.
#[derive(Debug, Clone)]
pub struct EntityGroup<'a> {
    pub key: String,
    pub members: Vec<&'a Record>,
}

/// Partitions records by `group_key`, keeping first-seen group order.
///
/// Records without a key cannot belong to any entity and are skipped.
pub fn partition<'a>(records: &'a [Record], group_key: &str) -> Vec<EntityGroup<'a>> {
    let mut groups: Vec<EntityGroup<'a>> = Vec::new();
    let mut skipped = 0usize;

    for record in records {
        let Some(key) = record.value(group_key).key() else {
            skipped += 1;
            continue;
        };

        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.members.push(record),
            None => groups.push(EntityGroup {
                key,
                members: vec![record],
            }),
        }
    }

    if skipped > 0 {
        warn!("Skipped {} records without a '{}' value", skipped, group_key);
    }

    groups
}

/// Picks the representative member of a group.
///
/// Legacy reports read the title and category from a fixed row position
/// (0 or 1) instead of an explicit column. Kept isolated so the policy can
/// change without touching the aggregation loop.
pub fn representative_row<'a>(members: &[&'a Record], index: usize) -> Option<&'a Record> {
    members.get(index).copied()
}

/// Reduces every group to one summary record.
pub fn aggregate(records: &[Record], group_key: &str, rules: &[NamedRule]) -> Result<Vec<SummaryRecord>> {
    let groups = partition(records, group_key);
    debug!(
        "Aggregating {} records into {} groups by '{}'",
        records.len(),
        groups.len(),
        group_key
    );

    groups
        .iter()
        .map(|group| summarize_group(group, group_key, rules))
        .collect()
}

/// Applies every rule to a single group.
pub fn summarize_group(group: &EntityGroup<'_>, group_key: &str, rules: &[NamedRule]) -> Result<SummaryRecord> {
    let mut values = Vec::with_capacity(rules.len());
    for named in rules {
        let value = apply_rule(group, &named.rule)?;
        if value.is_undefined() {
            debug!("Group '{}': no numeric values for '{}'", group.key, named.output);
        }
        values.push((named.output.clone(), value));
    }

    Ok(SummaryRecord {
        key_field: group_key.to_string(),
        key: group.key.clone(),
        members: group.members.len(),
        values,
    })
}

fn apply_rule(group: &EntityGroup<'_>, rule: &AggregationRule) -> Result<AggregateValue> {
    match rule {
        AggregationRule::Representative { field, index } => {
            let row = representative_row(&group.members, *index).ok_or_else(|| {
                ReportError::RepresentativeOutOfRange {
                    group: group.key.clone(),
                    field: field.clone(),
                    index: *index,
                    len: group.members.len(),
                }
            })?;
            Ok(AggregateValue::Scalar(row.value(field).clone()))
        }
        AggregationRule::CountWhere { field, equals } => Ok(AggregateValue::Count(
            group
                .members
                .iter()
                .filter(|record| record.value(field).matches(equals))
                .count(),
        )),
        AggregationRule::Mean { field } => {
            require_field(group, field)?;
            Ok(AggregateValue::Mean(mean(
                group.members.iter().map(|record| record.value(field)),
            )))
        }
        AggregationRule::FilteredList { field } => {
            require_field(group, field)?;
            Ok(AggregateValue::List(filtered_list(
                group.members.iter().map(|record| record.value(field)),
            )))
        }
        AggregationRule::ConcatWhere {
            fields,
            separator,
            where_field,
            equals,
        } => {
            for field in fields {
                require_field(group, field)?;
            }
            let joined = group
                .members
                .iter()
                .filter(|record| record.value(where_field).matches(equals))
                .filter_map(|record| {
                    let parts: Option<Vec<String>> =
                        fields.iter().map(|field| record.value(field).key()).collect();
                    parts.map(|parts| parts.join(separator))
                })
                .collect();
            Ok(AggregateValue::List(joined))
        }
    }
}

/// A field no member carries means the rule names a column this export
/// does not have.
fn require_field(group: &EntityGroup<'_>, field: &str) -> Result<()> {
    if group.members.iter().any(|record| record.contains(field)) {
        Ok(())
    } else {
        Err(ReportError::UnknownField {
            group: group.key.clone(),
            field: field.to_string(),
        })
    }
}

/// Mean of the numeric values, rounded to 2 decimals. `None` when there are none.
pub fn mean<'a>(values: impl Iterator<Item = &'a Value>) -> Option<f64> {
    let numbers: Vec<f64> = values.filter_map(Value::as_number).collect();
    if numbers.is_empty() {
        return None;
    }
    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
    Some(round_to(mean, 2))
}

/// Non-missing values in input order, with the "nan" marker removed.
pub fn filtered_list<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<String> {
    values
        .filter(|value| !value.is_absent())
        .map(|value| value.to_string())
        .collect()
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(id: &str, acceptance: &str, substance: Value, comment: Value) -> Record {
        Record::from_pairs([
            ("ID", Value::from(id)),
            ("Title", Value::from(format!("Paper {}", id))),
            ("Acceptance", Value::from(acceptance)),
            ("Substance_Rating", substance),
            ("Comments_for_Birddog", comment),
        ])
    }

    fn count_rule(output: &str, equals: &str) -> NamedRule {
        NamedRule::new(
            output,
            AggregationRule::CountWhere {
                field: "Acceptance".to_string(),
                equals: equals.to_string(),
            },
        )
    }

    #[test]
    fn test_count_where_scenario() {
        let records = vec![
            Record::from_pairs([("ID", Value::Number(1.0)), ("Acceptance", Value::from("Accept"))]),
            Record::from_pairs([("ID", Value::Number(1.0)), ("Acceptance", Value::from("Reject"))]),
        ];
        let rules = vec![count_rule("Num_Accept", "Accept"), count_rule("Num_Reject", "Reject")];

        let out = aggregate(&records, "ID", &rules).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, "1");
        assert_eq!(out[0].get("Num_Accept"), Some(&AggregateValue::Count(1)));
        assert_eq!(out[0].get("Num_Reject"), Some(&AggregateValue::Count(1)));
    }

    #[test]
    fn test_counts_partition_group_size() {
        let records = vec![
            review("7", "Accept", Value::Missing, Value::Missing),
            review("7", "Discuss", Value::Missing, Value::Missing),
            review("7", "Reject", Value::Missing, Value::Missing),
            review("7", "Accept", Value::Missing, Value::Missing),
        ];
        let rules = vec![
            count_rule("a", "Accept"),
            count_rule("r", "Reject"),
            count_rule("d", "Discuss"),
        ];

        let out = aggregate(&records, "ID", &rules).unwrap();
        let total: usize = out[0]
            .values
            .iter()
            .map(|(_, value)| match value {
                AggregateValue::Count(n) => *n,
                _ => 0,
            })
            .sum();

        assert_eq!(total, out[0].members);
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let records = vec![
            review("3", "Accept", Value::Missing, Value::Missing),
            review("1", "Accept", Value::Missing, Value::Missing),
            review("3", "Reject", Value::Missing, Value::Missing),
            review("2", "Accept", Value::Missing, Value::Missing),
        ];

        let groups = partition(&records, "ID");
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();

        assert_eq!(keys, vec!["3", "1", "2"]);
        assert_eq!(groups[0].members.len(), 2);
    }

    #[test]
    fn test_records_without_key_are_skipped() {
        let records = vec![
            review("3", "Accept", Value::Missing, Value::Missing),
            Record::from_pairs([("ID", Value::Missing), ("Acceptance", Value::from("Accept"))]),
        ];
        assert_eq!(partition(&records, "ID").len(), 1);
    }

    #[test]
    fn test_mean_excludes_non_numeric_and_rounds() {
        let records = vec![
            review("9", "Accept", Value::Number(4.0), Value::Missing),
            review("9", "Accept", Value::from("3"), Value::Missing),
            review("9", "Accept", Value::from("n/a"), Value::Missing),
            review("9", "Accept", Value::Number(4.0), Value::Missing),
        ];
        let rules = vec![NamedRule::new(
            "Mean_Substance_Rating",
            AggregationRule::Mean {
                field: "Substance_Rating".to_string(),
            },
        )];

        let out = aggregate(&records, "ID", &rules).unwrap();

        assert_eq!(out[0].get("Mean_Substance_Rating"), Some(&AggregateValue::Mean(Some(3.67))));
    }

    #[test]
    fn test_mean_without_numbers_is_undefined() {
        let records = vec![
            review("9", "Accept", Value::Missing, Value::Missing),
            review("9", "Accept", Value::from("nan"), Value::Missing),
        ];
        let rules = vec![NamedRule::new(
            "Mean",
            AggregationRule::Mean {
                field: "Substance_Rating".to_string(),
            },
        )];

        let out = aggregate(&records, "ID", &rules).unwrap();

        assert!(out[0].get("Mean").is_some_and(AggregateValue::is_undefined));
    }

    #[test]
    fn test_filtered_list_drops_sentinels_and_keeps_order() {
        let records = vec![
            review("5", "Accept", Value::Missing, Value::from("clear")),
            review("5", "Accept", Value::Missing, Value::from("NaN")),
            review("5", "Accept", Value::Missing, Value::Missing),
            review("5", "Accept", Value::Missing, Value::from("")),
            review("5", "Accept", Value::Missing, Value::Number(f64::NAN)),
            review("5", "Accept", Value::Missing, Value::from("needs data")),
        ];
        let rules = vec![NamedRule::new(
            "Comments_for_Birddog",
            AggregationRule::FilteredList {
                field: "Comments_for_Birddog".to_string(),
            },
        )];

        let out = aggregate(&records, "ID", &rules).unwrap();

        assert_eq!(
            out[0].get("Comments_for_Birddog"),
            Some(&AggregateValue::List(vec![
                "clear".to_string(),
                "needs data".to_string()
            ]))
        );
    }

    #[test]
    fn test_single_row_group_for_every_rule() {
        let records = vec![review("8", "Accept", Value::Number(4.0), Value::from("clear"))];
        let rules = vec![
            count_rule("Num_Accept", "Accept"),
            count_rule("Num_Reject", "Reject"),
            NamedRule::new(
                "Mean_Substance_Rating",
                AggregationRule::Mean {
                    field: "Substance_Rating".to_string(),
                },
            ),
            NamedRule::new(
                "Comments_for_Birddog",
                AggregationRule::FilteredList {
                    field: "Comments_for_Birddog".to_string(),
                },
            ),
        ];

        let out = aggregate(&records, "ID", &rules).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].members, 1);
        assert_eq!(out[0].get("Num_Accept"), Some(&AggregateValue::Count(1)));
        assert_eq!(out[0].get("Num_Reject"), Some(&AggregateValue::Count(0)));
        assert_eq!(out[0].get("Mean_Substance_Rating"), Some(&AggregateValue::Mean(Some(4.0))));
        assert_eq!(
            out[0].get("Comments_for_Birddog"),
            Some(&AggregateValue::List(vec!["clear".to_string()]))
        );
    }

    #[test]
    fn test_representative_index() {
        let mut second = review("4", "Reject", Value::Missing, Value::Missing);
        second.insert("Title", Value::from("Second row title"));
        let records = vec![review("4", "Accept", Value::Missing, Value::Missing), second];
        let rules = vec![
            NamedRule::new(
                "Title",
                AggregationRule::Representative {
                    field: "Title".to_string(),
                    index: 1,
                },
            ),
            NamedRule::new(
                "First_Title",
                AggregationRule::Representative {
                    field: "Title".to_string(),
                    index: 0,
                },
            ),
        ];

        let out = aggregate(&records, "ID", &rules).unwrap();

        assert_eq!(
            out[0].get("Title"),
            Some(&AggregateValue::Scalar(Value::from("Second row title")))
        );
        assert_eq!(
            out[0].get("First_Title"),
            Some(&AggregateValue::Scalar(Value::from("Paper 4")))
        );
    }

    #[test]
    fn test_representative_out_of_range_is_fault() {
        let records = vec![review("4", "Accept", Value::Missing, Value::Missing)];
        let rules = vec![NamedRule::new(
            "Title",
            AggregationRule::Representative {
                field: "Title".to_string(),
                index: 1,
            },
        )];

        let err = aggregate(&records, "ID", &rules).unwrap_err();

        assert!(matches!(
            err,
            ReportError::RepresentativeOutOfRange { index: 1, len: 1, .. }
        ));
    }

    #[test]
    fn test_unknown_field_is_fault() {
        let records = vec![review("4", "Accept", Value::Missing, Value::Missing)];
        let rules = vec![NamedRule::new(
            "Mean_Quality",
            AggregationRule::Mean {
                field: "Quality_Rating".to_string(),
            },
        )];

        let err = aggregate(&records, "ID", &rules).unwrap_err();

        assert!(err.is_configuration_fault());
        assert!(err.to_string().contains("Quality_Rating"));
    }

    #[test]
    fn test_concat_where_collects_volunteers() {
        let volunteer = |first: &str, last: &str, answer: &str| {
            Record::from_pairs([
                ("ID", Value::from("10")),
                ("ReviewerFirstname", Value::from(first)),
                ("ReviewerLastname", Value::from(last)),
                ("Birddog_Volunteer", Value::from(answer)),
            ])
        };
        let records = vec![
            volunteer("Ann", "Ode", "Yes"),
            volunteer("Bob", "Ray", "No"),
            volunteer("Cyd", "Fox", "Yes"),
        ];
        let rules = vec![NamedRule::new(
            "Birddog_Volunteer",
            AggregationRule::ConcatWhere {
                fields: vec!["ReviewerLastname".to_string(), "ReviewerFirstname".to_string()],
                separator: ",".to_string(),
                where_field: "Birddog_Volunteer".to_string(),
                equals: "Yes".to_string(),
            },
        )];

        let out = aggregate(&records, "ID", &rules).unwrap();

        assert_eq!(
            out[0].get("Birddog_Volunteer"),
            Some(&AggregateValue::List(vec!["Ode,Ann".to_string(), "Fox,Cyd".to_string()]))
        );
    }

    #[test]
    fn test_rule_deserializes_from_toml() {
        let toml_content = r#"
output = "Num_Accept"
rule = "count_where"
field = "Acceptance"
equals = "Accept"
"#;
        let rule: NamedRule = toml::from_str(toml_content).unwrap();
        assert_eq!(rule, count_rule("Num_Accept", "Accept"));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(2.675, 1), 2.7);
    }
}
