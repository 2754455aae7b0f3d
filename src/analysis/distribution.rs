//! Share of unique submissions per category.

use crate::analysis::aggregator::round_to;
use crate::models::{Record, Table, TableCell};
use serde::Serialize;
use std::collections::HashSet;

/// Count and share for one category value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    pub value: String,
    pub count: usize,
    /// `count` divided by the number of unique entities, 4 decimals.
    pub proportion: f64,
}

/// Category breakdown over unique entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub field: String,
    /// Number of distinct entity keys in the input.
    pub unique_entities: usize,
    pub entries: Vec<DistributionEntry>,
}

/// Deduplicates by `key` (first record wins) and computes the share of
/// each `field` value.
///
/// Entities whose `field` is missing still count toward the denominator,
/// so proportions may sum to less than one.
pub fn distribution<'a>(records: impl IntoIterator<Item = &'a Record>, key: &str, field: &str) -> Distribution {
    let mut seen: HashSet<String> = HashSet::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for record in records {
        let Some(entity) = record.value(key).key() else {
            continue;
        };
        if !seen.insert(entity) {
            continue;
        }
        let Some(value) = record.value(field).key() else {
            continue;
        };
        match counts.iter_mut().find(|(existing, _)| *existing == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let unique_entities = seen.len();
    let entries = counts
        .into_iter()
        .map(|(value, count)| DistributionEntry {
            value,
            count,
            proportion: round_to(count as f64 / unique_entities as f64, 4),
        })
        .collect();

    Distribution {
        field: field.to_string(),
        unique_entities,
        entries,
    }
}

impl Distribution {
    pub fn to_table(&self, name: impl Into<String>) -> Table {
        let mut table = Table::new(
            name,
            vec![self.field.clone(), "Count".to_string(), "Proportion".to_string()],
        );
        for entry in &self.entries {
            table.rows.push(vec![
                TableCell::Text(entry.value.clone()),
                TableCell::Integer(entry.count),
                TableCell::Number(Some(entry.proportion)),
            ]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(id: &str, org: &str) -> Record {
        Record::from_pairs([("ID", id), ("Org_Type", org)])
    }

    #[test]
    fn test_distribution_over_unique_ids() {
        let records = vec![
            submission("1", "Industry"),
            submission("1", "Industry"),
            submission("2", "Academia"),
            submission("3", "Industry"),
            submission("4", ""),
        ];

        let dist = distribution(&records, "ID", "Org_Type");

        assert_eq!(dist.unique_entities, 4);
        assert_eq!(dist.entries.len(), 2);
        assert_eq!(dist.entries[0].value, "Industry");
        assert_eq!(dist.entries[0].count, 2);
        assert_eq!(dist.entries[0].proportion, 0.5);
        assert_eq!(dist.entries[1].proportion, 0.25);
    }

    #[test]
    fn test_first_record_per_entity_wins() {
        let records = vec![submission("1", "Industry"), submission("1", "Academia")];

        let dist = distribution(&records, "ID", "Org_Type");

        assert_eq!(dist.entries.len(), 1);
        assert_eq!(dist.entries[0].value, "Industry");
    }

    #[test]
    fn test_empty_distribution() {
        let dist = distribution(&Vec::<Record>::new(), "ID", "Org_Type");
        assert_eq!(dist.unique_entities, 0);
        assert!(dist.entries.is_empty());
        assert_eq!(dist.to_table("empty").rows.len(), 0);
    }
}
