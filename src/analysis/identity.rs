//! Awardee submission history.
//!
//! Joins a roster of scholarship awardees against several years of
//! canonicalized submission records by (first name, last name). Every
//! roster entry yields at least one history row: one per matching
//! submission, or a single "not submitted" row when nothing matches.

use crate::models::{Identity, PaperOutcome, Record, SubmissionHistoryRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Field names and status vocabulary of the canonicalized submission pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchFields {
    pub first_name: String,
    pub last_name: String,
    pub id: String,
    pub title: String,
    pub subcommittee: String,
    pub abstract_status: String,
    pub paper_status: String,
    /// Value of `abstract_status` meaning the abstract was accepted.
    pub abstract_accepted: String,
    /// Value of `paper_status` meaning the paper was accepted.
    pub paper_accepted: String,
    /// Value of `paper_status` meaning the paper was rejected.
    pub paper_rejected: String,
}

impl Default for MatchFields {
    fn default() -> Self {
        Self {
            first_name: "First_Name".to_string(),
            last_name: "Last_Name".to_string(),
            id: "ID".to_string(),
            title: "Title".to_string(),
            subcommittee: "Subcommittee".to_string(),
            abstract_status: "Abstract_Accept".to_string(),
            paper_status: "Paper_Accept".to_string(),
            abstract_accepted: "Abstract_Accepted".to_string(),
            paper_accepted: "Paper_Accepted".to_string(),
            paper_rejected: "Paper_Rejected".to_string(),
        }
    }
}

/// Column names of the awardee roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterFields {
    pub first_name: String,
    pub last_name: String,
    pub award_name: String,
    pub award_year: String,
}

impl Default for RosterFields {
    fn default() -> Self {
        Self {
            first_name: "First_Name".to_string(),
            last_name: "Last_Name".to_string(),
            award_name: "Scholarship".to_string(),
            award_year: "Year".to_string(),
        }
    }
}

/// Decides whether a matched pool row was submitted by its first author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AuthorshipPolicy {
    /// Legacy heuristic: a row is a first-author row when the row just
    /// before it in the pool carries a different ID. Co-authors are exported
    /// as consecutive rows sharing the ID, lead author first.
    #[default]
    PrecedingRow,
    /// Reads an explicit author-order column.
    ExplicitColumn { field: String, equals: String },
}

impl AuthorshipPolicy {
    fn is_first_author(&self, pool: &SubmissionPool, index: usize, id_field: &str) -> bool {
        match self {
            AuthorshipPolicy::PrecedingRow => {
                if index == 0 {
                    return true;
                }
                let current = pool.entries[index].record.value(id_field).key();
                let previous = pool.entries[index - 1].record.value(id_field).key();
                current != previous
            }
            AuthorshipPolicy::ExplicitColumn { field, equals } => {
                pool.entries[index].record.value(field).matches(equals)
            }
        }
    }
}

/// Canonicalized records of one submission year.
#[derive(Debug, Clone)]
pub struct PoolYear {
    /// Explicit year; derived from the first record's ID when absent.
    pub year: Option<String>,
    pub records: Vec<Record>,
}

/// One row of the pooled submission set.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub year: Option<String>,
    pub record: Record,
}

/// Multi-year submission rows in original order, indexed by author name.
#[derive(Debug, Clone, Default)]
pub struct SubmissionPool {
    entries: Vec<PoolEntry>,
    by_name: HashMap<(String, String), Vec<usize>>,
}

impl SubmissionPool {
    /// Concatenates the years in the given order and indexes every row by
    /// its (first, last) name. Rows without a full name are kept for the
    /// authorship heuristic but can never match.
    pub fn build(years: Vec<PoolYear>, fields: &MatchFields) -> Self {
        let mut pool = Self::default();

        for PoolYear { year, records } in years {
            let year = year.or_else(|| derive_submission_year(&records, &fields.id));
            if year.is_none() {
                warn!("Could not determine submission year for {} records", records.len());
            }

            for record in records {
                let index = pool.entries.len();
                let first = record.value(&fields.first_name).key();
                let last = record.value(&fields.last_name).key();
                if let (Some(first), Some(last)) = (first, last) {
                    pool.by_name.entry((first, last)).or_default().push(index);
                }
                pool.entries.push(PoolEntry {
                    year: year.clone(),
                    record,
                });
            }
        }

        debug!(
            "Submission pool: {} rows, {} distinct authors",
            pool.entries.len(),
            pool.by_name.len()
        );
        pool
    }

    /// Pool positions of rows authored by this name, in pool order.
    pub fn matches(&self, first_name: &str, last_name: &str) -> &[usize] {
        self.by_name
            .get(&(first_name.to_string(), last_name.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derives "20YY" from the first two characters of the first record's ID.
pub fn derive_submission_year(records: &[Record], id_field: &str) -> Option<String> {
    let id = records.first()?.value(id_field).key()?;
    let prefix: String = id.chars().take(2).collect();
    if prefix.len() == 2 && prefix.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("20{}", prefix))
    } else {
        None
    }
}

/// Builds one identity per roster record, in roster order.
///
/// A row with an incomplete name is kept with the parts it has; it can never
/// match the pool and is reported as not submitted.
pub fn roster_from_records(records: &[Record], fields: &RosterFields) -> Vec<Identity> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let first = record.value(&fields.first_name).key();
            let last = record.value(&fields.last_name).key();
            if first.is_none() || last.is_none() {
                warn!("Roster row {} has no complete name; it cannot be matched", index + 1);
            }
            Identity {
                first_name: first.unwrap_or_default(),
                last_name: last.unwrap_or_default(),
                award_name: record.value(&fields.award_name).to_string(),
                award_year: record.value(&fields.award_year).to_string(),
            }
        })
        .collect()
}

/// Total join of a roster against a submission pool.
#[derive(Debug, Clone, Default)]
pub struct IdentityMatcher {
    pub fields: MatchFields,
    pub policy: AuthorshipPolicy,
}

impl IdentityMatcher {
    pub fn new(fields: MatchFields, policy: AuthorshipPolicy) -> Self {
        Self { fields, policy }
    }

    /// One or more history rows per identity, roster order first, then
    /// pool order. Name comparison is exact and case-sensitive.
    pub fn match_roster(&self, roster: &[Identity], pool: &SubmissionPool) -> Vec<SubmissionHistoryRecord> {
        let mut history = Vec::with_capacity(roster.len());

        for identity in roster {
            let hits = pool.matches(&identity.first_name, &identity.last_name);
            if hits.is_empty() {
                debug!("No submissions found for {}", identity.full_name());
                history.push(SubmissionHistoryRecord::not_found(identity.clone()));
                continue;
            }

            for &index in hits {
                history.push(self.history_row(identity, pool, index));
            }
        }

        history
    }

    fn history_row(&self, identity: &Identity, pool: &SubmissionPool, index: usize) -> SubmissionHistoryRecord {
        let fields = &self.fields;
        let entry = &pool.entries[index];
        let record = &entry.record;

        let paper_status = record.value(&fields.paper_status);
        let paper = if paper_status.matches(&fields.paper_accepted) {
            PaperOutcome::Accepted
        } else if paper_status.matches(&fields.paper_rejected) {
            PaperOutcome::Rejected
        } else {
            PaperOutcome::NotSubmitted
        };

        SubmissionHistoryRecord {
            identity: identity.clone(),
            abstract_submitted: true,
            submission_year: entry.year.clone(),
            abstract_id: record.value(&fields.id).key(),
            title: record.value(&fields.title).key(),
            subcommittee: record.value(&fields.subcommittee).key(),
            first_author: self.policy.is_first_author(pool, index, &fields.id),
            abstract_accepted: record.value(&fields.abstract_status).matches(&fields.abstract_accepted),
            paper,
        }
    }
}
