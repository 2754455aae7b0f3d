//! Data models for the report engine.
//!
//! This module contains the core data structures shared by the
//! canonicalization, aggregation, cross-tabulation and identity matching
//! stages: raw records, alias tables, summary rows, contingency tables and
//! the tabular result handed to the writers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Textual marker the submission platform exports for an empty cell.
pub const MISSING_SENTINEL: &str = "nan";

/// Separator used when a list cell is flattened into a single string.
pub const LIST_SEPARATOR: &str = "; ";

static MISSING: Value = Value::Missing;

/// A single scalar cell of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Returns true for absent cells, blank text and NaN numbers.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Number(n) => n.is_nan(),
        }
    }

    /// Returns true when the cell holds the textual "missing" marker.
    pub fn is_sentinel(&self) -> bool {
        match self {
            Value::Text(s) => s.trim().eq_ignore_ascii_case(MISSING_SENTINEL),
            Value::Number(n) => n.is_nan(),
            Value::Missing => false,
        }
    }

    /// Numeric view of the cell. Text is parsed; non-finite numbers are rejected.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Returns true when the cell carries no usable value: missing or the sentinel.
    pub fn is_absent(&self) -> bool {
        self.is_missing() || self.is_sentinel()
    }

    /// Textual key of the cell, `None` when absent.
    pub fn key(&self) -> Option<String> {
        if self.is_absent() {
            None
        } else {
            Some(self.to_string())
        }
    }

    /// Exact, case-sensitive comparison against a textual value.
    pub fn matches(&self, expected: &str) -> bool {
        match self {
            Value::Text(s) => s == expected,
            Value::Number(_) => !self.is_missing() && self.to_string() == expected,
            Value::Missing => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Missing => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

/// One raw row: an ordered mapping from field name to cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from ordered `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Self::new();
        for (name, value) in pairs {
            record.insert(name, value.into());
        }
        record
    }

    /// Returns the cell for a field, if the field exists.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Returns the cell for a field, treating an absent field as missing.
    pub fn value(&self, field: &str) -> &Value {
        self.get(field).unwrap_or(&MISSING)
    }

    /// Whether the record has a column with this name.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == field)
    }

    /// Sets a field, replacing the value in place when it already exists.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Iterates fields in their original order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Field names in their original order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// External-name to internal-name translation table.
///
/// The same table is consulted for field names and for field values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the internal name for an external one.
    pub fn get(&self, external: &str) -> Option<&str> {
        self.entries.get(external).map(String::as_str)
    }

    pub fn insert(&mut self, external: impl Into<String>, internal: impl Into<String>) {
        self.entries.insert(external.into(), internal.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (external, internal) in iter {
            table.insert(external, internal);
        }
        table
    }
}

/// A computed cell of a summary row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateValue {
    /// Value copied from a representative group member.
    Scalar(Value),
    /// Number of members matching a predicate.
    Count(usize),
    /// Rounded mean; `None` when no member carried a numeric value.
    Mean(Option<f64>),
    /// Ordered free-text collection.
    List(Vec<String>),
}

impl AggregateValue {
    /// Returns true for a mean computed over zero numeric values.
    pub fn is_undefined(&self) -> bool {
        matches!(self, AggregateValue::Mean(None))
    }
}

impl fmt::Display for AggregateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateValue::Scalar(value) => write!(f, "{}", value),
            AggregateValue::Count(count) => write!(f, "{}", count),
            AggregateValue::Mean(Some(mean)) => write!(f, "{}", mean),
            AggregateValue::Mean(None) => Ok(()),
            AggregateValue::List(items) => write!(f, "{}", items.join(LIST_SEPARATOR)),
        }
    }
}

/// One aggregated output row per entity group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    /// Name of the group key field.
    pub key_field: String,
    /// Entity key shared by all members of the group.
    pub key: String,
    /// Number of raw rows in the group.
    pub members: usize,
    /// Computed columns in rule order.
    pub values: Vec<(String, AggregateValue)>,
}

impl SummaryRecord {
    /// Looks up a computed column by its output name.
    #[allow(dead_code)] // Lookup for callers inspecting summaries
    pub fn get(&self, output: &str) -> Option<&AggregateValue> {
        self.values
            .iter()
            .find(|(name, _)| name == output)
            .map(|(_, value)| value)
    }
}

/// Dense two-factor contingency table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContingencyTable {
    /// Name of the row factor.
    pub row_factor: String,
    /// Name of the column factor.
    pub column_factor: String,
    /// Distinct row factor values, first-seen order.
    pub rows: Vec<String>,
    /// Distinct column factor values, first-seen order.
    pub columns: Vec<String>,
    /// `counts[row][column]`.
    pub counts: Vec<Vec<usize>>,
}

impl ContingencyTable {
    /// Count for a `(row, column)` pair; unknown labels count as zero.
    #[allow(dead_code)] // Lookup for callers inspecting tables
    pub fn get(&self, row: &str, column: &str) -> usize {
        let r = self.rows.iter().position(|label| label == row);
        let c = self.columns.iter().position(|label| label == column);
        match (r, c) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    /// Sum of every row.
    pub fn row_totals(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    /// Sum of every column.
    pub fn column_totals(&self) -> Vec<usize> {
        (0..self.columns.len())
            .map(|c| self.counts.iter().map(|row| row[c]).sum())
            .collect()
    }

    /// Sum over all cells.
    pub fn total(&self) -> usize {
        self.column_totals().iter().sum()
    }

    /// Appends a column holding each row's sum.
    pub fn with_total_column(mut self, name: &str) -> Self {
        let totals = self.row_totals();
        self.columns.push(name.to_string());
        for (row, total) in self.counts.iter_mut().zip(totals) {
            row.push(total);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A person tracked across several years of submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub first_name: String,
    pub last_name: String,
    /// Name of the award the person received.
    pub award_name: String,
    /// Year the award was given.
    pub award_year: String,
}

impl Identity {
    /// "First Last" display form.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Outcome of a submission at the paper stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperOutcome {
    Accepted,
    Rejected,
    NotSubmitted,
}

impl PaperOutcome {
    pub fn submitted(&self) -> bool {
        !matches!(self, PaperOutcome::NotSubmitted)
    }

    pub fn accepted(&self) -> bool {
        matches!(self, PaperOutcome::Accepted)
    }
}

/// One row of an awardee's submission history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionHistoryRecord {
    pub identity: Identity,
    /// Whether any abstract by this person was found.
    pub abstract_submitted: bool,
    pub submission_year: Option<String>,
    pub abstract_id: Option<String>,
    pub title: Option<String>,
    pub subcommittee: Option<String>,
    pub first_author: bool,
    pub abstract_accepted: bool,
    pub paper: PaperOutcome,
}

impl SubmissionHistoryRecord {
    /// Default row for an identity with no submission on file.
    pub fn not_found(identity: Identity) -> Self {
        Self {
            identity,
            abstract_submitted: false,
            submission_year: None,
            abstract_id: None,
            title: None,
            subcommittee: None,
            first_author: false,
            abstract_accepted: false,
            paper: PaperOutcome::NotSubmitted,
        }
    }
}

/// Abstract tabular result handed to the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    /// Output name chosen by the report configuration.
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<TableCell>>,
}

/// One cell of a [`Table`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableCell {
    Text(String),
    Integer(usize),
    Number(Option<f64>),
    List(Vec<String>),
}

impl fmt::Display for TableCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableCell::Text(s) => write!(f, "{}", s),
            TableCell::Integer(n) => write!(f, "{}", n),
            TableCell::Number(Some(n)) => write!(f, "{}", n),
            TableCell::Number(None) => Ok(()),
            TableCell::List(items) => write!(f, "{}", items.join(LIST_SEPARATOR)),
        }
    }
}

impl From<&AggregateValue> for TableCell {
    fn from(value: &AggregateValue) -> Self {
        match value {
            AggregateValue::Scalar(v) => TableCell::Text(v.to_string()),
            AggregateValue::Count(n) => TableCell::Integer(*n),
            AggregateValue::Mean(m) => TableCell::Number(*m),
            AggregateValue::List(items) => TableCell::List(items.clone()),
        }
    }
}

fn yes_no(flag: bool) -> TableCell {
    TableCell::Text(if flag { "Yes" } else { "No" }.to_string())
}

fn text_or_empty(value: &Option<String>) -> TableCell {
    TableCell::Text(value.clone().unwrap_or_default())
}

impl Table {
    /// Creates an empty table with the given name and headers.
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Summary rows: key column first, then each rule output in order.
    pub fn from_summaries(name: impl Into<String>, key_field: &str, summaries: &[SummaryRecord]) -> Self {
        let mut headers = vec![key_field.to_string()];
        if let Some(first) = summaries.first() {
            headers.extend(first.values.iter().map(|(output, _)| output.clone()));
        }

        let mut table = Self::new(name, headers);
        for summary in summaries {
            let mut row = vec![TableCell::Text(summary.key.clone())];
            row.extend(summary.values.iter().map(|(_, value)| TableCell::from(value)));
            table.rows.push(row);
        }
        table
    }

    /// Contingency table: row factor label column, then one column per value.
    pub fn from_contingency(name: impl Into<String>, crosstab: &ContingencyTable) -> Self {
        let mut headers = vec![crosstab.row_factor.clone()];
        headers.extend(crosstab.columns.iter().cloned());

        let mut table = Self::new(name, headers);
        for (label, counts) in crosstab.rows.iter().zip(&crosstab.counts) {
            let mut row = vec![TableCell::Text(label.clone())];
            row.extend(counts.iter().map(|count| TableCell::Integer(*count)));
            table.rows.push(row);
        }
        table
    }

    /// Submission history rows in the awardee report column order.
    pub fn from_history(name: impl Into<String>, history: &[SubmissionHistoryRecord]) -> Self {
        let headers = [
            "Awardee Name",
            "Scholarship Name",
            "Scholarship Year",
            "Abstract Submitted?",
            "Submission Year",
            "Abstract ID",
            "Abstract Title",
            "Subcommittee",
            "First Author?",
            "Accepted?",
            "Paper Submitted?",
            "Paper Accepted?",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let mut table = Self::new(name, headers);
        for entry in history {
            table.rows.push(vec![
                TableCell::Text(entry.identity.full_name()),
                TableCell::Text(entry.identity.award_name.clone()),
                TableCell::Text(entry.identity.award_year.clone()),
                yes_no(entry.abstract_submitted),
                text_or_empty(&entry.submission_year),
                text_or_empty(&entry.abstract_id),
                text_or_empty(&entry.title),
                text_or_empty(&entry.subcommittee),
                yes_no(entry.first_author),
                yes_no(entry.abstract_accepted),
                yes_no(entry.paper.submitted()),
                yes_no(entry.paper.accepted()),
            ]);
        }
        table
    }
}

/// Outcome of one report within a track run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportStatus {
    pub name: String,
    /// Files written for this report.
    pub files: Vec<String>,
    /// Fault that aborted the report, if any.
    pub error: Option<String>,
}

impl ReportStatus {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub name: String,
    /// Human-readable origin of the track's records.
    pub source: String,
    pub reports: Vec<ReportStatus>,
    /// Failure that prevented every report of the track from running.
    pub error: Option<String>,
}

impl TrackSummary {
    /// Track that could not load its records.
    pub fn failed(name: impl Into<String>, source: impl Into<String>, error: impl ToString) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            reports: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    /// Number of reports that failed, counting a failed track as one.
    pub fn failures(&self) -> usize {
        let failed_reports = self.reports.iter().filter(|r| !r.succeeded()).count();
        failed_reports + usize::from(self.error.is_some())
    }

    pub fn files_written(&self) -> usize {
        self.reports.iter().map(|r| r.files.len()).sum()
    }
}

/// Everything a run produced, rendered into `run_summary.md`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub output_dir: String,
    pub format: String,
    pub duration_seconds: f64,
    pub tracks: Vec<TrackSummary>,
}

impl RunSummary {
    pub fn failures(&self) -> usize {
        self.tracks.iter().map(TrackSummary::failures).sum()
    }

    pub fn files_written(&self) -> usize {
        self.tracks.iter().map(TrackSummary::files_written).sum()
    }
}
