//! Analysis modules.
//!
//! Aggregation, cross tabulation, distributions, row validation and
//! awardee identity matching over canonicalized records.

pub mod aggregator;
pub mod crosstab;
pub mod distribution;
pub mod identity;
pub mod validation;

pub use aggregator::{aggregate, AggregationRule, NamedRule};
pub use crosstab::{cross_tab, per_group_cross_tab, select, Filter};
pub use distribution::distribution;
pub use identity::{
    roster_from_records, AuthorshipPolicy, IdentityMatcher, MatchFields, PoolYear, RosterFields,
    SubmissionPool,
};
pub use validation::{issues_table, validate};
