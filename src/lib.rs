//! Student performance explorer.
//!
//! Loads a `;`-separated student dataset, derives `Average_Grade`, applies
//! sidebar-style filters and computes the statistics the dashboard shows.

pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod state;

pub use data::derive::compute_derived_columns;
pub use data::filter::{
    apply_filter, derive_default_filter_spec, Constraint, FilterSpec, FilteredView,
};
pub use data::model::{ColumnType, Dataset, Record, Schema, Value};
pub use data::stats::{compute_summary_aggregates, SummaryAggregates};
pub use error::PipelineError;
pub use state::Session;
