//! Cumulative running maxima over time-bucketed event tables.
//!
//! An event table is a time-ordered list of `(time, action)` pairs. The
//! aggregator sums the actions over the whole stream and, for every distinct
//! time, keeps the largest running total seen while that time was current.

mod aggregate;
pub mod datafusion;
mod error;
pub mod ffi;
pub mod sessions;
pub mod value;

pub use {
    aggregate::{
        convert_event_table, convert_event_table_strict, cumulative, distinct_times, Aggregator,
        Baseline,
    },
    error::{AggregateError, Result},
};
