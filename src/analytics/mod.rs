//! Aggregation over the derived dataset.
//!
//! This module derives analytical fields per trip, computes quantile-based
//! outlier bounds, runs the grouped queries, and emits the assembled report
//! as JSON locally or to S3.

pub mod engine;
pub mod outliers;
pub mod publish;
pub mod types;
pub mod utility;
