//! Bar aggregation for the barsmith engine.
//!
//! This crate handles:
//! - Aggregation mode selection and supported upgrade targets
//! - Time-window, fixed-chunk and calendar grouping
//! - The shared OHLCV reduction
//! - Completeness and continuity validation

pub mod aggregator;
pub mod grouping;
pub mod mode;
pub mod reducer;
pub mod validator;

pub use aggregator::Aggregator;
pub use grouping::Bucket;
pub use mode::{detect_mode, get_supported_targets, AggregationMode};
pub use reducer::reduce;
pub use validator::BucketValidator;
