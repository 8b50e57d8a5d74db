//! Core types and configuration for the barsmith engine.
//!
//! This crate provides shared types used across all other crates:
//! - Interval model (parsing, durations)
//! - Market data types (ticks, raw records, bars, gaps)
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod interval;
pub mod types;

pub use config::{AggregationConfig, CalendarConfig, Config, QualityConfig};
pub use error::{Error, Result};
pub use interval::{Granularity, IntervalSpec, IntervalUnit};
pub use types::*;
