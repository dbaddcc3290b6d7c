//! ABOUTME: Core error type, tracing setup and timing helpers
//! ABOUTME: Foundation crate shared by every exporter component

pub mod error;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
pub use time::MonotonicTimer;
