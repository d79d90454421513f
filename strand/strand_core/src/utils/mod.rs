//! Utility helpers.
//!
//! - **clock**: Millisecond wall-clock sources used for task expiry and connect throttling

pub mod clock;
