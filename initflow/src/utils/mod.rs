//! Utility functions for timestamps and identifier handling.

mod ids;
pub mod timestamps;

pub use ids::{generate_run_id, is_valid_id, ID_PATTERN};
pub use timestamps::{elapsed_ms, iso_timestamp, now_utc, Timestamp};
