//! Time-grain arithmetic and datetime/date intervals used throughout the
//! x-axis and cohort-day strategies.

pub mod grain;
pub mod interval;

pub use grain::TimeGrain;
pub use interval::{DateInterval, DatetimeInterval};
