//! Metric source implementations.

pub mod counter;
pub mod rolling_rate;

pub use counter::CounterSource;
pub use rolling_rate::{RateWindow, RollingRateSource};
