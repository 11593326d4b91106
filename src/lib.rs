//! Fixed-capacity, time-bucketed counters for "how much happened in the last N".
//!
//! A [`SlidingWindow`] keeps `window / granularity` buckets in a ring and a
//! background clock that moves to (and clears) the next bucket once per
//! granularity. Queries sum or average the most recent buckets.

mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod sample;
pub mod set;
mod state;
pub mod window;

pub use config::WindowConfig;
pub use error::{Result, WindowError};
pub use metrics::{Snapshot, Total};
pub use sample::Sample;
pub use set::WindowSet;
pub use window::{FloatWindow, IntWindow, SlidingWindow};
