//! Utility functions and types

mod parallel;
pub mod stats;

pub use parallel::{try_parallel_map, ParallelConfig};

use std::time::{Duration, Instant};

/// Format a duration for progress output
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{:.1}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{}m {:.0}s", secs as u64 / 60, secs % 60.0)
    }
}

/// Run `f` and return its result with the elapsed wall time
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let out = f();
    (out, start.elapsed())
}
