//! Bracketing a region by hand with `start()` and `stop()`.
//!
//! Manual mode does not record errors or panics in the region. Prefer scopes where possible.
//!
//! Run with: `cargo run --example profiler_manual`
#![expect(
    clippy::arithmetic_side_effects,
    reason = "this is example code that doesn't need production-level safety"
)]

use std::thread;
use std::time::Duration;

use multiprocess_profiler::{Profiler, ProfilerOptions};

fn main() -> Result<(), multiprocess_profiler::Error> {
    let mut profiler = Profiler::new(
        ProfilerOptions::new()
            .id("manual_region")
            .result_path("manual_profile")
            .timeout_secs(2.5)
            .ignore_timeout(false)
            .verbose(true),
    );

    for round in 1..=3_u64 {
        profiler.start()?;
        thread::sleep(Duration::from_millis(10 * round));
        let record = profiler.stop()?;

        println!("{record}");
    }

    Ok(())
}
