//! Measuring regions with a scope guard and with a closure.
//!
//! Records are appended to `scoped_profile.csv` in the working directory.
//!
//! Run with: `cargo run --example profiler_scoped`

use std::hint::black_box;
use std::thread;
use std::time::Duration;

use multiprocess_profiler::{Profiler, ProfilerOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = ProfilerOptions::new()
        .result_path("scoped_profile")
        .verbose(true);

    let mut profiler = Profiler::new(options.clone().id("sleep_with_pause"));

    {
        let mut scope = profiler.scope()?;
        thread::sleep(Duration::from_millis(20));

        // Waiting on something we do not want to measure.
        scope.pause()?;
        thread::sleep(Duration::from_millis(100));
        scope.resume()?;

        thread::sleep(Duration::from_millis(20));
    }

    // Named after this line, as no identifier is set.
    let mut profiler = Profiler::new(options);

    let sum = profiler.measure(|| {
        Ok::<_, std::io::Error>((0..1_000_000_u64).map(black_box).sum::<u64>())
    })??;
    println!("sum: {sum}");

    // A failed region is recorded as broken and the error comes back to us.
    let parsed = profiler.measure(|| "forty-two".parse::<u32>())?;
    if let Err(error) = parsed {
        println!("parsing failed as expected: {error}");
    }

    Ok(())
}
