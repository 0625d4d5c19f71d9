//! Several threads calling the same wrapped function, all appending to one record file.
//!
//! Run the example a few times in parallel to see separate processes share the file too.
//!
//! Run with: `cargo run --example profiler_threaded`

use std::sync::Arc;
use std::thread;

use multiprocess_profiler::{ProfiledFn, ProfilerOptions};

fn checksum(data: &[u8]) -> Result<u32, std::io::Error> {
    Ok(data.iter().fold(0_u32, |acc, &byte| {
        acc.rotate_left(5) ^ u32::from(byte)
    }))
}

fn main() {
    let checksum = Arc::new(ProfiledFn::new(
        ProfilerOptions::new().result_path("threaded_profile"),
        checksum,
    ));

    println!("recording calls of {}", checksum.id());

    let workers: Vec<_> = (0..4_u8)
        .map(|worker| {
            let checksum = Arc::clone(&checksum);

            thread::spawn(move || {
                let data = vec![worker; 64 * 1024];

                for _ in 0..10 {
                    match checksum.call_with(data.as_slice()) {
                        Ok(Ok(value)) => println!("worker {worker}: {value:08x}"),
                        Ok(Err(error)) => println!("worker {worker}: checksum failed: {error}"),
                        Err(error) => println!("worker {worker}: profiler failed: {error}"),
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker threads do not panic");
    }
}
