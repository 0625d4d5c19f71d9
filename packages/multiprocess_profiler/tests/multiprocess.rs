//! Many processes appending to the same record file.
//!
//! The parent test relaunches this test binary, asking it to run only the child test. The child
//! test does nothing unless the record file path is passed in the environment, so it is harmless
//! when the whole suite runs normally.
#![allow(clippy::indexing_slicing, reason = "panic is fine in tests")]

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::process::{Child, Command};

use multiprocess_profiler::{HEADER, Profiler, ProfilerOptions};

const RECORD_PATH_VAR: &str = "MULTIPROCESS_PROFILER_TEST_RECORD_PATH";
const CHILD_TEST_NAME: &str = "child_appends_records";
const RECORDS_PER_CHILD: usize = 25;

#[test]
fn child_appends_records() {
    let Ok(record_path) = env::var(RECORD_PATH_VAR) else {
        return;
    };

    let mut profiler = Profiler::new(
        ProfilerOptions::new()
            .id("child")
            .ignore_timeout(false)
            .result_path(record_path),
    );

    for _ in 0..RECORDS_PER_CHILD {
        let _scope = profiler.scope().unwrap();
    }
}

fn spawn_children(record_path: &Path, count: usize) -> Vec<Child> {
    let test_binary = env::current_exe().unwrap();

    (0..count)
        .map(|_| {
            Command::new(&test_binary)
                .args([CHILD_TEST_NAME, "--exact", "--nocapture"])
                .env(RECORD_PATH_VAR, record_path)
                .spawn()
                .unwrap()
        })
        .collect()
}

fn wait_all(children: Vec<Child>) {
    for mut child in children {
        assert!(child.wait().unwrap().success());
    }
}

fn read_rows(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .split_terminator("\r\n")
        .map(str::to_string)
        .collect()
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn two_processes_share_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let record_path = dir.path().join("shared.csv");

    wait_all(spawn_children(&record_path, 2));

    let rows = read_rows(&record_path);
    assert_eq!(rows.len(), 2 * RECORDS_PER_CHILD + 1);
    assert_eq!(rows[0], HEADER.join(","));

    let writers: HashSet<_> = rows[1..]
        .iter()
        .map(|row| row.split(',').nth(2).unwrap().to_string())
        .collect();
    assert_eq!(writers.len(), 2);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn many_processes_never_interleave_records() {
    const CHILDREN: usize = 8;

    let dir = tempfile::tempdir().unwrap();
    let record_path = dir.path().join("shared.csv");

    wait_all(spawn_children(&record_path, CHILDREN));

    let rows = read_rows(&record_path);
    assert_eq!(rows.len(), CHILDREN * RECORDS_PER_CHILD + 1);
    assert_eq!(rows.iter().filter(|row| row.starts_with("id,")).count(), 1);

    for row in &rows[1..] {
        assert!(row.starts_with("child,"));
        assert_eq!(row.split(',').count(), HEADER.len());
    }

    // Parent process of every child is this test process.
    let parent = std::process::id().to_string();
    assert!(rows[1..]
        .iter()
        .all(|row| row.split(',').nth(3) == Some(parent.as_str())));
}
