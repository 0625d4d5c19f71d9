//! Platform abstraction layer for the profiler.
//!
//! Everything the profiler needs from the operating system (the clock, advisory file locks and
//! process identity) goes through the [`Platform`] trait so unit tests can substitute a mock.

mod abstractions;
mod facade;
mod real;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub(crate) use abstractions::*;
pub(crate) use facade::*;
pub(crate) use real::*;
