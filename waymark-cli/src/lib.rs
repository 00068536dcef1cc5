//! Driver library for the `waymark` binary.
//!
//! Split from `main.rs` so the stage table and argument handling are
//! testable without spawning the binary.

#![forbid(unsafe_code)]

pub mod cli;
pub mod stages;
pub mod tools;
