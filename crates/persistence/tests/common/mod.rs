//! Test infrastructure for the persistence layer.
//!
//! Each integration test binary pulls this in with `mod common;` and uses a
//! subset of the helpers.

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
