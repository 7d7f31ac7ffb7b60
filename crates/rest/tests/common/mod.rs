//! Common test utilities for REST API testing.
//!
//! - [`harness`] - Test server wired to an in-memory store
//! - [`fixtures`] - Request payloads and directly seeded reference rows

pub mod fixtures;
pub mod harness;
