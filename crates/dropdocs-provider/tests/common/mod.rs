//! Common test utilities for provider integration tests.
#![allow(dead_code)]

pub mod harness;
pub mod mock;

pub use harness::TestProvider;
