//! Shared fixtures for recorder integration tests.

pub mod common;
