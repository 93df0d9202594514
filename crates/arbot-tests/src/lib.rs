//! End-to-end and concurrency test suite for the Arbot settlement engine.
//!
//! This crate contains integration tests that exercise the full stack
//! (ledger, runner, both stores) under downtime catch-up, replay, and
//! concurrent-trigger scenarios.

pub mod helpers;
