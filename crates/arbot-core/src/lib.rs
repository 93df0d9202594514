//! # arbot-core
//! Foundation types and traits for the Arbot cycle-settlement engine.

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
