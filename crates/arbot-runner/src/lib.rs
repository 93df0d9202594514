//! Settlement orchestration and persistence.
//!
//! This crate owns the two [`arbot_core::traits::SettlementStore`]
//! implementations (in-memory and RocksDB) and the [`SettlementRunner`],
//! which drives the per-user commit loop and the bounded parallel sweep
//! over all eligible users.

pub mod config;
pub mod memory;
pub mod rocks;
pub mod runner;

pub use config::RunnerConfig;
pub use memory::MemoryStore;
pub use rocks::RocksStore;
pub use runner::SettlementRunner;
