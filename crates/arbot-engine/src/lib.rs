//! # arbot-engine
//! Pure settlement math: profit curve, cycle clock, and the ledger that
//! replays elapsed cycles into a [`arbot_core::types::SettlementPlan`].
//! No I/O anywhere in this crate.

pub mod clock;
pub mod curve;
pub mod ledger;

pub use clock::{elapsed_cycles, FixedClock, SystemClock};
pub use curve::TierCurve;
pub use ledger::SettlementLedger;
