// Simulated position keeping
pub mod ledger;

pub use ledger::{transition, LedgerConfig, LedgerState, PositionLedger, SizingPolicy, Transition};
