//! Ledger module
//!
//! The authoritative in-memory ledger: the store, the transaction
//! applier, and transaction code generation.

pub mod applier;
pub mod code;
pub mod store;

pub use applier::{AppliedTransaction, Applier};
pub use store::{Ledger, LedgerState};
