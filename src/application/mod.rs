//! Application layer orchestrating transfers over the ledger ports.
//!
//! `TransferEngine` is the single entry point callers use; `ordering` and
//! `balance` hold the two pieces it composes per transfer: the deterministic
//! lock acquisition order and the in-transaction balance update.

pub mod balance;
pub mod engine;
pub mod ordering;
