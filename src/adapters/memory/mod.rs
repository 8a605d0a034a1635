//! In-memory adapters.
//!
//! Implement every persistence port with the same locking and atomicity
//! contract as the PostgreSQL adapters. Used by tests and local runs.

mod delphi_store;

pub use delphi_store::{InMemoryCaseTransaction, InMemoryDelphiStore};
