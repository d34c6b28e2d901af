//! Sync orchestration around the reconciliation engine.
//!
//! # Responsibility
//! - Resolve the remote source for an account.
//! - Serialise runs per account while letting different accounts proceed
//!   in parallel.
//! - Chain fetch → reconcile → cleanup for one account.

pub mod account_locks;
pub mod remote;
pub mod runner;
pub mod source_registry;
