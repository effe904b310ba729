//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for devices.
//! - Isolate SQL details from service orchestration.
//!
//! # Invariants
//! - Merges validate their fact set before touching the store.
//! - Lookups return semantic errors (`NotFound`) distinct from store errors.

pub mod device_repo;
pub mod filter;
pub mod projection;
