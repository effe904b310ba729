//! Device inventory domain model.
//!
//! # Responsibility
//! - Define the canonical device row and the per-source fact sets.
//!
//! # Invariants
//! - Every stored device is identified by a stable `DeviceId`.
//! - There is no delete path; rows are only created or merged.

pub mod device;
