//! Use-case services built on top of repository contracts.
//!
//! # Responsibility
//! - Expose the store operation set to callers.
//! - Own connection lifetime and transaction boundaries.
//!
//! # Invariants
//! - Services never hold a connection across calls.

pub mod registry;
pub mod store;
