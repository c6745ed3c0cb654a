//! Domain model for stored values and records.
//!
//! # Responsibility
//! - Define the explicit value variant persisted by the store.
//! - Define the row shapes of both storage tiers.
//!
//! # Invariants
//! - Stored values are always representable as JSON text.

pub mod entry;
pub mod value;
