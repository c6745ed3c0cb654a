//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage primitives the store composes.
//! - Isolate SQLite query details from operation orchestration.
//!
//! # Invariants
//! - Repository APIs return `Ok(None)` for missing rows and `Err` only for
//!   storage or decoding failures.

pub mod kv_repo;
