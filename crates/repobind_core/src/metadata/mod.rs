//! Custom repository metadata store.
//!
//! # Responsibility
//! - Record which entity each custom repository was declared against.
//! - Freeze registrations after an explicit load phase.
//!
//! # Invariants
//! - At most one registration exists per repository id.
//! - A built `MetadataStore` is never mutated; lookups need no locking.

pub mod manifest;
pub mod store;
