//! Entity model shared by registration, managers and query construction.
//!
//! # Responsibility
//! - Define how entity types are referenced and described.
//! - Hold the live entity model that managers resolve references against.
//!
//! # Invariants
//! - Entity names and table identifiers are validated before registration.
//! - The entity model is immutable once handed to a manager.

pub mod entity;
pub mod entity_model;
pub(crate) mod ident;
