//! Alias-scoped SELECT construction over one entity.

pub mod builder;
