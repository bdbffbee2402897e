//! Entity references and descriptors.
//!
//! # Responsibility
//! - Name persisted entity types either by type identity or by string name.
//! - Describe the table shape a manager needs to hand out data-access handles.
//!
//! # Invariants
//! - One `TypeId` identifies exactly one logical entity.
//! - Embedded sub-structures are flattened into their owner's columns and have
//!   no identity of their own.

use std::any::{type_name, TypeId};
use std::fmt::{Display, Formatter};

/// Persisted entity type with a static descriptor.
pub trait Entity: 'static {
    fn descriptor() -> EntityDescriptor;
}

/// Reference to an entity type inside the live entity model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// Direct type reference.
    Type { id: TypeId, name: &'static str },
    /// Entity name resolved later by the manager.
    Name(String),
}

impl EntityRef {
    /// Builds a direct type reference for `E`.
    pub fn of<E: Entity>() -> Self {
        Self::Type {
            id: TypeId::of::<E>(),
            name: short_type_name::<E>(),
        }
    }

    /// Builds a string reference.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Returns the human-readable entity name.
    pub fn name(&self) -> &str {
        match self {
            Self::Type { name, .. } => name,
            Self::Name(name) => name.as_str(),
        }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Type { name, .. } => write!(f, "{name}"),
            Self::Name(name) => write!(f, "\"{name}\""),
        }
    }
}

/// Parent/child link for hierarchical entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    /// Column holding the parent's primary key. `NULL` marks a root.
    pub parent_column: String,
}

/// Table mapping of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    /// Scalar columns including flattened embedded fields, primary key excluded.
    pub columns: Vec<String>,
    pub hierarchy: Option<Hierarchy>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            columns: Vec::new(),
            hierarchy: None,
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Flattens an embedded value into `<prefix>_<field>` columns.
    pub fn embedded(mut self, prefix: &str, fields: &[&str]) -> Self {
        self.columns
            .extend(fields.iter().map(|field| format!("{prefix}_{field}")));
        self
    }

    /// Marks the entity as hierarchical through `parent_column`.
    ///
    /// The parent column is also registered as a regular column so queries
    /// can filter on it.
    pub fn tree(mut self, parent_column: impl Into<String>) -> Self {
        let parent_column = parent_column.into();
        if !self.columns.contains(&parent_column) {
            self.columns.push(parent_column.clone());
        }
        self.hierarchy = Some(Hierarchy { parent_column });
        self
    }

    pub fn is_tree(&self) -> bool {
        self.hierarchy.is_some()
    }

    /// Returns all selectable columns, primary key first.
    pub fn all_columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_key.as_str()).chain(self.columns.iter().map(String::as_str))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.all_columns().any(|known| known == column)
    }
}

// `a::Wrapper<b::Category>` becomes `Wrapper`; generic arguments carry their own paths.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
