//! Entity manager contract and the bundled SQLite implementation.
//!
//! # Responsibility
//! - Turn an entity reference into a flat or tree-shaped data-access handle.
//! - Validate hierarchy support before handing out tree handles.
//!
//! # Invariants
//! - Handles borrow the manager's connection; they never own it.
//! - Tree handles are only produced for entities declaring a hierarchy.

use crate::db::DbError;
use crate::model::entity::{EntityDescriptor, EntityRef, Hierarchy};
use crate::query::builder::QueryBuilder;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors raised by managers, handles and query builders.
#[derive(Debug)]
pub enum ManagerError {
    /// Entity reference does not resolve in the live entity model.
    UnknownEntity(String),
    /// Tree handle requested for an entity without hierarchy metadata.
    NotTreeEntity(String),
    /// Query alias is empty or not an identifier.
    InvalidAlias(String),
    /// Query referenced a column the entity does not map.
    UnknownColumn { entity: String, column: String },
    Db(DbError),
}

impl Display for ManagerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(name) => write!(f, "entity is not registered: {name}"),
            Self::NotTreeEntity(name) => {
                write!(f, "entity has no hierarchy and cannot back a tree repository: {name}")
            }
            Self::InvalidAlias(alias) => write!(f, "query alias is invalid: `{alias}`"),
            Self::UnknownColumn { entity, column } => {
                write!(f, "entity `{entity}` has no column `{column}`")
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ManagerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ManagerError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ManagerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Data-access handle scoped to one entity.
pub trait RepositoryHandle {
    fn entity(&self) -> &EntityDescriptor;

    /// Starts a query over this handle's entity.
    fn create_query_builder(&self, alias: &str) -> ManagerResult<QueryBuilder> {
        QueryBuilder::new(self.entity().clone(), alias)
    }
}

/// Data-access handle for an entity whose records form a hierarchy.
pub trait TreeRepositoryHandle: RepositoryHandle {
    fn hierarchy(&self) -> &Hierarchy;
}

/// Produces connection-bound handles for entity references.
///
/// Implementations accept both type and string references and resolve them
/// against their own entity model.
pub trait EntityManager {
    type Repository: RepositoryHandle;
    type TreeRepository: TreeRepositoryHandle;

    fn repository_for(&self, entity: &EntityRef) -> ManagerResult<Self::Repository>;

    /// Fails with `NotTreeEntity` when the entity declares no hierarchy.
    fn tree_repository_for(&self, entity: &EntityRef) -> ManagerResult<Self::TreeRepository>;
}
