//! Custom repository to entity binding.
//!
//! # Responsibility
//! - Translate a custom repository id into the entity it was registered for.
//! - Hand out flat handles, tree handles and query builders for that entity.
//! - Offer explicit pass-through operations for other entity types.
//!
//! # Invariants
//! - Self operations always consult the metadata store; explicit operations never do.
//! - A missing registration (`RegistryLookup`) is distinct from a registration
//!   without entity (`NoManagedEntity`).
//! - Manager errors propagate unchanged; nothing is retried or defaulted.
//! - The resolver holds no cache and no mutable state.

use crate::manager::{EntityManager, ManagerError, ManagerResult, RepositoryHandle};
use crate::metadata::store::{CustomRepository, MetadataStore, RepositoryId};
use crate::model::entity::EntityRef;
use crate::query::builder::QueryBuilder;
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ResolverResult<T> = Result<T, ResolverError>;

/// Errors from self-resolving resolver operations.
#[derive(Debug)]
pub enum ResolverError {
    /// No registration exists for this repository id.
    RegistryLookup(RepositoryId),
    /// The registration carries no entity reference.
    NoManagedEntity(RepositoryId),
    /// Manager or query builder failure, passed through as-is.
    Manager(ManagerError),
}

impl Display for ResolverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegistryLookup(id) => {
                write!(f, "custom repository not found in metadata store: {id}")
            }
            Self::NoManagedEntity(id) => {
                write!(f, "custom repository manages no entity: {id}")
            }
            Self::Manager(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Manager(err) => Some(err),
            Self::RegistryLookup(_) | Self::NoManagedEntity(_) => None,
        }
    }
}

impl From<ManagerError> for ResolverError {
    fn from(value: ManagerError) -> Self {
        Self::Manager(value)
    }
}

/// Binding collaborator held by a custom repository.
///
/// ```ignore
/// struct PostRepository<'ctx, M: EntityManager> {
///     resolver: RepositoryResolver<'ctx, M>,
/// }
///
/// impl<M: EntityManager> CustomRepository for PostRepository<'_, M> {
///     const NAME: &'static str = "PostRepository";
/// }
/// ```
pub struct RepositoryResolver<'ctx, M: EntityManager> {
    repository: RepositoryId,
    metadata: &'ctx MetadataStore,
    manager: &'ctx M,
}

impl<M: EntityManager> Clone for RepositoryResolver<'_, M> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            metadata: self.metadata,
            manager: self.manager,
        }
    }
}

impl<'ctx, M: EntityManager> RepositoryResolver<'ctx, M> {
    /// Binds a resolver to an explicit repository id.
    pub fn new(repository: RepositoryId, metadata: &'ctx MetadataStore, manager: &'ctx M) -> Self {
        Self {
            repository,
            metadata,
            manager,
        }
    }

    /// Binds a resolver to custom repository type `R`.
    pub fn for_repository<R: CustomRepository>(
        metadata: &'ctx MetadataStore,
        manager: &'ctx M,
    ) -> Self {
        Self::new(R::repository_id(), metadata, manager)
    }

    /// Id this resolver resolves for self operations.
    pub fn repository_id(&self) -> &RepositoryId {
        &self.repository
    }

    /// Looks up the entity registered for `repository`.
    ///
    /// Returns `Ok(None)` when the registration exists without an entity.
    ///
    /// # Errors
    /// - `RegistryLookup` when no registration exists for `repository`.
    pub fn resolve(&self, repository: &RepositoryId) -> ResolverResult<Option<EntityRef>> {
        let Some(registration) = self.metadata.lookup(repository) else {
            warn!(
                "event=repo_resolve module=resolver status=error error_code=registry_lookup repository={}",
                repository
            );
            return Err(ResolverError::RegistryLookup(repository.clone()));
        };

        match &registration.entity {
            Some(entity) => {
                debug!(
                    "event=repo_resolve module=resolver status=ok repository={} entity={}",
                    repository, entity
                );
                Ok(Some(entity.clone()))
            }
            None => {
                debug!(
                    "event=repo_resolve module=resolver status=unbound repository={}",
                    repository
                );
                Ok(None)
            }
        }
    }

    /// Flat handle for the entity registered for this repository.
    ///
    /// # Errors
    /// - `RegistryLookup` / `NoManagedEntity` on a missing or unbound registration.
    /// - `Manager` when the manager cannot produce the handle.
    pub fn get_repository(&self) -> ResolverResult<M::Repository> {
        let entity = self.managed_entity()?;
        Ok(self.manager.repository_for(&entity)?)
    }

    /// Tree handle for the entity registered for this repository.
    ///
    /// Hierarchy support is checked by the manager, not here.
    ///
    /// # Errors
    /// - Same as [`Self::get_repository`].
    pub fn get_tree_repository(&self) -> ResolverResult<M::TreeRepository> {
        let entity = self.managed_entity()?;
        Ok(self.manager.tree_repository_for(&entity)?)
    }

    /// Query builder over the entity registered for this repository.
    ///
    /// # Errors
    /// - Same as [`Self::get_repository`]; an invalid alias surfaces as `Manager`.
    pub fn create_query_builder(&self, alias: &str) -> ResolverResult<QueryBuilder> {
        let repository = self.get_repository()?;
        Ok(repository.create_query_builder(alias)?)
    }

    /// Query builder over an explicit entity. Skips the metadata store.
    ///
    /// # Errors
    /// - Manager and alias errors, unchanged.
    pub fn create_query_builder_for(
        &self,
        entity: &EntityRef,
        alias: &str,
    ) -> ManagerResult<QueryBuilder> {
        self.manager.repository_for(entity)?.create_query_builder(alias)
    }

    /// Flat handle for an explicit entity. Skips the metadata store.
    ///
    /// # Errors
    /// - Manager errors, unchanged.
    pub fn get_repository_for(&self, entity: &EntityRef) -> ManagerResult<M::Repository> {
        self.manager.repository_for(entity)
    }

    /// Tree handle for an explicit entity. Skips the metadata store.
    ///
    /// # Errors
    /// - Manager errors, unchanged.
    pub fn get_tree_repository_for(&self, entity: &EntityRef) -> ManagerResult<M::TreeRepository> {
        self.manager.tree_repository_for(entity)
    }

    fn managed_entity(&self) -> ResolverResult<EntityRef> {
        self.resolve(&self.repository)?.ok_or_else(|| {
            warn!(
                "event=repo_resolve module=resolver status=error error_code=no_managed_entity repository={}",
                self.repository
            );
            ResolverError::NoManagedEntity(self.repository.clone())
        })
    }
}
