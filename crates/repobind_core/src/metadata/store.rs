//! Registration records, load-phase builder and frozen store.

use crate::model::entity::{Entity, EntityRef};
use crate::model::ident::is_path_identifier;
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// User-defined data-access facade bound to an entity through the store.
pub trait CustomRepository {
    /// Stable registered name used as the lookup key.
    const NAME: &'static str;

    fn repository_id() -> RepositoryId {
        RepositoryId::new(Self::NAME)
    }
}

/// Lookup key of one custom repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepositoryId(String);

impl RepositoryId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RepositoryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `(repository, entity)` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub repository: RepositoryId,
    /// `None` when the repository was declared without an entity.
    pub entity: Option<EntityRef>,
}

/// Load-phase registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    InvalidRepositoryName(String),
    InvalidEntityName(String),
    DuplicateRepository(RepositoryId),
    /// Manifest text could not be parsed.
    InvalidManifest(String),
}

impl Display for RegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRepositoryName(name) => {
                write!(f, "custom repository name is invalid: `{name}`")
            }
            Self::InvalidEntityName(name) => write!(f, "entity name is invalid: `{name}`"),
            Self::DuplicateRepository(id) => {
                write!(f, "custom repository already registered: {id}")
            }
            Self::InvalidManifest(message) => {
                write!(f, "invalid repository manifest: {message}")
            }
        }
    }
}

impl Error for RegistrationError {}

/// Collects registrations before the store is frozen.
#[derive(Debug, Default)]
pub struct MetadataStoreBuilder {
    registrations: BTreeMap<RepositoryId, Registration>,
}

impl MetadataStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `R` as the custom repository of `entity`.
    pub fn register<R: CustomRepository>(
        &mut self,
        entity: EntityRef,
    ) -> Result<&mut Self, RegistrationError> {
        self.insert(R::repository_id(), Some(entity))
    }

    /// Declares `R` as the custom repository of entity type `E`.
    pub fn register_entity<R: CustomRepository, E: Entity>(
        &mut self,
    ) -> Result<&mut Self, RegistrationError> {
        self.insert(R::repository_id(), Some(EntityRef::of::<E>()))
    }

    /// Declares `R` without any entity association.
    pub fn register_unbound<R: CustomRepository>(
        &mut self,
    ) -> Result<&mut Self, RegistrationError> {
        self.insert(R::repository_id(), None)
    }

    /// Declares a repository by name with an optional string entity reference.
    pub fn register_named(
        &mut self,
        repository: &str,
        entity: Option<&str>,
    ) -> Result<&mut Self, RegistrationError> {
        let entity = match entity.map(str::trim) {
            Some(name) if !is_path_identifier(name) => {
                return Err(RegistrationError::InvalidEntityName(name.to_string()));
            }
            Some(name) => Some(EntityRef::named(name)),
            None => None,
        };
        self.insert(RepositoryId::new(repository.trim()), entity)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Ends the load phase.
    pub fn build(self) -> MetadataStore {
        let unbound = self
            .registrations
            .values()
            .filter(|registration| registration.entity.is_none())
            .count();
        info!(
            "event=registry_build module=metadata status=ok repositories={} unbound={}",
            self.registrations.len(),
            unbound
        );
        MetadataStore {
            registrations: self.registrations,
        }
    }

    fn insert(
        &mut self,
        repository: RepositoryId,
        entity: Option<EntityRef>,
    ) -> Result<&mut Self, RegistrationError> {
        if !is_path_identifier(repository.as_str()) {
            return Err(RegistrationError::InvalidRepositoryName(repository.0));
        }
        if self.registrations.contains_key(&repository) {
            warn!(
                "event=registry_register module=metadata status=error error_code=duplicate_repository repository={}",
                repository
            );
            return Err(RegistrationError::DuplicateRepository(repository));
        }

        self.registrations
            .insert(repository.clone(), Registration { repository, entity });
        Ok(self)
    }
}

/// Frozen custom repository registrations.
#[derive(Debug, Default)]
pub struct MetadataStore {
    registrations: BTreeMap<RepositoryId, Registration>,
}

impl MetadataStore {
    pub fn builder() -> MetadataStoreBuilder {
        MetadataStoreBuilder::new()
    }

    /// Returns the registration whose key equals `repository`.
    pub fn lookup(&self, repository: &RepositoryId) -> Option<&Registration> {
        self.registrations.get(repository)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Returns sorted repository ids.
    pub fn repository_ids(&self) -> Vec<RepositoryId> {
        self.registrations.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{CustomRepository, MetadataStore, RegistrationError, RepositoryId};
    use crate::model::entity::{Entity, EntityDescriptor, EntityRef};

    struct Post;
    struct PostRepository;
    struct DraftRepository;

    impl Entity for Post {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::new("Post", "posts")
        }
    }

    impl CustomRepository for PostRepository {
        const NAME: &'static str = "PostRepository";
    }

    impl CustomRepository for DraftRepository {
        const NAME: &'static str = "blog::DraftRepository";
    }

    #[test]
    fn registers_bound_and_unbound_repositories() {
        let mut builder = MetadataStore::builder();
        builder
            .register_entity::<PostRepository, Post>()
            .expect("post repository should register")
            .register_unbound::<DraftRepository>()
            .expect("draft repository should register");
        let store = builder.build();

        assert_eq!(store.len(), 2);
        let post = store
            .lookup(&PostRepository::repository_id())
            .expect("post registration");
        assert_eq!(post.entity, Some(EntityRef::of::<Post>()));
        let draft = store
            .lookup(&RepositoryId::new("blog::DraftRepository"))
            .expect("draft registration");
        assert!(draft.entity.is_none());
        assert!(store.lookup(&RepositoryId::new("Missing")).is_none());
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut builder = MetadataStore::builder();
        builder
            .register::<PostRepository>(EntityRef::named("Post"))
            .expect("first registration");
        let err = builder
            .register_unbound::<PostRepository>()
            .expect_err("second registration must fail");
        assert_eq!(
            err,
            RegistrationError::DuplicateRepository(RepositoryId::new("PostRepository"))
        );

        let store = builder.build();
        assert_eq!(
            store
                .lookup(&PostRepository::repository_id())
                .and_then(|registration| registration.entity.clone()),
            Some(EntityRef::named("Post"))
        );
    }

    #[test]
    fn register_named_trims_and_validates() {
        let mut builder = MetadataStore::builder();
        builder
            .register_named("  PostRepository ", Some(" Post "))
            .expect("trimmed names should register");
        assert!(matches!(
            builder.register_named("Post Repository", None),
            Err(RegistrationError::InvalidRepositoryName(_))
        ));
        assert!(matches!(
            builder.register_named("Other", Some("")),
            Err(RegistrationError::InvalidEntityName(_))
        ));

        let store = builder.build();
        assert_eq!(
            store.repository_ids(),
            vec![RepositoryId::new("PostRepository")]
        );
    }
}
