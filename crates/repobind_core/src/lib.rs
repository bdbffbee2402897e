//! Entity-access resolution for custom repositories.
//! Binds user-defined repository facades to entity types through an explicit
//! metadata store and hands out manager-produced data-access handles.

pub mod db;
pub mod logging;
pub mod manager;
pub mod metadata;
pub mod model;
pub mod query;
pub mod resolver;

pub use logging::{
    default_log_level, init_logging, log_resolver_context, logging_status, LogConfig, LoggingError,
    RegistrySummary,
};
pub use manager::sqlite::{Record, SqliteEntityManager, SqliteRepository, SqliteTreeRepository};
pub use manager::{
    EntityManager, ManagerError, ManagerResult, RepositoryHandle, TreeRepositoryHandle,
};
pub use metadata::manifest::{ManifestEntry, RepositoryManifest};
pub use metadata::store::{
    CustomRepository, MetadataStore, MetadataStoreBuilder, Registration, RegistrationError,
    RepositoryId,
};
pub use model::entity::{Entity, EntityDescriptor, EntityRef, Hierarchy};
pub use model::entity_model::{EntityModel, ModelError};
pub use query::builder::{Order, QueryBuilder};
pub use resolver::{RepositoryResolver, ResolverError, ResolverResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
