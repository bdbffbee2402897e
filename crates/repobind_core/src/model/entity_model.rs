//! Live entity model keyed by type identity and by name.

use crate::model::entity::{Entity, EntityDescriptor, EntityRef};
use crate::model::ident::{is_identifier, is_path_identifier};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Entity model registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Another descriptor already uses this entity name.
    DuplicateEntity(String),
    /// Entity name is not a valid identifier.
    InvalidEntityName(String),
    /// Table or column name is not a plain identifier.
    InvalidIdentifier { entity: String, identifier: String },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEntity(name) => write!(f, "entity already registered: {name}"),
            Self::InvalidEntityName(name) => write!(f, "entity name is invalid: `{name}`"),
            Self::InvalidIdentifier { entity, identifier } => write!(
                f,
                "entity `{entity}` declares invalid identifier `{identifier}`"
            ),
        }
    }
}

impl Error for ModelError {}

/// Registered entity descriptors.
#[derive(Debug, Default)]
pub struct EntityModel {
    descriptors: BTreeMap<String, EntityDescriptor>,
    by_type: HashMap<TypeId, String>,
}

impl EntityModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers entity `E` under its descriptor name.
    pub fn register<E: Entity>(&mut self) -> Result<(), ModelError> {
        let descriptor = E::descriptor();
        validate_descriptor(&descriptor)?;
        if self.descriptors.contains_key(&descriptor.name) {
            return Err(ModelError::DuplicateEntity(descriptor.name));
        }

        self.by_type
            .insert(TypeId::of::<E>(), descriptor.name.clone());
        self.descriptors.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Resolves a type or string reference to its descriptor.
    pub fn resolve(&self, entity: &EntityRef) -> Option<&EntityDescriptor> {
        match entity {
            EntityRef::Type { id, .. } => self
                .by_type
                .get(id)
                .and_then(|name| self.descriptors.get(name)),
            EntityRef::Name(name) => self.descriptors.get(name.as_str()),
        }
    }

    /// Returns sorted entity names.
    pub fn entity_names(&self) -> Vec<String> {
        self.descriptors.keys().cloned().collect()
    }
}

fn validate_descriptor(descriptor: &EntityDescriptor) -> Result<(), ModelError> {
    if !is_path_identifier(&descriptor.name) {
        return Err(ModelError::InvalidEntityName(descriptor.name.clone()));
    }

    let identifiers = std::iter::once(descriptor.table.as_str()).chain(descriptor.all_columns());
    for identifier in identifiers {
        if !is_identifier(identifier) {
            return Err(ModelError::InvalidIdentifier {
                entity: descriptor.name.clone(),
                identifier: identifier.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{EntityModel, ModelError};
    use crate::model::entity::{Entity, EntityDescriptor, EntityRef};

    struct Post;
    struct PostCopy;
    struct BadTable;

    impl Entity for Post {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::new("Post", "posts").column("title")
        }
    }

    impl Entity for PostCopy {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::new("Post", "posts_copy")
        }
    }

    impl Entity for BadTable {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::new("BadTable", "bad table")
        }
    }

    #[test]
    fn resolves_by_type_and_by_name() {
        let mut model = EntityModel::new();
        model.register::<Post>().expect("post should register");

        let by_type = model
            .resolve(&EntityRef::of::<Post>())
            .expect("type reference should resolve");
        let by_name = model
            .resolve(&EntityRef::named("Post"))
            .expect("name reference should resolve");
        assert_eq!(by_type, by_name);
        assert_eq!(by_type.table, "posts");
        assert!(model.resolve(&EntityRef::named("Comment")).is_none());
    }

    #[test]
    fn rejects_duplicate_names_and_invalid_identifiers() {
        let mut model = EntityModel::new();
        model.register::<Post>().expect("post should register");

        let duplicate = model.register::<PostCopy>();
        assert_eq!(
            duplicate,
            Err(ModelError::DuplicateEntity("Post".to_string()))
        );
        assert!(model.resolve(&EntityRef::of::<PostCopy>()).is_none());

        let invalid = model.register::<BadTable>();
        assert!(matches!(
            invalid,
            Err(ModelError::InvalidIdentifier { .. })
        ));
        assert_eq!(model.entity_names(), vec!["Post".to_string()]);
    }
}
