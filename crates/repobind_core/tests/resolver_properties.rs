use repobind_core::{
    EntityDescriptor, EntityManager, EntityRef, Hierarchy, ManagerError, ManagerResult,
    MetadataStore, RepositoryHandle, RepositoryId, RepositoryResolver, ResolverError,
    TreeRepositoryHandle,
};
use std::sync::atomic::{AtomicUsize, Ordering};

struct MockHandle {
    entity: EntityDescriptor,
    hierarchy: Hierarchy,
}

impl RepositoryHandle for MockHandle {
    fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }
}

impl TreeRepositoryHandle for MockHandle {
    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }
}

/// Counts handle requests and treats names ending in `Tree` as hierarchical.
#[derive(Default)]
struct MockManager {
    flat_calls: AtomicUsize,
    tree_calls: AtomicUsize,
}

impl MockManager {
    fn handle(entity: &EntityRef) -> MockHandle {
        MockHandle {
            entity: EntityDescriptor::new(entity.name(), "mock_table"),
            hierarchy: Hierarchy {
                parent_column: "parent_id".to_string(),
            },
        }
    }
}

impl EntityManager for MockManager {
    type Repository = MockHandle;
    type TreeRepository = MockHandle;

    fn repository_for(&self, entity: &EntityRef) -> ManagerResult<MockHandle> {
        self.flat_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::handle(entity))
    }

    fn tree_repository_for(&self, entity: &EntityRef) -> ManagerResult<MockHandle> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        if entity.name().ends_with("Tree") {
            Ok(Self::handle(entity))
        } else {
            Err(ManagerError::NotTreeEntity(entity.name().to_string()))
        }
    }
}

fn store() -> MetadataStore {
    let mut builder = MetadataStore::builder();
    builder
        .load_manifest_json(
            r#"{"repositories":[
                {"repository":"PostRepository","entity":"Post"},
                {"repository":"CommentRepository","entity":"Comment"},
                {"repository":"MenuRepository","entity":"MenuTree"},
                {"repository":"DraftRepository"}
            ]}"#,
        )
        .expect("manifest should load");
    builder.build()
}

#[test]
fn each_registration_resolves_to_its_own_entity() {
    let store = store();
    let manager = MockManager::default();

    for (repository, entity) in [
        ("PostRepository", "Post"),
        ("CommentRepository", "Comment"),
        ("MenuRepository", "MenuTree"),
    ] {
        let resolver = RepositoryResolver::new(RepositoryId::new(repository), &store, &manager);
        assert_eq!(
            resolver
                .resolve(&RepositoryId::new(repository))
                .expect("registration exists"),
            Some(EntityRef::named(entity))
        );
        let handle = resolver.get_repository().expect("flat handle");
        assert_eq!(handle.entity().name, entity);
    }
}

#[test]
fn resolution_is_repeatable_and_side_effect_free() {
    let store = store();
    let manager = MockManager::default();
    let resolver = RepositoryResolver::new(RepositoryId::new("PostRepository"), &store, &manager);

    let first = resolver
        .resolve(resolver.repository_id())
        .expect("registration exists");
    for _ in 0..5 {
        let again = resolver
            .resolve(resolver.repository_id())
            .expect("registration exists");
        assert_eq!(again, first);
    }
    assert_eq!(store.len(), 4);
    assert_eq!(manager.flat_calls.load(Ordering::SeqCst), 0);
    assert_eq!(manager.tree_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unbound_repository_never_reaches_manager() {
    let store = store();
    let manager = MockManager::default();
    let resolver = RepositoryResolver::new(RepositoryId::new("DraftRepository"), &store, &manager);

    assert!(matches!(
        resolver.get_repository(),
        Err(ResolverError::NoManagedEntity(_))
    ));
    assert!(matches!(
        resolver.get_tree_repository(),
        Err(ResolverError::NoManagedEntity(_))
    ));
    assert!(matches!(
        resolver.create_query_builder("d"),
        Err(ResolverError::NoManagedEntity(_))
    ));
    assert_eq!(manager.flat_calls.load(Ordering::SeqCst), 0);
    assert_eq!(manager.tree_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn explicit_operations_succeed_with_empty_metadata_store() {
    let store = MetadataStore::builder().build();
    assert!(store.is_empty());
    let manager = MockManager::default();
    let resolver = RepositoryResolver::new(RepositoryId::new("Anything"), &store, &manager);

    assert!(matches!(
        resolver.get_repository(),
        Err(ResolverError::RegistryLookup(_))
    ));

    let flat = resolver
        .get_repository_for(&EntityRef::named("Post"))
        .expect("explicit flat handle");
    assert_eq!(flat.entity().name, "Post");
    let tree = resolver
        .get_tree_repository_for(&EntityRef::named("MenuTree"))
        .expect("explicit tree handle");
    assert_eq!(tree.hierarchy().parent_column, "parent_id");
    let query = resolver
        .create_query_builder_for(&EntityRef::named("Post"), "post")
        .expect("explicit query builder");
    assert_eq!(query.alias(), "post");

    assert_eq!(manager.flat_calls.load(Ordering::SeqCst), 2);
    assert_eq!(manager.tree_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn tree_handle_shape_is_decided_by_manager() {
    let store = store();
    let manager = MockManager::default();

    let menus = RepositoryResolver::new(RepositoryId::new("MenuRepository"), &store, &manager);
    let tree = menus.get_tree_repository().expect("menu tree handle");
    assert_eq!(tree.entity().name, "MenuTree");

    let posts = RepositoryResolver::new(RepositoryId::new("PostRepository"), &store, &manager);
    let err = posts
        .get_tree_repository()
        .err()
        .expect("manager rejects non-tree entity");
    assert!(matches!(
        err,
        ResolverError::Manager(ManagerError::NotTreeEntity(name)) if name == "Post"
    ));
    assert_eq!(manager.tree_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_resolution_from_many_threads() {
    let store = store();
    let manager = MockManager::default();

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let store = &store;
            let manager = &manager;
            scope.spawn(move || {
                let repository = if worker % 2 == 0 {
                    "PostRepository"
                } else {
                    "CommentRepository"
                };
                let resolver =
                    RepositoryResolver::new(RepositoryId::new(repository), store, manager);
                for _ in 0..50 {
                    let handle = resolver.get_repository().expect("flat handle");
                    assert!(repository.starts_with(handle.entity().name.as_str()));
                }
            });
        }
    });

    assert_eq!(manager.flat_calls.load(Ordering::SeqCst), 8 * 50);
}
