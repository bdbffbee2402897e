//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise registration, resolution and handle creation end to end.
//! - Keep output deterministic apart from generated post ids.
//!
//! Usage: `repobind_cli [manifest.json] [absolute-log-dir]`

use repobind_core::db::open_db_in_memory;
use repobind_core::{
    default_log_level, init_logging, log_resolver_context, CustomRepository, Entity,
    EntityDescriptor, EntityModel, MetadataStore, RepositoryHandle, RepositoryId,
    RepositoryResolver, SqliteEntityManager,
};
use rusqlite::{params, Connection};
use std::error::Error;
use uuid::Uuid;

struct Post;
struct Category;

impl Entity for Post {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("Post", "posts")
            .column("title")
            .embedded("counters", &["likes", "comments"])
    }
}

impl Entity for Category {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("Category", "categories")
            .column("name")
            .tree("parent_id")
    }
}

struct PostRepository;
struct CategoryRepository;

impl CustomRepository for PostRepository {
    const NAME: &'static str = "PostRepository";
}

impl CustomRepository for CategoryRepository {
    const NAME: &'static str = "CategoryRepository";
}

fn main() {
    if let Err(err) = run() {
        log::error!("event=cli_run module=cli status=error error={err}");
        eprintln!("repobind_cli error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let manifest_path = args.next();
    if let Some(log_dir) = args.next() {
        init_logging(default_log_level(), &log_dir)?;
    }

    println!("repobind_core version={}", repobind_core::core_version());

    let conn = open_db_in_memory()?;
    seed(&conn)?;

    let mut model = EntityModel::new();
    model.register::<Post>()?;
    model.register::<Category>()?;
    let manager = SqliteEntityManager::new(&conn, &model);

    let mut builder = MetadataStore::builder();
    match manifest_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            builder.load_manifest_json(&text)?;
        }
        None => {
            builder
                .register_entity::<PostRepository, Post>()?
                .register_entity::<CategoryRepository, Category>()?;
        }
    }
    let store = builder.build();
    let summary = log_resolver_context(&store, &model);
    println!("{summary}");

    for repository in store.repository_ids() {
        describe(&store, &manager, repository);
    }

    let categories = RepositoryResolver::for_repository::<CategoryRepository>(&store, &manager);
    let tree = categories.get_tree_repository()?;
    for root in tree.find_roots()? {
        println!("category root={:?}", root.get("name"));
    }
    Ok(())
}

fn describe(store: &MetadataStore, manager: &SqliteEntityManager<'_>, repository: RepositoryId) {
    let resolver = RepositoryResolver::new(repository.clone(), store, manager);
    match resolver.get_repository() {
        Ok(handle) => {
            let count = handle
                .count()
                .map_or_else(|err| format!("error({err})"), |count| count.to_string());
            let shape = if handle.entity().is_tree() { "tree" } else { "flat" };
            println!(
                "repository={repository} entity={} shape={shape} rows={count}",
                handle.entity().name
            );
        }
        Err(err) => println!("repository={repository} error={err}"),
    }
}

fn seed(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            counters_likes INTEGER NOT NULL DEFAULT 0,
            counters_comments INTEGER NOT NULL DEFAULT 0
         );
         CREATE TABLE categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES categories(id)
         );
         INSERT INTO categories (id, name, parent_id) VALUES
            (1, 'Engineering', NULL),
            (2, 'Rust', 1),
            (3, 'Announcements', NULL);",
    )?;
    for title in ["Hello resolver", "Tree handles"] {
        conn.execute(
            "INSERT INTO posts (id, title) VALUES (?1, ?2);",
            params![Uuid::new_v4().to_string(), title],
        )?;
    }
    Ok(())
}
