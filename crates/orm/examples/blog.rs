//! Example: eager loading a small blog schema
//!
//! Registers users, posts and comments, compiles a scoped query with nested
//! includes and runs it against the in-memory store. Run with
//! `RUST_LOG=orm_planner=debug` to see every storage fetch.

use orm_planner::{
    EntityDefinition, ExecutorConfig, FieldType, IndexDescriptor, MemoryStore, OrderDirection,
    OrmResult, PlanAnalyzer, Predicate, QueryExecutor, RelationDefinition, SchemaRegistry, Scope,
    ScopeCompiler,
};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn schema() -> OrmResult<Arc<SchemaRegistry>> {
    let mut registry = SchemaRegistry::new();

    registry.register(
        EntityDefinition::builder("User")
            .table("users")
            .field("id", FieldType::Integer)
            .field("name", FieldType::Text)
            .build()?,
    )?;
    registry.register(
        EntityDefinition::builder("Post")
            .table("posts")
            .field("id", FieldType::Integer)
            .field("author_id", FieldType::Integer)
            .field("title", FieldType::Text)
            .field("published", FieldType::Boolean)
            .field("created_at", FieldType::Timestamp)
            .relation(RelationDefinition::belongs_to("author", "User", "author_id"))
            .relation(RelationDefinition::has_many("comments", "Comment", "post_id"))
            .build()?,
    )?;
    registry.register(
        EntityDefinition::builder("Comment")
            .table("comments")
            .field("id", FieldType::Integer)
            .field("post_id", FieldType::Integer)
            .field("user_id", FieldType::Integer)
            .field("body", FieldType::Text)
            .relation(RelationDefinition::belongs_to("user", "User", "user_id"))
            .build()?,
    )?;

    registry.register_index(IndexDescriptor::new("Comment", &["post_id"]))?;
    registry.register_scope(
        Scope::new("Post", "published")
            .filter(Predicate::eq("published", true))
            .order_by("created_at", OrderDirection::Desc),
    )?;

    registry.seal()
}

fn seed() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.insert_many(
        "users",
        vec![
            json!({"id": 1, "name": "Ada"}),
            json!({"id": 2, "name": "Grace"}),
        ],
    );
    store.insert_many(
        "posts",
        vec![
            json!({"id": 1, "author_id": 1, "title": "Notes on the engine", "published": true, "created_at": "1843-09-01T00:00:00Z"}),
            json!({"id": 2, "author_id": 2, "title": "Compilers", "published": true, "created_at": "1952-05-01T00:00:00Z"}),
            json!({"id": 3, "author_id": 2, "title": "Draft", "published": false, "created_at": "1953-01-01T00:00:00Z"}),
        ],
    );
    store.insert_many(
        "comments",
        vec![
            json!({"id": 1, "post_id": 1, "user_id": 2, "body": "Remarkable"}),
            json!({"id": 2, "post_id": 2, "user_id": 1, "body": "Very useful"}),
            json!({"id": 3, "post_id": 2, "user_id": 2, "body": "Thank you"}),
        ],
    );
    Arc::new(store)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let registry = schema()?;
    let store = seed();

    let plan = ScopeCompiler::new(&registry)
        .query("Post")
        .scope("published")
        .with("author")
        .with("comments.user")
        .select(&["title", "created_at"])
        .build()?;

    let analysis = PlanAnalyzer::new(&registry).analyze(&plan);
    println!(
        "Plan issues {} fetches, estimated cost {:?}",
        analysis.fetch_count, analysis.cost
    );
    for recommendation in analysis.recommendations() {
        println!("  hint: {}", recommendation);
    }

    let executor = QueryExecutor::with_config(registry.clone(), store.clone(), ExecutorConfig::from_env()?);
    let (result, stats) = executor.execute_with_stats(&plan).await?;

    for post in result.records() {
        println!("{}", serde_json::to_string_pretty(&post.to_json())?);
    }
    println!(
        "{} posts loaded with {} fetches ({} rows)",
        result.len(),
        stats.fetch_count,
        stats.rows_fetched
    );

    Ok(())
}
