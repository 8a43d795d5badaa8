//! Eager Loading Benchmarks
//!
//! Measures plan compilation and batched execution against the in-memory store

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use orm_planner::{
    EntityDefinition, ExecutorConfig, FieldType, MemoryStore, Predicate, QueryExecutor,
    RelationDefinition, SchemaRegistry, ScopeCompiler,
};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn registry() -> Arc<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            EntityDefinition::builder("Post")
                .table("posts")
                .field("id", FieldType::Integer)
                .field("title", FieldType::Text)
                .relation(RelationDefinition::has_many("comments", "Comment", "post_id"))
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            EntityDefinition::builder("Comment")
                .table("comments")
                .field("id", FieldType::Integer)
                .field("post_id", FieldType::Integer)
                .field("body", FieldType::Text)
                .build()
                .unwrap(),
        )
        .unwrap();
    registry.seal().unwrap()
}

fn store(posts: usize, comments_per_post: usize) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    for post_id in 0..posts {
        store.insert("posts", json!({"id": post_id, "title": format!("Post {}", post_id)}));
        for n in 0..comments_per_post {
            store.insert(
                "comments",
                json!({"id": post_id * comments_per_post + n, "post_id": post_id, "body": "ok"}),
            );
        }
    }
    Arc::new(store)
}

fn bench_compile(c: &mut Criterion) {
    let registry = registry();
    let compiler = ScopeCompiler::new(&registry);

    c.bench_function("compile_with_include", |b| {
        b.iter(|| {
            let plan = compiler
                .compile(
                    black_box("Post"),
                    &[Predicate::gt("id", 10)],
                    &["comments"],
                    &["title"],
                )
                .unwrap();
            black_box(plan)
        })
    });
}

fn bench_execute(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let registry = registry();
    let plan = ScopeCompiler::new(&registry)
        .compile("Post", &[], &["comments"], &[])
        .unwrap();
    let config = ExecutorConfig {
        warn_unindexed: false,
        ..ExecutorConfig::default()
    };

    let mut group = c.benchmark_group("execute_eager");
    for &posts in &[10, 100, 1000] {
        let executor = QueryExecutor::with_config(registry.clone(), store(posts, 5), config.clone());
        group.bench_with_input(BenchmarkId::new("posts", posts), &posts, |b, _| {
            b.iter(|| rt.block_on(async { black_box(executor.execute(&plan).await.unwrap()) }))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
