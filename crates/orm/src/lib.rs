//! # orm-planner: read-query planning for an ORM layer
//!
//! Entities, their relations and indices live in a [`SchemaRegistry`].
//! Filters, includes, projections and named [`Scope`]s compile into a
//! [`QueryPlan`], and the [`QueryExecutor`] runs plans against a
//! [`StorageBackend`] with one fetch for the root and one batched fetch per
//! eager-loaded relation, so loading relations never degrades into N+1 reads.

pub mod backends;
pub mod error;
pub mod loading;
pub mod query;
pub mod schema;

pub use backends::{FetchRequest, MemoryStore, PgStore, Row, StorageBackend};
pub use error::{OrmError, OrmResult, StorageError};
pub use loading::{
    CostEstimate, ExecutionStats, ExecutorConfig, PlanAnalysis, PlanAnalyzer, QueryExecutor,
    QueryResult, Record, Related,
};
pub use query::{
    OrderBy, OrderDirection, Predicate, Projection, QueryBuilder, QueryOperator, QueryPlan,
    ResultCardinality, Scope, ScopeCompiler,
};
pub use schema::{
    Cardinality, EntityDefinition, FieldType, IndexDescriptor, RelationDefinition,
    RelationshipType, SchemaRegistry,
};
