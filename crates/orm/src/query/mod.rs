//! Query compilation: predicates, scopes, plans and SQL rendering

pub mod compiler;
pub mod plan;
pub mod predicate;
pub mod scope;
pub mod sql_generation;
pub mod types;

pub use compiler::{QueryBuilder, ScopeCompiler};
pub use plan::{IncludeNode, Projection, QueryPlan, ResultCardinality};
pub use predicate::Predicate;
pub use scope::Scope;
pub use sql_generation::SqlParam;
pub use types::{OrderBy, OrderDirection, QueryOperator};
