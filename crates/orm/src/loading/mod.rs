//! Plan execution: batched eager loading, lazy loading and cost analysis

pub mod analyzer;
pub mod config;
pub mod executor;
pub mod record;

pub use analyzer::{CostEstimate, IndexUsage, LookupKind, PlanAnalysis, PlanAnalyzer};
pub use config::ExecutorConfig;
pub use executor::{ExecutionStats, QueryExecutor};
pub use record::{QueryResult, Record, Related};
