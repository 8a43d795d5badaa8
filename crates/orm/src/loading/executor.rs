//! Query Executor - runs compiled plans with batched relation loading
//!
//! A plan costs one fetch for its root and one fetch per include node. Each
//! relation fetch covers the whole parent result set through a membership
//! filter on the join key, so the fetch count never depends on how many rows
//! came back.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::analyzer::{LookupKind, PlanAnalyzer};
use super::config::ExecutorConfig;
use super::record::{join_key, QueryResult, Record, Related};
use crate::backends::{FetchRequest, Row, StorageBackend};
use crate::error::{OrmError, OrmResult};
use crate::query::{IncludeNode, Predicate, QueryPlan, ResultCardinality, ScopeCompiler};
use crate::schema::SchemaRegistry;

type LoadFuture<'a> = Pin<Box<dyn Future<Output = OrmResult<()>> + Send + 'a>>;

/// Counters for a single execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Storage fetches issued
    pub fetch_count: usize,
    /// Rows returned by storage across all fetches
    pub rows_fetched: usize,
}

/// Executes query plans against a storage backend
#[derive(Clone)]
pub struct QueryExecutor {
    registry: Arc<SchemaRegistry>,
    backend: Arc<dyn StorageBackend>,
    config: ExecutorConfig,
}

impl QueryExecutor {
    /// Create an executor with default configuration
    pub fn new(registry: Arc<SchemaRegistry>, backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(registry, backend, ExecutorConfig::default())
    }

    pub fn with_config(
        registry: Arc<SchemaRegistry>,
        backend: Arc<dyn StorageBackend>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            config,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a plan, returning a single record or a collection per its cardinality
    pub async fn execute(&self, plan: &QueryPlan) -> OrmResult<QueryResult> {
        let (result, _) = self.execute_with_stats(plan).await?;
        Ok(result)
    }

    /// Execute a plan and report fetch counters
    pub async fn execute_with_stats(
        &self,
        plan: &QueryPlan,
    ) -> OrmResult<(QueryResult, ExecutionStats)> {
        if self.config.warn_unindexed {
            self.warn_unindexed(plan);
        }

        let mut stats = ExecutionStats::default();

        let request = FetchRequest::new(&plan.table, plan.root_fetch_fields())
            .with_column_types(self.registry.lookup(&plan.entity)?)
            .with_predicate(plan.predicate.clone())
            .with_order(plan.order_by.clone())
            .with_limit(plan.limit);
        let rows = self.fetch(&request, &mut stats).await?;

        let mut records: Vec<Record> = rows
            .into_iter()
            .map(|row| Record::from_row(&plan.entity, row, &plan.fields))
            .collect();

        self.load_nodes(&mut records, &plan.includes, &mut stats)
            .await?;

        tracing::debug!(
            "Executed plan on '{}': {} records, {} fetches, {} rows",
            plan.entity,
            records.len(),
            stats.fetch_count,
            stats.rows_fetched
        );

        let result = match plan.cardinality {
            ResultCardinality::Single => QueryResult::Single(records.into_iter().next()),
            ResultCardinality::Collection => QueryResult::Collection(records),
        };

        Ok((result, stats))
    }

    /// Lazily load a relation path onto records that were fetched without it.
    ///
    /// Issues one fetch per relation along the path, however many records are
    /// given, and returns the number of fetches issued.
    pub async fn load(
        &self,
        entity: &str,
        records: &mut [Record],
        relation_path: &str,
    ) -> OrmResult<usize> {
        let nodes = ScopeCompiler::new(&self.registry)
            .include_tree(entity, &[relation_path.to_string()])?;

        let mut stats = ExecutionStats::default();
        self.load_nodes(records, &nodes, &mut stats).await?;
        Ok(stats.fetch_count)
    }

    fn load_nodes<'a>(
        &'a self,
        records: &'a mut [Record],
        nodes: &'a [IncludeNode],
        stats: &'a mut ExecutionStats,
    ) -> LoadFuture<'a> {
        Box::pin(async move {
            for node in nodes {
                self.load_node(records, node, stats).await?;
            }
            Ok(())
        })
    }

    async fn load_node(
        &self,
        records: &mut [Record],
        node: &IncludeNode,
        stats: &mut ExecutionStats,
    ) -> OrmResult<()> {
        let mut keys = Vec::new();
        let mut seen = HashSet::new();
        for record in records.iter() {
            if let Some(value) = record.key(&node.parent_key) {
                if let Some(key) = join_key(value) {
                    if seen.insert(key) {
                        keys.push(value.clone());
                    }
                }
            }
        }

        let mut related: Vec<Record> = if keys.is_empty() && self.config.skip_empty_batches {
            tracing::debug!("Skipping '{}' fetch: no parent keys", node.path);
            Vec::new()
        } else {
            let request = FetchRequest::new(&node.table, node.fetch_fields())
                .with_column_types(self.registry.lookup(&node.entity)?)
                .with_predicate(Some(Predicate::In {
                    field: node.child_key.clone(),
                    values: keys,
                }));
            self.fetch(&request, stats)
                .await?
                .into_iter()
                .map(|row| Record::from_row(&node.entity, row, &node.fields))
                .collect()
        };

        if !node.children.is_empty() {
            self.load_nodes(&mut related, &node.children, stats).await?;
        }

        let mut grouped: HashMap<String, Vec<Record>> = HashMap::new();
        for record in related {
            let key = record.key(&node.child_key).and_then(join_key);
            if let Some(key) = key {
                grouped.entry(key).or_default().push(record);
            }
        }

        for record in records.iter_mut() {
            let matches = record
                .key(&node.parent_key)
                .and_then(join_key)
                .and_then(|key| grouped.get(&key));

            let value = if node.is_collection() {
                Related::Many(matches.cloned().unwrap_or_default())
            } else {
                Related::One(
                    matches
                        .and_then(|found| found.first())
                        .map(|found| Box::new(found.clone())),
                )
            };
            record.set_relation(&node.relation, value);
        }

        Ok(())
    }

    async fn fetch(&self, request: &FetchRequest, stats: &mut ExecutionStats) -> OrmResult<Vec<Row>> {
        stats.fetch_count += 1;

        let rows = self.backend.fetch(request).await.map_err(|e| {
            tracing::error!(
                "Fetch from '{}' on {} backend failed: {}",
                request.table,
                self.backend.name(),
                e
            );
            OrmError::from(e)
        })?;

        tracing::debug!("Fetched {} rows from '{}'", rows.len(), request.table);
        stats.rows_fetched += rows.len();
        Ok(rows)
    }

    fn warn_unindexed(&self, plan: &QueryPlan) {
        let analysis = PlanAnalyzer::new(&self.registry).analyze(plan);
        for lookup in analysis.unindexed() {
            if lookup.kind == LookupKind::Join {
                tracing::warn!(
                    "Eager loading from '{}' filters on unindexed field '{}'",
                    lookup.entity,
                    lookup.field
                );
            }
        }
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}
