//! In-memory storage backend
//!
//! Holds JSON rows per collection and evaluates fetch requests in process.
//! Every fetch is counted and logged, and collections can be taken offline,
//! which makes it the backend of choice for tests and demos.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use super::core::{FetchRequest, Row, StorageBackend};
use crate::error::StorageError;
use crate::query::predicate::compare_values;
use crate::query::OrderDirection;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, Vec<Row>>,
    fetch_count: AtomicUsize,
    requests: Mutex<Vec<FetchRequest>>,
    offline: AtomicBool,
    offline_tables: DashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; non-object values are ignored
    pub fn insert(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.tables.entry(table.to_string()).or_default().push(row);
        }
    }

    pub fn insert_many<I>(&self, table: &str, rows: I)
    where
        I: IntoIterator<Item = Value>,
    {
        for row in rows {
            self.insert(table, row);
        }
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }

    /// Number of fetches served or attempted since the last reset
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(AtomicOrdering::SeqCst)
    }

    /// Requests received since the last reset, in arrival order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn reset_counters(&self) {
        self.fetch_count.store(0, AtomicOrdering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }

    /// Make every fetch fail
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Make fetches against one collection fail
    pub fn set_table_offline(&self, table: &str, offline: bool) {
        if offline {
            self.offline_tables.insert(table.to_string());
        } else {
            self.offline_tables.remove(table);
        }
    }

    fn is_offline(&self, table: &str) -> bool {
        self.offline.load(AtomicOrdering::SeqCst) || self.offline_tables.contains(table)
    }
}

#[async_trait]
impl StorageBackend for MemoryStore {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Row>, StorageError> {
        self.fetch_count.fetch_add(1, AtomicOrdering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.is_offline(&request.table) {
            return Err(StorageError::Offline(format!(
                "collection '{}' is unreachable",
                request.table
            )));
        }

        let mut rows: Vec<Row> = self
            .tables
            .get(&request.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        request
                            .predicate
                            .as_ref()
                            .map_or(true, |predicate| predicate.matches(row))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !request.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for order in &request.order_by {
                    let left = a.get(&order.field).unwrap_or(&Value::Null);
                    let right = b.get(&order.field).unwrap_or(&Value::Null);
                    let ordering = compare_values(left, right).unwrap_or(Ordering::Equal);
                    let ordering = match order.direction {
                        OrderDirection::Asc => ordering,
                        OrderDirection::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = request.limit {
            rows.truncate(limit);
        }

        if !request.projection.is_empty() {
            rows = rows
                .into_iter()
                .map(|row| {
                    request
                        .projection
                        .iter()
                        .filter_map(|column| row.get(column).map(|v| (column.clone(), v.clone())))
                        .collect()
                })
                .collect();
        }

        Ok(rows)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
