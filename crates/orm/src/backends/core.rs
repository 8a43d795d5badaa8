//! Core Storage Backend Trait
//!
//! The executor talks to storage through a single operation: fetch the rows of
//! one collection that match a predicate, restricted to a set of columns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::StorageError;
use crate::query::{OrderBy, Predicate};
use crate::schema::{EntityDefinition, FieldType};

/// A fetched row, keyed by column name
pub type Row = Map<String, Value>;

/// A single storage read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Storage collection to read
    pub table: String,
    pub predicate: Option<Predicate>,
    /// Columns to return; rows carry no other columns
    pub projection: Vec<String>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    /// Declared types of the collection's fields, used to bind parameters
    #[serde(default)]
    pub column_types: BTreeMap<String, FieldType>,
}

impl FetchRequest {
    pub fn new(table: &str, projection: Vec<String>) -> Self {
        Self {
            table: table.to_string(),
            predicate: None,
            projection,
            order_by: Vec::new(),
            limit: None,
            column_types: BTreeMap::new(),
        }
    }

    /// Record the declared field types of the entity stored in `table`
    pub fn with_column_types(mut self, definition: &EntityDefinition) -> Self {
        self.column_types = definition
            .fields()
            .iter()
            .map(|field| (field.name.clone(), field.field_type))
            .collect();
        self
    }

    pub fn column_type(&self, column: &str) -> Option<FieldType> {
        self.column_types.get(column).copied()
    }

    pub fn with_predicate(mut self, predicate: Option<Predicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_order(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// Abstract storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fetch matching rows in storage order (or `order_by` when given)
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Row>, StorageError>;

    /// Backend name for diagnostics
    fn name(&self) -> &str {
        "storage"
    }
}
