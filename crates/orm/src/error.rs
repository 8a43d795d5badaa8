//! Error types for the query planner
//!
//! Compile-time errors (unknown entities, relations, fields, scopes) are caller
//! errors and never retryable. Storage failures surface at execution time as
//! `StorageUnavailable` and are not retried here.

/// Result type alias for planner operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for schema registration, plan compilation and execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrmError {
    /// An entity with this name is already registered
    #[error("Entity '{0}' is already registered")]
    DuplicateEntity(String),

    /// No entity with this name is registered
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    /// The entity declares no relation with this name
    #[error("Entity '{entity}' has no relation '{relation}'")]
    UnknownRelation { entity: String, relation: String },

    /// The entity declares no field with this name
    #[error("Entity '{entity}' has no field '{field}'")]
    UnknownField { entity: String, field: String },

    /// No scope with this name is bound to the entity
    #[error("Entity '{entity}' has no scope '{scope}'")]
    UnknownScope { entity: String, scope: String },

    /// The field exists but was left out of the plan's projection
    #[error("Field '{field}' of '{entity}' is not part of the projection")]
    FieldNotProjected { entity: String, field: String },

    /// A projected value could not be converted to the requested type
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid definition or registry setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The storage backend could not serve a fetch
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl OrmError {
    pub fn unknown_relation(entity: &str, relation: &str) -> Self {
        Self::UnknownRelation {
            entity: entity.to_string(),
            relation: relation.to_string(),
        }
    }

    pub fn unknown_field(entity: &str, field: &str) -> Self {
        Self::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }

    /// Returns true for errors raised while compiling a plan
    pub fn is_compile_error(&self) -> bool {
        !matches!(self, Self::StorageUnavailable(_))
    }
}

/// Error reported by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Backend is offline: {0}")]
    Offline(String),

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),
}

impl From<StorageError> for OrmError {
    fn from(err: StorageError) -> Self {
        OrmError::StorageUnavailable(err.to_string())
    }
}
