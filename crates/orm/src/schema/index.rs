//! Index descriptors - declarative performance hints

use serde::{Deserialize, Serialize};

/// A declared index over one or more fields of an entity.
///
/// Only consulted for cost estimation; plans run the same with or without it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub entity: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

impl IndexDescriptor {
    pub fn new(entity: &str, fields: &[&str]) -> Self {
        Self {
            entity: entity.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(entity: &str, fields: &[&str]) -> Self {
        Self {
            unique: true,
            ..Self::new(entity, fields)
        }
    }

    pub fn leading_field(&self) -> Option<&str> {
        self.fields.first().map(|s| s.as_str())
    }

    /// An index serves lookups on its leading field
    pub fn covers(&self, field: &str) -> bool {
        self.leading_field() == Some(field)
    }

    pub fn name(&self) -> String {
        format!("idx_{}_{}", self.entity.to_lowercase(), self.fields.join("_"))
    }
}
