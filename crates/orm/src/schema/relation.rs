//! Relation metadata - how one entity reaches another

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};

/// Defines the type of relationship between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// One-to-one, foreign key on the target (hasOne)
    HasOne,
    /// One-to-many, foreign key on the target (hasMany)
    HasMany,
    /// Many-to-one, foreign key on the source (belongsTo)
    BelongsTo,
}

impl RelationshipType {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany)
    }

    /// Returns true if the foreign key column lives on the declaring entity
    pub fn foreign_key_on_source(self) -> bool {
        matches!(self, Self::BelongsTo)
    }

    pub fn cardinality(self) -> Cardinality {
        if self.is_collection() {
            Cardinality::Many
        } else {
            Cardinality::One
        }
    }
}

/// How many related records a relation yields per source record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

/// A named relation declared on an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDefinition {
    /// Name of the relation (used in include lists)
    pub name: String,

    /// Name of the related entity
    pub target: String,

    /// The type of relationship
    pub relationship_type: RelationshipType,

    /// Foreign key column; on the target for has-one/has-many, on the source for belongs-to
    pub foreign_key: String,
}

impl RelationDefinition {
    pub fn new(
        name: &str,
        target: &str,
        relationship_type: RelationshipType,
        foreign_key: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            relationship_type,
            foreign_key: foreign_key.to_string(),
        }
    }

    pub fn has_many(name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(name, target, RelationshipType::HasMany, foreign_key)
    }

    pub fn has_one(name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(name, target, RelationshipType::HasOne, foreign_key)
    }

    pub fn belongs_to(name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(name, target, RelationshipType::BelongsTo, foreign_key)
    }

    pub fn cardinality(&self) -> Cardinality {
        self.relationship_type.cardinality()
    }

    /// Column read from parent records to collect the batch keys
    pub fn parent_key<'a>(&'a self, source_primary_key: &'a str) -> &'a str {
        if self.relationship_type.foreign_key_on_source() {
            &self.foreign_key
        } else {
            source_primary_key
        }
    }

    /// Column of the related rows matched against the batch keys
    pub fn child_key<'a>(&'a self, target_primary_key: &'a str) -> &'a str {
        if self.relationship_type.foreign_key_on_source() {
            target_primary_key
        } else {
            &self.foreign_key
        }
    }

    /// Validate the relation in isolation
    pub fn validate(&self) -> OrmResult<()> {
        if self.name.is_empty() {
            return Err(OrmError::Configuration(
                "Relation name cannot be empty".to_string(),
            ));
        }

        if self.name.contains('.') {
            return Err(OrmError::Configuration(format!(
                "Relation name '{}' cannot contain '.'",
                self.name
            )));
        }

        if self.target.is_empty() {
            return Err(OrmError::Configuration(format!(
                "Relation '{}' must name a target entity",
                self.name
            )));
        }

        if self.foreign_key.is_empty() {
            return Err(OrmError::Configuration(format!(
                "Relation '{}' must declare a foreign key",
                self.name
            )));
        }

        Ok(())
    }
}
