//! Entity definitions - fields, primary key and relations of a mapped type

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::relation::RelationDefinition;
use crate::error::{OrmError, OrmResult};

/// Type tag of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Uuid,
    Json,
}

/// A declared field of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
}

/// Entity definition, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    name: String,
    table: String,
    primary_key: String,
    fields: Vec<FieldDefinition>,
    relations: Vec<RelationDefinition>,
}

impl EntityDefinition {
    /// Start building an entity definition
    pub fn builder(name: &str) -> EntityDefinitionBuilder {
        EntityDefinitionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage collection name
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Declared fields, in declaration order
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Fail with `UnknownField` unless the field is declared
    pub fn require_field(&self, name: &str) -> OrmResult<&FieldDefinition> {
        self.field(name)
            .ok_or_else(|| OrmError::unknown_field(&self.name, name))
    }

    pub fn relations(&self) -> &[RelationDefinition] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Fail with `UnknownRelation` unless the relation is declared
    pub fn require_relation(&self, name: &str) -> OrmResult<&RelationDefinition> {
        self.relation(name)
            .ok_or_else(|| OrmError::unknown_relation(&self.name, name))
    }
}

/// Builder for [`EntityDefinition`]
#[derive(Debug, Clone)]
pub struct EntityDefinitionBuilder {
    name: String,
    table: Option<String>,
    primary_key: String,
    fields: Vec<FieldDefinition>,
    relations: Vec<RelationDefinition>,
}

impl EntityDefinitionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: None,
            primary_key: "id".to_string(),
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Override the storage collection name (defaults to the entity name)
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    /// Set the primary key field (defaults to "id")
    pub fn primary_key(mut self, field: &str) -> Self {
        self.primary_key = field.to_string();
        self
    }

    pub fn field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.push(FieldDefinition {
            name: name.to_string(),
            field_type,
        });
        self
    }

    pub fn relation(mut self, relation: RelationDefinition) -> Self {
        self.relations.push(relation);
        self
    }

    /// Validate and build the definition.
    ///
    /// Checks that names are unique, the primary key is declared, and each
    /// belongs-to foreign key is a field of this entity. Relation targets are
    /// checked when the registry is sealed.
    pub fn build(self) -> OrmResult<EntityDefinition> {
        if self.name.is_empty() {
            return Err(OrmError::Configuration(
                "Entity name cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(OrmError::Configuration(format!(
                    "Entity '{}' declares field '{}' twice",
                    self.name, field.name
                )));
            }
        }

        if !seen.contains(self.primary_key.as_str()) {
            return Err(OrmError::unknown_field(&self.name, &self.primary_key));
        }

        let mut relation_names = HashSet::new();
        for relation in &self.relations {
            relation.validate()?;

            if !relation_names.insert(relation.name.as_str()) {
                return Err(OrmError::Configuration(format!(
                    "Entity '{}' declares relation '{}' twice",
                    self.name, relation.name
                )));
            }

            if relation.relationship_type.foreign_key_on_source()
                && !seen.contains(relation.foreign_key.as_str())
            {
                return Err(OrmError::unknown_field(&self.name, &relation.foreign_key));
            }
        }

        let table = self.table.unwrap_or_else(|| self.name.clone());

        Ok(EntityDefinition {
            name: self.name,
            table,
            primary_key: self.primary_key,
            fields: self.fields,
            relations: self.relations,
        })
    }
}
