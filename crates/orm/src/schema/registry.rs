//! Schema Registry - entity, index and scope storage
//!
//! The registry is mutable while it is being populated and becomes read-only
//! once sealed into an `Arc`. A sealed registry can be installed process-wide
//! at startup and is never mutated during query processing.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

use super::entity::EntityDefinition;
use super::index::IndexDescriptor;
use super::relation::RelationDefinition;
use crate::error::{OrmError, OrmResult};
use crate::query::scope::Scope;

static GLOBAL_REGISTRY: OnceCell<Arc<SchemaRegistry>> = OnceCell::new();

/// Registry of entity definitions with their indices and named scopes
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// Map of entity name -> definition
    entities: HashMap<String, EntityDefinition>,

    /// Map of entity name -> declared indices
    indexes: HashMap<String, Vec<IndexDescriptor>>,

    /// Map of entity name -> scope name -> scope
    scopes: HashMap<String, HashMap<String, Scope>>,
}

impl SchemaRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity definition
    pub fn register(&mut self, definition: EntityDefinition) -> OrmResult<()> {
        if self.entities.contains_key(definition.name()) {
            return Err(OrmError::DuplicateEntity(definition.name().to_string()));
        }

        tracing::debug!(
            "Registering entity '{}' ({} fields, {} relations)",
            definition.name(),
            definition.fields().len(),
            definition.relations().len()
        );

        self.entities
            .insert(definition.name().to_string(), definition);
        Ok(())
    }

    /// Look up an entity definition by name
    pub fn lookup(&self, name: &str) -> OrmResult<&EntityDefinition> {
        self.entities
            .get(name)
            .ok_or_else(|| OrmError::UnknownEntity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a relation of an entity together with the target definition
    pub fn relation_target(
        &self,
        entity: &str,
        relation: &str,
    ) -> OrmResult<(&RelationDefinition, &EntityDefinition)> {
        let definition = self.lookup(entity)?;
        let relation = definition.require_relation(relation)?;
        let target = self.lookup(&relation.target)?;
        Ok((relation, target))
    }

    /// Declare an index over fields of a registered entity
    pub fn register_index(&mut self, index: IndexDescriptor) -> OrmResult<()> {
        let definition = self.lookup(&index.entity)?;

        if index.fields.is_empty() {
            return Err(OrmError::Configuration(format!(
                "Index on '{}' must cover at least one field",
                index.entity
            )));
        }

        for field in &index.fields {
            definition.require_field(field)?;
        }

        let indexes = self.indexes.entry(index.entity.clone()).or_default();
        if !indexes.contains(&index) {
            indexes.push(index);
        }
        Ok(())
    }

    /// Indices declared on an entity
    pub fn indexes_for(&self, entity: &str) -> &[IndexDescriptor] {
        self.indexes
            .get(entity)
            .map(|indexes| indexes.as_slice())
            .unwrap_or(&[])
    }

    /// A field counts as indexed when it leads some index, or is the primary key
    pub fn is_indexed(&self, entity: &str, field: &str) -> bool {
        let is_primary_key = self
            .entities
            .get(entity)
            .map(|definition| definition.primary_key() == field)
            .unwrap_or(false);

        is_primary_key || self.indexes_for(entity).iter().any(|index| index.covers(field))
    }

    /// Bind a named scope to its entity
    pub fn register_scope(&mut self, scope: Scope) -> OrmResult<()> {
        self.lookup(scope.entity())?;

        let scopes = self.scopes.entry(scope.entity().to_string()).or_default();
        if scopes.contains_key(scope.name()) {
            return Err(OrmError::Configuration(format!(
                "Scope '{}' is already registered on '{}'",
                scope.name(),
                scope.entity()
            )));
        }

        scopes.insert(scope.name().to_string(), scope);
        Ok(())
    }

    /// Look up a named scope bound to an entity
    pub fn scope(&self, entity: &str, name: &str) -> OrmResult<&Scope> {
        self.lookup(entity)?;

        self.scopes
            .get(entity)
            .and_then(|scopes| scopes.get(name))
            .ok_or_else(|| OrmError::UnknownScope {
                entity: entity.to_string(),
                scope: name.to_string(),
            })
    }

    pub fn scope_names(&self, entity: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .scopes
            .get(entity)
            .map(|scopes| scopes.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Validate cross-entity references and freeze the registry.
    ///
    /// Every relation target must be registered, every has-one/has-many
    /// foreign key must be a field of its target, and every scope must
    /// resolve against its entity.
    pub fn seal(self) -> OrmResult<Arc<SchemaRegistry>> {
        for definition in self.entities.values() {
            for relation in definition.relations() {
                let target = self.lookup(&relation.target)?;

                if !relation.relationship_type.foreign_key_on_source() {
                    target.require_field(&relation.foreign_key)?;
                }
            }
        }

        for scopes in self.scopes.values() {
            for scope in scopes.values() {
                scope.validate(&self)?;
            }
        }

        Ok(Arc::new(self))
    }
}

/// Install the process-wide registry. Fails if one is already installed.
pub fn install_global(registry: Arc<SchemaRegistry>) -> OrmResult<()> {
    let entity_count = registry.entities.len();

    GLOBAL_REGISTRY.set(registry).map_err(|_| {
        OrmError::Configuration("Schema registry is already installed".to_string())
    })?;

    tracing::info!("Schema registry installed with {} entities", entity_count);
    Ok(())
}

/// The process-wide registry installed at startup
pub fn global() -> OrmResult<Arc<SchemaRegistry>> {
    GLOBAL_REGISTRY
        .get()
        .cloned()
        .ok_or_else(|| OrmError::Configuration("Schema registry is not installed".to_string()))
}
