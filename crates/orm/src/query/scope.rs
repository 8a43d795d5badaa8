//! Scopes - named, reusable query fragments bound to an entity
//!
//! A scope carries an optional filter, relations to eager-load, a field
//! projection and ordering. Applying several scopes ANDs their filters and
//! unions their includes and projections; applying the same scope twice
//! changes nothing.

use serde::{Deserialize, Serialize};

use super::compiler::ScopeCompiler;
use super::predicate::Predicate;
use super::types::{push_order, push_unique, OrderBy, OrderDirection};
use crate::error::OrmResult;
use crate::schema::SchemaRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    entity: String,
    name: String,
    predicate: Option<Predicate>,
    includes: Vec<String>,
    projection: Vec<String>,
    order_by: Vec<OrderBy>,
}

impl Scope {
    pub fn new(entity: &str, name: &str) -> Self {
        Self {
            entity: entity.to_string(),
            name: name.to_string(),
            predicate: None,
            includes: Vec::new(),
            projection: Vec::new(),
            order_by: Vec::new(),
        }
    }

    /// AND a condition into the scope's filter
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Predicate::conjunction(self.predicate.take().into_iter().chain([predicate]));
        self
    }

    /// Eager-load a relation path, e.g. `comments` or `comments.author`
    pub fn include(mut self, relation: &str) -> Self {
        push_unique(&mut self.includes, relation);
        self
    }

    /// Restrict the projection to these fields
    pub fn select(mut self, fields: &[&str]) -> Self {
        for field in fields {
            push_unique(&mut self.projection, field);
        }
        self
    }

    pub fn order_by(mut self, field: &str, direction: OrderDirection) -> Self {
        push_order(
            &mut self.order_by,
            OrderBy {
                field: field.to_string(),
                direction,
            },
        );
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn ordering(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// Check the scope compiles against its entity
    pub fn validate(&self, registry: &SchemaRegistry) -> OrmResult<()> {
        ScopeCompiler::new(registry)
            .query(&self.entity)
            .apply(self)
            .build()
            .map(|_| ())
    }
}
