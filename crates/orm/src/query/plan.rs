//! Query plans - the compiled, validated form of a query

use serde::{Deserialize, Serialize};

use super::predicate::Predicate;
use super::types::{push_unique, OrderBy};
use crate::schema::{Cardinality, RelationshipType};

/// Fields a plan returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// Every declared field
    All,
    /// Only these declared fields, in this order
    Fields(Vec<String>),
}

impl Projection {
    pub fn is_all(&self) -> bool {
        matches!(self, Projection::All)
    }
}

/// Shape of the result an executed plan yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCardinality {
    Single,
    Collection,
}

/// An eager-loaded relation in the include tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeNode {
    /// Relation name on the parent entity
    pub relation: String,
    /// Dotted path from the plan root, e.g. `comments.author`
    pub path: String,
    /// Related entity name
    pub entity: String,
    /// Related entity storage collection
    pub table: String,
    pub relationship_type: RelationshipType,
    /// Column read from parent records to collect batch keys
    pub parent_key: String,
    /// Column of related rows matched against the batch keys
    pub child_key: String,
    /// Fields exposed on related records
    pub fields: Vec<String>,
    /// Key columns kept on related records for assembly and lazy loading
    pub key_fields: Vec<String>,
    /// Nested includes loaded from this relation's records
    pub children: Vec<IncludeNode>,
}

impl IncludeNode {
    pub fn cardinality(&self) -> Cardinality {
        self.relationship_type.cardinality()
    }

    pub fn is_collection(&self) -> bool {
        self.relationship_type.is_collection()
    }

    /// Columns requested from storage for this node
    pub fn fetch_fields(&self) -> Vec<String> {
        let mut fields = self.fields.clone();
        push_unique(&mut fields, &self.child_key);
        for key in &self.key_fields {
            push_unique(&mut fields, key);
        }
        for child in &self.children {
            push_unique(&mut fields, &child.parent_key);
        }
        fields
    }

    /// Number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(IncludeNode::node_count).sum::<usize>()
    }

    pub(crate) fn collect_paths(&self, paths: &mut Vec<String>) {
        paths.push(self.path.clone());
        for child in &self.children {
            child.collect_paths(paths);
        }
    }

    pub(crate) fn visit<'a>(&'a self, nodes: &mut Vec<&'a IncludeNode>) {
        nodes.push(self);
        for child in &self.children {
            child.visit(nodes);
        }
    }
}

/// A compiled read query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub entity: String,
    pub table: String,
    /// Declared projection
    pub projection: Projection,
    /// Fields exposed on result records (the projection, resolved)
    pub fields: Vec<String>,
    /// Key columns always fetched so relations can be assembled or lazily loaded
    pub key_fields: Vec<String>,
    pub predicate: Option<Predicate>,
    pub includes: Vec<IncludeNode>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub cardinality: ResultCardinality,
}

impl QueryPlan {
    /// Columns requested from storage for the root fetch
    pub fn root_fetch_fields(&self) -> Vec<String> {
        let mut fields = self.fields.clone();
        for key in &self.key_fields {
            push_unique(&mut fields, key);
        }
        for include in &self.includes {
            push_unique(&mut fields, &include.parent_key);
        }
        fields
    }

    /// Whether result records expose the field
    pub fn is_projected(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Dotted paths of every eager-loaded relation, parents before children
    pub fn include_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for include in &self.includes {
            include.collect_paths(&mut paths);
        }
        paths
    }

    /// Every include node, depth first
    pub fn include_nodes(&self) -> Vec<&IncludeNode> {
        let mut nodes = Vec::new();
        for include in &self.includes {
            include.visit(&mut nodes);
        }
        nodes
    }

    /// Storage fetches the executor issues: one for the root plus one per
    /// include node, whatever the size of the result set
    pub fn fetch_count(&self) -> usize {
        1 + self.includes.iter().map(IncludeNode::node_count).sum::<usize>()
    }

    pub fn is_single(&self) -> bool {
        self.cardinality == ResultCardinality::Single
    }
}
