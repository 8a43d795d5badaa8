//! Plan analysis - index usage and cost estimates for compiled plans
//!
//! Indices never change what a plan returns, only how expensive it is.

use crate::query::{Predicate, QueryOperator, QueryPlan};
use crate::schema::SchemaRegistry;

/// Why a field is looked up in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Root filter condition
    Filter,
    /// Batched relation membership filter
    Join,
}

/// A single storage lookup and whether an index serves it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUsage {
    pub entity: String,
    pub field: String,
    pub kind: LookupKind,
    pub indexed: bool,
}

/// Rough read cost of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CostEstimate {
    Low,
    Medium,
    High,
}

/// Analysis result for a query plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanAnalysis {
    /// Storage fetches the plan issues
    pub fetch_count: usize,
    pub lookups: Vec<IndexUsage>,
    pub cost: CostEstimate,
}

impl PlanAnalysis {
    pub fn unindexed(&self) -> impl Iterator<Item = &IndexUsage> {
        self.lookups.iter().filter(|lookup| !lookup.indexed)
    }

    /// Index recommendations for every unindexed lookup
    pub fn recommendations(&self) -> Vec<String> {
        self.unindexed()
            .map(|lookup| match lookup.kind {
                LookupKind::Join => format!(
                    "Add an index on {}({}) to serve eager loading",
                    lookup.entity, lookup.field
                ),
                LookupKind::Filter => format!(
                    "Add an index on {}({}) to serve the filter",
                    lookup.entity, lookup.field
                ),
            })
            .collect()
    }
}

/// Estimates plan cost from declared indices
pub struct PlanAnalyzer<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> PlanAnalyzer<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn analyze(&self, plan: &QueryPlan) -> PlanAnalysis {
        let mut lookups = Vec::new();

        if let Some(predicate) = &plan.predicate {
            for field in filter_fields(predicate) {
                lookups.push(IndexUsage {
                    entity: plan.entity.clone(),
                    field: field.to_string(),
                    kind: LookupKind::Filter,
                    indexed: self.registry.is_indexed(&plan.entity, field),
                });
            }
        }

        for node in plan.include_nodes() {
            lookups.push(IndexUsage {
                entity: node.entity.clone(),
                field: node.child_key.clone(),
                kind: LookupKind::Join,
                indexed: self.registry.is_indexed(&node.entity, &node.child_key),
            });
        }

        // unindexed joins scan the related collection once per execution
        let weight: usize = lookups
            .iter()
            .filter(|lookup| !lookup.indexed)
            .map(|lookup| match lookup.kind {
                LookupKind::Join => 2,
                LookupKind::Filter => 1,
            })
            .sum();

        let cost = match weight {
            0 => CostEstimate::Low,
            1 => CostEstimate::Medium,
            _ => CostEstimate::High,
        };

        PlanAnalysis {
            fetch_count: plan.fetch_count(),
            lookups,
            cost,
        }
    }
}

/// Fields of top-level conjuncts an index could serve
fn filter_fields(predicate: &Predicate) -> Vec<&str> {
    let mut fields: Vec<&str> = Vec::new();
    for term in predicate.conjuncts() {
        let field = match term {
            Predicate::Compare {
                field, operator, ..
            } if !matches!(
                operator,
                QueryOperator::NotEqual | QueryOperator::Like | QueryOperator::NotLike
            ) =>
            {
                field
            }
            Predicate::In { field, .. } | Predicate::IsNull(field) => field,
            _ => continue,
        };
        if !fields.contains(&field.as_str()) {
            fields.push(field);
        }
    }
    fields
}
