//! Scope Compiler - turns filters, includes, projections and scopes into plans
//!
//! Every name is resolved against the schema registry here, so a plan that
//! compiles only fails at execution time if storage does.

use super::plan::{IncludeNode, Projection, QueryPlan, ResultCardinality};
use super::predicate::Predicate;
use super::scope::Scope;
use super::types::{push_order, push_unique, OrderBy, OrderDirection};
use crate::error::{OrmError, OrmResult};
use crate::schema::{EntityDefinition, SchemaRegistry};

/// Compiles queries against a schema registry
#[derive(Debug, Clone, Copy)]
pub struct ScopeCompiler<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> ScopeCompiler<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// Compile a collection query.
    ///
    /// Predicate fragments are ANDed, includes are deduplicated and an empty
    /// projection selects every declared field.
    pub fn compile(
        &self,
        entity: &str,
        predicate_fragments: &[Predicate],
        includes: &[&str],
        projection: &[&str],
    ) -> OrmResult<QueryPlan> {
        let mut query = self.query(entity).select(projection);
        for fragment in predicate_fragments {
            query = query.filter(fragment.clone());
        }
        for include in includes {
            query = query.with(include);
        }
        query.build()
    }

    /// Start a fluent query on an entity
    pub fn query(&self, entity: &str) -> QueryBuilder<'r> {
        QueryBuilder::new(*self, entity)
    }

    /// Resolve dotted include paths into an include tree rooted at `entity`
    pub fn include_tree(&self, entity: &str, paths: &[String]) -> OrmResult<Vec<IncludeNode>> {
        let root = self.registry.lookup(entity)?;
        let mut nodes: Vec<IncludeNode> = Vec::new();

        for path in paths {
            let mut definition = root;
            let mut level = &mut nodes;
            let mut walked = String::new();

            for segment in path.split('.') {
                let relation = definition.require_relation(segment)?;
                let target = self.registry.lookup(&relation.target)?;

                if !walked.is_empty() {
                    walked.push('.');
                }
                walked.push_str(segment);

                let position = match level.iter().position(|node| node.relation == segment) {
                    Some(position) => position,
                    None => {
                        level.push(IncludeNode {
                            relation: relation.name.clone(),
                            path: walked.clone(),
                            entity: target.name().to_string(),
                            table: target.table().to_string(),
                            relationship_type: relation.relationship_type,
                            parent_key: relation.parent_key(definition.primary_key()).to_string(),
                            child_key: relation.child_key(target.primary_key()).to_string(),
                            fields: target.field_names(),
                            key_fields: key_fields(target),
                            children: Vec::new(),
                        });
                        level.len() - 1
                    }
                };

                level = &mut level[position].children;
                definition = target;
            }
        }

        Ok(nodes)
    }

    fn build(&self, parts: QueryBuilder<'r>) -> OrmResult<QueryPlan> {
        let definition = self.registry.lookup(&parts.entity)?;

        let projection = if parts.projection.is_empty() {
            Projection::All
        } else {
            for field in &parts.projection {
                definition.require_field(field)?;
            }
            Projection::Fields(parts.projection.clone())
        };

        let fields = match &projection {
            Projection::All => definition.field_names(),
            Projection::Fields(fields) => fields.clone(),
        };

        let predicate = Predicate::conjunction(parts.predicates);
        if let Some(predicate) = &predicate {
            for field in predicate.fields() {
                definition.require_field(field)?;
            }
        }

        for order in &parts.order_by {
            definition.require_field(&order.field)?;
        }

        let includes = self.include_tree(&parts.entity, &parts.includes)?;

        let limit = match parts.cardinality {
            ResultCardinality::Single => Some(1),
            ResultCardinality::Collection => parts.limit,
        };

        Ok(QueryPlan {
            entity: definition.name().to_string(),
            table: definition.table().to_string(),
            projection,
            fields,
            key_fields: key_fields(definition),
            predicate,
            includes,
            order_by: parts.order_by,
            limit,
            cardinality: parts.cardinality,
        })
    }
}

/// Primary key plus every belongs-to foreign key of the entity
fn key_fields(definition: &EntityDefinition) -> Vec<String> {
    let mut keys = vec![definition.primary_key().to_string()];
    for relation in definition.relations() {
        if relation.relationship_type.foreign_key_on_source() {
            push_unique(&mut keys, &relation.foreign_key);
        }
    }
    keys
}

/// Fluent query builder collecting fragments before compilation
#[derive(Debug, Clone)]
pub struct QueryBuilder<'r> {
    compiler: ScopeCompiler<'r>,
    entity: String,
    predicates: Vec<Predicate>,
    includes: Vec<String>,
    projection: Vec<String>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
    cardinality: ResultCardinality,
    /// First scope lookup failure, reported by `build`
    error: Option<OrmError>,
}

impl<'r> QueryBuilder<'r> {
    fn new(compiler: ScopeCompiler<'r>, entity: &str) -> Self {
        Self {
            compiler,
            entity: entity.to_string(),
            predicates: Vec::new(),
            includes: Vec::new(),
            projection: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            cardinality: ResultCardinality::Collection,
            error: None,
        }
    }

    /// AND a predicate fragment into the query
    pub fn filter(mut self, predicate: Predicate) -> Self {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
        self
    }

    /// Eager-load a relation path
    pub fn with(mut self, relation: &str) -> Self {
        push_unique(&mut self.includes, relation);
        self
    }

    /// Eager-load a relation path only when the condition holds
    pub fn with_when(self, condition: bool, relation: &str) -> Self {
        if condition {
            self.with(relation)
        } else {
            self
        }
    }

    /// Add fields to the projection
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

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Return a single record instead of a collection
    pub fn first(mut self) -> Self {
        self.cardinality = ResultCardinality::Single;
        self
    }

    /// Apply a scope's fragments
    pub fn apply(mut self, scope: &Scope) -> Self {
        if scope.entity() != self.entity {
            if self.error.is_none() {
                self.error = Some(OrmError::UnknownScope {
                    entity: self.entity.clone(),
                    scope: scope.name().to_string(),
                });
            }
            return self;
        }

        if let Some(predicate) = scope.predicate() {
            self = self.filter(predicate.clone());
        }
        for include in scope.includes() {
            push_unique(&mut self.includes, include);
        }
        for field in scope.projection() {
            push_unique(&mut self.projection, field);
        }
        for order in scope.ordering() {
            push_order(&mut self.order_by, order.clone());
        }
        self
    }

    /// Apply a scope registered under this entity
    pub fn scope(self, name: &str) -> Self {
        match self.compiler.registry().scope(&self.entity, name) {
            Ok(scope) => self.apply(scope),
            Err(err) => {
                let mut builder = self;
                if builder.error.is_none() {
                    builder.error = Some(err);
                }
                builder
            }
        }
    }

    /// Validate and compile into a plan
    pub fn build(mut self) -> OrmResult<QueryPlan> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        let compiler = self.compiler;
        compiler.build(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, RelationDefinition, RelationshipType};

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                EntityDefinition::builder("User")
                    .table("users")
                    .field("id", FieldType::Integer)
                    .field("name", FieldType::Text)
                    .relation(RelationDefinition::has_many("posts", "Post", "author_id"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                EntityDefinition::builder("Post")
                    .table("posts")
                    .field("id", FieldType::Integer)
                    .field("author_id", FieldType::Integer)
                    .field("title", FieldType::Text)
                    .field("published", FieldType::Boolean)
                    .field("created_at", FieldType::Timestamp)
                    .relation(RelationDefinition::has_many("comments", "Comment", "post_id"))
                    .relation(RelationDefinition::belongs_to("author", "User", "author_id"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                EntityDefinition::builder("Comment")
                    .table("comments")
                    .field("id", FieldType::Integer)
                    .field("post_id", FieldType::Integer)
                    .field("user_id", FieldType::Integer)
                    .field("body", FieldType::Text)
                    .relation(RelationDefinition::belongs_to("user", "User", "user_id"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_compile_all_fields() {
        let registry = registry();
        let plan = ScopeCompiler::new(&registry)
            .compile("Post", &[], &[], &[])
            .unwrap();

        assert_eq!(plan.projection, Projection::All);
        assert_eq!(
            plan.fields,
            vec!["id", "author_id", "title", "published", "created_at"]
        );
        assert_eq!(plan.table, "posts");
        assert_eq!(plan.predicate, None);
        assert_eq!(plan.cardinality, ResultCardinality::Collection);
        assert_eq!(plan.fetch_count(), 1);
    }

    #[test]
    fn test_compile_projection() {
        let registry = registry();
        let plan = ScopeCompiler::new(&registry)
            .compile("Post", &[], &[], &["title", "created_at"])
            .unwrap();

        assert_eq!(
            plan.projection,
            Projection::Fields(vec!["title".to_string(), "created_at".to_string()])
        );
        assert!(plan.is_projected("title"));
        assert!(!plan.is_projected("id"));
        // keys are still fetched for assembly
        assert_eq!(plan.root_fetch_fields(), vec!["title", "created_at", "id", "author_id"]);
    }

    #[test]
    fn test_unknown_names() {
        let registry = registry();
        let compiler = ScopeCompiler::new(&registry);

        assert_eq!(
            compiler.compile("Post", &[], &[], &["rating"]).unwrap_err(),
            OrmError::unknown_field("Post", "rating")
        );
        assert_eq!(
            compiler.compile("Post", &[], &["tags"], &[]).unwrap_err(),
            OrmError::unknown_relation("Post", "tags")
        );
        assert_eq!(
            compiler
                .compile("Post", &[], &["comments.replies"], &[])
                .unwrap_err(),
            OrmError::unknown_relation("Comment", "replies")
        );
        assert_eq!(
            compiler
                .compile("Post", &[Predicate::eq("rating", 5)], &[], &[])
                .unwrap_err(),
            OrmError::unknown_field("Post", "rating")
        );
        assert_eq!(
            compiler.compile("Tag", &[], &[], &[]).unwrap_err(),
            OrmError::UnknownEntity("Tag".to_string())
        );
        assert!(matches!(
            compiler.query("Post").order_by("rating", OrderDirection::Asc).build(),
            Err(OrmError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_predicate_fragments_are_anded() {
        let registry = registry();
        let plan = ScopeCompiler::new(&registry)
            .compile(
                "Post",
                &[Predicate::eq("published", true), Predicate::gt("id", 10)],
                &[],
                &[],
            )
            .unwrap();

        assert_eq!(
            plan.predicate,
            Some(Predicate::And(vec![
                Predicate::eq("published", true),
                Predicate::gt("id", 10)
            ]))
        );
    }

    #[test]
    fn test_includes_are_deduplicated() {
        let registry = registry();
        let plan = ScopeCompiler::new(&registry)
            .compile(
                "Post",
                &[],
                &["comments", "comments", "comments.user", "author"],
                &[],
            )
            .unwrap();

        assert_eq!(plan.includes.len(), 2);
        assert_eq!(
            plan.include_paths(),
            vec!["comments", "comments.user", "author"]
        );
        assert_eq!(plan.fetch_count(), 4);

        let comments = &plan.includes[0];
        assert_eq!(comments.entity, "Comment");
        assert_eq!(comments.table, "comments");
        assert_eq!(comments.relationship_type, RelationshipType::HasMany);
        assert_eq!(comments.parent_key, "id");
        assert_eq!(comments.child_key, "post_id");
        assert!(comments.fetch_fields().contains(&"user_id".to_string()));

        let author = &plan.includes[1];
        assert_eq!(author.parent_key, "author_id");
        assert_eq!(author.child_key, "id");
    }

    #[test]
    fn test_nested_path_implies_parent() {
        let registry = registry();
        let plan = ScopeCompiler::new(&registry)
            .compile("User", &[], &["posts.comments"], &[])
            .unwrap();

        assert_eq!(plan.include_paths(), vec!["posts", "posts.comments"]);
        assert_eq!(plan.fetch_count(), 3);
    }

    #[test]
    fn test_first_sets_single_cardinality() {
        let registry = registry();
        let plan = ScopeCompiler::new(&registry)
            .query("Post")
            .filter(Predicate::eq("id", 1))
            .first()
            .build()
            .unwrap();

        assert!(plan.is_single());
        assert_eq!(plan.limit, Some(1));
    }

    #[test]
    fn test_with_when() {
        let registry = registry();
        let compiler = ScopeCompiler::new(&registry);

        let with = compiler.query("Post").with_when(true, "comments").build().unwrap();
        let without = compiler.query("Post").with_when(false, "comments").build().unwrap();

        assert_eq!(with.fetch_count(), 2);
        assert_eq!(without.fetch_count(), 1);
    }

    #[test]
    fn test_scope_application_is_idempotent() {
        let registry = registry();
        let compiler = ScopeCompiler::new(&registry);
        let published = Scope::new("Post", "published")
            .filter(Predicate::eq("published", true))
            .include("comments")
            .select(&["title"])
            .order_by("created_at", OrderDirection::Desc);

        let once = compiler.query("Post").apply(&published).build().unwrap();
        let twice = compiler
            .query("Post")
            .apply(&published)
            .apply(&published)
            .build()
            .unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_scopes_compose() {
        let registry = registry();
        let compiler = ScopeCompiler::new(&registry);
        let published = Scope::new("Post", "published")
            .filter(Predicate::eq("published", true))
            .include("comments");
        let with_author = Scope::new("Post", "with_author")
            .filter(Predicate::is_not_null("author_id"))
            .include("author");

        let plan = compiler
            .query("Post")
            .apply(&published)
            .apply(&with_author)
            .build()
            .unwrap();

        assert_eq!(
            plan.predicate,
            Some(Predicate::And(vec![
                Predicate::eq("published", true),
                Predicate::is_not_null("author_id")
            ]))
        );
        assert_eq!(plan.include_paths(), vec!["comments", "author"]);
    }

    #[test]
    fn test_scope_errors() {
        let registry = registry();
        let compiler = ScopeCompiler::new(&registry);

        assert!(matches!(
            compiler.query("Post").scope("drafts").build(),
            Err(OrmError::UnknownScope { .. })
        ));

        let user_scope = Scope::new("User", "named").filter(Predicate::is_not_null("name"));
        assert!(matches!(
            compiler.query("Post").apply(&user_scope).build(),
            Err(OrmError::UnknownScope { .. })
        ));
    }
}
