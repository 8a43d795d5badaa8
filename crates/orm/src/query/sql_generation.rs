//! SQL generation for fetch requests
//!
//! Renders a parameterised SELECT with `$n` placeholders. Identifiers come
//! from the schema registry and are double-quoted.

use serde_json::Value;

use super::predicate::Predicate;
use crate::backends::FetchRequest;

/// A bound parameter and the column it is compared against
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam {
    pub column: String,
    pub value: Value,
}

impl FetchRequest {
    /// Generate SQL with parameter placeholders and return the parameters
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let (sql, params) = self.to_sql_with_columns();
        (sql, params.into_iter().map(|param| param.value).collect())
    }

    /// Like [`FetchRequest::to_sql`], keeping the column each parameter binds to
    pub fn to_sql_with_columns(&self) -> (String, Vec<SqlParam>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.projection.is_empty() {
            sql.push('*');
        } else {
            let columns: Vec<String> = self.projection.iter().map(|c| quote_identifier(c)).collect();
            sql.push_str(&columns.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&quote_identifier(&self.table));

        if let Some(predicate) = &self.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.to_sql(&mut params));
        }

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|o| format!("{} {}", quote_identifier(&o.field), o.direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        (sql, params)
    }
}

impl Predicate {
    /// Render the predicate, appending bound values to `params`
    pub fn to_sql(&self, params: &mut Vec<SqlParam>) -> String {
        match self {
            Predicate::Compare {
                field,
                operator,
                value,
            } => {
                params.push(SqlParam {
                    column: field.clone(),
                    value: value.clone(),
                });
                format!("{} {} ${}", quote_identifier(field), operator, params.len())
            }
            Predicate::In { field, values } => {
                if values.is_empty() {
                    return "FALSE".to_string();
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|value| {
                        params.push(SqlParam {
                            column: field.clone(),
                            value: value.clone(),
                        });
                        format!("${}", params.len())
                    })
                    .collect();
                format!("{} IN ({})", quote_identifier(field), placeholders.join(", "))
            }
            Predicate::IsNull(field) => format!("{} IS NULL", quote_identifier(field)),
            Predicate::IsNotNull(field) => format!("{} IS NOT NULL", quote_identifier(field)),
            Predicate::And(terms) => join_terms(terms, " AND ", "TRUE", params),
            Predicate::Or(terms) => join_terms(terms, " OR ", "FALSE", params),
            Predicate::Not(inner) => format!("NOT ({})", inner.to_sql(params)),
        }
    }
}

fn join_terms(
    terms: &[Predicate],
    separator: &str,
    empty: &str,
    params: &mut Vec<SqlParam>,
) -> String {
    if terms.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = terms
        .iter()
        .map(|term| format!("({})", term.to_sql(params)))
        .collect();
    rendered.join(separator)
}

pub(crate) fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::OrderBy;
    use serde_json::json;

    #[test]
    fn test_select_with_projection() {
        let request = FetchRequest::new("posts", vec!["id".to_string(), "title".to_string()]);
        let (sql, params) = request.to_sql();

        assert_eq!(sql, r#"SELECT "id", "title" FROM "posts""#);
        assert!(params.is_empty());
    }

    #[test]
    fn test_batched_membership_filter() {
        let request = FetchRequest::new("comments", vec!["id".to_string(), "post_id".to_string()])
            .with_predicate(Some(Predicate::is_in("post_id", vec![1, 2])));
        let (sql, params) = request.to_sql();

        assert_eq!(
            sql,
            r#"SELECT "id", "post_id" FROM "comments" WHERE "post_id" IN ($1, $2)"#
        );
        assert_eq!(params, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_compound_predicate_order_and_limit() {
        let predicate = Predicate::eq("published", true)
            .and(Predicate::gt("views", 100).or(Predicate::is_null("views")));
        let request = FetchRequest::new("posts", Vec::new())
            .with_predicate(Some(predicate))
            .with_order(vec![OrderBy::desc("created_at")])
            .with_limit(Some(1));
        let (sql, params) = request.to_sql();

        assert_eq!(
            sql,
            r#"SELECT * FROM "posts" WHERE ("published" = $1) AND (("views" > $2) OR ("views" IS NULL)) ORDER BY "created_at" DESC LIMIT 1"#
        );
        assert_eq!(params, vec![json!(true), json!(100)]);
    }

    #[test]
    fn test_empty_membership_and_negation() {
        let mut params = Vec::new();
        assert_eq!(Predicate::is_in::<i64>("id", vec![]).to_sql(&mut params), "FALSE");
        assert_eq!(
            Predicate::like("title", "%rust%").negate().to_sql(&mut params),
            r#"NOT ("title" LIKE $1)"#
        );
    }

    #[test]
    fn test_parameters_keep_their_columns() {
        let predicate = Predicate::eq("author_id", "550e8400-e29b-41d4-a716-446655440000")
            .and(Predicate::is_in("created_at", vec!["2024-01-10T00:00:00Z"]));
        let request = FetchRequest::new("posts", Vec::new()).with_predicate(Some(predicate));
        let (_, params) = request.to_sql_with_columns();

        let columns: Vec<&str> = params.iter().map(|p| p.column.as_str()).collect();
        assert_eq!(columns, vec!["author_id", "created_at"]);
        assert_eq!(params[1].value, json!("2024-01-10T00:00:00Z"));
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }
}
