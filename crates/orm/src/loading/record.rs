//! Records - executed results with projected fields and attached relations

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::backends::Row;
use crate::error::{OrmError, OrmResult};

/// Relation data attached to a record
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// To-one relation; `None` when no related row matched
    One(Option<Box<Record>>),
    /// To-many relation; empty when no related rows matched
    Many(Vec<Record>),
}

/// A fetched record.
///
/// Only projected fields are readable. Key columns fetched for assembly are
/// kept aside and never exposed.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: String,
    fields: Map<String, Value>,
    field_order: Vec<String>,
    keys: Map<String, Value>,
    relations: Vec<(String, Related)>,
}

impl Record {
    /// Split a fetched row into exposed fields and hidden keys
    pub(crate) fn from_row(entity: &str, mut row: Row, visible: &[String]) -> Self {
        let mut fields = Map::new();
        for name in visible {
            let value = row.remove(name).unwrap_or(Value::Null);
            fields.insert(name.clone(), value);
        }

        Self {
            entity: entity.to_string(),
            fields,
            field_order: visible.to_vec(),
            keys: row,
            relations: Vec::new(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Read a projected field
    pub fn get(&self, field: &str) -> OrmResult<&Value> {
        self.fields.get(field).ok_or_else(|| OrmError::FieldNotProjected {
            entity: self.entity.clone(),
            field: field.to_string(),
        })
    }

    /// Read a projected field as a typed value
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> OrmResult<T> {
        let value = self.get(field)?;
        serde_json::from_value(value.clone()).map_err(|e| {
            OrmError::Serialization(format!(
                "Failed to deserialize field '{}' of '{}': {}",
                field, self.entity, e
            ))
        })
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Projected field names, in projection order
    pub fn field_names(&self) -> Vec<&str> {
        self.field_order.iter().map(|k| k.as_str()).collect()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Key value used for relation assembly, whether projected or not
    pub(crate) fn key(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).or_else(|| self.keys.get(field))
    }

    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations
            .iter()
            .find(|(relation, _)| relation.as_str() == name)
            .map(|(_, related)| related)
    }

    pub(crate) fn relation_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.relations
            .iter_mut()
            .find(|(relation, _)| relation.as_str() == name)
            .map(|(_, related)| related)
    }

    pub fn is_loaded(&self, relation: &str) -> bool {
        self.relation(relation).is_some()
    }

    /// Records of a loaded to-many relation
    pub fn many(&self, relation: &str) -> Option<&[Record]> {
        match self.relation(relation)? {
            Related::Many(records) => Some(records),
            Related::One(_) => None,
        }
    }

    /// Record of a loaded to-one relation; `None` if absent or not loaded
    pub fn one(&self, relation: &str) -> Option<&Record> {
        match self.relation(relation)? {
            Related::One(record) => record.as_deref(),
            Related::Many(_) => None,
        }
    }

    /// Attach or replace a relation
    pub(crate) fn set_relation(&mut self, name: &str, related: Related) {
        match self.relation_mut(name) {
            Some(existing) => *existing = related,
            None => self.relations.push((name.to_string(), related)),
        }
    }

    /// Projected fields with relations nested under their names
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        for (name, related) in &self.relations {
            let value = match related {
                Related::One(record) => record.as_ref().map_or(Value::Null, |r| r.to_json()),
                Related::Many(records) => {
                    Value::Array(records.iter().map(Record::to_json).collect())
                }
            };
            object.insert(name.clone(), value);
        }
        Value::Object(object)
    }
}

/// Result of executing a plan
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Single(Option<Record>),
    Collection(Vec<Record>),
}

impl QueryResult {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Single(record) => usize::from(record.is_some()),
            QueryResult::Collection(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> &[Record] {
        match self {
            QueryResult::Single(Some(record)) => std::slice::from_ref(record),
            QueryResult::Single(None) => &[],
            QueryResult::Collection(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            QueryResult::Single(record) => record.into_iter().collect(),
            QueryResult::Collection(records) => records,
        }
    }

    /// The single record of a single-cardinality result
    pub fn into_single(self) -> Option<Record> {
        match self {
            QueryResult::Single(record) => record,
            QueryResult::Collection(records) => records.into_iter().next(),
        }
    }
}

/// Hashable form of a join key value. NULL never joins.
pub(crate) fn join_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(format!("n:{}", i))
            } else if let Some(u) = n.as_u64() {
                Some(format!("n:{}", u))
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(format!("n:{}", f as i64))
                } else {
                    Some(format!("n:{}", f))
                }
            }
        }
        Value::String(s) => Some(format!("s:{}", s)),
        Value::Bool(b) => Some(format!("b:{}", b)),
        other => Some(format!("j:{}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post() -> Record {
        let row = json!({"title": "Scopes", "created_at": "2024-03-01", "id": 7})
            .as_object()
            .cloned()
            .unwrap();
        Record::from_row(
            "Post",
            row,
            &["title".to_string(), "created_at".to_string()],
        )
    }

    #[test]
    fn test_projection_hides_other_fields() {
        let post = post();
        assert_eq!(post.get("title").unwrap(), &json!("Scopes"));
        assert_eq!(post.field_names(), vec!["title", "created_at"]);
        assert_eq!(
            post.get("id").unwrap_err(),
            OrmError::FieldNotProjected {
                entity: "Post".to_string(),
                field: "id".to_string()
            }
        );
        assert_eq!(post.key("id"), Some(&json!(7)));
        assert_eq!(post.to_json(), json!({"title": "Scopes", "created_at": "2024-03-01"}));
    }

    #[test]
    fn test_typed_access() {
        let post = post();
        let title: String = post.get_as("title").unwrap();
        assert_eq!(title, "Scopes");
        assert!(matches!(
            post.get_as::<i64>("title"),
            Err(OrmError::Serialization(_))
        ));
    }

    #[test]
    fn test_relations() {
        let mut post = post();
        assert!(!post.is_loaded("comments"));

        post.set_relation("comments", Related::Many(Vec::new()));
        post.set_relation("author", Related::One(None));

        assert_eq!(post.many("comments").map(|c| c.len()), Some(0));
        assert!(post.one("author").is_none());
        assert!(post.is_loaded("author"));
        assert_eq!(post.to_json()["comments"], json!([]));
        assert_eq!(post.to_json()["author"], Value::Null);
    }

    #[test]
    fn test_query_result_accessors() {
        let single = QueryResult::Single(Some(post()));
        assert_eq!(single.len(), 1);
        assert_eq!(single.records().len(), 1);
        assert!(single.into_single().is_some());

        let empty = QueryResult::Single(None);
        assert!(empty.is_empty());

        let collection = QueryResult::Collection(vec![post(), post()]);
        assert_eq!(collection.into_records().len(), 2);
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key(&json!(1)), join_key(&json!(1.0)));
        assert_ne!(join_key(&json!(1)), join_key(&json!("1")));
        assert_eq!(join_key(&Value::Null), None);
    }
}
