//! PostgreSQL storage backend
//!
//! Runs fetch requests through a sqlx connection pool and converts result rows
//! to JSON.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _};
use uuid::Uuid;

use super::core::{FetchRequest, Row, StorageBackend};
use crate::error::StorageError;
use crate::schema::FieldType;

/// Storage backend over a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StorageBackend for PgStore {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Row>, StorageError> {
        let (sql, params) = request.to_sql_with_columns();

        let mut query = sqlx::query(&sql);
        for param in params {
            let declared = request.column_type(&param.column);
            query = PgParam::from_json(param.value, declared)?.bind(query);
        }

        let rows = query.fetch_all(&self.pool).await?;
        tracing::debug!("PostgreSQL returned {} rows for: {}", rows.len(), sql);

        Ok(rows.iter().map(row_to_json).collect())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

/// A parameter converted to the PostgreSQL type it is bound as.
///
/// Key values come back from `row_to_json` as JSON strings for uuid and
/// timestamp columns, so they must be bound with their column's type or the
/// comparison fails with `uuid = text`.
#[derive(Debug, Clone, PartialEq)]
enum PgParam {
    Null(Option<FieldType>),
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl PgParam {
    /// Pick the bind type from the declared column type, or from the value
    /// itself when the column is undeclared
    fn from_json(value: Value, declared: Option<FieldType>) -> Result<Self, StorageError> {
        let param = match (declared, value) {
            (declared, Value::Null) => PgParam::Null(declared),
            (Some(FieldType::Json), value) => PgParam::Json(value),
            (Some(FieldType::Uuid), Value::String(s)) => match Uuid::parse_str(&s) {
                Ok(uuid) => PgParam::Uuid(uuid),
                Err(e) => {
                    return Err(StorageError::UnsupportedValue(format!(
                        "'{}' is not a uuid: {}",
                        s, e
                    )))
                }
            },
            (Some(FieldType::Timestamp), Value::String(s)) => match parse_timestamp(&s) {
                Some(timestamp) => PgParam::Timestamp(timestamp),
                None => {
                    return Err(StorageError::UnsupportedValue(format!(
                        "'{}' is not a timestamp",
                        s
                    )))
                }
            },
            (None, Value::String(s)) => {
                if let Ok(uuid) = Uuid::parse_str(&s) {
                    PgParam::Uuid(uuid)
                } else if let Some(timestamp) = parse_timestamp(&s) {
                    PgParam::Timestamp(timestamp)
                } else {
                    PgParam::Text(s)
                }
            }
            (_, Value::String(s)) => PgParam::Text(s),
            (_, Value::Bool(b)) => PgParam::Bool(b),
            (Some(FieldType::Float), Value::Number(n)) => match n.as_f64() {
                Some(f) => PgParam::Float(f),
                None => return Err(StorageError::UnsupportedValue(format!("number {}", n))),
            },
            (_, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    PgParam::Int(i)
                } else if let Some(f) = n.as_f64() {
                    PgParam::Float(f)
                } else {
                    return Err(StorageError::UnsupportedValue(format!("number {}", n)));
                }
            }
            (_, other) => PgParam::Json(other),
        };
        Ok(param)
    }

    fn bind<'q>(self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            PgParam::Null(declared) => match declared {
                Some(FieldType::Uuid) => query.bind(None::<Uuid>),
                Some(FieldType::Timestamp) => query.bind(None::<DateTime<Utc>>),
                Some(FieldType::Text) => query.bind(None::<String>),
                Some(FieldType::Boolean) => query.bind(None::<bool>),
                Some(FieldType::Float) => query.bind(None::<f64>),
                Some(FieldType::Json) => query.bind(None::<Value>),
                Some(FieldType::Integer) | None => query.bind(None::<i64>),
            },
            PgParam::Bool(b) => query.bind(b),
            PgParam::Int(i) => query.bind(i),
            PgParam::Float(f) => query.bind(f),
            PgParam::Text(s) => query.bind(s),
            PgParam::Uuid(uuid) => query.bind(uuid),
            PgParam::Timestamp(timestamp) => query.bind(timestamp),
            PgParam::Json(value) => query.bind(value),
        }
    }
}

/// RFC 3339, or a zone-less `YYYY-MM-DD HH:MM:SS[.f]` read as UTC
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(s) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Convert a PostgreSQL row to a JSON row
fn row_to_json(row: &PgRow) -> Row {
    let mut map = Map::new();

    for (i, column) in row.columns().iter().enumerate() {
        let value = if let Ok(value) = row.try_get::<Option<String>, _>(i) {
            value.map_or(Value::Null, Value::String)
        } else if let Ok(value) = row.try_get::<Option<i64>, _>(i) {
            value.map_or(Value::Null, |v| Value::Number(Number::from(v)))
        } else if let Ok(value) = row.try_get::<Option<i32>, _>(i) {
            value.map_or(Value::Null, |v| Value::Number(Number::from(v)))
        } else if let Ok(value) = row.try_get::<Option<f64>, _>(i) {
            value
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number)
        } else if let Ok(value) = row.try_get::<Option<bool>, _>(i) {
            value.map_or(Value::Null, Value::Bool)
        } else if let Ok(value) = row.try_get::<Option<DateTime<Utc>>, _>(i) {
            value.map_or(Value::Null, |v| Value::String(v.to_rfc3339()))
        } else if let Ok(value) = row.try_get::<Option<Uuid>, _>(i) {
            value.map_or(Value::Null, |v| Value::String(v.to_string()))
        } else if let Ok(value) = row.try_get::<Option<Value>, _>(i) {
            value.unwrap_or(Value::Null)
        } else {
            Value::Null
        };

        map.insert(column.name().to_string(), value);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_uuid_keys_bind_as_uuid() {
        let expected = PgParam::Uuid(Uuid::parse_str(KEY).unwrap());

        assert_eq!(
            PgParam::from_json(json!(KEY), Some(FieldType::Uuid)).unwrap(),
            expected
        );
        assert_eq!(PgParam::from_json(json!(KEY), None).unwrap(), expected);
        assert!(matches!(
            PgParam::from_json(json!("not-a-uuid"), Some(FieldType::Uuid)),
            Err(StorageError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn test_declared_text_stays_text() {
        assert_eq!(
            PgParam::from_json(json!(KEY), Some(FieldType::Text)).unwrap(),
            PgParam::Text(KEY.to_string())
        );
        assert_eq!(
            PgParam::from_json(json!("Eager loading"), None).unwrap(),
            PgParam::Text("Eager loading".to_string())
        );
    }

    #[test]
    fn test_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 0).unwrap();

        assert_eq!(
            PgParam::from_json(json!("2024-01-10T08:30:00+00:00"), Some(FieldType::Timestamp))
                .unwrap(),
            PgParam::Timestamp(expected)
        );
        assert_eq!(
            PgParam::from_json(json!("2024-01-10 08:30:00"), Some(FieldType::Timestamp)).unwrap(),
            PgParam::Timestamp(expected)
        );
        assert_eq!(
            PgParam::from_json(json!("2024-01-10T10:30:00+02:00"), None).unwrap(),
            PgParam::Timestamp(expected)
        );
        assert!(PgParam::from_json(json!("yesterday"), Some(FieldType::Timestamp)).is_err());
    }

    #[test]
    fn test_scalars_and_nulls() {
        assert_eq!(
            PgParam::from_json(json!(7), Some(FieldType::Integer)).unwrap(),
            PgParam::Int(7)
        );
        assert_eq!(
            PgParam::from_json(json!(7), Some(FieldType::Float)).unwrap(),
            PgParam::Float(7.0)
        );
        assert_eq!(PgParam::from_json(json!(true), None).unwrap(), PgParam::Bool(true));
        assert_eq!(
            PgParam::from_json(json!({"tags": ["orm"]}), Some(FieldType::Json)).unwrap(),
            PgParam::Json(json!({"tags": ["orm"]}))
        );
        assert_eq!(
            PgParam::from_json(Value::Null, Some(FieldType::Uuid)).unwrap(),
            PgParam::Null(Some(FieldType::Uuid))
        );
    }

    #[test]
    fn test_fetch_request_carries_declared_types() {
        use crate::schema::EntityDefinition;
        use crate::query::Predicate;

        let post = EntityDefinition::builder("Post")
            .table("posts")
            .field("id", FieldType::Uuid)
            .field("title", FieldType::Text)
            .build()
            .unwrap();
        let request = FetchRequest::new("posts", vec!["id".to_string()])
            .with_column_types(&post)
            .with_predicate(Some(Predicate::is_in("id", vec![KEY])));

        let (sql, params) = request.to_sql_with_columns();
        assert_eq!(sql, r#"SELECT "id" FROM "posts" WHERE "id" IN ($1)"#);

        let bound: Vec<PgParam> = params
            .into_iter()
            .map(|p| PgParam::from_json(p.value, request.column_type(&p.column)).unwrap())
            .collect();
        assert_eq!(bound, vec![PgParam::Uuid(Uuid::parse_str(KEY).unwrap())]);
    }
}
