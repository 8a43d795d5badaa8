//! Predicate trees - filter conditions combined with AND / OR / NOT
//!
//! Predicates are plain data: the compiler validates their fields against the
//! schema, the SQL generator renders them, and in-process backends evaluate
//! them against JSON rows with [`Predicate::matches`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use super::types::QueryOperator;

/// A filter condition over the fields of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare {
        field: String,
        operator: QueryOperator,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    IsNull(String),
    IsNotNull(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    fn compare<T: Into<Value>>(field: &str, operator: QueryOperator, value: T) -> Self {
        Predicate::Compare {
            field: field.to_string(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq<T: Into<Value>>(field: &str, value: T) -> Self {
        Self::compare(field, QueryOperator::Equal, value)
    }

    pub fn ne<T: Into<Value>>(field: &str, value: T) -> Self {
        Self::compare(field, QueryOperator::NotEqual, value)
    }

    pub fn gt<T: Into<Value>>(field: &str, value: T) -> Self {
        Self::compare(field, QueryOperator::GreaterThan, value)
    }

    pub fn gte<T: Into<Value>>(field: &str, value: T) -> Self {
        Self::compare(field, QueryOperator::GreaterThanOrEqual, value)
    }

    pub fn lt<T: Into<Value>>(field: &str, value: T) -> Self {
        Self::compare(field, QueryOperator::LessThan, value)
    }

    pub fn lte<T: Into<Value>>(field: &str, value: T) -> Self {
        Self::compare(field, QueryOperator::LessThanOrEqual, value)
    }

    /// SQL LIKE with `%` and `_` wildcards
    pub fn like(field: &str, pattern: &str) -> Self {
        Self::compare(field, QueryOperator::Like, pattern)
    }

    pub fn not_like(field: &str, pattern: &str) -> Self {
        Self::compare(field, QueryOperator::NotLike, pattern)
    }

    /// Membership filter
    pub fn is_in<T: Into<Value>>(field: &str, values: Vec<T>) -> Self {
        Predicate::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(field: &str) -> Self {
        Predicate::IsNull(field.to_string())
    }

    pub fn is_not_null(field: &str) -> Self {
        Predicate::IsNotNull(field.to_string())
    }

    pub fn and(self, other: Predicate) -> Self {
        // conjunction of two non-empty fragments is never empty
        Self::conjunction([self, other]).unwrap_or(Predicate::And(Vec::new()))
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut terms) => {
                terms.push(other);
                Predicate::Or(terms)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// AND together predicate fragments.
    ///
    /// Nested conjunctions are flattened and repeated fragments collapse, so
    /// combining a fragment with itself yields the fragment. Returns `None`
    /// when there is nothing to filter on.
    pub fn conjunction<I>(fragments: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Predicate>,
    {
        let mut terms: Vec<Predicate> = Vec::new();

        for fragment in fragments {
            let parts = match fragment {
                Predicate::And(parts) => parts,
                single => vec![single],
            };

            for part in parts {
                if let Predicate::And(nested) = part {
                    if let Some(flattened) = Self::conjunction(nested) {
                        for term in flattened.into_terms() {
                            if !terms.contains(&term) {
                                terms.push(term);
                            }
                        }
                    }
                } else if !terms.contains(&part) {
                    terms.push(part);
                }
            }
        }

        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(Predicate::And(terms)),
        }
    }

    fn into_terms(self) -> Vec<Predicate> {
        match self {
            Predicate::And(terms) => terms,
            single => vec![single],
        }
    }

    /// Fields referenced anywhere in the tree, in first-seen order
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, fields: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { field, .. }
            | Predicate::In { field, .. }
            | Predicate::IsNull(field)
            | Predicate::IsNotNull(field) => {
                if !fields.contains(&field.as_str()) {
                    fields.push(field);
                }
            }
            Predicate::And(terms) | Predicate::Or(terms) => {
                for term in terms {
                    term.collect_fields(fields);
                }
            }
            Predicate::Not(inner) => inner.collect_fields(fields),
        }
    }

    /// Top-level conjuncts, the terms every matching row must satisfy
    pub fn conjuncts(&self) -> Vec<&Predicate> {
        match self {
            Predicate::And(terms) => terms.iter().collect(),
            single => vec![single],
        }
    }

    /// Evaluate against a row with SQL semantics: missing fields read as NULL,
    /// comparisons involving NULL are unknown, and only rows where the
    /// predicate is known to hold match.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.evaluate(row) == Some(true)
    }

    /// Three-valued evaluation; `None` is SQL's UNKNOWN
    pub fn evaluate(&self, row: &Map<String, Value>) -> Option<bool> {
        match self {
            Predicate::Compare {
                field,
                operator,
                value,
            } => {
                let actual = row.get(field).unwrap_or(&Value::Null);
                if actual.is_null() || value.is_null() {
                    return None;
                }
                let outcome = match operator {
                    QueryOperator::Equal => values_equal(actual, value),
                    QueryOperator::NotEqual => !values_equal(actual, value),
                    QueryOperator::GreaterThan => {
                        compare_values(actual, value) == Some(Ordering::Greater)
                    }
                    QueryOperator::GreaterThanOrEqual => matches!(
                        compare_values(actual, value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    QueryOperator::LessThan => compare_values(actual, value) == Some(Ordering::Less),
                    QueryOperator::LessThanOrEqual => matches!(
                        compare_values(actual, value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    QueryOperator::Like => like_match(actual, value),
                    QueryOperator::NotLike => !like_match(actual, value),
                };
                Some(outcome)
            }
            Predicate::In { field, values } => {
                let actual = row.get(field).unwrap_or(&Value::Null);
                if values.is_empty() {
                    return Some(false);
                }
                if actual.is_null() {
                    return None;
                }
                if values.iter().any(|v| values_equal(actual, v)) {
                    Some(true)
                } else if values.iter().any(Value::is_null) {
                    None
                } else {
                    Some(false)
                }
            }
            Predicate::IsNull(field) => Some(row.get(field).map_or(true, Value::is_null)),
            Predicate::IsNotNull(field) => Some(row.get(field).map_or(false, |v| !v.is_null())),
            Predicate::And(terms) => {
                let mut outcome = Some(true);
                for term in terms {
                    match term.evaluate(row) {
                        Some(false) => return Some(false),
                        None => outcome = None,
                        Some(true) => {}
                    }
                }
                outcome
            }
            Predicate::Or(terms) => {
                let mut outcome = Some(false);
                for term in terms {
                    match term.evaluate(row) {
                        Some(true) => return Some(true),
                        None => outcome = None,
                        Some(false) => {}
                    }
                }
                outcome
            }
            Predicate::Not(inner) => inner.evaluate(row).map(|holds| !holds),
        }
    }
}

/// Equality that treats `1` and `1.0` as the same number
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Ordering between two scalar values of the same kind
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Integers compare exactly; floats only when either side is one
fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    match (integer_value(x), integer_value(y)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}

fn integer_value(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn like_match(actual: &Value, pattern: &Value) -> bool {
    match (actual, pattern) {
        (Value::String(text), Value::String(pattern)) => {
            let text: Vec<char> = text.chars().collect();
            let pattern: Vec<char> = pattern.chars().collect();
            like_chars(&text, &pattern)
        }
        _ => false,
    }
}

/// Wildcard match in linear passes: on a mismatch, resume from the most
/// recent `%` and let it absorb one more character.
fn like_chars(text: &[char], pattern: &[char]) -> bool {
    let (mut t, mut p) = (0, 0);
    let mut resume: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                resume = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match resume {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    resume = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}
