use crate::error::{FilterError, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// What a resolved property value must satisfy.
#[derive(Clone)]
pub enum Criterion {
    /// The value must be a list holding every item.
    Contains(Vec<Value>),

    /// Every operator must hold.
    Operators(Vec<Operator>),

    /// Delegates to a caller supplied predicate.
    Predicate(Predicate),

    /// The value must be text in which the pattern is found (unanchored search).
    Pattern(Regex),

    /// Plain equality.
    Equals(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `$in`. For a list value every operand item must be in the value;
    /// for a scalar value the value must be among the operand items.
    In(Vec<Value>),

    /// `$eq`
    Eq(Value),
}

impl Operator {
    pub fn parse(key: &str, operand: Value) -> Result<Self> {
        match key {
            "$in" => match operand {
                Value::Array(items) => Ok(Operator::In(items)),
                other => Err(FilterError::InvalidOperand {
                    operator: key.to_string(),
                    reason: format!("value must be a list, got {other}"),
                }),
            },
            "$eq" => Ok(Operator::Eq(operand)),
            other => Err(FilterError::UnknownOperator(other.to_string())),
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            // The scalar branch checks containment in the opposite direction
            // from the list branch. Callers rely on both.
            Operator::In(items) => match value {
                Value::Array(values) => items.iter().all(|item| values.contains(item)),
                scalar => items.contains(scalar),
            },
            Operator::Eq(expected) => value == expected,
        }
    }
}

impl Criterion {
    pub fn contains<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Criterion::Contains(items.into_iter().map(Into::into).collect())
    }

    pub fn equals(value: impl Into<Value>) -> Self {
        Criterion::Equals(value.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Criterion::Pattern(Regex::new(pattern)?))
    }

    pub fn predicate(predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Criterion::Predicate(Arc::new(predicate))
    }

    /// Builds an operator criterion, rejecting unknown operator keys up front.
    pub fn operators(operators: Map<String, Value>) -> Result<Self> {
        let operators = operators
            .into_iter()
            .map(|(key, operand)| Operator::parse(&key, operand))
            .collect::<Result<Vec<_>>>()?;
        Ok(Criterion::Operators(operators))
    }

    /// Interprets a JSON criterion by shape: list → containment,
    /// object → operators, anything else → equality.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Criterion::Contains(items)),
            Value::Object(operators) => Criterion::operators(operators),
            other => Ok(Criterion::Equals(other)),
        }
    }

    pub fn matches_value(&self, value: &Value) -> bool {
        match self {
            Criterion::Contains(items) => match value {
                Value::Array(values) => items.iter().all(|item| values.contains(item)),
                _ => false,
            },
            Criterion::Operators(operators) => operators.iter().all(|op| op.matches(value)),
            Criterion::Predicate(predicate) => predicate(value),
            Criterion::Pattern(pattern) => value.as_str().is_some_and(|text| pattern.is_match(text)),
            Criterion::Equals(expected) => value == expected,
        }
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Contains(items) => f.debug_tuple("Contains").field(items).finish(),
            Criterion::Operators(ops) => f.debug_tuple("Operators").field(ops).finish(),
            Criterion::Predicate(_) => f.write_str("Predicate(..)"),
            Criterion::Pattern(pattern) => f.debug_tuple("Pattern").field(&pattern.as_str()).finish(),
            Criterion::Equals(value) => f.debug_tuple("Equals").field(value).finish(),
        }
    }
}
