//! Scalar leaves of the resource tree

use rust_decimal::Decimal;
use std::sync::Arc;

/// A scalar JSON value. Scalars are never tenant-scoped.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Only legal inside primitive arrays that carry a `_field` companion.
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(Arc<str>),
}

impl Primitive {
    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Self::String(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Primitive {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Decimal> for Primitive {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}
