//! Predicate definitions for query filtering.
//!
//! Predicates are plain data so that query definitions can be compared, cloned across
//! threads and replaced wholesale by a refetch.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use vigil_core::{Record, Value};

/// Comparison operator for field predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

/// A filter over records of one entity kind.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Predicate {
    /// Matches every record.
    #[default]
    True,
    /// Compares a field to a literal. Missing fields compare as `Null`.
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// Field value is one of the listed values.
    In { field: String, values: Vec<Value> },
    /// Field is missing or `Null`.
    IsNull(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Predicate::IsNull(field.into())
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::True, p) | (p, Predicate::True) => p,
            (Predicate::And(mut lhs), Predicate::And(rhs)) => {
                lhs.extend(rhs);
                Predicate::And(lhs)
            }
            (Predicate::And(mut lhs), p) => {
                lhs.push(p);
                Predicate::And(lhs)
            }
            (lhs, rhs) => Predicate::And(alloc::vec![lhs, rhs]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::Or(mut lhs), rhs) => {
                lhs.push(rhs);
                Predicate::Or(lhs)
            }
            (lhs, rhs) => Predicate::Or(alloc::vec![lhs, rhs]),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Predicate::Not(inner) => *inner,
            p => Predicate::Not(Box::new(p)),
        }
    }

    /// Evaluates the predicate against a record.
    pub fn eval(&self, record: &Record) -> bool {
        match self {
            Predicate::True => true,
            Predicate::Compare { field, op, value } => op.holds(record.get_or_null(field), value),
            Predicate::In { field, values } => {
                let actual = record.get_or_null(field);
                values.iter().any(|v| v == actual)
            }
            Predicate::IsNull(field) => record.get_or_null(field).is_null(),
            Predicate::And(parts) => parts.iter().all(|p| p.eval(record)),
            Predicate::Or(parts) => parts.iter().any(|p| p.eval(record)),
            Predicate::Not(inner) => !inner.eval(record),
        }
    }

    /// Returns the field names referenced by this predicate.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::True => {}
            Predicate::Compare { field, .. } | Predicate::In { field, .. } | Predicate::IsNull(field) => {
                if !out.contains(&field.as_str()) {
                    out.push(field.as_str());
                }
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.collect_fields(out);
                }
            }
            Predicate::Not(inner) => inner.collect_fields(out),
        }
    }
}
