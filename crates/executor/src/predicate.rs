//! WHERE-clause predicate tree (spec §4.6): a small boolean expression
//! language over a single record's fields, with SQL's usual three-valued
//! NULL handling collapsed to false wherever a comparison is undefined.

use common::Record;
use std::cmp::Ordering;
use types::Value;

/// A single column comparison. Equality-family ops use `Value::eq_same_type`
/// so cross-type comparisons (e.g. `Int` vs `String`) never match rather
/// than panicking or coercing.
#[derive(Clone, Debug)]
pub enum Op {
    Eq(Value),
    NotEq(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Like(String),
    Between(Value, Value),
    IsNull,
    IsNotNull,
}

/// A WHERE clause: one leaf comparison, or a conjunction/disjunction of two
/// sub-predicates. There is no `NOT` node; negation lives in the leaf ops
/// (`NotEq`, `NotIn`) the way the value-level API already expresses it.
#[derive(Clone, Debug)]
pub enum Predicate {
    Leaf { column: String, op: Op },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Predicate::Leaf {
            column: column.into(),
            op: Op::Eq(value),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// If this predicate is a single equality leaf, returns the column and
    /// value — used by the executor to try an index lookup before falling
    /// back to a full scan.
    pub fn as_equality(&self) -> Option<(&str, &Value)> {
        match self {
            Predicate::Leaf {
                column,
                op: Op::Eq(value),
            } => Some((column.as_str(), value)),
            _ => None,
        }
    }

    pub fn eval(&self, record: &Record) -> bool {
        match self {
            Predicate::Leaf { column, op } => eval_leaf(record.get(column), op),
            Predicate::And(l, r) => l.eval(record) && r.eval(record),
            Predicate::Or(l, r) => l.eval(record) || r.eval(record),
        }
    }
}

fn eval_leaf(value: Option<&Value>, op: &Op) -> bool {
    match op {
        Op::IsNull => value.map(Value::is_null).unwrap_or(true),
        Op::IsNotNull => value.map(|v| !v.is_null()).unwrap_or(false),
        _ => {
            let Some(v) = value else { return false };
            match op {
                Op::Eq(rhs) => v.eq_same_type(rhs).unwrap_or(false),
                Op::NotEq(rhs) => v.eq_same_type(rhs).map(|eq| !eq).unwrap_or(false),
                Op::Lt(rhs) => v.cmp_same_type(rhs) == Some(Ordering::Less),
                Op::Lte(rhs) => matches!(v.cmp_same_type(rhs), Some(Ordering::Less | Ordering::Equal)),
                Op::Gt(rhs) => v.cmp_same_type(rhs) == Some(Ordering::Greater),
                Op::Gte(rhs) => {
                    matches!(v.cmp_same_type(rhs), Some(Ordering::Greater | Ordering::Equal))
                }
                Op::In(list) => list.iter().any(|x| v.eq_same_type(x) == Some(true)),
                Op::NotIn(list) => !list.iter().any(|x| v.eq_same_type(x) == Some(true)),
                Op::Like(pattern) => v.like(pattern).unwrap_or(false),
                Op::Between(lo, hi) => {
                    matches!(v.cmp_same_type(lo), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(v.cmp_same_type(hi), Some(Ordering::Less | Ordering::Equal))
                }
                Op::IsNull | Op::IsNotNull => unreachable!("handled above"),
            }
        }
    }
}
