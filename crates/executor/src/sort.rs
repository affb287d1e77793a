//! `ORDER BY` sort keys (spec §4.6): a stable multi-column sort applied to a
//! `SELECT`'s post-filter matches, before `LIMIT`/`OFFSET` slicing.

use common::Record;
use std::cmp::Ordering;
use types::Value;

/// One `ORDER BY` column and its direction.
#[derive(Clone, Debug)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), descending: false }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), descending: true }
    }
}

/// Stable sort of `records` by `keys`, left to right — ties on an earlier
/// key fall through to the next one, and rows that tie on every key keep
/// scan order.
pub fn sort_records(records: &mut [Record], keys: &[OrderBy]) {
    records.sort_by(|a, b| compare_records(a, b, keys));
}

fn compare_records(a: &Record, b: &Record, keys: &[OrderBy]) -> Ordering {
    for key in keys {
        let ordering = compare_values(a.get(&key.column), b.get(&key.column));
        let ordering = if key.descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// A missing field and `Value::Null` both sort before every other value.
/// Values that can't be compared (different dynamic types) are treated as
/// equal rather than panicking or picking an arbitrary order.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let is_null = |v: Option<&Value>| v.is_none() || matches!(v, Some(Value::Null));
    match (is_null(a), is_null(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.unwrap().cmp_same_type(b.unwrap()).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Value;

    fn rec(id: i64, umur: i64) -> Record {
        Record::new().with("id", Value::Int(id)).with("umur", Value::Int(umur))
    }

    #[test]
    fn single_key_ascending() {
        let mut rows = vec![rec(1, 5), rec(2, 2), rec(3, 8)];
        sort_records(&mut rows, &[OrderBy::asc("umur")]);
        let ids: Vec<_> = rows.iter().map(|r| r.get("id").unwrap().clone()).collect();
        assert_eq!(ids, vec![Value::Int(2), Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn single_key_descending() {
        let mut rows = vec![rec(1, 5), rec(2, 2), rec(3, 8)];
        sort_records(&mut rows, &[OrderBy::desc("umur")]);
        let ids: Vec<_> = rows.iter().map(|r| r.get("id").unwrap().clone()).collect();
        assert_eq!(ids, vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn multi_key_breaks_ties_left_to_right() {
        let a = Record::new().with("dept", Value::String("sales".into())).with("pay", Value::Int(2));
        let b = Record::new().with("dept", Value::String("sales".into())).with("pay", Value::Int(1));
        let c = Record::new().with("dept", Value::String("eng".into())).with("pay", Value::Int(9));
        let mut rows = vec![a.clone(), b.clone(), c.clone()];
        sort_records(&mut rows, &[OrderBy::asc("dept"), OrderBy::asc("pay")]);
        assert_eq!(rows, vec![c, b, a]);
    }

    #[test]
    fn missing_or_null_field_sorts_first() {
        let has = rec(1, 3);
        let missing = Record::new().with("id", Value::Int(2));
        let null = Record::new().with("id", Value::Int(3)).with("umur", Value::Null);
        let mut rows = vec![has.clone(), missing.clone(), null.clone()];
        sort_records(&mut rows, &[OrderBy::asc("umur")]);
        assert_eq!(rows[2], has);
    }

    #[test]
    fn stable_sort_preserves_order_of_ties() {
        let mut rows = vec![rec(1, 5), rec(2, 5), rec(3, 5)];
        sort_records(&mut rows, &[OrderBy::asc("umur")]);
        let ids: Vec<_> = rows.iter().map(|r| r.get("id").unwrap().clone()).collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }
}
