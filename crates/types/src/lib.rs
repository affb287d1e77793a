use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Null,
    Bool,
    Int,
    Float,
    String,
    Timestamp,
}

/// A single dynamically-typed field value.
///
/// Records in the heap are schemaless: each field carries its own tag rather
/// than deferring to a column's declared type, so `Value` (not `SqlType`) is
/// what actually travels through the codec and the executor.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// An ISO-8601 timestamp, carried as its textual representation.
    Timestamp(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_tag(&self) -> SqlType {
        match self {
            Value::Null => SqlType::Null,
            Value::Bool(_) => SqlType::Bool,
            Value::Int(_) => SqlType::Int,
            Value::Float(_) => SqlType::Float,
            Value::String(_) => SqlType::String,
            Value::Timestamp(_) => SqlType::Timestamp,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compares two values of the same dynamic type. Cross-type comparisons
    /// (and any comparison involving `Null`) are not orderable and return
    /// `None`; the executor treats that as a non-match rather than an error
    /// wherever SQL would too (see `expr`'s NULL-propagation rule).
    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        self.cmp_same_type(other).map(|o| o == Ordering::Equal)
    }

    /// SQL `LIKE` matching with `%` (any run of characters) and `_` (any
    /// single character) wildcards. Only defined for string-like values.
    pub fn like(&self, pattern: &str) -> Option<bool> {
        let text = match self {
            Value::String(s) | Value::Timestamp(s) => s.as_str(),
            _ => return None,
        };
        Some(like_match(text, pattern))
    }
}

/// Standalone `LIKE` matcher so the executor's predicate evaluator and the
/// index layer's planning logic can both reach it without depending on a row.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_match_inner(&text, &pattern)
}

fn like_match_inner(text: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('%', rest)) => {
            // '%' matches any run, including empty; try every split point.
            (0..=text.len()).any(|i| like_match_inner(&text[i..], rest))
        }
        Some(('_', rest)) => match text.split_first() {
            Some((_, tail)) => like_match_inner(tail, rest),
            None => false,
        },
        Some((c, rest)) => match text.split_first() {
            Some((t, tail)) if t == c => like_match_inner(tail, rest),
            _ => false,
        },
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Timestamp(s) => s.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering::{Equal, Greater, Less};

    #[test]
    fn cmp_same_type_works() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(
            Value::Int(1).cmp_same_type(&Value::String("1".into())),
            None
        );
    }

    #[test]
    fn truthiness_is_strict() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Bool(false).as_bool(), Some(false));
        assert_eq!(Value::Int(1).as_bool(), None);
        assert_eq!(Value::String("true".into()).as_bool(), None);
        assert_eq!(Value::Null.as_bool(), None);
    }

    #[test]
    fn comparisons_require_same_type() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(
            Value::String("a".into()).cmp_same_type(&Value::String("a".into())),
            Some(Equal)
        );
        assert_eq!(
            Value::Bool(true).cmp_same_type(&Value::Bool(false)),
            Some(Greater)
        );
        assert_eq!(
            Value::Int(1).cmp_same_type(&Value::String("1".into())),
            None
        );
        assert_eq!(Value::Null.cmp_same_type(&Value::Int(1)), None);
    }

    #[test]
    fn int_and_float_compare_numerically() {
        assert_eq!(Value::Int(2).cmp_same_type(&Value::Float(2.5)), Some(Less));
        assert_eq!(
            Value::Float(3.0).cmp_same_type(&Value::Int(3)),
            Some(Equal)
        );
    }

    #[test]
    fn equality_requires_same_type() {
        assert_eq!(Value::Int(1).eq_same_type(&Value::Int(1)), Some(true));
        assert_eq!(Value::Int(1).eq_same_type(&Value::Int(2)), Some(false));
        assert_eq!(
            Value::String("abc".into()).eq_same_type(&Value::String("abc".into())),
            Some(true)
        );
        assert_eq!(
            Value::Bool(true).eq_same_type(&Value::Bool(false)),
            Some(false)
        );
        assert_eq!(
            Value::String("1".into()).eq_same_type(&Value::Int(1)),
            None
        );
    }

    #[test]
    fn serde_round_trip_stability() {
        let vals = vec![
            Value::Int(-42),
            Value::Float(3.5),
            Value::String("Ada".into()),
            Value::Bool(true),
            Value::Timestamp("2024-01-01T00:00:00Z".into()),
            Value::Null,
        ];

        let json = serde_json::to_string(&vals).unwrap();
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();

        assert_eq!(vals, back);
    }

    #[test]
    fn like_wildcards() {
        assert!(like_match("Tenera", "Ten%"));
        assert!(like_match("Tenera", "T_n%"));
        assert!(like_match("Tenera", "%era"));
        assert!(!like_match("Tenera", "Dura%"));
        assert!(like_match("", "%"));
        assert!(!like_match("", "_"));
    }

    #[test]
    fn value_hash_consistent_with_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Value::Float(1.5));
        set.insert(Value::Float(1.5));
        set.insert(Value::Int(1));
        assert_eq!(set.len(), 2);
    }

    proptest! {
        #[test]
        fn order_is_antisymmetric(i in any::<i64>(), j in any::<i64>()) {
            let a = Value::Int(i);
            let b = Value::Int(j);
            let ord1 = a.cmp_same_type(&b);
            let ord2 = b.cmp_same_type(&a);
            match (ord1, ord2) {
                (Some(o1), Some(o2)) => assert_eq!(o1, o2.reverse()),
                _ => prop_assert!(true),
            }
        }

        #[test]
        fn eq_reflexive(val in any::<i64>()) {
            let v = Value::Int(val);
            assert_eq!(v.eq_same_type(&v), Some(true));
        }

        #[test]
        fn text_cmp_matches_std(a in ".*", b in ".*") {
            let va = Value::String(a.clone());
            let vb = Value::String(b.clone());
            assert_eq!(va.cmp_same_type(&vb), Some(a.cmp(&b)));
        }
    }
}
