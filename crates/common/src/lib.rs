use std::{io, path::PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::Value;

/// Identifier for a page in the single-file pager. Page 0 is always the
/// header page; every other id addresses a data page.
///
/// Examples:
/// - `let header = PageId(0);`
/// - `let first_data_page = PageId(1);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub u32);

/// Fully-qualified address of a record within a table: the page holding it
/// and its slot index inside that page.
///
/// Examples:
/// - `let rid = RowId { page: PageId(1), slot: 0 };`
/// - `let rid = RowId { page: PageId(7), slot: 12 };`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId {
    pub page: PageId,
    pub slot: u16,
}

/// A schemaless, ordered sequence of (field name, value) pairs.
///
/// Unlike a positional row, two `Record`s in the same table may carry
/// different fields entirely — the codec encodes whatever fields are
/// present, nothing more.
///
/// Examples:
/// - `let r = Record::new().with("id", Value::Int(1)).with("bibit", Value::String("Dura".into()));`
/// - `let r = Record::from_pairs(vec![("id".into(), Value::Int(2))]);`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn from_pairs(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    /// Builder-style insert, for constructing literal records in tests and
    /// call sites that build a record field by field.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a field's value. Existing fields keep their
    /// position; new fields are appended, preserving insertion order.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.fields
    }

    /// Value equality ignoring field order, per invariant 2 in the spec's
    /// testable-properties section (`decode(encode(r)) == r` by value).
    pub fn value_eq(&self, other: &Record) -> bool {
        if self.fields.len() != other.fields.len() {
            return false;
        }
        self.fields
            .iter()
            .all(|(name, value)| other.get(name).is_some_and(|v| v == value))
    }

    /// Restricts the record to the given field names, in the order
    /// requested. Used by `SELECT <cols>` projections; `*` bypasses this
    /// and returns the whole record untouched.
    pub fn project(&self, cols: &[String]) -> Record {
        let mut out = Record::new();
        for col in cols {
            if let Some(v) = self.get(col) {
                out.set(col.clone(), v.clone());
            }
        }
        out
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self::from_pairs(iter.into_iter().collect())
    }
}

/// Canonical error type shared across the storage, catalog, heap, index and
/// executor crates. One variant per failure kind named in the error-handling
/// design; everything else is surfaced through `Io`.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("corrupt file: {0}")]
    CorruptFile(String),
    #[error("invalid page id: {0}")]
    InvalidPageId(String),
    #[error("table already exists: {0}")]
    TableExists(String),
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("record too large: {0}")]
    RecordTooLarge(String),
    #[error("catalog full: {0}")]
    CatalogFull(String),
    #[error("index not found: {0}")]
    IndexNotFound(String),
    #[error("codec: {0}")]
    Codec(String),
    #[error("executor: {0}")]
    Executor(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the database handle.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .cache_capacity(500)
///     .build();
/// ```
#[derive(Clone, Debug, bon::Builder)]
pub struct Config {
    /// Directory holding the page file plus sidecar files
    /// (`_fts_index.json`, `_permissions.json`) managed by collaborators.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// File name of the page-structured store within `data_dir`.
    #[builder(default = PathBuf::from("main.sawit"))]
    pub file_name: PathBuf,
    /// Number of pages the LRU cache keeps resident. Default matches the
    /// spec's ~4 MiB default (1000 pages of 4 KiB).
    #[builder(default = 1000)]
    pub cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            file_name: PathBuf::from("main.sawit"),
            cache_capacity: 1000,
        }
    }
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }
}

/// Events emitted synchronously by the executor shell after a successful
/// mutating operation, for replication/trigger collaborators to consume.
#[derive(Clone, Debug)]
pub enum DbEvent {
    OnTableInserted { table: String, data: Record },
    OnTableUpdated { table: String, criteria: String, updates: Record },
    OnTableDeleted { table: String, criteria: String },
}
