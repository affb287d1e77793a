//! Per-column secondary index (spec §4.5): a `Value -> RowId[]` map, kept
//! in memory and snapshotted as a JSON-encoded row in the `_indexes` system
//! table so it survives a close/reopen without needing its own page format.

use catalog::Catalog;
use common::{DbError, DbResult, PageId, Record, RowId};
use std::collections::HashMap;
use storage::Pager;
use types::Value;

const INDEXES_TABLE: &str = "_indexes";

/// A single column's `value -> row locations` map.
#[derive(Clone, Debug)]
pub struct Index {
    pub table: String,
    pub column: String,
    map: HashMap<Value, Vec<RowId>>,
}

impl Index {
    fn scan_build(pager: &mut impl Pager, table_head: PageId, table: &str, column: &str) -> DbResult<Self> {
        let mut map: HashMap<Value, Vec<RowId>> = HashMap::new();
        for (rid, record) in heap::scan(pager, table_head)? {
            if let Some(value) = record.get(column) {
                map.entry(value.clone()).or_default().push(rid);
            }
        }
        Ok(Self {
            table: table.to_string(),
            column: column.to_string(),
            map,
        })
    }

    /// Row locations for an equality match. Empty if nothing matches.
    pub fn lookup(&self, value: &Value) -> &[RowId] {
        self.map.get(value).map(Vec::as_slice).unwrap_or(&[])
    }
}

struct Entry {
    rid: RowId,
    index: Index,
}

fn encode_entry(index: &Index) -> DbResult<Record> {
    let pairs: Vec<(&Value, &Vec<RowId>)> = index.map.iter().collect();
    let serialized = serde_json::to_string(&pairs)
        .map_err(|e| DbError::Codec(format!("serializing index map failed: {e}")))?;
    Ok(Record::new()
        .with("table", Value::String(index.table.clone()))
        .with("column", Value::String(index.column.clone()))
        .with("map_serialized", Value::String(serialized)))
}

fn decode_entry(rid: RowId, record: Record) -> DbResult<Entry> {
    let table = match record.get("table") {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(DbError::CorruptFile("_indexes row missing 'table'".into())),
    };
    let column = match record.get("column") {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(DbError::CorruptFile("_indexes row missing 'column'".into())),
    };
    let serialized = match record.get("map_serialized") {
        Some(Value::String(s)) => s.clone(),
        _ => {
            return Err(DbError::CorruptFile(
                "_indexes row missing 'map_serialized'".into(),
            ))
        }
    };
    let pairs: Vec<(Value, Vec<RowId>)> = serde_json::from_str(&serialized)
        .map_err(|e| DbError::Codec(format!("parsing index map failed: {e}")))?;
    Ok(Entry {
        rid,
        index: Index {
            table,
            column,
            map: pairs.into_iter().collect(),
        },
    })
}

/// Holds every index defined in the database, backed by the `_indexes`
/// system table. `CREATE INDEX` builds one with a full table scan; inserts,
/// updates, and deletes on an indexed table keep the in-memory map (and its
/// persisted snapshot) current.
pub struct IndexCatalog {
    table_head: PageId,
    entries: Vec<Entry>,
}

impl IndexCatalog {
    /// Loads every index snapshot, creating the `_indexes` table on first use.
    pub fn load(pager: &mut impl Pager, catalog: &mut Catalog) -> DbResult<Self> {
        let table_head = match catalog.table(INDEXES_TABLE) {
            Ok(head) => head,
            Err(DbError::TableNotFound(_)) => catalog.create_table(pager, INDEXES_TABLE, true)?,
            Err(e) => return Err(e),
        };
        let entries = heap::scan(pager, table_head)?
            .into_iter()
            .map(|(rid, record)| decode_entry(rid, record))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Self { table_head, entries })
    }

    pub fn find(&self, table: &str, column: &str) -> Option<&Index> {
        self.entries
            .iter()
            .find(|e| e.index.table == table && e.index.column == column)
            .map(|e| &e.index)
    }

    fn find_idx(&self, table: &str, column: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.index.table == table && e.index.column == column)
    }

    /// Builds an index over `table.column` from scratch via a full scan and
    /// persists it. Errors if one already exists for this column.
    pub fn create_index(
        &mut self,
        pager: &mut impl Pager,
        catalog: &Catalog,
        table: &str,
        column: &str,
    ) -> DbResult<()> {
        if self.find(table, column).is_some() {
            return Err(DbError::Executor(format!(
                "index already exists on {table}.{column}"
            )));
        }
        let table_head = catalog.table(table)?;
        let index = Index::scan_build(pager, table_head, table, column)?;
        let record = encode_entry(&index)?;
        let rid = heap::insert(pager, self.table_head, &record)?;
        self.entries.push(Entry { rid, index });
        Ok(())
    }

    fn persist(&mut self, pager: &mut impl Pager, idx: usize) -> DbResult<()> {
        let record = encode_entry(&self.entries[idx].index)?;
        let new_rid = heap::update(pager, self.table_head, self.entries[idx].rid, &record)?;
        self.entries[idx].rid = new_rid;
        Ok(())
    }

    /// Call after a row is inserted into `table`, so any index on one of its
    /// columns picks up the new row location.
    pub fn on_inserted(
        &mut self,
        pager: &mut impl Pager,
        table: &str,
        rid: RowId,
        record: &Record,
    ) -> DbResult<()> {
        for i in 0..self.entries.len() {
            if self.entries[i].index.table != table {
                continue;
            }
            let column = self.entries[i].index.column.clone();
            if let Some(value) = record.get(&column) {
                self.entries[i]
                    .index
                    .map
                    .entry(value.clone())
                    .or_default()
                    .push(rid);
                self.persist(pager, i)?;
            }
        }
        Ok(())
    }

    /// Call after a row moves from `old_rid`/`old_record` to
    /// `new_rid`/`new_record` (the two may be equal, for an in-place update).
    pub fn on_updated(
        &mut self,
        pager: &mut impl Pager,
        table: &str,
        old_rid: RowId,
        old_record: &Record,
        new_rid: RowId,
        new_record: &Record,
    ) -> DbResult<()> {
        for i in 0..self.entries.len() {
            if self.entries[i].index.table != table {
                continue;
            }
            let column = self.entries[i].index.column.clone();
            let mut touched = false;
            if let Some(old_value) = old_record.get(&column) {
                if let Some(rids) = self.entries[i].index.map.get_mut(old_value) {
                    rids.retain(|r| *r != old_rid);
                    touched = true;
                }
            }
            if let Some(new_value) = new_record.get(&column) {
                self.entries[i]
                    .index
                    .map
                    .entry(new_value.clone())
                    .or_default()
                    .push(new_rid);
                touched = true;
            }
            if touched {
                self.persist(pager, i)?;
            }
        }
        Ok(())
    }

    /// Call after `rid` (whose indexed columns had `record`'s values) is
    /// deleted from `table`.
    pub fn on_deleted(
        &mut self,
        pager: &mut impl Pager,
        table: &str,
        rid: RowId,
        record: &Record,
    ) -> DbResult<()> {
        for i in 0..self.entries.len() {
            if self.entries[i].index.table != table {
                continue;
            }
            let column = self.entries[i].index.column.clone();
            if let Some(value) = record.get(&column) {
                if let Some(rids) = self.entries[i].index.map.get_mut(value) {
                    rids.retain(|r| *r != rid);
                    self.persist(pager, i)?;
                }
            }
        }
        Ok(())
    }
}
