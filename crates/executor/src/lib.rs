//! Operation dispatch shell (spec §4.6): takes a parsed [`OpDescriptor`],
//! runs it against the catalog, heap, and index layers, and emits a
//! [`common::DbEvent`] to any subscribers on a successful mutation.
//!
//! There is no query planner here — `OpDescriptor` already names the exact
//! table and predicate to run against, the way a hand-rolled command layer
//! would. Subscribers run synchronously and are forbidden from calling back
//! into [`Engine::execute`] while an event is in flight; see `emit`.

pub mod predicate;
pub mod sort;

pub use predicate::{Op, Predicate};
pub use sort::OrderBy;

use catalog::Catalog;
use common::{DbError, DbEvent, DbResult, PageId, Record, RowId};
use index::IndexCatalog;
use storage::Pager;
use types::Value;

/// One request the engine can run. Mirrors the operation set a SQL front
/// end would compile down to: create/drop a table, insert/select/update/
/// delete its rows, or build a secondary index.
#[derive(Clone, Debug)]
pub enum OpDescriptor {
    CreateTable {
        table: String,
        /// Marks a table created implicitly by a subsystem (e.g. `_indexes`)
        /// rather than by an explicit `CREATE TABLE`.
        is_system: bool,
    },
    DropTable {
        table: String,
    },
    Insert {
        table: String,
        record: Record,
    },
    Select {
        table: String,
        predicate: Option<Predicate>,
        /// `None` means `SELECT *`.
        columns: Option<Vec<String>>,
        /// Applied to the post-filter matches before `limit`/`offset`.
        order_by: Option<Vec<OrderBy>>,
        limit: Option<usize>,
        offset: Option<usize>,
    },
    Update {
        table: String,
        predicate: Option<Predicate>,
        updates: Record,
    },
    Delete {
        table: String,
        predicate: Option<Predicate>,
    },
    CreateIndex {
        table: String,
        column: String,
    },
}

/// Result of running an [`OpDescriptor`].
#[derive(Clone, Debug)]
pub enum OpResult {
    Rows(Vec<Record>),
    Affected(usize),
    Unit,
}

/// Diagnostics from a scan, surfaced instead of a logging call — this
/// workspace carries no tracing/log dependency, so callers that want
/// visibility into scan cost read this struct directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanStats {
    pub rows_scanned: usize,
    pub rows_matched: usize,
    pub used_index: bool,
}

type Subscriber = Box<dyn FnMut(&DbEvent)>;

/// Ties the catalog, heap, and index layers to a single pager and dispatches
/// [`OpDescriptor`]s against them.
pub struct Engine<P: Pager> {
    pager: P,
    catalog: Catalog,
    indexes: IndexCatalog,
    subscribers: Vec<Subscriber>,
    emitting: bool,
}

impl<P: Pager> Engine<P> {
    pub fn open(mut pager: P) -> DbResult<Self> {
        let mut catalog = Catalog::load(&mut pager)?;
        let indexes = IndexCatalog::load(&mut pager, &mut catalog)?;
        Ok(Self {
            pager,
            catalog,
            indexes,
            subscribers: Vec::new(),
            emitting: false,
        })
    }

    pub fn close(self) -> DbResult<()> {
        self.pager.close()
    }

    /// Registers a callback run synchronously after every successful
    /// mutating operation. The callback must not call back into `execute`;
    /// doing so returns `DbError::Executor` rather than reentering.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&DbEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    fn emit(&mut self, event: DbEvent) -> DbResult<()> {
        if self.emitting {
            return Err(DbError::Executor(
                "a subscriber attempted to re-enter execute() from within an event".into(),
            ));
        }
        self.emitting = true;
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
        self.emitting = false;
        Ok(())
    }

    pub fn execute(&mut self, op: OpDescriptor) -> DbResult<OpResult> {
        if self.emitting {
            return Err(DbError::Executor(
                "cannot execute() while a subscriber callback is running".into(),
            ));
        }
        match op {
            OpDescriptor::CreateTable { table, is_system } => {
                self.catalog.create_table(&mut self.pager, &table, is_system)?;
                Ok(OpResult::Unit)
            }
            OpDescriptor::DropTable { table } => {
                self.catalog.drop_table(&mut self.pager, &table)?;
                Ok(OpResult::Unit)
            }
            OpDescriptor::Insert { table, record } => {
                self.insert(&table, record)?;
                Ok(OpResult::Affected(1))
            }
            OpDescriptor::Select {
                table,
                predicate,
                columns,
                order_by,
                limit,
                offset,
            } => {
                let (rows, _stats) = self.select(
                    &table,
                    predicate.as_ref(),
                    columns.as_deref(),
                    order_by.as_deref(),
                    limit,
                    offset,
                )?;
                Ok(OpResult::Rows(rows))
            }
            OpDescriptor::Update {
                table,
                predicate,
                updates,
            } => {
                let count = self.update_many(&table, predicate, updates)?;
                Ok(OpResult::Affected(count))
            }
            OpDescriptor::Delete { table, predicate } => {
                let count = self.delete_many(&table, predicate)?;
                Ok(OpResult::Affected(count))
            }
            OpDescriptor::CreateIndex { table, column } => {
                self.indexes
                    .create_index(&mut self.pager, &self.catalog, &table, &column)?;
                Ok(OpResult::Unit)
            }
        }
    }

    fn insert(&mut self, table: &str, record: Record) -> DbResult<RowId> {
        let head = self.catalog.table(table)?;
        let rid = heap::insert(&mut self.pager, head, &record)?;
        self.indexes.on_inserted(&mut self.pager, table, rid, &record)?;
        self.emit(DbEvent::OnTableInserted {
            table: table.to_string(),
            data: record,
        })?;
        Ok(rid)
    }

    /// Runs a predicate (full scan, or an index lookup when the predicate is
    /// a single equality on an indexed column), then sorts, slices, and
    /// projects the matches in that order — sorting after projection would
    /// break `ORDER BY` on a column the caller didn't select.
    fn select(
        &mut self,
        table: &str,
        predicate: Option<&Predicate>,
        columns: Option<&[String]>,
        order_by: Option<&[OrderBy]>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> DbResult<(Vec<Record>, ScanStats)> {
        let head = self.catalog.table(table)?;
        let mut stats = ScanStats::default();

        let mut matched = None;
        if let Some((column, value)) = predicate.and_then(Predicate::as_equality) {
            if let Some(index) = self.indexes.find(table, column) {
                stats.used_index = true;
                let mut out = Vec::new();
                for rid in index.lookup(value) {
                    stats.rows_scanned += 1;
                    let mut record = heap::get(&mut self.pager, *rid)?;
                    let serial = heap::serial_id(&mut self.pager, head, *rid)?;
                    record.set("_id", Value::Int(serial));
                    stats.rows_matched += 1;
                    out.push(record);
                }
                matched = Some(out);
            }
        }
        let mut matched = match matched {
            Some(rows) => rows,
            None => {
                let mut out = Vec::new();
                for (_, record) in heap::scan(&mut self.pager, head)? {
                    stats.rows_scanned += 1;
                    if predicate.map(|p| p.eval(&record)).unwrap_or(true) {
                        stats.rows_matched += 1;
                        out.push(record);
                    }
                }
                out
            }
        };

        if let Some(keys) = order_by {
            sort::sort_records(&mut matched, keys);
        }

        let start = offset.unwrap_or(0).min(matched.len());
        let end = match limit {
            Some(n) => start.saturating_add(n).min(matched.len()),
            None => matched.len(),
        };
        let out = matched[start..end].iter().map(|r| project(r, columns)).collect();
        Ok((out, stats))
    }

    fn update_many(
        &mut self,
        table: &str,
        predicate: Option<Predicate>,
        updates: Record,
    ) -> DbResult<usize> {
        let head = self.catalog.table(table)?;
        let matches = matching_rows(&mut self.pager, head, predicate.as_ref())?;

        let mut count = 0;
        for (old_rid, old_record) in matches {
            let mut merged = old_record.clone();
            for (name, value) in updates.iter() {
                merged.set(name.to_string(), value.clone());
            }
            let new_rid = heap::update(&mut self.pager, head, old_rid, &merged)?;
            self.indexes
                .on_updated(&mut self.pager, table, old_rid, &old_record, new_rid, &merged)?;
            count += 1;
        }

        if count > 0 {
            self.emit(DbEvent::OnTableUpdated {
                table: table.to_string(),
                criteria: format!("{predicate:?}"),
                updates,
            })?;
        }
        Ok(count)
    }

    fn delete_many(&mut self, table: &str, predicate: Option<Predicate>) -> DbResult<usize> {
        let head = self.catalog.table(table)?;
        let matches = matching_rows(&mut self.pager, head, predicate.as_ref())?;

        let mut count = 0;
        for (rid, record) in matches {
            heap::delete(&mut self.pager, rid)?;
            self.indexes.on_deleted(&mut self.pager, table, rid, &record)?;
            count += 1;
        }

        if count > 0 {
            self.emit(DbEvent::OnTableDeleted {
                table: table.to_string(),
                criteria: format!("{predicate:?}"),
            })?;
        }
        Ok(count)
    }
}

/// Rows matching `predicate`, with the scan's hidden `_id` stripped back
/// off — callers of this helper (update/delete) write the record back to
/// the heap, and `_id` is a read-time position, not a stored field.
fn matching_rows(
    pager: &mut impl Pager,
    head: PageId,
    predicate: Option<&Predicate>,
) -> DbResult<Vec<(RowId, Record)>> {
    Ok(heap::scan(pager, head)?
        .into_iter()
        .filter(|(_, record)| predicate.map(|p| p.eval(record)).unwrap_or(true))
        .map(|(rid, mut record)| {
            record.remove("_id");
            (rid, record)
        })
        .collect())
}

fn project(record: &Record, columns: Option<&[String]>) -> Record {
    match columns {
        Some(cols) => record.project(cols),
        None => record.clone(),
    }
}
