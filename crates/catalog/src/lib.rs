//! Table-name to head-page-id directory (spec §4.2), persisted directly in
//! the bytes of page 0 rather than a side file — the header page's first
//! eight bytes belong to the pager ([`storage::header`]); everything after
//! that is ours.
//!
//! ```text
//! [8..12)  u32 LE table_count
//! table_count * (
//!     u8   name_len
//!     [u8] name bytes (utf-8)
//!     u32 LE head_page_id
//!     u8   is_system flag (0 or 1)
//! )
//! ```

use ahash::RandomState;
use common::{DbError, DbResult, PageId};
use hashbrown::HashMap;
use storage::header::CATALOG_START;
use storage::{Pager, PAGE_SIZE};

type Map<K, V> = HashMap<K, V, RandomState>;

const COUNT_BYTES: usize = 4;

#[derive(Clone, Debug)]
struct TableMeta {
    name: String,
    head: PageId,
    is_system: bool,
}

/// In-memory view of the catalog, kept in sync with page 0 on every
/// mutation. Table order matches on-disk entry order.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: Vec<TableMeta>,
    by_name: Map<String, usize>,
}

impl Catalog {
    /// Reads and parses the table directory out of page 0.
    pub fn load(pager: &mut impl Pager) -> DbResult<Self> {
        let page = pager.read_page(PageId(0))?;
        Self::decode(&page.data)
    }

    fn decode(buf: &[u8]) -> DbResult<Self> {
        let mut pos = CATALOG_START;
        let count = read_u32(buf, pos)?;
        pos += COUNT_BYTES;

        let mut tables = Vec::with_capacity(count as usize);
        let mut by_name = Map::default();
        for _ in 0..count {
            let name_len = *buf.get(pos).ok_or_else(truncated)? as usize;
            pos += 1;
            let name_bytes = buf.get(pos..pos + name_len).ok_or_else(truncated)?;
            let name = String::from_utf8(name_bytes.to_vec())
                .map_err(|e| DbError::CorruptFile(format!("catalog entry name not utf-8: {e}")))?;
            pos += name_len;
            let head = PageId(read_u32(buf, pos)?);
            pos += 4;
            let is_system = *buf.get(pos).ok_or_else(truncated)? != 0;
            pos += 1;

            by_name.insert(name.clone(), tables.len());
            tables.push(TableMeta { name, head, is_system });
        }

        Ok(Self { tables, by_name })
    }

    fn encode(&self) -> DbResult<Vec<u8>> {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut pos = CATALOG_START + COUNT_BYTES;
        for meta in &self.tables {
            let name_bytes = meta.name.as_bytes();
            if name_bytes.len() > u8::MAX as usize {
                return Err(DbError::CatalogFull(format!(
                    "table name '{}' is longer than 255 bytes",
                    meta.name
                )));
            }
            let entry_len = 1 + name_bytes.len() + 4 + 1;
            if pos + entry_len > PAGE_SIZE {
                return Err(DbError::CatalogFull(format!(
                    "catalog page has no room left for table '{}'",
                    meta.name
                )));
            }
            buf[pos] = name_bytes.len() as u8;
            pos += 1;
            buf[pos..pos + name_bytes.len()].copy_from_slice(name_bytes);
            pos += name_bytes.len();
            buf[pos..pos + 4].copy_from_slice(&meta.head.0.to_le_bytes());
            pos += 4;
            buf[pos] = meta.is_system as u8;
            pos += 1;
        }
        buf[CATALOG_START..CATALOG_START + COUNT_BYTES]
            .copy_from_slice(&(self.tables.len() as u32).to_le_bytes());
        Ok(buf)
    }

    /// Writes the current directory into page 0, preserving the pager's
    /// magic/total-pages header bytes.
    fn persist(&self, pager: &mut impl Pager) -> DbResult<()> {
        let existing = pager.read_page(PageId(0))?.data;
        let mut buf = self.encode()?;
        buf[0..CATALOG_START].copy_from_slice(&existing[0..CATALOG_START]);
        pager.write_page(PageId(0), buf)
    }

    /// Allocates a fresh head page for `name` and records it in the
    /// directory. Fails with `TableExists` if the name is already taken, or
    /// `CatalogFull` if page 0 has no room for another entry. `is_system`
    /// marks tables created implicitly by a subsystem (e.g. `_indexes`)
    /// rather than by an explicit `CREATE TABLE`.
    pub fn create_table(&mut self, pager: &mut impl Pager, name: &str, is_system: bool) -> DbResult<PageId> {
        if self.by_name.contains_key(name) {
            return Err(DbError::TableExists(name.to_string()));
        }
        let head = pager.alloc_page()?;
        self.by_name.insert(name.to_string(), self.tables.len());
        self.tables.push(TableMeta {
            name: name.to_string(),
            head,
            is_system,
        });
        if let Err(e) = self.persist(pager) {
            // Roll back the in-memory entry so the catalog stays consistent
            // with what's actually on disk.
            self.tables.pop();
            self.by_name.remove(name);
            return Err(e);
        }
        Ok(head)
    }

    /// Removes `name` from the directory. The heap pages it pointed to are
    /// never reclaimed — this store has no free-list, only a bump allocator.
    pub fn drop_table(&mut self, pager: &mut impl Pager, name: &str) -> DbResult<()> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?;
        self.tables.remove(idx);
        self.rebuild_name_index();
        self.persist(pager)
    }

    fn rebuild_name_index(&mut self) {
        self.by_name.clear();
        for (i, meta) in self.tables.iter().enumerate() {
            self.by_name.insert(meta.name.clone(), i);
        }
    }

    pub fn table(&self, name: &str) -> DbResult<PageId> {
        self.by_name
            .get(name)
            .map(|&i| self.tables[i].head)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// `findTableEntry` (spec §4.2): the head page id and is-system flag for
    /// a table, or `TableNotFound`.
    pub fn find_table(&self, name: &str) -> DbResult<(PageId, bool)> {
        self.by_name
            .get(name)
            .map(|&i| (self.tables[i].head, self.tables[i].is_system))
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_name(&self, head: PageId) -> Option<&str> {
        self.tables
            .iter()
            .find(|m| m.head == head)
            .map(|m| m.name.as_str())
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|m| m.name.as_str())
    }
}

fn truncated() -> DbError {
    DbError::CorruptFile("catalog section of page 0 is truncated".into())
}

fn read_u32(buf: &[u8], pos: usize) -> DbResult<u32> {
    let b = buf.get(pos..pos + 4).ok_or_else(truncated)?;
    Ok(u32::from_le_bytes(b.try_into().unwrap()))
}
