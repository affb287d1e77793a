//! The pager: the sole reader/writer of the single-file page store.
//!
//! Everything above this crate speaks page-ids and byte buffers; only
//! [`FilePager`] ever touches the file descriptor. Page 0 is the header
//! page (magic + allocation counter, see [`header`]); every other page is a
//! data page with the append-log layout in [`data_page`].

pub mod data_page;
pub mod header;

use common::{DbError, DbResult, PageId};
use lru::LruCache;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::Path;

pub const PAGE_SIZE: usize = 4096;

/// One fixed-size page's contents, tagged with its id.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    pub data: Vec<u8>,
}

impl Page {
    fn zeroed(id: PageId) -> Self {
        Self {
            id,
            data: vec![0u8; PAGE_SIZE],
        }
    }
}

/// Abstraction over fetching, allocating, and persisting pages (spec §4.1).
pub trait Pager {
    fn read_page(&mut self, pid: PageId) -> DbResult<Page>;
    fn write_page(&mut self, pid: PageId, buf: Vec<u8>) -> DbResult<()>;
    fn alloc_page(&mut self) -> DbResult<PageId>;
    fn total_pages(&mut self) -> DbResult<u32>;
    fn close(self) -> DbResult<()>;
}

/// File-backed pager with an LRU page cache.
///
/// The cache maps `PageId` to its buffer; any access re-homes the key to
/// the MRU end, and eviction drops the LRU end, flushing it first if dirty.
pub struct FilePager {
    file: File,
    cache: LruCache<PageId, Vec<u8>>,
    dirty: HashSet<PageId>,
}

impl FilePager {
    /// Opens (creating if absent) the page file at `path`. A fresh file
    /// gets a zeroed header page with `total_pages = 1`. Fails with
    /// `CorruptFile` if an existing file's magic doesn't match.
    pub fn open(path: impl AsRef<Path>, cache_capacity: usize) -> DbResult<Self> {
        assert!(cache_capacity > 0, "cache_capacity must be > 0");
        let path = path.as_ref();
        let is_new = !path.exists();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if is_new {
            let mut buf = vec![0u8; PAGE_SIZE];
            header::init_header(&mut buf);
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&buf)?;
        } else {
            let mut buf = vec![0u8; PAGE_SIZE];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut buf)
                .map_err(|e| DbError::CorruptFile(format!("could not read header page: {e}")))?;
            if !header::magic_ok(&buf) {
                return Err(DbError::CorruptFile(
                    "header page magic does not match 'WOWO'".into(),
                ));
            }
        }

        Ok(Self {
            file,
            cache: LruCache::new(NonZeroUsize::new(cache_capacity).unwrap()),
            dirty: HashSet::new(),
        })
    }

    fn file_pages(&self) -> DbResult<u64> {
        Ok(self.file.metadata()?.len() / PAGE_SIZE as u64)
    }

    fn load_from_disk(&mut self, pid: PageId) -> DbResult<Vec<u8>> {
        let file_pages = self.file_pages()?;
        if pid.0 as u64 >= file_pages {
            return Err(DbError::InvalidPageId(format!(
                "page {} was never allocated",
                pid.0
            )));
        }
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file
            .seek(SeekFrom::Start(pid.0 as u64 * PAGE_SIZE as u64))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn flush_page(&mut self, pid: PageId, buf: &[u8]) -> DbResult<()> {
        self.file
            .seek(SeekFrom::Start(pid.0 as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn evict_if_needed(&mut self) -> DbResult<()> {
        if self.cache.len() < self.cache.cap().get() {
            return Ok(());
        }
        if let Some((pid, buf)) = self.cache.pop_lru() {
            if self.dirty.remove(&pid) {
                self.flush_page(pid, &buf)?;
            }
        }
        Ok(())
    }

    fn cache_put(&mut self, pid: PageId, buf: Vec<u8>, mark_dirty: bool) -> DbResult<()> {
        if !self.cache.contains(&pid) {
            self.evict_if_needed()?;
        }
        self.cache.put(pid, buf);
        if mark_dirty {
            self.dirty.insert(pid);
        }
        Ok(())
    }
}

impl Pager for FilePager {
    fn read_page(&mut self, pid: PageId) -> DbResult<Page> {
        if let Some(buf) = self.cache.get(&pid) {
            return Ok(Page {
                id: pid,
                data: buf.clone(),
            });
        }
        let buf = self.load_from_disk(pid)?;
        self.cache_put(pid, buf.clone(), false)?;
        Ok(Page { id: pid, data: buf })
    }

    fn write_page(&mut self, pid: PageId, buf: Vec<u8>) -> DbResult<()> {
        assert_eq!(
            buf.len(),
            PAGE_SIZE,
            "writePage requires an exact page-size buffer"
        );
        self.cache_put(pid, buf, true)
    }

    fn alloc_page(&mut self) -> DbResult<PageId> {
        let mut header_buf = self.read_page(PageId(0))?.data;
        let total = header::read_total_pages(&header_buf);
        let new_id = PageId(total);
        header::write_total_pages(&mut header_buf, total + 1);

        let mut page_buf = Page::zeroed(new_id).data;
        data_page::init_data_page(&mut page_buf);

        // Grow the file first so the new page is addressable by `read_page`
        // before it ever lands in cache.
        self.flush_page(new_id, &page_buf)?;
        self.write_page(PageId(0), header_buf)?;
        self.write_page(new_id, page_buf)?;

        Ok(new_id)
    }

    fn total_pages(&mut self) -> DbResult<u32> {
        let header_buf = self.read_page(PageId(0))?.data;
        Ok(header::read_total_pages(&header_buf))
    }

    fn close(mut self) -> DbResult<()> {
        let dirty: Vec<PageId> = self.dirty.iter().copied().collect();
        for pid in dirty {
            if let Some(buf) = self.cache.peek(&pid).cloned() {
                self.flush_page(pid, &buf)?;
            }
        }
        self.dirty.clear();
        Ok(())
    }
}
