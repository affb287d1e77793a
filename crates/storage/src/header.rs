//! Byte layout of page 0, the header page.
//!
//! The pager owns bytes `[0..8)`: a 4-byte magic followed by the
//! total-page count. Everything from byte 8 onward belongs to the catalog
//! (table-name to head-page-id entries), which this crate never reads.
//!
//! ```text
//! [0..4)   magic b"WOWO"
//! [4..8)   u32 LE total_pages (including the header page itself)
//! [8..)    catalog bytes, opaque to this crate
//! ```

pub const MAGIC: [u8; 4] = *b"WOWO";
pub const TOTAL_PAGES_OFFSET: usize = 4;
/// First byte the catalog is free to use.
pub const CATALOG_START: usize = 8;

pub fn magic_ok(buf: &[u8]) -> bool {
    buf.len() >= 4 && buf[0..4] == MAGIC
}

pub fn init_header(buf: &mut [u8]) {
    buf[0..4].copy_from_slice(&MAGIC);
    write_total_pages(buf, 1);
}

pub fn read_total_pages(buf: &[u8]) -> u32 {
    let b = &buf[TOTAL_PAGES_OFFSET..TOTAL_PAGES_OFFSET + 4];
    u32::from_le_bytes(b.try_into().unwrap())
}

pub fn write_total_pages(buf: &mut [u8], total: u32) {
    buf[TOTAL_PAGES_OFFSET..TOTAL_PAGES_OFFSET + 4].copy_from_slice(&total.to_le_bytes());
}
