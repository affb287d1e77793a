//! Byte layout of a data page: a sequential append log, not an
//! offset-indirection slot table. Slot `i` is found by walking every
//! record from byte 8, not by looking it up in a side array.
//!
//! ```text
//! [0..4)  u32 LE next     page-id of the next page in this table's chain, 0 = none
//! [4..6)  u16 LE count    number of slots ever appended (live + tombstoned)
//! [6..8)  u16 LE free     byte offset where the next record would be appended
//! [8..free) records, back to back:
//!     u16 LE len_and_flag   bit 15 = tombstoned, bits 0..15 = payload length
//!     [u8]  payload         `len_and_flag & 0x7fff` bytes
//! ```
//!
//! A tombstoned slot's payload bytes stay on disk so every later slot's
//! offset is unaffected; only [`tombstone`] flips the bit, and only
//! [`compact_trailing_tombstones`] ever reclaims the bytes, and then only
//! from the tail.

use common::PageId;

pub const DATA_HEADER_BYTES: usize = 8;
const TOMBSTONE_BIT: u16 = 0x8000;
const LEN_MASK: u16 = 0x7fff;
/// Largest payload a single slot can hold; the top bit of the length field
/// is reserved for the tombstone flag.
pub const MAX_PAYLOAD_LEN: usize = LEN_MASK as usize;

pub fn init_data_page(buf: &mut [u8]) {
    write_next(buf, PageId(0));
    write_slot_count(buf, 0);
    write_free_offset(buf, DATA_HEADER_BYTES as u16);
}

pub fn next_page(buf: &[u8]) -> Option<PageId> {
    let id = read_u32(buf, 0);
    (id != 0).then_some(PageId(id))
}

pub fn write_next(buf: &mut [u8], next: PageId) {
    write_u32(buf, 0, next.0);
}

pub fn slot_count(buf: &[u8]) -> u16 {
    read_u16(buf, 4)
}

fn write_slot_count(buf: &mut [u8], count: u16) {
    write_u16(buf, 4, count);
}

fn free_offset(buf: &[u8]) -> u16 {
    read_u16(buf, 6)
}

fn write_free_offset(buf: &mut [u8], offset: u16) {
    write_u16(buf, 6, offset);
}

pub fn free_space(buf: &[u8], page_size: usize) -> usize {
    page_size.saturating_sub(free_offset(buf) as usize)
}

pub fn can_fit(buf: &[u8], payload_len: usize, page_size: usize) -> bool {
    payload_len <= MAX_PAYLOAD_LEN
        && slot_count(buf) < u16::MAX
        && free_space(buf, page_size) >= 2 + payload_len
}

struct Located {
    len_field_offset: usize,
    payload_offset: usize,
    payload_len: usize,
    tombstoned: bool,
}

/// Walks the record log to find slot `slot_idx`. Returns `None` if the slot
/// index was never appended (i.e. `slot_idx >= slot_count`).
fn locate(buf: &[u8], slot_idx: u16) -> Option<Located> {
    if slot_idx >= slot_count(buf) {
        return None;
    }
    let mut pos = DATA_HEADER_BYTES;
    for i in 0..=slot_idx {
        let raw = read_u16(buf, pos);
        let tombstoned = raw & TOMBSTONE_BIT != 0;
        let len = (raw & LEN_MASK) as usize;
        if i == slot_idx {
            return Some(Located {
                len_field_offset: pos,
                payload_offset: pos + 2,
                payload_len: len,
                tombstoned,
            });
        }
        pos += 2 + len;
    }
    unreachable!("slot_idx < slot_count but walk did not reach it")
}

/// Appends a new record, returning its slot index. Caller must have checked
/// `can_fit` first; this does not itself allocate a new page.
pub fn append_record(buf: &mut [u8], payload: &[u8]) -> u16 {
    let idx = slot_count(buf);
    let offset = free_offset(buf) as usize;
    let raw = payload.len() as u16;
    buf[offset..offset + 2].copy_from_slice(&raw.to_le_bytes());
    buf[offset + 2..offset + 2 + payload.len()].copy_from_slice(payload);
    write_free_offset(buf, (offset + 2 + payload.len()) as u16);
    write_slot_count(buf, idx + 1);
    idx
}

/// Returns the live payload for `slot_idx`, or `None` if out of range or
/// tombstoned.
pub fn read_record<'a>(buf: &'a [u8], slot_idx: u16) -> Option<&'a [u8]> {
    let loc = locate(buf, slot_idx)?;
    if loc.tombstoned {
        return None;
    }
    Some(&buf[loc.payload_offset..loc.payload_offset + loc.payload_len])
}

pub fn is_tombstoned(buf: &[u8], slot_idx: u16) -> Option<bool> {
    locate(buf, slot_idx).map(|l| l.tombstoned)
}

/// Marks a slot deleted in place. Returns `false` if the slot was already
/// tombstoned or out of range.
pub fn tombstone(buf: &mut [u8], slot_idx: u16) -> bool {
    let Some(loc) = locate(buf, slot_idx) else {
        return false;
    };
    if loc.tombstoned {
        return false;
    }
    let raw = (loc.payload_len as u16) | TOMBSTONE_BIT;
    buf[loc.len_field_offset..loc.len_field_offset + 2].copy_from_slice(&raw.to_le_bytes());
    true
}

/// Attempts to overwrite `slot_idx`'s payload in place. Only succeeds when
/// `new_payload` is no larger than the slot's current physical size; a
/// shrink memmoves every later record left to reclaim the freed bytes. A
/// grow returns `false` — the caller tombstones the slot and reinserts the
/// new value elsewhere.
pub fn try_replace_in_place(buf: &mut [u8], slot_idx: u16, new_payload: &[u8]) -> bool {
    let Some(loc) = locate(buf, slot_idx) else {
        return false;
    };
    if new_payload.len() > loc.payload_len {
        return false;
    }

    let shrink_by = loc.payload_len - new_payload.len();
    buf[loc.payload_offset..loc.payload_offset + new_payload.len()].copy_from_slice(new_payload);
    buf[loc.len_field_offset..loc.len_field_offset + 2]
        .copy_from_slice(&(new_payload.len() as u16).to_le_bytes());

    if shrink_by > 0 {
        let old_free = free_offset(buf) as usize;
        let trailing_start = loc.payload_offset + loc.payload_len;
        let new_record_end = loc.payload_offset + new_payload.len();
        buf.copy_within(trailing_start..old_free, new_record_end);
        write_free_offset(buf, (old_free - shrink_by) as u16);
    }

    true
}

/// Drops tombstoned slots off the tail of the log, reclaiming their bytes
/// and shrinking `slot_count`. Stops at the first live slot scanning
/// backwards, so it never reclaims a tombstone buried earlier in the page.
pub fn compact_trailing_tombstones(buf: &mut [u8]) {
    loop {
        let count = slot_count(buf);
        if count == 0 {
            return;
        }
        let last = count - 1;
        match is_tombstoned(buf, last) {
            Some(true) => {
                let loc = locate(buf, last).expect("just located this slot");
                write_free_offset(buf, loc.len_field_offset as u16);
                write_slot_count(buf, last);
            }
            _ => return,
        }
    }
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())
}

fn write_u16(buf: &mut [u8], offset: usize, val: u16) {
    buf[offset..offset + 2].copy_from_slice(&val.to_le_bytes());
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn write_u32(buf: &mut [u8], offset: usize, val: u32) {
    buf[offset..offset + 4].copy_from_slice(&val.to_le_bytes());
}
