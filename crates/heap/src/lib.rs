//! Table heap: insert/scan/update/delete over a chain of data pages rooted
//! at the table's head page id, per spec §4.3.
//!
//! A table is nothing but its head `PageId`; the chain is walked by
//! following each page's `next` pointer until one reads back `None`. There
//! is no page directory — scans and inserts alike walk the chain.

use common::{DbError, DbResult, PageId, Record, RowId};
use storage::{data_page, Pager, PAGE_SIZE};
use types::Value;

/// Largest payload a freshly allocated, otherwise-empty page can hold.
const MAX_RECORD_LEN: usize = PAGE_SIZE - data_page::DATA_HEADER_BYTES - 2;

/// Encodes `record` and appends it to the first page in `head`'s chain with
/// room for it, allocating a new page at the tail if none do.
pub fn insert(pager: &mut impl Pager, head: PageId, record: &Record) -> DbResult<RowId> {
    let payload = codec::encode_record(record)?;
    if payload.len() > MAX_RECORD_LEN {
        return Err(DbError::RecordTooLarge(format!(
            "encoded record is {} bytes, more than the {MAX_RECORD_LEN}-byte page capacity",
            payload.len()
        )));
    }

    let mut pid = head;
    loop {
        let mut page = pager.read_page(pid)?.data;
        if data_page::can_fit(&page, payload.len(), PAGE_SIZE) {
            let slot = data_page::append_record(&mut page, &payload);
            pager.write_page(pid, page)?;
            return Ok(RowId { page: pid, slot });
        }
        match data_page::next_page(&page) {
            Some(next) => pid = next,
            None => {
                let new_pid = pager.alloc_page()?;
                data_page::write_next(&mut page, new_pid);
                pager.write_page(pid, page)?;
                pid = new_pid;
            }
        }
    }
}

/// Reads and decodes a single row by its address.
pub fn get(pager: &mut impl Pager, rid: RowId) -> DbResult<Record> {
    let page = pager.read_page(rid.page)?.data;
    let bytes = data_page::read_record(&page, rid.slot)
        .ok_or_else(|| DbError::Executor(format!("row {:?} not found", rid)))?;
    codec::decode_record(bytes)
}

/// Walks every page in `head`'s chain and decodes each live record, tagging
/// it with a hidden `_id` equal to its 0-based serial position across the
/// whole table (spec §4.3 scan order) alongside whatever real `id` field the
/// row itself carries.
pub fn scan(pager: &mut impl Pager, head: PageId) -> DbResult<Vec<(RowId, Record)>> {
    let mut out = Vec::new();
    let mut pid = head;
    let mut serial: i64 = 0;
    loop {
        let page = pager.read_page(pid)?.data;
        for slot in 0..data_page::slot_count(&page) {
            if let Some(bytes) = data_page::read_record(&page, slot) {
                let mut record = codec::decode_record(bytes)?;
                record.set("_id", Value::Int(serial));
                serial += 1;
                out.push((RowId { page: pid, slot }, record));
            }
        }
        match data_page::next_page(&page) {
            Some(next) => pid = next,
            None => break,
        }
    }
    Ok(out)
}

/// The serial position `scan` would assign `target` — the count of live
/// records preceding it in `head`'s chain. Lets a lookup path that finds a
/// row without a full scan (an index hit) still attach the same `_id` a
/// scan would have. Errors if `target` isn't a live row in this chain.
pub fn serial_id(pager: &mut impl Pager, head: PageId, target: RowId) -> DbResult<i64> {
    let mut pid = head;
    let mut serial: i64 = 0;
    loop {
        let page = pager.read_page(pid)?.data;
        for slot in 0..data_page::slot_count(&page) {
            if data_page::read_record(&page, slot).is_some() {
                if pid == target.page && slot == target.slot {
                    return Ok(serial);
                }
                serial += 1;
            }
        }
        match data_page::next_page(&page) {
            Some(next) => pid = next,
            None => break,
        }
    }
    Err(DbError::Executor(format!("row {:?} not found", target)))
}

/// Replaces the row at `rid` with `record`. A shrink or same-size update
/// keeps the same `RowId`; a grow tombstones the old slot and reinserts
/// elsewhere in `head`'s chain, so the caller must use the returned `RowId`
/// (and update any index entries) going forward.
pub fn update(
    pager: &mut impl Pager,
    head: PageId,
    rid: RowId,
    record: &Record,
) -> DbResult<RowId> {
    let payload = codec::encode_record(record)?;
    if payload.len() > MAX_RECORD_LEN {
        return Err(DbError::RecordTooLarge(format!(
            "encoded record is {} bytes, more than the {MAX_RECORD_LEN}-byte page capacity",
            payload.len()
        )));
    }

    let mut page = pager.read_page(rid.page)?.data;
    match data_page::is_tombstoned(&page, rid.slot) {
        None | Some(true) => return Err(DbError::Executor(format!("row {:?} not found", rid))),
        Some(false) => {}
    }
    if data_page::try_replace_in_place(&mut page, rid.slot, &payload) {
        pager.write_page(rid.page, page)?;
        return Ok(rid);
    }

    // Doesn't fit in place: tombstone here, reinsert wherever there's room.
    data_page::tombstone(&mut page, rid.slot);
    data_page::compact_trailing_tombstones(&mut page);
    pager.write_page(rid.page, page)?;
    insert(pager, head, record)
}

/// Tombstones the row at `rid`, compacting trailing tombstones on its page.
pub fn delete(pager: &mut impl Pager, rid: RowId) -> DbResult<()> {
    let mut page = pager.read_page(rid.page)?.data;
    if !data_page::tombstone(&mut page, rid.slot) {
        return Err(DbError::Executor(format!("row {:?} not found", rid)));
    }
    data_page::compact_trailing_tombstones(&mut page);
    pager.write_page(rid.page, page)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::FilePager;
    use tempfile::tempdir;
    use types::Value;

    fn pager() -> (FilePager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (FilePager::open(dir.path().join("main.sawit"), 16).unwrap(), dir)
    }

    fn new_head(pager: &mut FilePager) -> PageId {
        pager.alloc_page().unwrap()
    }

    fn row(id: i64, name: &str) -> Record {
        Record::new().with("id", Value::Int(id)).with("name", Value::String(name.into()))
    }

    #[test]
    fn insert_then_get_round_trips() {
        let (mut pager, _dir) = pager();
        let head = new_head(&mut pager);
        let rid = insert(&mut pager, head, &row(1, "dura")).unwrap();
        let got = get(&mut pager, rid).unwrap();
        assert!(got.value_eq(&row(1, "dura")));
    }

    #[test]
    fn scan_returns_every_inserted_row_in_order() {
        let (mut pager, _dir) = pager();
        let head = new_head(&mut pager);
        insert(&mut pager, head, &row(1, "a")).unwrap();
        insert(&mut pager, head, &row(2, "b")).unwrap();
        insert(&mut pager, head, &row(3, "c")).unwrap();

        let rows = scan(&mut pager, head).unwrap();
        let names: Vec<_> = rows
            .iter()
            .map(|(_, r)| r.get("name").unwrap().clone())
            .collect();
        assert_eq!(
            names,
            vec![
                Value::String("a".into()),
                Value::String("b".into()),
                Value::String("c".into())
            ]
        );
    }

    #[test]
    fn insert_spills_onto_a_new_page_when_the_head_page_is_full() {
        let (mut pager, _dir) = pager();
        let head = new_head(&mut pager);
        let big = Record::new().with("blob", Value::String("x".repeat(3000)));
        insert(&mut pager, head, &big).unwrap();
        let second = insert(&mut pager, head, &big).unwrap();
        assert_ne!(second.page, head);
        assert_eq!(scan(&mut pager, head).unwrap().len(), 2);
    }

    #[test]
    fn shrinking_update_keeps_the_same_row_id() {
        let (mut pager, _dir) = pager();
        let head = new_head(&mut pager);
        let rid = insert(&mut pager, head, &row(1, "a-long-name")).unwrap();
        let updated = update(&mut pager, head, rid, &row(1, "a")).unwrap();
        assert_eq!(updated, rid);
        assert!(get(&mut pager, updated).unwrap().value_eq(&row(1, "a")));
    }

    #[test]
    fn growing_update_moves_to_a_new_slot_and_tombstones_the_old_one() {
        let (mut pager, _dir) = pager();
        let head = new_head(&mut pager);
        let rid = insert(&mut pager, head, &row(1, "a")).unwrap();
        let bigger = Record::new()
            .with("id", Value::Int(1))
            .with("name", Value::String("x".repeat(3000)));
        let updated = update(&mut pager, head, rid, &bigger).unwrap();
        assert_ne!(updated, rid);
        assert!(get(&mut pager, rid).is_err());
        assert!(get(&mut pager, updated).unwrap().value_eq(&bigger));
    }

    #[test]
    fn delete_removes_a_row_from_the_scan() {
        let (mut pager, _dir) = pager();
        let head = new_head(&mut pager);
        let rid = insert(&mut pager, head, &row(1, "a")).unwrap();
        insert(&mut pager, head, &row(2, "b")).unwrap();
        delete(&mut pager, rid).unwrap();

        let rows = scan(&mut pager, head).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(get(&mut pager, rid).is_err());
    }

    #[test]
    fn scan_tags_each_record_with_its_serial_position() {
        let (mut pager, _dir) = pager();
        let head = new_head(&mut pager);
        insert(&mut pager, head, &row(1, "a")).unwrap();
        let rid = insert(&mut pager, head, &row(2, "b")).unwrap();
        insert(&mut pager, head, &row(3, "c")).unwrap();

        let rows = scan(&mut pager, head).unwrap();
        let ids: Vec<_> = rows.iter().map(|(_, r)| r.get("_id").unwrap().clone()).collect();
        assert_eq!(ids, vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
        assert_eq!(serial_id(&mut pager, head, rid).unwrap(), 1);
    }

    #[test]
    fn serial_id_skips_tombstoned_rows() {
        let (mut pager, _dir) = pager();
        let head = new_head(&mut pager);
        let first = insert(&mut pager, head, &row(1, "a")).unwrap();
        let second = insert(&mut pager, head, &row(2, "b")).unwrap();
        delete(&mut pager, first).unwrap();
        assert_eq!(serial_id(&mut pager, head, second).unwrap(), 0);
    }

    #[test]
    fn deleting_twice_is_an_error() {
        let (mut pager, _dir) = pager();
        let head = new_head(&mut pager);
        let rid = insert(&mut pager, head, &row(1, "a")).unwrap();
        delete(&mut pager, rid).unwrap();
        assert!(delete(&mut pager, rid).is_err());
    }
}
