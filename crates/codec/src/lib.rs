//! Tagged-binary row codec (spec §4.4): encodes a schemaless [`Record`] into
//! a self-describing byte run and back. Kept independent of the page layout
//! so it can be fuzzed and round-trip tested on its own.
//!
//! Wire format, all integers little-endian:
//!
//! ```text
//! u16        field_count
//! field_count * (
//!     u8     name_len
//!     [u8]   name bytes (utf-8)
//!     u8     type_tag     0=null 1=bool 2=i64 3=f64 4=string 5=timestamp
//!     ..     type-specific payload
//! )
//! ```
//!
//! Payloads: null and bool-as-tag-only types have no extra bytes beyond what
//! the tag implies (bool still carries one payload byte); i64/f64 are 8
//! fixed bytes; string/timestamp are a `u32` byte length followed by UTF-8
//! bytes.

use common::{DbError, DbResult, Record};
use types::Value;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_TIMESTAMP: u8 = 5;

/// Encodes a record to its tagged-binary representation.
///
/// # Errors
/// Returns `DbError::Codec` if a field name is longer than 255 bytes (the
/// name-length prefix is a single byte) or a string/timestamp payload
/// exceeds `u32::MAX` bytes.
pub fn encode_record(record: &Record) -> DbResult<Vec<u8>> {
    let field_count = record.len();
    if field_count > u16::MAX as usize {
        return Err(DbError::Codec(format!(
            "record has {field_count} fields, more than the {} the codec can address",
            u16::MAX
        )));
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(&(field_count as u16).to_le_bytes());

    for (name, value) in record.iter() {
        encode_field(&mut buf, name, value)?;
    }

    Ok(buf)
}

fn encode_field(buf: &mut Vec<u8>, name: &str, value: &Value) -> DbResult<()> {
    let name_bytes = name.as_bytes();
    if name_bytes.len() > u8::MAX as usize {
        return Err(DbError::Codec(format!(
            "field name '{name}' is {} bytes, longer than the 255-byte limit",
            name_bytes.len()
        )));
    }
    buf.push(name_bytes.len() as u8);
    buf.extend_from_slice(name_bytes);

    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(*b as u8);
        }
        Value::Int(i) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            buf.push(TAG_FLOAT);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            encode_text(buf, s)?;
        }
        Value::Timestamp(s) => {
            buf.push(TAG_TIMESTAMP);
            encode_text(buf, s)?;
        }
    }
    Ok(())
}

fn encode_text(buf: &mut Vec<u8>, text: &str) -> DbResult<()> {
    let bytes = text.as_bytes();
    if bytes.len() > u32::MAX as usize {
        return Err(DbError::Codec("string field exceeds u32 length".into()));
    }
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Decodes a tagged-binary payload back into a [`Record`].
///
/// # Errors
/// Returns `DbError::Codec` if the buffer is truncated, contains an unknown
/// type tag, or a string/name is not valid UTF-8.
pub fn decode_record(bytes: &[u8]) -> DbResult<Record> {
    let mut cur = Cursor::new(bytes);
    let field_count = cur.take_u16()?;

    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let name_len = cur.take_u8()? as usize;
        let name_bytes = cur.take(name_len)?;
        let name = String::from_utf8(name_bytes.to_vec())
            .map_err(|e| DbError::Codec(format!("field name is not utf-8: {e}")))?;

        let tag = cur.take_u8()?;
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_BOOL => Value::Bool(cur.take_u8()? != 0),
            TAG_INT => Value::Int(cur.take_i64()?),
            TAG_FLOAT => Value::Float(cur.take_f64()?),
            TAG_STRING => Value::String(cur.take_text()?),
            TAG_TIMESTAMP => Value::Timestamp(cur.take_text()?),
            other => return Err(DbError::Codec(format!("unknown type tag {other}"))),
        };
        fields.push((name, value));
    }

    Ok(Record::from_pairs(fields))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> DbResult<&'a [u8]> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(DbError::Codec("truncated record payload".into()));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> DbResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> DbResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn take_u32(&mut self) -> DbResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn take_i64(&mut self) -> DbResult<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().unwrap()))
    }

    fn take_f64(&mut self) -> DbResult<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }

    fn take_text(&mut self) -> DbResult<String> {
        let len = self.take_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| DbError::Codec(format!("not utf-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_record() -> Record {
        Record::from_pairs(vec![
            ("id".into(), Value::Int(1)),
            ("bibit".into(), Value::String("Dura".into())),
            ("umur".into(), Value::Int(5)),
            ("active".into(), Value::Bool(true)),
            ("score".into(), Value::Float(3.5)),
            ("deleted_at".into(), Value::Null),
            (
                "planted".into(),
                Value::Timestamp("2024-01-01T00:00:00Z".into()),
            ),
        ])
    }

    #[test]
    fn round_trips_mixed_record() {
        let record = sample_record();
        let bytes = encode_record(&record).unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert!(record.value_eq(&decoded));
    }

    #[test]
    fn round_trips_empty_record() {
        let record = Record::new();
        let bytes = encode_record(&record).unwrap();
        assert_eq!(bytes, 0u16.to_le_bytes());
        let decoded = decode_record(&bytes).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn preserves_apostrophes_in_strings() {
        let record = Record::new().with("bibit", Value::String("O'Neil".into()));
        let bytes = encode_record(&record).unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(decoded.get("bibit"), Some(&Value::String("O'Neil".into())));
    }

    #[test]
    fn rejects_truncated_payload() {
        let record = sample_record();
        let mut bytes = encode_record(&record).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(decode_record(&bytes).is_err());
    }

    #[test]
    fn rejects_unknown_type_tag() {
        let mut bytes = 1u16.to_le_bytes().to_vec();
        bytes.push(1); // name_len
        bytes.push(b'x');
        bytes.push(200); // invalid tag
        assert!(decode_record(&bytes).is_err());
    }

    #[test]
    fn rejects_field_name_over_255_bytes() {
        let long_name = "x".repeat(256);
        let record = Record::new().with(long_name, Value::Int(1));
        assert!(encode_record(&record).is_err());
    }

    proptest! {
        #[test]
        fn round_trips_arbitrary_int_fields(
            names in prop::collection::vec("[a-zA-Z_][a-zA-Z0-9_]{0,10}", 0..8),
            values in prop::collection::vec(any::<i64>(), 0..8),
        ) {
            let n = names.len().min(values.len());
            let record: Record = names
                .into_iter()
                .take(n)
                .zip(values.into_iter().take(n))
                .map(|(name, value)| (name, Value::Int(value)))
                .collect();
            let bytes = encode_record(&record).unwrap();
            let decoded = decode_record(&bytes).unwrap();
            prop_assert!(record.value_eq(&decoded));
        }

        #[test]
        fn round_trips_arbitrary_strings(s in ".*") {
            let record = Record::new().with("s", Value::String(s));
            let bytes = encode_record(&record).unwrap();
            let decoded = decode_record(&bytes).unwrap();
            prop_assert!(record.value_eq(&decoded));
        }
    }
}
