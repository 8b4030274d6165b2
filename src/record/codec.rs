//! Record payload encoding.

use crate::common::{Error, Result};

use super::field::{FieldTag, FieldValue};
use super::record::Record;

/// Encodes records to and decodes them from heap slot payloads.
///
/// # Layout (big-endian)
/// ```text
/// ┌──────────┬──────────────────┬─────────────────────────────────────┐
/// │ id (4B)  │ field_count (4B) │ field_count × (tag (1B) │ value)    │
/// └──────────┴──────────────────┴─────────────────────────────────────┘
/// value: Int/Float 4B, Long/Double 8B, Bool 1B, Text len (4B) + UTF-8
/// ```
///
/// Decoding stops after the last declared field. Anything after it is
/// ignored: a slot that was overwritten in place with a shorter payload
/// keeps its original length, and the tail is padding.
pub struct RecordCodec;

impl RecordCodec {
    /// Encode a record. Deterministic: equal records give equal bytes.
    pub fn encode(record: &Record) -> Vec<u8> {
        let mut buf = Vec::with_capacity(record.encoded_len());
        buf.extend_from_slice(&record.id().to_be_bytes());
        buf.extend_from_slice(&(record.fields().len() as u32).to_be_bytes());

        for field in record.fields() {
            buf.push(field.tag() as u8);
            match field {
                FieldValue::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
                FieldValue::Long(v) => buf.extend_from_slice(&v.to_be_bytes()),
                FieldValue::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
                FieldValue::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
                FieldValue::Bool(v) => buf.push(*v as u8),
                FieldValue::Text(s) => {
                    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
                    buf.extend_from_slice(s.as_bytes());
                }
            }
        }

        debug_assert_eq!(buf.len(), record.encoded_len());
        buf
    }

    /// Decode a record from the front of `bytes`.
    ///
    /// # Errors
    /// Returns `Error::MalformedRecord` if the bytes end before every declared
    /// field is read, a tag is unknown, or text is not valid UTF-8.
    pub fn decode(bytes: &[u8]) -> Result<Record> {
        let mut reader = Reader { bytes, pos: 0 };

        let id = i32::from_be_bytes(reader.take_array("id")?);
        let count = u32::from_be_bytes(reader.take_array("field count")?) as usize;

        // Every field needs at least two bytes; reject absurd counts before allocating.
        if count > reader.remaining() / 2 {
            return Err(Error::malformed(format!(
                "record {} declares {} fields in {} bytes",
                id,
                count,
                reader.remaining()
            )));
        }

        let mut fields = Vec::with_capacity(count);
        for index in 0..count {
            let [raw_tag] = reader.take_array::<1>("field tag")?;
            let tag = FieldTag::from_u8(raw_tag).ok_or_else(|| {
                Error::malformed(format!("unknown tag {} for field {}", raw_tag, index))
            })?;

            let value = match tag {
                FieldTag::Int => FieldValue::Int(i32::from_be_bytes(reader.take_array("int")?)),
                FieldTag::Long => FieldValue::Long(i64::from_be_bytes(reader.take_array("long")?)),
                FieldTag::Float => {
                    FieldValue::Float(f32::from_be_bytes(reader.take_array("float")?))
                }
                FieldTag::Double => {
                    FieldValue::Double(f64::from_be_bytes(reader.take_array("double")?))
                }
                FieldTag::Bool => {
                    let [b] = reader.take_array::<1>("bool")?;
                    FieldValue::Bool(b != 0)
                }
                FieldTag::Text => {
                    let len = u32::from_be_bytes(reader.take_array("text length")?) as usize;
                    let raw = reader.take(len, "text")?;
                    let s = std::str::from_utf8(raw).map_err(|e| {
                        Error::malformed(format!("field {} is not UTF-8: {}", index, e))
                    })?;
                    FieldValue::Text(s.to_string())
                }
            };
            fields.push(value);
        }

        Ok(Record::new(id, fields))
    }
}

/// Bounds-checked cursor over a payload.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::malformed(format!(
                "payload ended reading {} at byte {} (need {}, have {})",
                what,
                self.pos,
                len,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::new(
            12,
            vec![
                FieldValue::from("08/05/2023 02:15:00 PM"),
                FieldValue::Long(19_574),
                FieldValue::from("TRAFFIC SIGNAL"),
                FieldValue::Bool(true),
                FieldValue::Int(2),
                FieldValue::Float(1.0),
                FieldValue::Double(-0.5),
            ],
        )
    }

    #[test]
    fn test_roundtrip() {
        let record = sample();
        let bytes = RecordCodec::encode(&record);
        assert_eq!(bytes.len(), record.encoded_len());
        assert_eq!(RecordCodec::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_layout_is_big_endian() {
        let record = Record::new(1, vec![FieldValue::Int(0x0102_0304)]);
        let bytes = RecordCodec::encode(&record);
        assert_eq!(
            bytes,
            vec![0, 0, 0, 1, 0, 0, 0, 1, FieldTag::Int as u8, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_decode_ignores_trailing_padding() {
        let record = sample();
        let mut bytes = RecordCodec::encode(&record);
        bytes.extend_from_slice(&[0u8; 32]);
        assert_eq!(RecordCodec::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_decode_truncated_fails() {
        let bytes = RecordCodec::encode(&sample());
        for cut in [0, 3, 7, 9, bytes.len() - 1] {
            let result = RecordCodec::decode(&bytes[..cut]);
            assert!(
                matches!(result, Err(Error::MalformedRecord { .. })),
                "cut at {} should fail",
                cut
            );
        }
    }

    #[test]
    fn test_decode_unknown_tag_fails() {
        let mut bytes = RecordCodec::encode(&Record::new(1, vec![FieldValue::Int(5)]));
        bytes[8] = 0xEE;
        assert!(matches!(
            RecordCodec::decode(&bytes),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_utf8_fails() {
        let mut bytes = RecordCodec::encode(&Record::new(1, vec![FieldValue::from("ab")]));
        let last = bytes.len() - 1;
        bytes[last] = 0xFF;
        assert!(matches!(
            RecordCodec::decode(&bytes),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_decode_absurd_field_count_fails() {
        let mut bytes = vec![0, 0, 0, 1];
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            RecordCodec::decode(&bytes),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_nan_roundtrip() {
        let record = Record::new(
            4,
            vec![FieldValue::Float(f32::NAN), FieldValue::Double(f64::NAN)],
        );
        let decoded = RecordCodec::decode(&RecordCodec::encode(&record)).unwrap();
        assert_eq!(decoded, record);
    }
}
