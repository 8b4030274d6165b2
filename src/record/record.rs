//! The logical record.

use std::fmt;

use super::field::FieldValue;

/// Size of the fixed part of an encoded payload: `id:int32, field_count:uint32`.
pub(crate) const RECORD_PREFIX_SIZE: usize = 8;

/// A logical record: a unique id and an ordered sequence of typed fields.
///
/// The tombstone flag is not part of the record value; it lives in the heap
/// slot header, so tombstoning never touches the payload.
///
/// # Example
/// ```
/// use slotdb::{FieldValue, Record};
///
/// let mut record = Record::new(7, vec![FieldValue::from("CLEAR"), FieldValue::Int(2)]);
/// let before = record.encoded_len();
/// record.set_field(0, "RAIN");
/// assert_eq!(record.encoded_len(), before - 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: i32,
    fields: Vec<FieldValue>,
}

impl Record {
    pub fn new(id: i32, fields: Vec<FieldValue>) -> Self {
        Self { id, fields }
    }

    #[inline]
    pub fn id(&self) -> i32 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    #[inline]
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldValue> {
        self.fields.get(index)
    }

    /// Replace the field at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set_field(&mut self, index: usize, value: impl Into<FieldValue>) {
        self.fields[index] = value.into();
    }

    pub fn push_field(&mut self, value: impl Into<FieldValue>) {
        self.fields.push(value.into());
    }

    pub fn into_fields(self) -> Vec<FieldValue> {
        self.fields
    }

    /// Length of this record's encoded payload.
    ///
    /// Always derived from the current fields, never cached.
    pub fn encoded_len(&self) -> usize {
        RECORD_PREFIX_SIZE + self.fields.iter().map(FieldValue::encoded_len).sum::<usize>()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [", self.id)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, "]")
    }
}
