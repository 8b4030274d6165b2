//! Logical records and their binary encoding.
//!
//! This module contains:
//! - [`FieldValue`] - One typed field
//! - [`Record`] - An id plus an ordered list of fields
//! - [`RecordCodec`] - The payload encoding stored in heap slots

mod codec;
mod field;
#[allow(clippy::module_inception)]
mod record;

pub use codec::RecordCodec;
pub use field::{FieldTag, FieldValue};
pub use record::Record;
