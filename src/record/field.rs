//! Typed record fields.

use std::fmt;
use std::str::FromStr;

use crate::common::Error;

/// Tag byte written before each field in an encoded payload.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    Int = 1,
    Long = 2,
    Float = 3,
    Double = 4,
    Bool = 5,
    Text = 6,
}

impl FieldTag {
    /// Convert from u8, returning `None` for unknown tags.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FieldTag::Int),
            2 => Some(FieldTag::Long),
            3 => Some(FieldTag::Float),
            4 => Some(FieldTag::Double),
            5 => Some(FieldTag::Bool),
            6 => Some(FieldTag::Text),
            _ => None,
        }
    }
}

/// One typed field of a record.
///
/// Equality compares floats by their bit pattern, so a `NaN` equals itself
/// after a round trip through the codec while `0.0` and `-0.0` differ.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Int(i32),
    /// 64-bit integer; also used for dates stored as epoch days.
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn tag(&self) -> FieldTag {
        match self {
            FieldValue::Int(_) => FieldTag::Int,
            FieldValue::Long(_) => FieldTag::Long,
            FieldValue::Float(_) => FieldTag::Float,
            FieldValue::Double(_) => FieldTag::Double,
            FieldValue::Bool(_) => FieldTag::Bool,
            FieldValue::Text(_) => FieldTag::Text,
        }
    }

    /// Number of bytes this field occupies in an encoded payload, tag included.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            FieldValue::Int(_) | FieldValue::Float(_) => 4,
            FieldValue::Long(_) | FieldValue::Double(_) => 8,
            FieldValue::Bool(_) => 1,
            FieldValue::Text(s) => 4 + s.len(),
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Long(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            (FieldValue::Long(a), FieldValue::Long(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Double(a), FieldValue::Double(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Long(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// Parses typed literals of the form `<type>:<value>`.
///
/// Types: `i` (int), `l` (long), `f` (float), `d` (double), `b` (bool),
/// `s` (text). Everything after the first `:` is the value, so text may
/// itself contain colons.
impl FromStr for FieldValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidConfig(format!("field literal {:?} has no type prefix", s)))?;

        let bad = |e: &dyn fmt::Display| Error::InvalidConfig(format!("field literal {:?}: {}", s, e));

        match kind {
            "i" => value.parse().map(FieldValue::Int).map_err(|e| bad(&e)),
            "l" => value.parse().map(FieldValue::Long).map_err(|e| bad(&e)),
            "f" => value.parse().map(FieldValue::Float).map_err(|e| bad(&e)),
            "d" => value.parse().map(FieldValue::Double).map_err(|e| bad(&e)),
            "b" => value.parse().map(FieldValue::Bool).map_err(|e| bad(&e)),
            "s" => Ok(FieldValue::Text(value.to_string())),
            other => Err(Error::InvalidConfig(format!("unknown field type {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_from_u8() {
        for tag in [
            FieldTag::Int,
            FieldTag::Long,
            FieldTag::Float,
            FieldTag::Double,
            FieldTag::Bool,
            FieldTag::Text,
        ] {
            assert_eq!(FieldTag::from_u8(tag as u8), Some(tag));
        }
        assert_eq!(FieldTag::from_u8(0), None);
        assert_eq!(FieldTag::from_u8(200), None);
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(FieldValue::Float(f32::NAN), FieldValue::Float(f32::NAN));
        assert_eq!(FieldValue::Double(f64::NAN), FieldValue::Double(f64::NAN));
        assert_ne!(FieldValue::Double(0.0), FieldValue::Double(-0.0));
        assert_ne!(FieldValue::Int(1), FieldValue::Long(1));
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(FieldValue::Int(1).encoded_len(), 5);
        assert_eq!(FieldValue::Long(1).encoded_len(), 9);
        assert_eq!(FieldValue::Bool(true).encoded_len(), 2);
        // Multi-byte UTF-8 counts bytes, not chars
        assert_eq!(FieldValue::from("ação").encoded_len(), 1 + 4 + 6);
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!("i:42".parse::<FieldValue>().unwrap(), FieldValue::Int(42));
        assert_eq!("l:-7".parse::<FieldValue>().unwrap(), FieldValue::Long(-7));
        assert_eq!("f:1.5".parse::<FieldValue>().unwrap(), FieldValue::Float(1.5));
        assert_eq!("d:2.25".parse::<FieldValue>().unwrap(), FieldValue::Double(2.25));
        assert_eq!("b:true".parse::<FieldValue>().unwrap(), FieldValue::Bool(true));
        assert_eq!(
            "s:12:30 PM".parse::<FieldValue>().unwrap(),
            FieldValue::from("12:30 PM")
        );
    }

    #[test]
    fn test_parse_rejects_bad_literals() {
        assert!("42".parse::<FieldValue>().is_err());
        assert!("x:1".parse::<FieldValue>().is_err());
        assert!("i:abc".parse::<FieldValue>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", FieldValue::Int(3)), "3");
        assert_eq!(format!("{}", FieldValue::from("rain")), "\"rain\"");
    }
}
