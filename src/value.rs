//! Scalar values carried by records.
//!
//! Records arrive as flat JSON objects, so `Value` deserializes from plain
//! JSON scalars rather than a tagged form. Filters coerce values to the
//! numeric type they compare against at evaluation time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar attribute value inside a record.
///
/// # Examples
///
/// ```
/// use eventgate::Value;
///
/// let v: Value = serde_json::from_str("15").unwrap();
/// assert_eq!(v, Value::UInt(15));
/// assert_eq!(v.to_f64(), Some(15.0));
///
/// let s = Value::from("0b101");
/// assert_eq!(s.to_u64(), Some(5));
/// ```
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    #[allow(missing_docs)]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerces to a float for range comparison.
    ///
    /// Integers, floats and numeric strings coerce; booleans and null do not.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::UInt(v) => Some(*v as f64),
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            Self::Null | Self::Bool(_) => None,
        }
    }

    /// Coerces to an unsigned 64-bit flag word for bitmask comparison.
    ///
    /// Negative numbers, fractional floats and non-numeric strings do not
    /// coerce. Strings may be decimal or carry a `0x` / `0b` prefix.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            Self::Float(v) => float_to_u64(*v),
            Self::String(s) => parse_flag_word(s.trim()),
            Self::Null | Self::Bool(_) => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::UInt(_) | Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

// 2^64 as f64; anything at or above it does not fit.
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn float_to_u64(v: f64) -> Option<u64> {
    if v.is_finite() && v.fract() == 0.0 && v >= 0.0 && v < U64_LIMIT {
        Some(v as u64)
    } else {
        None
    }
}

fn parse_flag_word(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else {
        s.parse::<u64>().ok()
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "\"{v}\""),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_json_scalars() {
        let v: Vec<Value> = serde_json::from_str(r#"[null, true, 7, -3, 2.5, "12"]"#).unwrap();
        assert_eq!(
            v,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::UInt(7),
                Value::Int(-3),
                Value::Float(2.5),
                Value::String("12".to_string()),
            ]
        );
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(Value::UInt(3).to_f64(), Some(3.0));
        assert_eq!(Value::Int(-3).to_f64(), Some(-3.0));
        assert_eq!(Value::from(" 1.25 ").to_f64(), Some(1.25));
        assert_eq!(Value::from("warm").to_f64(), None);
        assert_eq!(Value::Bool(true).to_f64(), None);
        assert_eq!(Value::Null.to_f64(), None);
    }

    #[test]
    fn test_to_u64() {
        assert_eq!(Value::UInt(7).to_u64(), Some(7));
        assert_eq!(Value::Int(5).to_u64(), Some(5));
        assert_eq!(Value::Int(-1).to_u64(), None);
        assert_eq!(Value::Float(4.0).to_u64(), Some(4));
        assert_eq!(Value::Float(4.5).to_u64(), None);
        assert_eq!(Value::Float(-1.0).to_u64(), None);
        assert_eq!(Value::Float(f64::NAN).to_u64(), None);
        assert_eq!(Value::from("0x10").to_u64(), Some(16));
        assert_eq!(Value::from("0b011").to_u64(), Some(3));
        assert_eq!(Value::from("42").to_u64(), Some(42));
        assert_eq!(Value::from("-42").to_u64(), None);
    }

    #[test]
    fn test_zero_is_a_value() {
        assert!(!Value::UInt(0).is_null());
        assert_eq!(Value::UInt(0).to_u64(), Some(0));
        assert_eq!(Value::Float(0.0).to_f64(), Some(0.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(Value::Int(-2).to_string(), "-2");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
