//! TypedValueCodec - conversions between typed values and raw bytes.
//!
//! Integers are little-endian fixed 8-byte; floats are IEEE-754 doubles.
//! All functions are pure; conversion failures come back as
//! [`ConversionError`], never a panic.

use crate::error::ConversionError;
use std::fmt;
use std::str::FromStr;

/// Scalar type a memory cell can be interpreted as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Float,
    Text,
}

impl ValueType {
    /// Natural byte width of one value of this type. Text has no fixed
    /// width; 8 is used when a read size must be chosen up front.
    pub fn byte_width(&self) -> usize {
        8
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Text => "string",
        }
    }
}

impl FromStr for ValueType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(ValueType::Int),
            "float" | "double" => Ok(ValueType::Float),
            "string" | "str" | "text" => Ok(ValueType::Text),
            other => Err(ConversionError::UnknownType(other.to_string())),
        }
    }
}

/// How a decoded value should be rendered for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayFormat {
    Hex,
    Decimal,
    Ascii,
    Bytes,
    #[default]
    Mixed,
}

/// Native value produced by a decode
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Result of decoding a byte buffer
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Native value
    pub value: Value,
    /// Contiguous lowercase hex of the source bytes
    pub hex: String,
    /// Human-readable rendering per the requested format
    pub formatted: String,
}

/// Decode raw bytes into a typed value.
///
/// Integer buffers shorter than 8 bytes are zero-extended; longer buffers
/// are truncated to the first 8.
pub fn decode(bytes: &[u8], ty: ValueType, format: DisplayFormat) -> Decoded {
    let value = match ty {
        ValueType::Int => Value::Int(i64::from_le_bytes(fixed8(bytes))),
        ValueType::Float => Value::Float(f64::from_le_bytes(fixed8(bytes))),
        ValueType::Text => Value::Text(printable(bytes)),
    };
    let hex = hex::encode(bytes);
    let formatted = render(bytes, &value, format);
    Decoded { value, hex, formatted }
}

/// Encode a string-form value into raw bytes.
///
/// Integers accept decimal and `0x`-prefixed hex input.
pub fn encode(input: &str, ty: ValueType) -> Result<Vec<u8>, ConversionError> {
    match ty {
        ValueType::Int => parse_int(input).map(|v| v.to_le_bytes().to_vec()),
        ValueType::Float => input
            .trim()
            .parse::<f64>()
            .map(|v| v.to_le_bytes().to_vec())
            .map_err(|_| ConversionError::BadFloat(input.to_string())),
        ValueType::Text => Ok(input.as_bytes().to_vec()),
    }
}

/// Parse an integer value, accepting decimal and `0x` hex forms
pub fn parse_int(input: &str) -> Result<i64, ConversionError> {
    let s = input.trim();
    if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex_digits, 16)
            .map(|v| v as i64)
            .map_err(|_| ConversionError::BadInt(input.to_string()));
    }
    s.parse::<i64>()
        .map_err(|_| ConversionError::BadInt(input.to_string()))
}

/// Map bytes to their printable-ASCII projection, '.' for the rest
pub fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (32..=126).contains(&b) { b as char } else { '.' })
        .collect()
}

fn fixed8(bytes: &[u8]) -> [u8; 8] {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

fn render(bytes: &[u8], value: &Value, format: DisplayFormat) -> String {
    match format {
        DisplayFormat::Hex => match value {
            Value::Int(v) => format!("{:#x}", v),
            _ => format!("0x{}", hex::encode(bytes)),
        },
        DisplayFormat::Decimal => value.to_string(),
        DisplayFormat::Ascii => printable(bytes),
        DisplayFormat::Bytes => bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" "),
        DisplayFormat::Mixed => match value {
            Value::Int(v) => format!("{} ({:#x}) '{}'", v, v, printable(bytes)),
            Value::Float(v) => format!("{} '{}'", v, printable(bytes)),
            Value::Text(s) => format!("'{}'", s),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip() {
        let bytes = encode("42", ValueType::Int).unwrap();
        assert_eq!(bytes, 42i64.to_le_bytes().to_vec());

        let decoded = decode(&bytes, ValueType::Int, DisplayFormat::Decimal);
        assert_eq!(decoded.value, Value::Int(42));
        assert_eq!(decoded.formatted, "42");
    }

    #[test]
    fn int_accepts_hex_prefix() {
        let bytes = encode("0x2a", ValueType::Int).unwrap();
        let decoded = decode(&bytes, ValueType::Int, DisplayFormat::Hex);
        assert_eq!(decoded.value, Value::Int(42));
        assert_eq!(decoded.formatted, "0x2a");
    }

    #[test]
    fn int_rejects_garbage() {
        assert!(matches!(
            encode("not-a-number", ValueType::Int),
            Err(ConversionError::BadInt(_))
        ));
        assert!(matches!(
            encode("0xzz", ValueType::Int),
            Err(ConversionError::BadInt(_))
        ));
    }

    #[test]
    fn float_round_trip() {
        let bytes = encode("3.25", ValueType::Float).unwrap();
        let decoded = decode(&bytes, ValueType::Float, DisplayFormat::Decimal);
        assert_eq!(decoded.value, Value::Float(3.25));
    }

    #[test]
    fn float_rejects_garbage() {
        assert!(matches!(
            encode("abc", ValueType::Float),
            Err(ConversionError::BadFloat(_))
        ));
    }

    #[test]
    fn text_projection_masks_unprintable() {
        let decoded = decode(b"Hi\x00\xff!", ValueType::Text, DisplayFormat::Ascii);
        assert_eq!(decoded.value, Value::Text("Hi..!".to_string()));
        assert_eq!(decoded.formatted, "Hi..!");
    }

    #[test]
    fn short_int_buffer_is_zero_extended() {
        let decoded = decode(&[0x2a], ValueType::Int, DisplayFormat::Decimal);
        assert_eq!(decoded.value, Value::Int(42));
    }

    #[test]
    fn bytes_format_is_spaced_hex() {
        let decoded = decode(&[0xde, 0xad], ValueType::Int, DisplayFormat::Bytes);
        assert_eq!(decoded.formatted, "de ad");
        assert_eq!(decoded.hex, "dead");
    }

    #[test]
    fn value_type_parsing() {
        assert_eq!("int".parse::<ValueType>().unwrap(), ValueType::Int);
        assert_eq!("string".parse::<ValueType>().unwrap(), ValueType::Text);
        assert!("blob".parse::<ValueType>().is_err());
    }
}
