//! Value codec
//!
//! Exact byte-level encoding for every built-in type.
//!
//! ## Wire Format (version 1)
//!
//! All multi-byte numbers are big-endian.
//!
//! ### Fixed-width scalars
//! ```text
//! kv.int    ┌──── 4 ────┐      kv.bool  ┌ 1 ┐  (0x00 / 0x01)
//! kv.long   ┌──── 8 ────┐      kv.byte  ┌ 1 ┐
//! kv.float  ┌──── 4 ────┐      kv.char  ┌ 2 ┐  (UTF-16 code unit)
//! kv.double ┌──── 8 ────┐
//! ```
//!
//! ### Strings
//! Raw UTF-8, no length prefix; the payload length is the string length.
//!
//! ### Primitive arrays
//! Concatenated fixed-width elements. The element count is
//! `payload.len() / width` and is never stored.
//!
//! ### Framed sequences (string arrays, lists)
//! ```text
//! ┌──────────┬──────────┬─────────┬──────────┬─────────┬─────
//! │Count (4) │ Len (4)  │ Elem 0  │ Len (4)  │ Elem 1  │ ...
//! └──────────┴──────────┴─────────┴──────────┴─────────┴─────
//! ```
//!
//! ### List tags
//! A list stores `kv.list<` + element tag + `>` so decode can recover the
//! element codec from the tag alone.

use bytes::{Buf, BufMut};

use crate::error::{KvError, Result};
use crate::value::Value;

/// Version of the byte layout described above
pub const WIRE_FORMAT_VERSION: u32 = 1;

/// Namespace reserved for built-in tags
pub const RESERVED_PREFIX: &str = "kv.";

/// Opening marker of a composite list tag
pub const LIST_TAG_PREFIX: &str = "kv.list<";

/// Closing marker of a composite list tag
pub const LIST_TAG_SUFFIX: &str = ">";

/// Size of a count or length field in framed sequences
pub const FRAME_HEADER_SIZE: usize = 4;

// =============================================================================
// Built-in Types
// =============================================================================

/// Every type the codec handles without a converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Int,
    Long,
    Float,
    Double,
    Bool,
    Byte,
    Char,
    String,
    IntArray,
    LongArray,
    FloatArray,
    DoubleArray,
    CharArray,
    StringArray,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 14] = [
        BuiltinType::Int,
        BuiltinType::Long,
        BuiltinType::Float,
        BuiltinType::Double,
        BuiltinType::Bool,
        BuiltinType::Byte,
        BuiltinType::Char,
        BuiltinType::String,
        BuiltinType::IntArray,
        BuiltinType::LongArray,
        BuiltinType::FloatArray,
        BuiltinType::DoubleArray,
        BuiltinType::CharArray,
        BuiltinType::StringArray,
    ];

    /// Persisted tag
    pub fn tag(self) -> &'static str {
        match self {
            BuiltinType::Int => "kv.int",
            BuiltinType::Long => "kv.long",
            BuiltinType::Float => "kv.float",
            BuiltinType::Double => "kv.double",
            BuiltinType::Bool => "kv.bool",
            BuiltinType::Byte => "kv.byte",
            BuiltinType::Char => "kv.char",
            BuiltinType::String => "kv.string",
            BuiltinType::IntArray => "kv.int[]",
            BuiltinType::LongArray => "kv.long[]",
            BuiltinType::FloatArray => "kv.float[]",
            BuiltinType::DoubleArray => "kv.double[]",
            BuiltinType::CharArray => "kv.char[]",
            BuiltinType::StringArray => "kv.string[]",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.tag() == tag)
    }

    /// Rust type the variant maps to
    pub fn type_name(self) -> &'static str {
        match self {
            BuiltinType::Int => "i32",
            BuiltinType::Long => "i64",
            BuiltinType::Float => "f32",
            BuiltinType::Double => "f64",
            BuiltinType::Bool => "bool",
            BuiltinType::Byte => "u8",
            BuiltinType::Char => "char",
            BuiltinType::String => "String",
            BuiltinType::IntArray => "Vec<i32>",
            BuiltinType::LongArray => "Vec<i64>",
            BuiltinType::FloatArray => "Vec<f32>",
            BuiltinType::DoubleArray => "Vec<f64>",
            BuiltinType::CharArray => "Vec<char>",
            BuiltinType::StringArray => "Vec<String>",
        }
    }

    /// Width of one element for fixed-width scalars and primitive arrays
    pub fn element_width(self) -> Option<usize> {
        match self {
            BuiltinType::Int | BuiltinType::IntArray => Some(4),
            BuiltinType::Long | BuiltinType::LongArray => Some(8),
            BuiltinType::Float | BuiltinType::FloatArray => Some(4),
            BuiltinType::Double | BuiltinType::DoubleArray => Some(8),
            BuiltinType::Bool | BuiltinType::Byte => Some(1),
            BuiltinType::Char | BuiltinType::CharArray => Some(2),
            BuiltinType::String | BuiltinType::StringArray => None,
        }
    }

    /// Built-in type of a value, `None` for lists and objects
    pub fn of(value: &Value) -> Option<Self> {
        let ty = match value {
            Value::Int(_) => BuiltinType::Int,
            Value::Long(_) => BuiltinType::Long,
            Value::Float(_) => BuiltinType::Float,
            Value::Double(_) => BuiltinType::Double,
            Value::Bool(_) => BuiltinType::Bool,
            Value::Byte(_) => BuiltinType::Byte,
            Value::Char(_) => BuiltinType::Char,
            Value::String(_) => BuiltinType::String,
            Value::IntArray(_) => BuiltinType::IntArray,
            Value::LongArray(_) => BuiltinType::LongArray,
            Value::FloatArray(_) => BuiltinType::FloatArray,
            Value::DoubleArray(_) => BuiltinType::DoubleArray,
            Value::CharArray(_) => BuiltinType::CharArray,
            Value::StringArray(_) => BuiltinType::StringArray,
            Value::List(_) | Value::Object(_) => return None,
        };
        Some(ty)
    }
}

// =============================================================================
// Tags
// =============================================================================

/// Whether a tag lives in the built-in namespace
pub fn is_reserved(tag: &str) -> bool {
    tag.starts_with(RESERVED_PREFIX)
}

/// Compose the tag of a list whose elements use `element_tag`
pub fn list_tag(element_tag: &str) -> String {
    format!("{}{}{}", LIST_TAG_PREFIX, element_tag, LIST_TAG_SUFFIX)
}

/// Element tag of a composite list tag, `None` if `tag` is not a list tag
pub fn split_list_tag(tag: &str) -> Option<&str> {
    tag.strip_prefix(LIST_TAG_PREFIX)?
        .strip_suffix(LIST_TAG_SUFFIX)
        .filter(|element| !element.is_empty())
}

// =============================================================================
// Built-in Encoding/Decoding
// =============================================================================

/// Encode a built-in value
///
/// Lists and objects are routed through the registry, never here.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let bytes = match value {
        Value::Int(v) => v.to_be_bytes().to_vec(),
        Value::Long(v) => v.to_be_bytes().to_vec(),
        Value::Float(v) => v.to_be_bytes().to_vec(),
        Value::Double(v) => v.to_be_bytes().to_vec(),
        Value::Bool(v) => vec![u8::from(*v)],
        Value::Byte(v) => vec![*v],
        Value::Char(c) => code_unit(*c)?.to_be_bytes().to_vec(),
        Value::String(s) => s.as_bytes().to_vec(),
        Value::IntArray(items) => {
            let mut buf = Vec::with_capacity(items.len() * 4);
            items.iter().for_each(|v| buf.put_i32(*v));
            buf
        }
        Value::LongArray(items) => {
            let mut buf = Vec::with_capacity(items.len() * 8);
            items.iter().for_each(|v| buf.put_i64(*v));
            buf
        }
        Value::FloatArray(items) => {
            let mut buf = Vec::with_capacity(items.len() * 4);
            items.iter().for_each(|v| buf.put_f32(*v));
            buf
        }
        Value::DoubleArray(items) => {
            let mut buf = Vec::with_capacity(items.len() * 8);
            items.iter().for_each(|v| buf.put_f64(*v));
            buf
        }
        Value::CharArray(items) => {
            let mut buf = Vec::with_capacity(items.len() * 2);
            for c in items {
                buf.put_u16(code_unit(*c)?);
            }
            buf
        }
        Value::StringArray(items) => encode_frames(items.iter().map(|s| s.as_bytes()))?,
        Value::List(_) | Value::Object(_) => {
            return Err(KvError::UnmappedType(value.type_name()));
        }
    };
    Ok(bytes)
}

/// Decode a payload written by [`encode`] for the given type
pub fn decode(ty: BuiltinType, payload: &[u8]) -> Result<Value> {
    if let Some(width) = ty.element_width() {
        check_width(ty, payload, width)?;
    }

    let mut buf = payload;
    let value = match ty {
        BuiltinType::Int => Value::Int(buf.get_i32()),
        BuiltinType::Long => Value::Long(buf.get_i64()),
        BuiltinType::Float => Value::Float(buf.get_f32()),
        BuiltinType::Double => Value::Double(buf.get_f64()),
        BuiltinType::Bool => match buf.get_u8() {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(KvError::Decode(format!(
                    "kv.bool: invalid byte 0x{:02x}",
                    other
                )))
            }
        },
        BuiltinType::Byte => Value::Byte(buf.get_u8()),
        BuiltinType::Char => Value::Char(from_code_unit(buf.get_u16())?),
        BuiltinType::String => Value::String(decode_utf8(payload)?),
        BuiltinType::IntArray => {
            let mut items = Vec::with_capacity(payload.len() / 4);
            while buf.has_remaining() {
                items.push(buf.get_i32());
            }
            Value::IntArray(items)
        }
        BuiltinType::LongArray => {
            let mut items = Vec::with_capacity(payload.len() / 8);
            while buf.has_remaining() {
                items.push(buf.get_i64());
            }
            Value::LongArray(items)
        }
        BuiltinType::FloatArray => {
            let mut items = Vec::with_capacity(payload.len() / 4);
            while buf.has_remaining() {
                items.push(buf.get_f32());
            }
            Value::FloatArray(items)
        }
        BuiltinType::DoubleArray => {
            let mut items = Vec::with_capacity(payload.len() / 8);
            while buf.has_remaining() {
                items.push(buf.get_f64());
            }
            Value::DoubleArray(items)
        }
        BuiltinType::CharArray => {
            let mut items = Vec::with_capacity(payload.len() / 2);
            while buf.has_remaining() {
                items.push(from_code_unit(buf.get_u16())?);
            }
            Value::CharArray(items)
        }
        BuiltinType::StringArray => {
            let items = decode_frames(payload)?
                .into_iter()
                .map(decode_utf8)
                .collect::<Result<Vec<_>>>()?;
            Value::StringArray(items)
        }
    };
    Ok(value)
}

/// Scalars need the exact width, arrays a whole number of elements
fn check_width(ty: BuiltinType, payload: &[u8], width: usize) -> Result<()> {
    let is_array = matches!(
        ty,
        BuiltinType::IntArray
            | BuiltinType::LongArray
            | BuiltinType::FloatArray
            | BuiltinType::DoubleArray
            | BuiltinType::CharArray
    );

    if is_array && payload.len() % width != 0 {
        return Err(KvError::Decode(format!(
            "{}: payload of {} bytes is not a multiple of {}",
            ty.tag(),
            payload.len(),
            width
        )));
    }
    if !is_array && payload.len() != width {
        return Err(KvError::Decode(format!(
            "{}: expected {} bytes, got {}",
            ty.tag(),
            width,
            payload.len()
        )));
    }
    Ok(())
}

fn code_unit(c: char) -> Result<u16> {
    u16::try_from(u32::from(c)).map_err(|_| {
        KvError::InvalidArgument(format!(
            "char U+{:04X} does not fit in one UTF-16 code unit",
            u32::from(c)
        ))
    })
}

fn from_code_unit(unit: u16) -> Result<char> {
    char::from_u32(u32::from(unit)).ok_or_else(|| {
        KvError::Decode(format!("kv.char: 0x{:04x} is a lone surrogate", unit))
    })
}

fn decode_utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| KvError::Decode(format!("invalid UTF-8: {}", e)))
}

// =============================================================================
// Framing
// =============================================================================

/// Frame a sequence of byte strings: count (4) + N × {len (4), bytes}
///
/// Fails with `InvalidArgument` when the count or an element length does not
/// fit the 4-byte field.
pub fn encode_frames<'a, I>(elements: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let elements: Vec<&[u8]> = elements.into_iter().collect();
    let total = FRAME_HEADER_SIZE
        + elements
            .iter()
            .map(|e| FRAME_HEADER_SIZE + e.len())
            .sum::<usize>();

    let mut buf = Vec::with_capacity(total);
    buf.put_u32(frame_field(elements.len())?);
    for element in elements {
        buf.put_u32(frame_field(element.len())?);
        buf.put_slice(element);
    }
    Ok(buf)
}

/// Count or length as it is written into a 4-byte frame field
pub fn frame_field(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| {
        KvError::InvalidArgument(format!("frame field {} exceeds u32::MAX", n))
    })
}

/// Split a framed payload back into its elements, in order
pub fn decode_frames(payload: &[u8]) -> Result<Vec<&[u8]>> {
    let mut buf = payload;
    if buf.remaining() < FRAME_HEADER_SIZE {
        return Err(KvError::Decode(format!(
            "framed payload: missing count (got {} bytes)",
            buf.remaining()
        )));
    }

    let count = buf.get_u32() as usize;
    // Every element costs at least its length field
    if count > buf.remaining() / FRAME_HEADER_SIZE {
        return Err(KvError::Decode(format!(
            "framed payload: count {} exceeds available bytes {}",
            count,
            buf.remaining()
        )));
    }

    let mut elements = Vec::with_capacity(count);
    for index in 0..count {
        if buf.remaining() < FRAME_HEADER_SIZE {
            return Err(KvError::Decode(format!(
                "framed payload: element {} missing length",
                index
            )));
        }
        let len = buf.get_u32() as usize;
        if buf.remaining() < len {
            return Err(KvError::Decode(format!(
                "framed payload: element {} truncated (expected {}, got {})",
                index,
                len,
                buf.remaining()
            )));
        }
        let (element, rest) = buf.split_at(len);
        elements.push(element);
        buf = rest;
    }

    if buf.has_remaining() {
        return Err(KvError::Decode(format!(
            "framed payload: {} trailing bytes",
            buf.remaining()
        )));
    }
    Ok(elements)
}
