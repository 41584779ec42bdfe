//! Runtime values: owned `Value` for encode inputs and struct interiors,
//! borrowed `FieldView` for parse outputs.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use uuid::Uuid;

use crate::tlv::Tlv;

/// Decoded interior of a nested struct. Struct fields are owned because the
/// struct itself is assembled from scattered wire regions.
pub type StructValue = HashMap<String, Value>;

/// Owned value, supplied by callers to the builder and produced when decoding
/// struct interiors and TLV records.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U16(u16),
    U32(u32),
    U64(u64),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Str(String),
    StrArray(Vec<String>),
    U32Array(Vec<u32>),
    Struct(StructValue),
    StructArray(Vec<StructValue>),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Ipv4Array(Vec<Ipv4Addr>),
    Ipv6Array(Vec<Ipv6Addr>),
    Tlv(Tlv),
    TlvList(Vec<Tlv>),
}

impl Value {
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Value::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            Value::U32(v) => Some(u64::from(*v)),
            Value::U16(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(m) => Some(m),
            _ => None,
        }
    }
}

/// Decoded field as seen by the parser: scalars and contiguous byte regions
/// borrow from the message buffer, everything assembled from scattered or
/// re-encoded wire data is owned.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldView<'a> {
    /// A conditional field whose predicate was false.
    Absent,
    U16(u16),
    U32(u32),
    U64(u64),
    Uuid(Uuid),
    Bytes(&'a [u8]),
    Str(String),
    StrArray(Vec<String>),
    U32Array(Vec<u32>),
    Struct(StructValue),
    MsStruct(Option<StructValue>),
    StructArray(Vec<StructValue>),
    MsStructArray(Option<Vec<StructValue>>),
    Ipv4(Option<Ipv4Addr>),
    Ipv6(Option<Ipv6Addr>),
    Ipv4Array(Vec<Ipv4Addr>),
    Ipv6Array(Vec<Ipv6Addr>),
    Tlv(Tlv),
    TlvString(String),
    TlvU16Array(Vec<u16>),
    TlvList(Vec<Tlv>),
}

impl<'a> FieldView<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldView::Absent)
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            FieldView::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldView::U64(v) => Some(*v),
            FieldView::U32(v) => Some(u64::from(*v)),
            FieldView::U16(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            FieldView::Bytes(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldView::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str_array(&self) -> Option<&[String]> {
        match self {
            FieldView::StrArray(v) => Some(v),
            _ => None,
        }
    }

    /// Detach the view into an owned `Value`, copying borrowed regions.
    /// `Absent` and the nullable forms with no payload map to `None`.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            FieldView::Absent => None,
            FieldView::U16(v) => Some(Value::U16(*v)),
            FieldView::U32(v) => Some(Value::U32(*v)),
            FieldView::U64(v) => Some(Value::U64(*v)),
            FieldView::Uuid(v) => Some(Value::Uuid(*v)),
            FieldView::Bytes(b) => Some(Value::Bytes(b.to_vec())),
            FieldView::Str(s) => Some(Value::Str(s.clone())),
            FieldView::StrArray(v) => Some(Value::StrArray(v.clone())),
            FieldView::U32Array(v) => Some(Value::U32Array(v.clone())),
            FieldView::Struct(m) => Some(Value::Struct(m.clone())),
            FieldView::MsStruct(m) => m.clone().map(Value::Struct),
            FieldView::StructArray(v) => Some(Value::StructArray(v.clone())),
            FieldView::MsStructArray(v) => v.clone().map(Value::StructArray),
            FieldView::Ipv4(a) => a.map(Value::Ipv4),
            FieldView::Ipv6(a) => a.map(Value::Ipv6),
            FieldView::Ipv4Array(v) => Some(Value::Ipv4Array(v.clone())),
            FieldView::Ipv6Array(v) => Some(Value::Ipv6Array(v.clone())),
            FieldView::Tlv(t) => Some(Value::Tlv(t.clone())),
            FieldView::TlvString(s) => Some(Value::Str(s.clone())),
            FieldView::TlvU16Array(v) => {
                Some(Value::U32Array(v.iter().map(|&x| u32::from(x)).collect()))
            }
            FieldView::TlvList(v) => Some(Value::TlvList(v.clone())),
        }
    }
}
