//! # wirecmd — schema-driven codec for binary modem control messages
//!
//! Message templates are declared as ordered field lists, validated once,
//! and then drive three runtime artifacts per variant:
//!
//! - **builder**: typed values in, complete command buffer out
//! - **parser**: message buffer in, typed field values out
//! - **formatter**: message buffer in, human-readable diagnostic text out
//!
//! ## Wire model
//!
//! The payload region is offset-addressed: scalars and offset/length headers
//! sit in a fixed part in declaration order, while strings, referenced byte
//! arrays, and indirected structs live out-of-line behind offsets relative to
//! the payload start. All integers are little-endian.
//!
//! ## Field formats
//!
//! - Integers: `uint16`, `uint32`, `uint64`, plus `uuid`
//! - Byte arrays: fixed inline, unsized tail, offset/length referenced
//!   (plain, swapped header, length-prefixed)
//! - Strings: UTF-16LE or UTF-8, single or counted arrays
//! - Structs: inline, offset/size indirected (`ms-struct` family), and
//!   fixed-stride or per-element referenced arrays
//! - Addresses: referenced IPv4/IPv6 and counted address arrays
//! - TLV: single records, typed string/u16-array views, and trailing lists
//!
//! ## Usage
//!
//! ```no_run
//! use std::collections::HashMap;
//! use uuid::Uuid;
//! use wirecmd::{
//!     FieldFormat, FieldSpec, FieldSelection, Message, MessageCodec,
//!     MessageVariant, Schema, Value, VariantKind,
//! };
//!
//! let service = Uuid::from_bytes([0xa2; 16]);
//! let message = Message::new(service, 4, "Connect").with_set(MessageVariant::new(
//!     "1.0",
//!     vec![
//!         FieldSpec::new("SessionId", FieldFormat::Uint32),
//!         FieldSpec::new("AccessString", FieldFormat::String),
//!     ],
//! ));
//! let codec = MessageCodec::new(&message, &Schema::new()).unwrap();
//!
//! let mut values = HashMap::new();
//! values.insert("SessionId".to_string(), Value::U32(1));
//! values.insert("AccessString".to_string(), Value::Str("internet".to_string()));
//! let raw = codec.build(VariantKind::Set, 1, &values).unwrap();
//!
//! let parsed = codec.parse(&raw, VariantKind::Set, FieldSelection::All).unwrap();
//! assert_eq!(parsed.get("SessionId").and_then(|v| v.as_u32()), Some(1));
//! ```

pub mod builder;
pub mod codec;
pub mod parser;
pub mod printable;
pub mod schema;
pub mod tlv;
pub mod validate;
pub mod value;
pub mod wire;

pub use codec::{CodecError, DecodeContext, MessageCodec};
pub use parser::{FieldSelection, ParsedFields};
pub use printable::{set_show_personal_info, show_personal_info};
pub use schema::{
    CondOp, Condition, FieldFormat, FieldSpec, Message, MessageVariant, PublicType, Schema,
    StringEncoding, StructDef, VariantKind,
};
pub use tlv::Tlv;
pub use validate::{CompiledMessage, CompiledSchema, SchemaError};
pub use value::{FieldView, StructValue, Value};
pub use wire::{MessageView, PayloadBuilder};
