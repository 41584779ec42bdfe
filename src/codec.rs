//! The field codec: per-format encode and decode over an offset-addressed
//! payload region, plus the `MessageCodec` front door tying a validated
//! message template to its builder, parser, and printable walks.
//!
//! Decode threads one running offset through the field list in declaration
//! order. Each format advances the offset by its fixed-region footprint only;
//! out-of-line data is reached through the offsets stored in that footprint
//! and never advances the cursor.

use std::collections::HashMap;

use thiserror::Error;

use crate::builder;
use crate::parser::{self, FieldSelection, ParsedFields};
use crate::printable;
use crate::schema::{FieldFormat, Message, Schema, VariantKind};
use crate::tlv::Tlv;
use crate::validate::{
    CompiledField, CompiledMessage, CompiledSchema, CompiledStruct, SchemaError,
};
use crate::value::{FieldView, StructValue, Value};
use crate::wire::{self, PayloadBuilder};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Truncated {what} at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Invalid string data: {0}")]
    InvalidString(String),
    #[error("Unknown struct '{0}'")]
    UnknownStruct(String),
    #[error("Failed to decode field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: Box<CodecError>,
    },
}

impl CodecError {
    pub(crate) fn in_field(self, field: &str) -> CodecError {
        CodecError::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

/// Values of always-read fields decoded so far in the current field list,
/// indexed by field position. Size and presence sources land here.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    values: Vec<Option<u32>>,
}

impl DecodeContext {
    pub fn new(len: usize) -> Self {
        DecodeContext {
            values: vec![None; len],
        }
    }

    pub fn set(&mut self, index: usize, value: u32) {
        self.values[index] = Some(value);
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.values[index]
    }
}

fn element_count(field: &CompiledField, ctx: &DecodeContext) -> Result<usize, CodecError> {
    let index = field.size_ref.ok_or_else(|| {
        CodecError::InvalidMessage(format!("field '{}' has no size source", field.spec.name))
    })?;
    ctx.get(index).map(|v| v as usize).ok_or_else(|| {
        CodecError::InvalidMessage(format!(
            "size source for field '{}' was not decoded",
            field.spec.name
        ))
    })
}

/// Element counts come off the wire; never reserve more than the payload
/// could possibly hold (every counted element occupies at least 4 bytes).
fn capped_capacity(count: usize, payload_len: usize) -> usize {
    count.min(payload_len / 4)
}

fn lookup_struct<'s>(
    schema: &'s CompiledSchema,
    field: &CompiledField,
) -> Result<&'s CompiledStruct, CodecError> {
    let name = field.spec.struct_type.as_deref().ok_or_else(|| {
        CodecError::InvalidMessage(format!("field '{}' has no struct type", field.spec.name))
    })?;
    schema
        .get(name)
        .ok_or_else(|| CodecError::UnknownStruct(name.to_string()))
}

/// Decode one nested struct at `base`. Returns the interior values and the
/// bytes consumed by the struct's fixed part.
pub fn decode_struct_value(
    payload: &[u8],
    schema: &CompiledSchema,
    def: &CompiledStruct,
    base: usize,
) -> Result<(StructValue, usize), CodecError> {
    let mut ctx = DecodeContext::new(def.fields.fields.len());
    let mut offset = base;
    let mut out = StructValue::new();
    for (i, field) in def.fields.fields.iter().enumerate() {
        let view = decode_field(payload, schema, field, &ctx, base, &mut offset)
            .map_err(|e| e.in_field(&field.spec.name))?;
        if field.always_read {
            if let Some(v) = view.as_u32() {
                ctx.set(i, v);
            }
        }
        if let Some(value) = view.to_value() {
            out.insert(field.spec.name.clone(), value);
        }
    }
    Ok((out, offset - base))
}

/// Decode one field at the running offset. `base` is the absolute payload
/// offset the field list's stored offsets are relative to (0 at message
/// level, the struct's own start inside a nested struct).
pub fn decode_field<'a>(
    payload: &'a [u8],
    schema: &CompiledSchema,
    field: &CompiledField,
    ctx: &DecodeContext,
    base: usize,
    offset: &mut usize,
) -> Result<FieldView<'a>, CodecError> {
    if let Some(cond) = &field.cond {
        let lhs = ctx.get(cond.index).ok_or_else(|| {
            CodecError::InvalidMessage(format!(
                "presence source for field '{}' was not decoded",
                field.spec.name
            ))
        })?;
        if !cond.op.eval(lhs, cond.value) {
            return Ok(FieldView::Absent);
        }
    }

    match &field.spec.format {
        FieldFormat::Uint16 => {
            let v = wire::read_u16(payload, *offset)?;
            *offset += 2;
            Ok(FieldView::U16(v))
        }
        FieldFormat::Uint32 => {
            let v = wire::read_u32(payload, *offset)?;
            *offset += 4;
            Ok(FieldView::U32(v))
        }
        FieldFormat::Uint64 => {
            let v = wire::read_u64(payload, *offset)?;
            *offset += 8;
            Ok(FieldView::U64(v))
        }
        FieldFormat::Uuid => {
            let v = wire::read_uuid(payload, *offset)?;
            *offset += 16;
            Ok(FieldView::Uuid(v))
        }
        FieldFormat::ByteArray => {
            let size = field.spec.array_size.unwrap_or(0) as usize;
            let bytes = wire::slice(payload, *offset, size, "byte array")?;
            *offset += size;
            Ok(FieldView::Bytes(bytes))
        }
        FieldFormat::UnsizedByteArray => {
            if *offset > payload.len() {
                return Err(CodecError::Truncated {
                    what: "unsized byte array",
                    offset: *offset,
                    needed: 0,
                    available: 0,
                });
            }
            let bytes = &payload[*offset..];
            *offset = payload.len();
            Ok(FieldView::Bytes(bytes))
        }
        FieldFormat::RefByteArray => {
            let rel = wire::read_u32(payload, *offset)? as usize;
            let size = wire::read_u32(payload, *offset + 4)? as usize;
            *offset += 8;
            if size == 0 {
                return Ok(FieldView::Bytes(&[]));
            }
            Ok(FieldView::Bytes(wire::slice(
                payload,
                base + rel,
                size,
                "ref byte array data",
            )?))
        }
        FieldFormat::UiccRefByteArray => {
            let size = wire::read_u32(payload, *offset)? as usize;
            let rel = wire::read_u32(payload, *offset + 4)? as usize;
            *offset += 8;
            if size == 0 {
                return Ok(FieldView::Bytes(&[]));
            }
            Ok(FieldView::Bytes(wire::slice(
                payload,
                base + rel,
                size,
                "uicc ref byte array data",
            )?))
        }
        FieldFormat::RefByteArrayNoOffset => {
            let size = wire::read_u32(payload, *offset)? as usize;
            let bytes = wire::slice(payload, *offset + 4, size, "length-prefixed byte array")?;
            *offset += 4;
            Ok(FieldView::Bytes(bytes))
        }
        FieldFormat::String => {
            let rel = wire::read_u32(payload, *offset)? as usize;
            let size = wire::read_u32(payload, *offset + 4)? as usize;
            *offset += 8;
            if rel == 0 || size == 0 {
                return Ok(FieldView::Str(String::new()));
            }
            let text = wire::read_string_data(payload, base + rel, size, field.spec.encoding)?;
            Ok(FieldView::Str(text))
        }
        FieldFormat::StringArray => {
            let count = element_count(field, ctx)?;
            let mut items = Vec::with_capacity(capped_capacity(count, payload.len()));
            for _ in 0..count {
                let rel = wire::read_u32(payload, *offset)? as usize;
                let size = wire::read_u32(payload, *offset + 4)? as usize;
                *offset += 8;
                if rel == 0 || size == 0 {
                    items.push(String::new());
                } else {
                    items.push(wire::read_string_data(
                        payload,
                        base + rel,
                        size,
                        field.spec.encoding,
                    )?);
                }
            }
            Ok(FieldView::StrArray(items))
        }
        FieldFormat::Uint32Array => {
            let count = element_count(field, ctx)?;
            let mut items = Vec::with_capacity(capped_capacity(count, payload.len()));
            for _ in 0..count {
                items.push(wire::read_u32(payload, *offset)?);
                *offset += 4;
            }
            Ok(FieldView::U32Array(items))
        }
        FieldFormat::Struct => {
            let def = lookup_struct(schema, field)?;
            let (value, consumed) = decode_struct_value(payload, schema, def, *offset)?;
            *offset += consumed;
            Ok(FieldView::Struct(value))
        }
        FieldFormat::MsStruct => {
            let rel = wire::read_u32(payload, *offset)? as usize;
            *offset += 8;
            if rel == 0 {
                return Ok(FieldView::MsStruct(None));
            }
            let def = lookup_struct(schema, field)?;
            let (value, _) = decode_struct_value(payload, schema, def, base + rel)?;
            Ok(FieldView::MsStruct(Some(value)))
        }
        FieldFormat::StructArray => {
            let rel = wire::read_u32(payload, *offset)? as usize;
            *offset += 4;
            let count = element_count(field, ctx)?;
            let def = lookup_struct(schema, field)?;
            let stride = def.fixed_size.ok_or_else(|| {
                CodecError::InvalidMessage(format!("struct '{}' has no fixed wire size", def.name))
            })? as usize;
            let mut items = Vec::with_capacity(capped_capacity(count, payload.len()));
            for i in 0..count {
                let (value, _) = decode_struct_value(payload, schema, def, base + rel + i * stride)?;
                items.push(value);
            }
            Ok(FieldView::StructArray(items))
        }
        FieldFormat::RefStructArray => {
            let count = element_count(field, ctx)?;
            let def = lookup_struct(schema, field)?;
            let mut items = Vec::with_capacity(capped_capacity(count, payload.len()));
            for _ in 0..count {
                let rel = wire::read_u32(payload, *offset)? as usize;
                *offset += 8;
                let (value, _) = decode_struct_value(payload, schema, def, base + rel)?;
                items.push(value);
            }
            Ok(FieldView::StructArray(items))
        }
        FieldFormat::MsStructArray => {
            let rel = wire::read_u32(payload, *offset)? as usize;
            *offset += 8;
            if rel == 0 {
                return Ok(FieldView::MsStructArray(None));
            }
            let def = lookup_struct(schema, field)?;
            let count = wire::read_u32(payload, base + rel)? as usize;
            let mut cursor = base + rel + 4;
            let mut items = Vec::with_capacity(capped_capacity(count, payload.len()));
            for _ in 0..count {
                let (value, consumed) = decode_struct_value(payload, schema, def, cursor)?;
                cursor += consumed;
                items.push(value);
            }
            Ok(FieldView::MsStructArray(Some(items)))
        }
        FieldFormat::RefIpv4 => {
            let rel = wire::read_u32(payload, *offset)? as usize;
            *offset += 4;
            if rel == 0 {
                return Ok(FieldView::Ipv4(None));
            }
            Ok(FieldView::Ipv4(Some(wire::read_ipv4(payload, base + rel)?)))
        }
        FieldFormat::RefIpv6 => {
            let rel = wire::read_u32(payload, *offset)? as usize;
            *offset += 4;
            if rel == 0 {
                return Ok(FieldView::Ipv6(None));
            }
            Ok(FieldView::Ipv6(Some(wire::read_ipv6(payload, base + rel)?)))
        }
        FieldFormat::Ipv4Array => {
            let rel = wire::read_u32(payload, *offset)? as usize;
            *offset += 4;
            let count = element_count(field, ctx)?;
            let mut items = Vec::with_capacity(capped_capacity(count, payload.len()));
            for i in 0..count {
                items.push(wire::read_ipv4(payload, base + rel + i * 4)?);
            }
            Ok(FieldView::Ipv4Array(items))
        }
        FieldFormat::Ipv6Array => {
            let rel = wire::read_u32(payload, *offset)? as usize;
            *offset += 4;
            let count = element_count(field, ctx)?;
            let mut items = Vec::with_capacity(capped_capacity(count, payload.len()));
            for i in 0..count {
                items.push(wire::read_ipv6(payload, base + rel + i * 16)?);
            }
            Ok(FieldView::Ipv6Array(items))
        }
        FieldFormat::Tlv => {
            let (tlv, consumed) = Tlv::from_raw(tail(payload, *offset)?)?;
            *offset += consumed;
            Ok(FieldView::Tlv(tlv))
        }
        FieldFormat::TlvString => {
            let (tlv, consumed) = Tlv::from_raw(tail(payload, *offset)?)?;
            *offset += consumed;
            Ok(FieldView::TlvString(tlv.string()?))
        }
        FieldFormat::TlvUint16Array => {
            let (tlv, consumed) = Tlv::from_raw(tail(payload, *offset)?)?;
            *offset += consumed;
            Ok(FieldView::TlvU16Array(tlv.u16_array()))
        }
        FieldFormat::TlvList => {
            let mut items = Vec::new();
            while *offset < payload.len() {
                let (tlv, consumed) = Tlv::from_raw(&payload[*offset..])?;
                *offset += consumed;
                items.push(tlv);
            }
            Ok(FieldView::TlvList(items))
        }
    }
}

fn tail(payload: &[u8], offset: usize) -> Result<&[u8], CodecError> {
    payload.get(offset..).ok_or(CodecError::Truncated {
        what: "tlv record",
        offset,
        needed: crate::tlv::TLV_HEADER_SIZE,
        available: 0,
    })
}

/// Serialize a nested struct into a standalone byte block whose internal
/// offsets are relative to the block start.
pub fn encode_struct_value(
    schema: &CompiledSchema,
    def: &CompiledStruct,
    values: &StructValue,
) -> Vec<u8> {
    let mut builder = PayloadBuilder::new();
    for field in &def.fields.fields {
        encode_field(&mut builder, schema, field, values.get(&field.spec.name));
    }
    builder.complete()
}

/// Encode one field into the payload under construction. Missing values fall
/// back to the format's zero/empty default; conditional fields the caller
/// omitted are skipped entirely.
pub fn encode_field(
    builder: &mut PayloadBuilder,
    schema: &CompiledSchema,
    field: &CompiledField,
    value: Option<&Value>,
) {
    if field.cond.is_some() && value.is_none() {
        return;
    }

    match &field.spec.format {
        FieldFormat::Uint16 => {
            builder.append_u16(value.and_then(Value::as_u16).unwrap_or(0));
        }
        FieldFormat::Uint32 => {
            builder.append_u32(value.and_then(Value::as_u32).unwrap_or(0));
        }
        FieldFormat::Uint64 => {
            builder.append_u64(value.and_then(Value::as_u64).unwrap_or(0));
        }
        FieldFormat::Uuid => {
            let uuid = match value {
                Some(Value::Uuid(u)) => *u,
                _ => uuid::Uuid::nil(),
            };
            builder.append_uuid(&uuid);
        }
        FieldFormat::ByteArray => {
            let data = value.and_then(Value::as_bytes).unwrap_or(&[]);
            let size = field.spec.array_size.unwrap_or(0) as usize;
            if field.spec.pad_array {
                builder.append_raw_padded(data, size);
            } else {
                builder.append_raw(data);
            }
        }
        FieldFormat::UnsizedByteArray => {
            builder.append_raw(value.and_then(Value::as_bytes).unwrap_or(&[]));
            if field.spec.pad_array {
                builder.pad_fixed();
            }
        }
        FieldFormat::RefByteArray => {
            builder.append_bytes_ref(
                value.and_then(Value::as_bytes).unwrap_or(&[]),
                field.spec.pad_array,
            );
        }
        FieldFormat::UiccRefByteArray => {
            builder.append_bytes_ref_swapped(
                value.and_then(Value::as_bytes).unwrap_or(&[]),
                field.spec.pad_array,
            );
        }
        FieldFormat::RefByteArrayNoOffset => {
            builder.append_bytes_len_prefixed(
                value.and_then(Value::as_bytes).unwrap_or(&[]),
                field.spec.pad_array,
            );
        }
        FieldFormat::String => {
            builder.append_string(
                value.and_then(Value::as_str).unwrap_or(""),
                field.spec.encoding,
            );
        }
        FieldFormat::StringArray => {
            if let Some(Value::StrArray(items)) = value {
                for item in items {
                    builder.append_string(item, field.spec.encoding);
                }
            }
        }
        FieldFormat::Uint32Array => {
            if let Some(Value::U32Array(items)) = value {
                for &item in items {
                    builder.append_u32(item);
                }
            }
        }
        FieldFormat::Struct => {
            let empty = StructValue::new();
            let interior = value.and_then(Value::as_struct).unwrap_or(&empty);
            if let Some(def) = field
                .spec
                .struct_type
                .as_deref()
                .and_then(|name| schema.get(name))
            {
                builder.append_raw(&encode_struct_value(schema, def, interior));
            }
        }
        FieldFormat::MsStruct => {
            let def = field
                .spec
                .struct_type
                .as_deref()
                .and_then(|name| schema.get(name));
            match (value.and_then(Value::as_struct), def) {
                (Some(interior), Some(def)) => {
                    let block = encode_struct_value(schema, def, interior);
                    builder.append_offset_fixup();
                    builder.append_u32(block.len() as u32);
                    builder.append_variable(&block);
                    builder.pad_variable();
                }
                _ => {
                    builder.append_u32(0);
                    builder.append_u32(0);
                }
            }
        }
        FieldFormat::StructArray => {
            let def = field
                .spec
                .struct_type
                .as_deref()
                .and_then(|name| schema.get(name));
            match (value, def) {
                (Some(Value::StructArray(items)), Some(def)) if !items.is_empty() => {
                    builder.append_offset_fixup();
                    for item in items {
                        let block = encode_struct_value(schema, def, item);
                        builder.append_variable(&block);
                    }
                }
                _ => builder.append_u32(0),
            }
        }
        FieldFormat::RefStructArray => {
            let def = field
                .spec
                .struct_type
                .as_deref()
                .and_then(|name| schema.get(name));
            if let (Some(Value::StructArray(items)), Some(def)) = (value, def) {
                for item in items {
                    let block = encode_struct_value(schema, def, item);
                    builder.append_offset_fixup();
                    builder.append_u32(block.len() as u32);
                    builder.append_variable(&block);
                    builder.pad_variable();
                }
            }
        }
        FieldFormat::MsStructArray => {
            let def = field
                .spec
                .struct_type
                .as_deref()
                .and_then(|name| schema.get(name));
            match (value, def) {
                (Some(Value::StructArray(items)), Some(def)) => {
                    let mut block = (items.len() as u32).to_le_bytes().to_vec();
                    for item in items {
                        block.extend_from_slice(&encode_struct_value(schema, def, item));
                    }
                    builder.append_offset_fixup();
                    builder.append_u32(block.len() as u32);
                    builder.append_variable(&block);
                    builder.pad_variable();
                }
                _ => {
                    builder.append_u32(0);
                    builder.append_u32(0);
                }
            }
        }
        FieldFormat::RefIpv4 => {
            let addr = match value {
                Some(Value::Ipv4(a)) => Some(*a),
                _ => None,
            };
            builder.append_ipv4_ref(addr);
        }
        FieldFormat::RefIpv6 => {
            let addr = match value {
                Some(Value::Ipv6(a)) => Some(*a),
                _ => None,
            };
            builder.append_ipv6_ref(addr);
        }
        FieldFormat::Ipv4Array => match value {
            Some(Value::Ipv4Array(items)) if !items.is_empty() => {
                builder.append_offset_fixup();
                for addr in items {
                    builder.append_variable(&addr.octets());
                }
            }
            _ => builder.append_u32(0),
        },
        FieldFormat::Ipv6Array => match value {
            Some(Value::Ipv6Array(items)) if !items.is_empty() => {
                builder.append_offset_fixup();
                for addr in items {
                    builder.append_variable(&addr.octets());
                }
            }
            _ => builder.append_u32(0),
        },
        FieldFormat::Tlv | FieldFormat::TlvString | FieldFormat::TlvUint16Array => {
            let record = match value {
                Some(Value::Tlv(t)) => t.clone(),
                Some(Value::Str(s)) => Tlv::new_string(0, s),
                _ => Tlv::new(0, Vec::new()),
            };
            let mut block = Vec::with_capacity(record.wire_size());
            record.write_to(&mut block);
            builder.append_raw(&block);
        }
        FieldFormat::TlvList => {
            if let Some(Value::TlvList(items)) = value {
                let mut block = Vec::new();
                for item in items {
                    item.write_to(&mut block);
                }
                builder.append_raw(&block);
            }
        }
    }
}

/// One validated message template with its struct registry: the front door
/// for building commands, parsing responses and notifications, and rendering
/// diagnostic text.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    message: CompiledMessage,
    schema: CompiledSchema,
}

impl MessageCodec {
    pub fn new(message: &Message, schema: &Schema) -> Result<Self, SchemaError> {
        Ok(MessageCodec {
            schema: CompiledSchema::compile(schema)?,
            message: CompiledMessage::compile(message, schema)?,
        })
    }

    pub fn message(&self) -> &CompiledMessage {
        &self.message
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    /// Build a complete command message from a value-per-field map. `kind`
    /// must name a declared query or set variant.
    pub fn build(
        &self,
        kind: VariantKind,
        transaction_id: u32,
        values: &HashMap<String, Value>,
    ) -> Result<Vec<u8>, CodecError> {
        builder::build_command(&self.message, &self.schema, kind, transaction_id, values)
    }

    /// Parse a message buffer against a declared variant, returning the
    /// selected fields.
    pub fn parse<'a>(
        &self,
        buffer: &'a [u8],
        kind: VariantKind,
        selection: FieldSelection<'_>,
    ) -> Result<ParsedFields<'a>, CodecError> {
        parser::parse(&self.message, &self.schema, buffer, kind, selection)
    }

    /// Render a message buffer as human-readable diagnostic text. Decode
    /// failures degrade to an inline note rather than an error.
    pub fn printable(&self, buffer: &[u8], kind: VariantKind, line_prefix: &str) -> String {
        printable::printable(&self.message, &self.schema, buffer, kind, line_prefix)
    }
}
