//! Human-readable rendering of message buffers for diagnostics and logs.
//!
//! The walk mirrors the parser exactly so the rendered offsets stay honest,
//! but failure is soft: a field that cannot be decoded appends an inline
//! `n/a: <reason>` note and the text produced so far is returned.

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::codec::{self, DecodeContext};
use crate::schema::{FieldSpec, PublicType, VariantKind};
use crate::tlv::Tlv;
use crate::validate::{CompiledMessage, CompiledSchema, CompiledStruct};
use crate::value::{FieldView, StructValue, Value};
use crate::wire::MessageView;

/// Fields tagged as personal information render as `'###'` unless this
/// toggle is enabled. Process-wide, like the log verbosity it accompanies.
static SHOW_PERSONAL_INFO: AtomicBool = AtomicBool::new(false);

pub fn set_show_personal_info(show: bool) {
    SHOW_PERSONAL_INFO.store(show, Ordering::Relaxed);
}

pub fn show_personal_info() -> bool {
    SHOW_PERSONAL_INFO.load(Ordering::Relaxed)
}

fn str_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

fn render_integer(value: u64, public_type: Option<&PublicType>) -> String {
    match public_type {
        Some(PublicType::Bool) => if value != 0 { "true" } else { "false" }.to_string(),
        Some(PublicType::Enum { values, .. }) => values
            .iter()
            .find(|(v, _)| u64::from(*v) == value)
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| value.to_string()),
        Some(PublicType::Flags { values, .. }) => {
            let mut names = Vec::new();
            let mut remaining = value;
            for (bit, name) in values {
                if u64::from(*bit) & value != 0 {
                    names.push(name.as_str());
                    remaining &= !u64::from(*bit);
                }
            }
            if names.is_empty() {
                "none".to_string()
            } else if remaining != 0 {
                format!("{}|0x{:x}", names.join("|"), remaining)
            } else {
                names.join("|")
            }
        }
        None => value.to_string(),
    }
}

fn render_tlv(tlv: &Tlv, line_prefix: &str) -> String {
    let mut out = String::new();
    out.push_str("{\n");
    let _ = writeln!(out, "{}  tlv type   = 0x{:04x}", line_prefix, tlv.tlv_type);
    let _ = writeln!(out, "{}  tlv data   = {}", line_prefix, str_hex(&tlv.data));
    let _ = write!(out, "{}}}", line_prefix);
    out
}

fn render_struct(
    schema: &CompiledSchema,
    def: &CompiledStruct,
    values: &StructValue,
    line_prefix: &str,
) -> String {
    let mut out = String::new();
    let show = show_personal_info();
    for field in &def.fields.fields {
        let _ = write!(out, "{}  {} = ", line_prefix, field.spec.name);
        if let Some(value) = values.get(&field.spec.name) {
            if field.spec.personal_info && !show {
                out.push_str("'###'");
            } else {
                out.push_str(&render_value(schema, &field.spec, value, line_prefix));
            }
        }
        out.push('\n');
    }
    out
}

fn render_struct_block(
    schema: &CompiledSchema,
    spec: &FieldSpec,
    values: &StructValue,
    line_prefix: &str,
) -> String {
    let def = match spec.struct_type.as_deref().and_then(|n| schema.get(n)) {
        Some(def) => def,
        None => return String::new(),
    };
    let inner_prefix = format!("{}    ", line_prefix);
    let mut out = String::new();
    out.push_str("{\n");
    out.push_str(&render_struct(schema, def, values, &inner_prefix));
    let _ = write!(out, "{}  }}", line_prefix);
    out
}

fn render_struct_array(
    schema: &CompiledSchema,
    spec: &FieldSpec,
    items: &[StructValue],
    line_prefix: &str,
) -> String {
    let def = match spec.struct_type.as_deref().and_then(|n| schema.get(n)) {
        Some(def) => def,
        None => return String::new(),
    };
    let inner_prefix = format!("{}        ", line_prefix);
    let mut out = String::new();
    out.push_str("'{\n");
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}    [{}] = {{", line_prefix, i);
        out.push_str(&render_struct(schema, def, item, &inner_prefix));
        let _ = writeln!(out, "{}    }},", line_prefix);
    }
    let _ = write!(out, "{}  }}'", line_prefix);
    out
}

/// Render an owned struct-interior value.
fn render_value(
    schema: &CompiledSchema,
    spec: &FieldSpec,
    value: &Value,
    line_prefix: &str,
) -> String {
    match value {
        Value::U16(v) => format!("'{}'", render_integer(u64::from(*v), spec.public_type.as_ref())),
        Value::U32(v) => format!("'{}'", render_integer(u64::from(*v), spec.public_type.as_ref())),
        Value::U64(v) => format!("'{}'", render_integer(*v, spec.public_type.as_ref())),
        Value::Uuid(u) => format!("'{}'", u),
        Value::Bytes(b) => format!("'{}'", str_hex(b)),
        Value::Str(s) => format!("'{}'", s),
        Value::StrArray(items) => format!("'{}'", items.join(", ")),
        Value::U32Array(items) => format!(
            "'{}'",
            items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Struct(m) => render_struct_block(schema, spec, m, line_prefix),
        Value::StructArray(items) => render_struct_array(schema, spec, items, line_prefix),
        Value::Ipv4(a) => format!("'{}'", a),
        Value::Ipv6(a) => format!("'{}'", a),
        Value::Ipv4Array(items) => format!(
            "'{}'",
            items
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Ipv6Array(items) => format!(
            "'{}'",
            items
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Tlv(t) => format!("'{}'", render_tlv(t, &format!("{}  ", line_prefix))),
        Value::TlvList(items) => render_tlv_list(items, line_prefix),
    }
}

fn render_tlv_list(items: &[Tlv], line_prefix: &str) -> String {
    let inner_prefix = format!("{}    ", line_prefix);
    let mut out = String::new();
    out.push_str("'[ ");
    for item in items {
        out.push_str(&render_tlv(item, &inner_prefix));
        out.push(',');
    }
    let _ = write!(out, "\n{}  ]'", line_prefix);
    out
}

fn render_view(
    schema: &CompiledSchema,
    spec: &FieldSpec,
    view: &FieldView<'_>,
    line_prefix: &str,
) -> String {
    match view {
        FieldView::Absent => String::new(),
        FieldView::U16(v) => format!("'{}'", render_integer(u64::from(*v), spec.public_type.as_ref())),
        FieldView::U32(v) => format!("'{}'", render_integer(u64::from(*v), spec.public_type.as_ref())),
        FieldView::U64(v) => format!("'{}'", render_integer(*v, spec.public_type.as_ref())),
        FieldView::Uuid(u) => format!("'{}'", u),
        FieldView::Bytes(b) => format!("'{}'", str_hex(b)),
        FieldView::Str(s) => format!("'{}'", s),
        FieldView::StrArray(items) => format!("'{}'", items.join(", ")),
        FieldView::U32Array(items) => format!(
            "'{}'",
            items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        FieldView::Struct(m) => render_struct_block(schema, spec, m, line_prefix),
        FieldView::MsStruct(m) => match m {
            Some(m) => render_struct_block(schema, spec, m, line_prefix),
            None => format!("{{\n{}  }}", line_prefix),
        },
        FieldView::StructArray(items) => render_struct_array(schema, spec, items, line_prefix),
        FieldView::MsStructArray(items) => {
            render_struct_array(schema, spec, items.as_deref().unwrap_or(&[]), line_prefix)
        }
        FieldView::Ipv4(a) => match a {
            Some(a) => format!("'{}'", a),
            None => "''".to_string(),
        },
        FieldView::Ipv6(a) => match a {
            Some(a) => format!("'{}'", a),
            None => "''".to_string(),
        },
        FieldView::Ipv4Array(items) => format!(
            "'{}'",
            items
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        FieldView::Ipv6Array(items) => format!(
            "'{}'",
            items
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        FieldView::Tlv(t) => format!("'{}'", render_tlv(t, &format!("{}  ", line_prefix))),
        FieldView::TlvString(s) => format!("'{}'", s),
        FieldView::TlvU16Array(items) => format!(
            "'{}'",
            items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        FieldView::TlvList(items) => render_tlv_list(items, line_prefix),
    }
}

/// Render one variant of a message buffer as indented diagnostic text, one
/// `Name = 'value'` line per field.
pub fn printable(
    message: &CompiledMessage,
    schema: &CompiledSchema,
    buffer: &[u8],
    kind: VariantKind,
    line_prefix: &str,
) -> String {
    let mut out = String::new();

    let variant = match message.variant(kind) {
        Some(v) => v,
        None => return out,
    };
    if variant.fields.is_empty() {
        return out;
    }

    let view = match MessageView::new(buffer) {
        Ok(v) => v,
        Err(e) => {
            let _ = write!(out, "n/a: {}", e);
            return out;
        }
    };
    let payload = match view.payload_region() {
        Some(p) => p,
        None => {
            out.push_str("n/a: Message does not have information buffer");
            return out;
        }
    };

    let show = show_personal_info();
    let mut ctx = DecodeContext::new(variant.fields.fields.len());
    let mut offset = 0usize;
    for (i, field) in variant.fields.fields.iter().enumerate() {
        let _ = write!(out, "{}  {} = ", line_prefix, field.spec.name);
        match codec::decode_field(payload, schema, field, &ctx, 0, &mut offset) {
            Ok(fview) => {
                if field.always_read {
                    if let Some(v) = fview.as_u32() {
                        ctx.set(i, v);
                    }
                }
                if !fview.is_absent() {
                    if field.spec.personal_info && !show {
                        out.push_str("'###'");
                    } else {
                        out.push_str(&render_view(schema, &field.spec, &fview, line_prefix));
                    }
                }
                out.push('\n');
            }
            Err(e) => {
                let _ = write!(out, "n/a: {}", e);
                return out;
            }
        }
    }
    out
}
