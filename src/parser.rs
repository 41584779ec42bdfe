//! Message parsing: envelope checks, then an ordered decode walk over the
//! payload region with a caller-chosen field selection.

use tracing::trace;

use crate::codec::{self, CodecError, DecodeContext};
use crate::schema::VariantKind;
use crate::validate::{CompiledMessage, CompiledSchema};
use crate::value::FieldView;
use crate::wire::{MessageView, COMMAND_TYPE_QUERY, COMMAND_TYPE_SET};

/// Which fields the caller wants back. Unselected fields are still decoded,
/// because later fields depend on the offset and size state they produce, but
/// their values are not retained.
#[derive(Debug, Clone, Copy)]
pub enum FieldSelection<'s> {
    All,
    Only(&'s [&'s str]),
}

impl<'s> FieldSelection<'s> {
    pub fn includes(&self, name: &str) -> bool {
        match self {
            FieldSelection::All => true,
            FieldSelection::Only(names) => names.contains(&name),
        }
    }
}

/// Decoded fields in declaration order. Conditional fields whose predicate
/// was false appear as `FieldView::Absent`.
#[derive(Debug, Default)]
pub struct ParsedFields<'a> {
    entries: Vec<(String, FieldView<'a>)>,
}

impl<'a> ParsedFields<'a> {
    pub fn get(&self, name: &str) -> Option<&FieldView<'a>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldView<'a>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_kind(view: &MessageView<'_>, kind: VariantKind) -> Result<(), CodecError> {
    let ok = match kind {
        VariantKind::Query => view.is_command() && view.command_type() == Some(COMMAND_TYPE_QUERY),
        VariantKind::Set => view.is_command() && view.command_type() == Some(COMMAND_TYPE_SET),
        VariantKind::Response => view.is_response(),
        VariantKind::Notification => view.is_notification(),
    };
    if ok {
        Ok(())
    } else {
        Err(CodecError::InvalidMessage(format!(
            "Message is not a {}",
            kind.as_str()
        )))
    }
}

/// Parse a complete message buffer against one declared variant of a
/// validated message. The first decode failure aborts the walk; any owned
/// values produced before the failure are dropped before the error returns.
pub fn parse<'a>(
    message: &CompiledMessage,
    schema: &CompiledSchema,
    buffer: &'a [u8],
    kind: VariantKind,
    selection: FieldSelection<'_>,
) -> Result<ParsedFields<'a>, CodecError> {
    let view = MessageView::new(buffer)?;
    check_kind(&view, kind)?;

    let variant = message.variant(kind).ok_or_else(|| {
        CodecError::InvalidMessage(format!(
            "message '{}' has no {} variant",
            message.name,
            kind.as_str()
        ))
    })?;
    if variant.fields.is_empty() {
        return Ok(ParsedFields::default());
    }

    let payload = view.payload_region().ok_or_else(|| {
        CodecError::InvalidMessage("Message does not have information buffer".to_string())
    })?;

    let mut ctx = DecodeContext::new(variant.fields.fields.len());
    let mut offset = 0usize;
    let mut out = ParsedFields::default();
    for (i, field) in variant.fields.fields.iter().enumerate() {
        let fview = codec::decode_field(payload, schema, field, &ctx, 0, &mut offset)
            .map_err(|e| e.in_field(&field.spec.name))?;
        if field.always_read {
            if let Some(v) = fview.as_u32() {
                ctx.set(i, v);
            }
        }
        trace!(field = %field.spec.name, offset, "decoded field");
        if selection.includes(&field.spec.name) {
            out.entries.push((field.spec.name.clone(), fview));
        }
    }
    Ok(out)
}
