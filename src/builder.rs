//! Command building: walk a validated field list with caller values and wrap
//! the assembled payload in a message envelope.

use std::collections::HashMap;

use tracing::debug;

use crate::codec::{self, CodecError};
use crate::schema::VariantKind;
use crate::validate::{CompiledMessage, CompiledSchema};
use crate::value::Value;
use crate::wire::{self, PayloadBuilder, COMMAND_TYPE_QUERY, COMMAND_TYPE_SET};

fn assemble_payload(
    message: &CompiledMessage,
    schema: &CompiledSchema,
    kind: VariantKind,
    values: &HashMap<String, Value>,
) -> Result<Vec<u8>, CodecError> {
    let variant = message.variant(kind).ok_or_else(|| {
        CodecError::InvalidMessage(format!(
            "message '{}' has no {} variant",
            message.name,
            kind.as_str()
        ))
    })?;
    let mut builder = PayloadBuilder::new();
    for field in &variant.fields.fields {
        codec::encode_field(&mut builder, schema, field, values.get(&field.spec.name));
    }
    Ok(builder.complete())
}

/// Build a complete command message. `kind` selects the query or set field
/// list; fields are written in declaration order, and fields the caller did
/// not supply encode as their zero/empty default (conditional fields are
/// skipped instead).
pub fn build_command(
    message: &CompiledMessage,
    schema: &CompiledSchema,
    kind: VariantKind,
    transaction_id: u32,
    values: &HashMap<String, Value>,
) -> Result<Vec<u8>, CodecError> {
    let command_type = match kind {
        VariantKind::Query => COMMAND_TYPE_QUERY,
        VariantKind::Set => COMMAND_TYPE_SET,
        other => {
            return Err(CodecError::InvalidMessage(format!(
                "cannot build a command from the {} variant",
                other.as_str()
            )));
        }
    };
    let payload = assemble_payload(message, schema, kind, values)?;
    debug!(
        message = %message.name,
        kind = kind.as_str(),
        payload_len = payload.len(),
        "built command payload"
    );
    Ok(wire::command_new(
        transaction_id,
        &message.service,
        message.cid,
        command_type,
        &payload,
    ))
}

/// Build a command-done message carrying a status code, from the response
/// field list. Modems send these; building one locally is how loopback tests
/// and simulators produce inputs for the parser.
pub fn build_response(
    message: &CompiledMessage,
    schema: &CompiledSchema,
    transaction_id: u32,
    status: u32,
    values: &HashMap<String, Value>,
) -> Result<Vec<u8>, CodecError> {
    let payload = assemble_payload(message, schema, VariantKind::Response, values)?;
    Ok(wire::response_new(
        transaction_id,
        &message.service,
        message.cid,
        status,
        &payload,
    ))
}

/// Build an indication message from the notification field list.
pub fn build_notification(
    message: &CompiledMessage,
    schema: &CompiledSchema,
    transaction_id: u32,
    values: &HashMap<String, Value>,
) -> Result<Vec<u8>, CodecError> {
    let payload = assemble_payload(message, schema, VariantKind::Notification, values)?;
    Ok(wire::notification_new(
        transaction_id,
        &message.service,
        message.cid,
        &payload,
    ))
}
