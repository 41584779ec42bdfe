//! Schema validation and compilation.
//!
//! Runs once per message template, before any encode or decode. Cross-field
//! name references are resolved to list indices here so the codec never does
//! name lookups on the hot path, and every field targeted by a size or
//! presence reference is marked always-read.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::schema::{
    CondOp, FieldFormat, FieldSpec, Message, Schema, VariantKind,
};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Field '{field}' requires a struct type")]
    MissingStructType { field: String },
    #[error("Field '{field}' references unknown struct '{struct_type}'")]
    UnknownStruct { field: String, struct_type: String },
    #[error("Field '{field}' requires a literal array size")]
    MissingArraySize { field: String },
    #[error("Field '{field}' requires an array size field")]
    MissingArraySizeField { field: String },
    #[error("Field '{field}' references '{target}', which does not appear earlier in the list")]
    UnresolvedReference { field: String, target: String },
    #[error("Field '{field}' references '{target}' as a size or presence source, but '{target}' is not a uint32")]
    ReferenceNotUint32 { field: String, target: String },
    #[error("Field '{field}' references '{target}' as a size or presence source, but '{target}' is conditionally present")]
    ConditionalDependency { field: String, target: String },
    #[error("Message '{message}' declares a {kind} variant without a since version")]
    MissingSince { message: String, kind: &'static str },
    #[error("Field '{field}' is a struct-array of '{struct_type}', which has no fixed wire size")]
    VariableSizeStructInArray { field: String, struct_type: String },
    #[error("Duplicate struct name: {0}")]
    DuplicateStruct(String),
}

/// Compiled presence predicate: index of the source field in the same list.
#[derive(Debug, Clone)]
pub struct CompiledCond {
    pub index: usize,
    pub op: CondOp,
    pub value: u32,
}

/// One validated field with its resolved cross-references.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub spec: FieldSpec,
    /// Decoded and retained even when the caller did not select this field.
    pub always_read: bool,
    /// Index of the field carrying this field's element count.
    pub size_ref: Option<usize>,
    pub cond: Option<CompiledCond>,
}

/// An ordered, validated field list. Wire layout is declaration order.
#[derive(Debug, Clone, Default)]
pub struct CompiledFields {
    pub fields: Vec<CompiledField>,
}

impl CompiledFields {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledStruct {
    pub name: String,
    pub fields: CompiledFields,
    /// Total inline size when every field is fixed-width, `None` otherwise.
    pub fixed_size: Option<u32>,
}

/// Validated struct registry shared by every message of a schema.
#[derive(Debug, Clone, Default)]
pub struct CompiledSchema {
    structs: Vec<CompiledStruct>,
    by_name: HashMap<String, usize>,
}

impl CompiledSchema {
    pub fn compile(schema: &Schema) -> Result<Self, SchemaError> {
        let mut compiled = CompiledSchema::default();
        // Two passes so struct fields can reference structs defined later.
        for def in &schema.structs {
            if compiled
                .by_name
                .insert(def.name.clone(), compiled.structs.len())
                .is_some()
            {
                return Err(SchemaError::DuplicateStruct(def.name.clone()));
            }
            compiled.structs.push(CompiledStruct {
                name: def.name.clone(),
                fields: CompiledFields::default(),
                fixed_size: None,
            });
        }
        for (i, def) in schema.structs.iter().enumerate() {
            let fields = compile_field_list(&def.fields, schema)?;
            compiled.structs[i].fields = fields;
        }
        for i in 0..compiled.structs.len() {
            compiled.structs[i].fixed_size =
                struct_fixed_size(&schema.structs[i].fields, schema);
        }
        Ok(compiled)
    }

    pub fn get(&self, name: &str) -> Option<&CompiledStruct> {
        self.by_name.get(name).map(|&i| &self.structs[i])
    }
}

/// Inline wire size of a struct whose fields are all fixed-width.
fn struct_fixed_size(fields: &[FieldSpec], schema: &Schema) -> Option<u32> {
    let mut total = 0u32;
    for field in fields {
        let size = match &field.format {
            FieldFormat::Struct => {
                let def = schema.get_struct(field.struct_type.as_deref()?)?;
                struct_fixed_size(&def.fields, schema)?
            }
            other => other.fixed_wire_size(field.array_size)?,
        };
        total = total.checked_add(size)?;
    }
    Some(total)
}

fn resolve_earlier<'a>(
    fields: &'a [FieldSpec],
    upto: usize,
    field: &str,
    target: &str,
) -> Result<usize, SchemaError> {
    fields[..upto]
        .iter()
        .position(|f| f.name == target)
        .ok_or_else(|| SchemaError::UnresolvedReference {
            field: field.to_string(),
            target: target.to_string(),
        })
}

/// Validate one ordered field list and resolve its cross-references.
pub fn compile_field_list(
    fields: &[FieldSpec],
    schema: &Schema,
) -> Result<CompiledFields, SchemaError> {
    let mut always_read = vec![false; fields.len()];
    let mut size_refs = vec![None; fields.len()];
    let mut conds: Vec<Option<CompiledCond>> = vec![None; fields.len()];

    for (i, field) in fields.iter().enumerate() {
        if field.format.requires_struct_type() {
            let struct_type =
                field
                    .struct_type
                    .as_deref()
                    .ok_or_else(|| SchemaError::MissingStructType {
                        field: field.name.clone(),
                    })?;
            let def = schema
                .get_struct(struct_type)
                .ok_or_else(|| SchemaError::UnknownStruct {
                    field: field.name.clone(),
                    struct_type: struct_type.to_string(),
                })?;
            if field.format == FieldFormat::StructArray
                && struct_fixed_size(&def.fields, schema).is_none()
            {
                return Err(SchemaError::VariableSizeStructInArray {
                    field: field.name.clone(),
                    struct_type: struct_type.to_string(),
                });
            }
        }

        if field.format == FieldFormat::ByteArray && field.array_size.is_none() {
            return Err(SchemaError::MissingArraySize {
                field: field.name.clone(),
            });
        }

        if field.format.requires_size_field() {
            let target =
                field
                    .array_size_field
                    .as_deref()
                    .ok_or_else(|| SchemaError::MissingArraySizeField {
                        field: field.name.clone(),
                    })?;
            let index = resolve_earlier(fields, i, &field.name, target)?;
            if fields[index].format != FieldFormat::Uint32 {
                return Err(SchemaError::ReferenceNotUint32 {
                    field: field.name.clone(),
                    target: target.to_string(),
                });
            }
            // Later layout depends on the source value, so it can never be
            // conditionally absent itself.
            if fields[index].available_if.is_some() {
                return Err(SchemaError::ConditionalDependency {
                    field: field.name.clone(),
                    target: target.to_string(),
                });
            }
            if !always_read[index] {
                debug!(field = %fields[index].name, "marking size source field always-read");
                always_read[index] = true;
            }
            size_refs[i] = Some(index);
        }

        if let Some(cond) = &field.available_if {
            let index = resolve_earlier(fields, i, &field.name, &cond.field)?;
            if fields[index].format != FieldFormat::Uint32 {
                return Err(SchemaError::ReferenceNotUint32 {
                    field: field.name.clone(),
                    target: cond.field.clone(),
                });
            }
            if fields[index].available_if.is_some() {
                return Err(SchemaError::ConditionalDependency {
                    field: field.name.clone(),
                    target: cond.field.clone(),
                });
            }
            if !always_read[index] {
                debug!(field = %fields[index].name, "marking presence source field always-read");
                always_read[index] = true;
            }
            conds[i] = Some(CompiledCond {
                index,
                op: cond.op,
                value: cond.value,
            });
        }
    }

    let compiled = fields
        .iter()
        .cloned()
        .zip(always_read)
        .zip(size_refs)
        .zip(conds)
        .map(|(((spec, always_read), size_ref), cond)| CompiledField {
            spec,
            always_read,
            size_ref,
            cond,
        })
        .collect();
    Ok(CompiledFields { fields: compiled })
}

#[derive(Debug, Clone)]
pub struct CompiledVariant {
    pub since: String,
    pub fields: CompiledFields,
}

/// A fully validated message template, ready for the builder, parser, and
/// printable walks.
#[derive(Debug, Clone)]
pub struct CompiledMessage {
    pub service: Uuid,
    pub cid: u32,
    pub name: String,
    query: Option<CompiledVariant>,
    set: Option<CompiledVariant>,
    response: Option<CompiledVariant>,
    notification: Option<CompiledVariant>,
}

impl CompiledMessage {
    pub fn compile(message: &Message, schema: &Schema) -> Result<Self, SchemaError> {
        let compile_variant =
            |kind: VariantKind| -> Result<Option<CompiledVariant>, SchemaError> {
                let variant = match message.variant(kind) {
                    Some(v) => v,
                    None => return Ok(None),
                };
                if variant.since.is_empty() {
                    return Err(SchemaError::MissingSince {
                        message: message.name.clone(),
                        kind: kind.as_str(),
                    });
                }
                let fields = compile_field_list(&variant.fields, schema)?;
                Ok(Some(CompiledVariant {
                    since: variant.since.clone(),
                    fields,
                }))
            };
        Ok(CompiledMessage {
            service: message.service,
            cid: message.cid,
            name: message.name.clone(),
            query: compile_variant(VariantKind::Query)?,
            set: compile_variant(VariantKind::Set)?,
            response: compile_variant(VariantKind::Response)?,
            notification: compile_variant(VariantKind::Notification)?,
        })
    }

    pub fn variant(&self, kind: VariantKind) -> Option<&CompiledVariant> {
        match kind {
            VariantKind::Query => self.query.as_ref(),
            VariantKind::Set => self.set.as_ref(),
            VariantKind::Response => self.response.as_ref(),
            VariantKind::Notification => self.notification.as_ref(),
        }
    }
}
