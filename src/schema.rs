//! Message schema model: field specifications, variants, and the struct registry.

use std::collections::HashMap;

use uuid::Uuid;

use crate::validate::SchemaError;

/// Wire-shape tag of one schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFormat {
    Uint16,
    Uint32,
    Uint64,
    Uuid,
    /// Fixed-size inline byte array; size from `array_size`.
    ByteArray,
    /// Inline bytes until the end of the payload.
    UnsizedByteArray,
    /// Offset + length header, data out-of-line.
    RefByteArray,
    /// Length + offset header (swapped), data out-of-line.
    UiccRefByteArray,
    /// Length header only, data immediately after it.
    RefByteArrayNoOffset,
    String,
    StringArray,
    /// Inline u32 sequence, count from `array_size_field`.
    Uint32Array,
    Struct,
    /// Offset/size-indirected struct; may be legitimately absent.
    MsStruct,
    /// Inline sequence of fixed-size structs behind one offset header.
    StructArray,
    /// One offset/size entry per element.
    RefStructArray,
    /// Offset/size-indirected, self-reporting count; may be absent.
    MsStructArray,
    RefIpv4,
    Ipv4Array,
    RefIpv6,
    Ipv6Array,
    Tlv,
    TlvString,
    TlvUint16Array,
    TlvList,
}

impl FieldFormat {
    /// Formats whose element count comes from another field in the same list.
    pub fn requires_size_field(&self) -> bool {
        matches!(
            self,
            FieldFormat::StringArray
                | FieldFormat::Uint32Array
                | FieldFormat::StructArray
                | FieldFormat::RefStructArray
                | FieldFormat::Ipv4Array
                | FieldFormat::Ipv6Array
        )
    }

    /// Formats that reference a named struct definition.
    pub fn requires_struct_type(&self) -> bool {
        matches!(
            self,
            FieldFormat::Struct
                | FieldFormat::MsStruct
                | FieldFormat::StructArray
                | FieldFormat::RefStructArray
                | FieldFormat::MsStructArray
        )
    }

    /// Wire size of the field when it is fully inline and fixed, in bytes.
    /// `None` for formats with variable or out-of-line data. `array_size`
    /// must be supplied for `ByteArray`.
    pub fn fixed_wire_size(&self, array_size: Option<u32>) -> Option<u32> {
        match self {
            FieldFormat::Uint16 => Some(2),
            FieldFormat::Uint32 => Some(4),
            FieldFormat::Uint64 => Some(8),
            FieldFormat::Uuid => Some(16),
            FieldFormat::ByteArray => array_size,
            _ => None,
        }
    }
}

/// Wire text encoding for string formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// UTF-16 little-endian, the protocol default.
    #[default]
    Utf16,
    Utf8,
}

/// Comparison operator in an `available_if` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CondOp {
    pub fn eval(&self, lhs: u32, rhs: u32) -> bool {
        match self {
            CondOp::Eq => lhs == rhs,
            CondOp::Ne => lhs != rhs,
            CondOp::Lt => lhs < rhs,
            CondOp::Le => lhs <= rhs,
            CondOp::Gt => lhs > rhs,
            CondOp::Ge => lhs >= rhs,
        }
    }
}

/// Presence predicate: the field exists on the wire only if a previously
/// decoded field satisfies the comparison.
#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub op: CondOp,
    pub value: u32,
}

/// Semantic re-typing of an integer field for presentation.
#[derive(Debug, Clone)]
pub enum PublicType {
    Bool,
    Enum {
        name: String,
        values: Vec<(u32, String)>,
    },
    Flags {
        name: String,
        values: Vec<(u32, String)>,
    },
}

/// One declared field in a message variant or struct definition.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub format: FieldFormat,
    pub struct_type: Option<String>,
    /// Literal element count, for fixed-size byte arrays.
    pub array_size: Option<u32>,
    /// Cross-reference to an earlier u32 field carrying the element count.
    pub array_size_field: Option<String>,
    pub available_if: Option<Condition>,
    pub encoding: StringEncoding,
    pub public_type: Option<PublicType>,
    pub personal_info: bool,
    pub pad_array: bool,
}

impl FieldSpec {
    pub fn new(name: &str, format: FieldFormat) -> Self {
        FieldSpec {
            name: name.to_string(),
            format,
            struct_type: None,
            array_size: None,
            array_size_field: None,
            available_if: None,
            encoding: StringEncoding::default(),
            public_type: None,
            personal_info: false,
            pad_array: true,
        }
    }

    pub fn with_struct_type(mut self, struct_type: &str) -> Self {
        self.struct_type = Some(struct_type.to_string());
        self
    }

    pub fn with_array_size(mut self, size: u32) -> Self {
        self.array_size = Some(size);
        self
    }

    pub fn with_array_size_field(mut self, field: &str) -> Self {
        self.array_size_field = Some(field.to_string());
        self
    }

    pub fn with_available_if(mut self, field: &str, op: CondOp, value: u32) -> Self {
        self.available_if = Some(Condition {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    pub fn with_encoding(mut self, encoding: StringEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_public_type(mut self, public_type: PublicType) -> Self {
        self.public_type = Some(public_type);
        self
    }

    pub fn with_personal_info(mut self) -> Self {
        self.personal_info = true;
        self
    }

    pub fn with_pad_array(mut self, pad: bool) -> Self {
        self.pad_array = pad;
        self
    }
}

/// Reusable nested layout referenced by `struct_type`.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

/// Role of one field list within a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Query,
    Set,
    Response,
    Notification,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Query => "query",
            VariantKind::Set => "set",
            VariantKind::Response => "response",
            VariantKind::Notification => "notification",
        }
    }
}

/// One field list of a message, introduced at a specific protocol version.
#[derive(Debug, Clone)]
pub struct MessageVariant {
    /// Major protocol version where the variant was introduced, e.g. "1.0".
    pub since: String,
    pub fields: Vec<FieldSpec>,
}

impl MessageVariant {
    pub fn new(since: &str, fields: Vec<FieldSpec>) -> Self {
        MessageVariant {
            since: since.to_string(),
            fields,
        }
    }
}

/// A named message within a service: up to four independently versioned
/// field lists. Compile-time template, immutable once validated.
#[derive(Debug, Clone)]
pub struct Message {
    pub service: Uuid,
    pub cid: u32,
    /// May be empty for service-wide singleton messages.
    pub name: String,
    pub query: Option<MessageVariant>,
    pub set: Option<MessageVariant>,
    pub response: Option<MessageVariant>,
    pub notification: Option<MessageVariant>,
}

impl Message {
    pub fn new(service: Uuid, cid: u32, name: &str) -> Self {
        Message {
            service,
            cid,
            name: name.to_string(),
            query: None,
            set: None,
            response: None,
            notification: None,
        }
    }

    pub fn with_query(mut self, variant: MessageVariant) -> Self {
        self.query = Some(variant);
        self
    }

    pub fn with_set(mut self, variant: MessageVariant) -> Self {
        self.set = Some(variant);
        self
    }

    pub fn with_response(mut self, variant: MessageVariant) -> Self {
        self.response = Some(variant);
        self
    }

    pub fn with_notification(mut self, variant: MessageVariant) -> Self {
        self.notification = Some(variant);
        self
    }

    pub fn variant(&self, kind: VariantKind) -> Option<&MessageVariant> {
        match kind {
            VariantKind::Query => self.query.as_ref(),
            VariantKind::Set => self.set.as_ref(),
            VariantKind::Response => self.response.as_ref(),
            VariantKind::Notification => self.notification.as_ref(),
        }
    }
}

/// Struct definitions by name, shared by all messages of a schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub structs: Vec<StructDef>,
    structs_by_name: HashMap<String, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn add_struct(&mut self, def: StructDef) -> Result<(), SchemaError> {
        if self
            .structs_by_name
            .insert(def.name.clone(), self.structs.len())
            .is_some()
        {
            return Err(SchemaError::DuplicateStruct(def.name));
        }
        self.structs.push(def);
        Ok(())
    }

    pub fn get_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs_by_name.get(name).map(|&i| &self.structs[i])
    }
}
