//! Low-level wire access: bounds-checked reads over a payload region, the
//! two-region payload builder with offset fixups, and the message envelope.
//!
//! All integers are little-endian. Offsets stored on the wire are relative to
//! the start of the payload region (or, inside a nested struct, to the start
//! of that struct).

use std::net::{Ipv4Addr, Ipv6Addr};

use byteorder::{ByteOrder, LittleEndian};
use uuid::Uuid;

use crate::codec::CodecError;
use crate::schema::StringEncoding;

/// Bounds-checked sub-slice of a payload region.
pub fn slice<'a>(
    payload: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], CodecError> {
    let end = offset
        .checked_add(len)
        .ok_or(CodecError::Truncated {
            what,
            offset,
            needed: len,
            available: payload.len().saturating_sub(offset),
        })?;
    if end > payload.len() {
        return Err(CodecError::Truncated {
            what,
            offset,
            needed: len,
            available: payload.len().saturating_sub(offset),
        });
    }
    Ok(&payload[offset..end])
}

pub fn read_u16(payload: &[u8], offset: usize) -> Result<u16, CodecError> {
    Ok(LittleEndian::read_u16(slice(payload, offset, 2, "u16")?))
}

pub fn read_u32(payload: &[u8], offset: usize) -> Result<u32, CodecError> {
    Ok(LittleEndian::read_u32(slice(payload, offset, 4, "u32")?))
}

pub fn read_u64(payload: &[u8], offset: usize) -> Result<u64, CodecError> {
    Ok(LittleEndian::read_u64(slice(payload, offset, 8, "u64")?))
}

pub fn read_uuid(payload: &[u8], offset: usize) -> Result<Uuid, CodecError> {
    let raw = slice(payload, offset, 16, "uuid")?;
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(raw);
    Ok(Uuid::from_bytes(bytes))
}

pub fn read_ipv4(payload: &[u8], offset: usize) -> Result<Ipv4Addr, CodecError> {
    let raw = slice(payload, offset, 4, "ipv4 address")?;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(raw);
    Ok(Ipv4Addr::from(bytes))
}

pub fn read_ipv6(payload: &[u8], offset: usize) -> Result<Ipv6Addr, CodecError> {
    let raw = slice(payload, offset, 16, "ipv6 address")?;
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(raw);
    Ok(Ipv6Addr::from(bytes))
}

/// Decode out-of-line string data at an absolute payload offset. Trailing
/// NULs are stripped, matching what modems actually send.
pub fn read_string_data(
    payload: &[u8],
    offset: usize,
    size: usize,
    encoding: StringEncoding,
) -> Result<String, CodecError> {
    let raw = slice(payload, offset, size, "string data")?;
    match encoding {
        StringEncoding::Utf16 => {
            if size % 2 != 0 {
                return Err(CodecError::InvalidString(format!(
                    "utf-16 string size {} is not a multiple of 2",
                    size
                )));
            }
            let units: Vec<u16> = raw.chunks_exact(2).map(LittleEndian::read_u16).collect();
            String::from_utf16(&units)
                .map(|s| s.trim_end_matches('\0').to_string())
                .map_err(|e| CodecError::InvalidString(e.to_string()))
        }
        StringEncoding::Utf8 => std::str::from_utf8(raw)
            .map(|s| s.trim_end_matches('\0').to_string())
            .map_err(|e| CodecError::InvalidString(e.to_string())),
    }
}

fn encode_string_data(text: &str, encoding: StringEncoding) -> Vec<u8> {
    match encoding {
        StringEncoding::Utf16 => {
            let mut out = Vec::with_capacity(text.len() * 2);
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out
        }
        StringEncoding::Utf8 => text.as_bytes().to_vec(),
    }
}

fn pad_to_boundary(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

/// Payload under construction: a fixed region holding scalars and offset
/// headers, a variable region holding out-of-line data, and the positions of
/// every offset value that must be rebased when the regions are merged.
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    fixed: Vec<u8>,
    variable: Vec<u8>,
    fixups: Vec<usize>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        PayloadBuilder::default()
    }

    pub fn append_u16(&mut self, value: u16) {
        self.fixed.extend_from_slice(&value.to_le_bytes());
    }

    pub fn append_u32(&mut self, value: u32) {
        self.fixed.extend_from_slice(&value.to_le_bytes());
    }

    pub fn append_u64(&mut self, value: u64) {
        self.fixed.extend_from_slice(&value.to_le_bytes());
    }

    pub fn append_uuid(&mut self, value: &Uuid) {
        self.fixed.extend_from_slice(value.as_bytes());
    }

    /// Inline bytes in the fixed region.
    pub fn append_raw(&mut self, data: &[u8]) {
        self.fixed.extend_from_slice(data);
    }

    /// Inline bytes zero-padded up to `size`. Input longer than `size` is
    /// truncated; the validator guarantees callers a declared size to meet.
    pub fn append_raw_padded(&mut self, data: &[u8], size: usize) {
        let take = data.len().min(size);
        self.fixed.extend_from_slice(&data[..take]);
        self.fixed.extend(std::iter::repeat(0u8).take(size - take));
    }

    /// Write an offset placeholder pointing at the current end of the
    /// variable region and record it for rebasing at `complete`.
    pub fn append_offset_fixup(&mut self) {
        let position = self.fixed.len();
        self.append_u32(self.variable.len() as u32);
        self.fixups.push(position);
    }

    /// Out-of-line data into the variable region.
    pub fn append_variable(&mut self, data: &[u8]) {
        self.variable.extend_from_slice(data);
    }

    pub fn pad_variable(&mut self) {
        pad_to_boundary(&mut self.variable);
    }

    pub fn pad_fixed(&mut self) {
        pad_to_boundary(&mut self.fixed);
    }

    /// Offset + length header, data out-of-line. Empty data writes a 0/0
    /// header with no fixup.
    pub fn append_bytes_ref(&mut self, data: &[u8], pad: bool) {
        if data.is_empty() {
            self.append_u32(0);
        } else {
            self.append_offset_fixup();
        }
        self.append_u32(data.len() as u32);
        self.variable.extend_from_slice(data);
        if pad {
            pad_to_boundary(&mut self.variable);
        }
    }

    /// Length + offset header (swapped order), data out-of-line.
    pub fn append_bytes_ref_swapped(&mut self, data: &[u8], pad: bool) {
        self.append_u32(data.len() as u32);
        if data.is_empty() {
            self.append_u32(0);
        } else {
            self.append_offset_fixup();
        }
        self.variable.extend_from_slice(data);
        if pad {
            pad_to_boundary(&mut self.variable);
        }
    }

    /// Length header only, data immediately after the fixed region.
    pub fn append_bytes_len_prefixed(&mut self, data: &[u8], pad: bool) {
        self.append_u32(data.len() as u32);
        self.variable.extend_from_slice(data);
        if pad {
            pad_to_boundary(&mut self.variable);
        }
    }

    /// Offset + length header, text out-of-line, padded to a 4-byte boundary.
    /// The empty string writes a 0/0 header.
    pub fn append_string(&mut self, text: &str, encoding: StringEncoding) {
        let data = encode_string_data(text, encoding);
        if data.is_empty() {
            self.append_u32(0);
            self.append_u32(0);
            return;
        }
        self.append_offset_fixup();
        self.append_u32(data.len() as u32);
        self.variable.extend_from_slice(&data);
        pad_to_boundary(&mut self.variable);
    }

    /// Offset header, 4 address bytes out-of-line. `None` writes offset 0.
    pub fn append_ipv4_ref(&mut self, address: Option<Ipv4Addr>) {
        match address {
            Some(addr) => {
                self.append_offset_fixup();
                self.variable.extend_from_slice(&addr.octets());
            }
            None => self.append_u32(0),
        }
    }

    /// Offset header, 16 address bytes out-of-line. `None` writes offset 0.
    pub fn append_ipv6_ref(&mut self, address: Option<Ipv6Addr>) {
        match address {
            Some(addr) => {
                self.append_offset_fixup();
                self.variable.extend_from_slice(&addr.octets());
            }
            None => self.append_u32(0),
        }
    }

    /// Merge the two regions: every recorded offset is rebased by the fixed
    /// region's final length, then fixed and variable are concatenated.
    pub fn complete(mut self) -> Vec<u8> {
        let fixed_len = self.fixed.len() as u32;
        for &position in &self.fixups {
            let rebased = LittleEndian::read_u32(&self.fixed[position..position + 4]) + fixed_len;
            LittleEndian::write_u32(&mut self.fixed[position..position + 4], rebased);
        }
        self.fixed.extend_from_slice(&self.variable);
        self.fixed
    }
}

pub const MESSAGE_TYPE_COMMAND: u32 = 0x0000_0003;
pub const MESSAGE_TYPE_COMMAND_DONE: u32 = 0x8000_0003;
pub const MESSAGE_TYPE_INDICATE_STATUS: u32 = 0x8000_0007;

pub const COMMAND_TYPE_QUERY: u32 = 0;
pub const COMMAND_TYPE_SET: u32 = 1;

/// Header bytes before the payload region, identical for all three kinds:
/// type, total length, transaction id, service uuid, cid, then one or two
/// kind-specific u32 words and the payload length.
const COMMON_HEADER_SIZE: usize = 32;

fn envelope_header(
    message_type: u32,
    transaction_id: u32,
    service: &Uuid,
    cid: u32,
    extra: &[u32],
    payload: &[u8],
) -> Vec<u8> {
    let total = COMMON_HEADER_SIZE + 4 * extra.len() + 4 + payload.len();
    let mut data = Vec::with_capacity(total);
    data.extend_from_slice(&message_type.to_le_bytes());
    data.extend_from_slice(&(total as u32).to_le_bytes());
    data.extend_from_slice(&transaction_id.to_le_bytes());
    data.extend_from_slice(service.as_bytes());
    data.extend_from_slice(&cid.to_le_bytes());
    for word in extra {
        data.extend_from_slice(&word.to_le_bytes());
    }
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(payload);
    data
}

/// Build a command message (host to modem).
pub fn command_new(
    transaction_id: u32,
    service: &Uuid,
    cid: u32,
    command_type: u32,
    payload: &[u8],
) -> Vec<u8> {
    envelope_header(
        MESSAGE_TYPE_COMMAND,
        transaction_id,
        service,
        cid,
        &[command_type],
        payload,
    )
}

/// Build a command-done message (modem to host, carries a status code).
pub fn response_new(
    transaction_id: u32,
    service: &Uuid,
    cid: u32,
    status: u32,
    payload: &[u8],
) -> Vec<u8> {
    envelope_header(
        MESSAGE_TYPE_COMMAND_DONE,
        transaction_id,
        service,
        cid,
        &[status],
        payload,
    )
}

/// Build an unsolicited indication message.
pub fn notification_new(transaction_id: u32, service: &Uuid, cid: u32, payload: &[u8]) -> Vec<u8> {
    envelope_header(
        MESSAGE_TYPE_INDICATE_STATUS,
        transaction_id,
        service,
        cid,
        &[],
        payload,
    )
}

/// Borrowed reader over a complete message buffer.
#[derive(Debug, Clone, Copy)]
pub struct MessageView<'a> {
    data: &'a [u8],
}

impl<'a> MessageView<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, CodecError> {
        if data.len() < COMMON_HEADER_SIZE + 4 {
            return Err(CodecError::InvalidMessage(format!(
                "message too short for header: {} bytes",
                data.len()
            )));
        }
        let view = MessageView { data };
        let declared = LittleEndian::read_u32(&data[4..8]) as usize;
        if declared != data.len() {
            return Err(CodecError::InvalidMessage(format!(
                "declared length {} does not match buffer length {}",
                declared,
                data.len()
            )));
        }
        match view.message_type() {
            MESSAGE_TYPE_COMMAND | MESSAGE_TYPE_COMMAND_DONE => {
                if data.len() < COMMON_HEADER_SIZE + 8 {
                    return Err(CodecError::InvalidMessage(
                        "message too short for command header".to_string(),
                    ));
                }
            }
            MESSAGE_TYPE_INDICATE_STATUS => {}
            other => {
                return Err(CodecError::InvalidMessage(format!(
                    "unknown message type 0x{:08x}",
                    other
                )));
            }
        }
        Ok(view)
    }

    pub fn message_type(&self) -> u32 {
        LittleEndian::read_u32(&self.data[0..4])
    }

    pub fn transaction_id(&self) -> u32 {
        LittleEndian::read_u32(&self.data[8..12])
    }

    pub fn service(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.data[12..28]);
        Uuid::from_bytes(bytes)
    }

    pub fn cid(&self) -> u32 {
        LittleEndian::read_u32(&self.data[28..32])
    }

    pub fn is_command(&self) -> bool {
        self.message_type() == MESSAGE_TYPE_COMMAND
    }

    pub fn is_response(&self) -> bool {
        self.message_type() == MESSAGE_TYPE_COMMAND_DONE
    }

    pub fn is_notification(&self) -> bool {
        self.message_type() == MESSAGE_TYPE_INDICATE_STATUS
    }

    /// Query/set discriminator of a command, or the status code of a
    /// command-done.
    pub fn kind_word(&self) -> Option<u32> {
        if self.is_command() || self.is_response() {
            Some(LittleEndian::read_u32(&self.data[32..36]))
        } else {
            None
        }
    }

    pub fn command_type(&self) -> Option<u32> {
        if self.is_command() {
            self.kind_word()
        } else {
            None
        }
    }

    pub fn status(&self) -> Option<u32> {
        if self.is_response() {
            self.kind_word()
        } else {
            None
        }
    }

    fn payload_length_offset(&self) -> usize {
        if self.is_notification() {
            COMMON_HEADER_SIZE
        } else {
            COMMON_HEADER_SIZE + 4
        }
    }

    /// The information buffer, or `None` when the declared payload length is
    /// zero.
    pub fn payload_region(&self) -> Option<&'a [u8]> {
        let at = self.payload_length_offset();
        let len = LittleEndian::read_u32(&self.data[at..at + 4]) as usize;
        if len == 0 {
            return None;
        }
        let start = at + 4;
        let end = start.checked_add(len)?;
        if end > self.data.len() {
            return None;
        }
        Some(&self.data[start..end])
    }
}
