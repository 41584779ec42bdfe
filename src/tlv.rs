//! Self-describing tag-length-value records.
//!
//! Wire layout is an 8-byte header (u16 type, u8 reserved, u8 padding length,
//! u32 data length, integers little-endian) followed by the data and then
//! `padding_length` zero bytes. The data length excludes the padding.

use byteorder::{ByteOrder, LittleEndian};

use crate::codec::CodecError;

pub const TLV_HEADER_SIZE: usize = 8;

/// One decoded or caller-built TLV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tlv_type: u16,
    pub data: Vec<u8>,
}

impl Tlv {
    /// Build a record over raw data. Padding is computed at serialization.
    pub fn new(tlv_type: u16, data: Vec<u8>) -> Self {
        Tlv { tlv_type, data }
    }

    /// Build a record carrying UTF-16LE text.
    pub fn new_string(tlv_type: u16, text: &str) -> Self {
        let mut data = Vec::with_capacity(text.len() * 2);
        for unit in text.encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        Tlv { tlv_type, data }
    }

    /// Build a record carrying little-endian u16 elements.
    pub fn new_u16_array(tlv_type: u16, values: &[u16]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 2);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Tlv { tlv_type, data }
    }

    /// Parse one record from the start of `buf`. Returns the record and the
    /// total bytes consumed, header and padding included.
    pub fn from_raw(buf: &[u8]) -> Result<(Tlv, usize), CodecError> {
        if buf.len() < TLV_HEADER_SIZE {
            return Err(CodecError::Truncated {
                what: "tlv header",
                offset: 0,
                needed: TLV_HEADER_SIZE,
                available: buf.len(),
            });
        }
        let tlv_type = LittleEndian::read_u16(&buf[0..2]);
        let padding_length = buf[3] as usize;
        let data_length = LittleEndian::read_u32(&buf[4..8]) as usize;
        let total = TLV_HEADER_SIZE + data_length + padding_length;
        if buf.len() < total {
            return Err(CodecError::Truncated {
                what: "tlv data",
                offset: TLV_HEADER_SIZE,
                needed: data_length + padding_length,
                available: buf.len() - TLV_HEADER_SIZE,
            });
        }
        let data = buf[TLV_HEADER_SIZE..TLV_HEADER_SIZE + data_length].to_vec();
        Ok((Tlv { tlv_type, data }, total))
    }

    /// Padding needed to bring the data to a 4-byte boundary.
    pub fn padding_length(&self) -> usize {
        (4 - self.data.len() % 4) % 4
    }

    /// Total serialized size, header and padding included.
    pub fn wire_size(&self) -> usize {
        TLV_HEADER_SIZE + self.data.len() + self.padding_length()
    }

    /// Append the serialized record to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let padding = self.padding_length();
        out.extend_from_slice(&self.tlv_type.to_le_bytes());
        out.push(0);
        out.push(padding as u8);
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out.extend(std::iter::repeat(0u8).take(padding));
    }

    /// Interpret the data as UTF-16LE text.
    pub fn string(&self) -> Result<String, CodecError> {
        if self.data.len() % 2 != 0 {
            return Err(CodecError::InvalidString(
                "tlv string data length is not a multiple of 2".to_string(),
            ));
        }
        let units: Vec<u16> = self
            .data
            .chunks_exact(2)
            .map(LittleEndian::read_u16)
            .collect();
        String::from_utf16(&units)
            .map(|s| s.trim_end_matches('\0').to_string())
            .map_err(|e| CodecError::InvalidString(e.to_string()))
    }

    /// Interpret the data as little-endian u16 elements.
    pub fn u16_array(&self) -> Vec<u16> {
        self.data
            .chunks_exact(2)
            .map(LittleEndian::read_u16)
            .collect()
    }
}
