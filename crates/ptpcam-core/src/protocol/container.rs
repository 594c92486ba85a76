//! PTP container header structures and the header writer.
//!
//! A container header carries `(type, code, transaction_id)` and, in the
//! length-prefixed layouts, the total container length. The quirky host uses
//! five framings; see [`Layout`].

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use thiserror::Error;

use super::constants::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Buffer too small: expected {expected}, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("No known container layout matches {len} bytes")]
    UnknownLayout { len: usize },
    #[error("Invalid container type 0x{0:04X}")]
    InvalidType(u16),
    #[error("Container length {declared} outside 12..={received}")]
    BadLength { declared: u32, received: usize },
}

/// PTP container type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ContainerType {
    Command = PTP_CT_COMMAND,
    Data = PTP_CT_DATA,
    Response = PTP_CT_RESPONSE,
    Event = PTP_CT_EVENT,
}

impl ContainerType {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            PTP_CT_COMMAND => Some(Self::Command),
            PTP_CT_DATA => Some(Self::Data),
            PTP_CT_RESPONSE => Some(Self::Response),
            PTP_CT_EVENT => Some(Self::Event),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerType::Command => write!(f, "COMMAND"),
            ContainerType::Data => write!(f, "DATA"),
            ContainerType::Response => write!(f, "RESPONSE"),
            ContainerType::Event => write!(f, "EVENT"),
        }
    }
}

/// Wire framing of a container header.
///
/// | Layout    | Fields                              | Bytes |
/// |-----------|-------------------------------------|------:|
/// | Standard  | len32, type16, code16, tid32        | 12 |
/// | Alternate | len32, code16, tid32, type16        | 12 |
/// | Pad3      | 00 00 00, type16, code16, tid32     | 11 |
/// | Pad2      | 00 00, type16, code16, tid32        | 10 |
/// | Pad1      | 00, type16, code16, tid32           | 9  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Standard,
    Alternate,
    Pad3,
    Pad2,
    Pad1,
}

impl Layout {
    pub const ALL: [Layout; 5] = [
        Layout::Standard,
        Layout::Alternate,
        Layout::Pad3,
        Layout::Pad2,
        Layout::Pad1,
    ];

    /// Bytes before params/payload.
    pub const fn header_len(self) -> usize {
        match self {
            Layout::Standard | Layout::Alternate => 12,
            Layout::Pad3 => 11,
            Layout::Pad2 => 10,
            Layout::Pad1 => 9,
        }
    }

    /// Whether the header starts with a `len32` field.
    pub const fn has_length(self) -> bool {
        matches!(self, Layout::Standard | Layout::Alternate)
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Standard => write!(f, "std_len"),
            Layout::Alternate => write!(f, "alt_len"),
            Layout::Pad3 => write!(f, "pad3"),
            Layout::Pad2 => write!(f, "pad2"),
            Layout::Pad1 => write!(f, "pad1"),
        }
    }
}

/// Decoded container header, layout independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub container_type: ContainerType,
    pub code: u16,
    pub transaction_id: u32,
}

impl ContainerHeader {
    pub fn new(container_type: ContainerType, code: u16, transaction_id: u32) -> Self {
        Self {
            container_type,
            code,
            transaction_id,
        }
    }

    /// Serialize the header in `layout`. `total_len` is ignored by the
    /// no-length layouts.
    pub fn encode(&self, layout: Layout, total_len: u32) -> EncodedHeader {
        write_header(
            layout,
            total_len,
            self.container_type,
            self.code,
            self.transaction_id,
        )
    }
}

/// Header bytes produced by [`write_header`] (9..=12 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncodedHeader {
    bytes: [u8; STD_HEADER_LEN],
    len: usize,
}

impl EncodedHeader {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for EncodedHeader {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for EncodedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedHeader({:02X?})", self.as_bytes())
    }
}

/// Write a container header in the given layout.
pub fn write_header(
    layout: Layout,
    total_len: u32,
    container_type: ContainerType,
    code: u16,
    tid: u32,
) -> EncodedHeader {
    let mut b = [0u8; STD_HEADER_LEN];
    let ty = container_type.as_u16();
    match layout {
        Layout::Standard => {
            LittleEndian::write_u32(&mut b[0..4], total_len);
            LittleEndian::write_u16(&mut b[4..6], ty);
            LittleEndian::write_u16(&mut b[6..8], code);
            LittleEndian::write_u32(&mut b[8..12], tid);
        }
        Layout::Alternate => {
            LittleEndian::write_u32(&mut b[0..4], total_len);
            LittleEndian::write_u16(&mut b[4..6], code);
            LittleEndian::write_u32(&mut b[6..10], tid);
            LittleEndian::write_u16(&mut b[10..12], ty);
        }
        Layout::Pad3 | Layout::Pad2 | Layout::Pad1 => {
            // Leading pad bytes are already zero.
            let pad = layout.header_len() - 8;
            LittleEndian::write_u16(&mut b[pad..pad + 2], ty);
            LittleEndian::write_u16(&mut b[pad + 2..pad + 4], code);
            LittleEndian::write_u32(&mut b[pad + 4..pad + 8], tid);
        }
    }
    EncodedHeader {
        bytes: b,
        len: layout.header_len(),
    }
}

/// Standard-layout header. Every outbound container goes through here.
pub fn write_std_header(
    total_len: u32,
    container_type: ContainerType,
    code: u16,
    tid: u32,
) -> EncodedHeader {
    write_header(Layout::Standard, total_len, container_type, code, tid)
}

/// Build a complete standard-layout RESPONSE container (no params).
pub fn response_container(code: u16, tid: u32) -> EncodedHeader {
    write_std_header(STD_HEADER_LEN as u32, ContainerType::Response, code, tid)
}

/// Build a complete standard-layout COMMAND container.
pub fn command_container(code: u16, tid: u32, params: &[u32]) -> Vec<u8> {
    let params = &params[..params.len().min(MAX_PARAMS)];
    let total = STD_HEADER_LEN + params.len() * 4;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(
        write_std_header(total as u32, ContainerType::Command, code, tid).as_bytes(),
    );
    for &p in params {
        let mut word = [0u8; 4];
        LittleEndian::write_u32(&mut word, p);
        out.extend_from_slice(&word);
    }
    out
}

/// Build a complete standard-layout DATA container.
pub fn data_container(code: u16, tid: u32, payload: &[u8]) -> Vec<u8> {
    let total = STD_HEADER_LEN + payload.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(write_std_header(total as u32, ContainerType::Data, code, tid).as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Parse a standard-layout header, returning it with the declared length.
pub fn read_std_header(data: &[u8]) -> Result<(u32, ContainerHeader), FrameError> {
    if data.len() < STD_HEADER_LEN {
        return Err(FrameError::BufferTooSmall {
            expected: STD_HEADER_LEN,
            actual: data.len(),
        });
    }
    let len = LittleEndian::read_u32(&data[0..4]);
    let raw_type = LittleEndian::read_u16(&data[4..6]);
    let container_type = ContainerType::from_u16(raw_type).ok_or(FrameError::InvalidType(raw_type))?;
    Ok((
        len,
        ContainerHeader {
            container_type,
            code: LittleEndian::read_u16(&data[6..8]),
            transaction_id: LittleEndian::read_u32(&data[8..12]),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_header_bytes() {
        let hdr = write_std_header(16, ContainerType::Command, PTP_OC_OPEN_SESSION, 7);
        assert_eq!(
            hdr.as_bytes(),
            &[0x10, 0, 0, 0, 0x01, 0x00, 0x02, 0x10, 0x07, 0, 0, 0]
        );
    }

    #[test]
    fn test_alternate_header_field_order() {
        let hdr = write_header(Layout::Alternate, 12, ContainerType::Response, 0x2001, 3);
        assert_eq!(
            hdr.as_bytes(),
            &[0x0C, 0, 0, 0, 0x01, 0x20, 0x03, 0, 0, 0, 0x03, 0x00]
        );
    }

    #[test]
    fn test_padded_header_lengths() {
        for (layout, len) in [(Layout::Pad3, 11), (Layout::Pad2, 10), (Layout::Pad1, 9)] {
            let hdr = write_header(layout, 999, ContainerType::Command, 0x1001, 1);
            assert_eq!(hdr.len(), len);
            let pad = len - 8;
            assert!(hdr.as_bytes()[..pad].iter().all(|&b| b == 0));
            assert_eq!(hdr.as_bytes()[pad], 0x01);
        }
    }

    #[test]
    fn test_response_container() {
        let resp = response_container(PTP_RC_OK, 0x1234);
        let (len, hdr) = read_std_header(resp.as_bytes()).unwrap();
        assert_eq!(len, 12);
        assert_eq!(hdr.container_type, ContainerType::Response);
        assert_eq!(hdr.code, PTP_RC_OK);
        assert_eq!(hdr.transaction_id, 0x1234);
    }

    #[test]
    fn test_command_container_caps_params() {
        let cmd = command_container(PTP_OC_OPEN_SESSION, 1, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(cmd.len(), 12 + 20);
        assert_eq!(LittleEndian::read_u32(&cmd[0..4]), 32);
    }

    #[test]
    fn test_read_std_header_rejects_bad_type() {
        let mut raw = [0u8; 12];
        raw[4] = 9;
        assert_eq!(read_std_header(&raw), Err(FrameError::InvalidType(9)));
    }
}
