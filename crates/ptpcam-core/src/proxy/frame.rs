//! Relay wire format.
//!
//! ```text
//! +-----------+--------+-----------+
//! | len: u32  | type   | payload   |
//! | (BE)      | u8     | len-1 B   |
//! +-----------+--------+-----------+
//! ```
//!
//! `len` covers the type byte and the payload, so it is never zero.

use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::protocol::TX_BUF_SIZE;

/// Raw bulk-OUT transfer, device to relay.
pub const FRAME_RAW_OUT: u8 = 0x10;
/// One bulk-IN transfer to replay, relay to device. Empty means ZLP.
pub const FRAME_RAW_IN: u8 = 0x11;
/// End of the relay's answer to one RAW_OUT.
pub const FRAME_RAW_DONE: u8 = 0x12;

/// Largest payload the device side accepts in one frame.
pub const MAX_FRAME_PAYLOAD: usize = TX_BUF_SIZE;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Timed out waiting for relay")]
    Timeout,

    #[error("No relay client connected")]
    NotConnected,

    #[error("Frame payload of {len} bytes exceeds {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Invalid frame length 0")]
    InvalidLength,

    #[error("Relay connection closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for ProxyError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ProxyError::Timeout,
            io::ErrorKind::UnexpectedEof => ProxyError::Closed,
            _ => ProxyError::Io(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    RawOut,
    RawIn,
    RawDone,
}

impl FrameKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            FRAME_RAW_OUT => Some(Self::RawOut),
            FRAME_RAW_IN => Some(Self::RawIn),
            FRAME_RAW_DONE => Some(Self::RawDone),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            FrameKind::RawOut => FRAME_RAW_OUT,
            FrameKind::RawIn => FRAME_RAW_IN,
            FrameKind::RawDone => FRAME_RAW_DONE,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::RawOut => write!(f, "RAW_OUT"),
            FrameKind::RawIn => write!(f, "RAW_IN"),
            FrameKind::RawDone => write!(f, "RAW_DONE"),
        }
    }
}

/// One relay frame. The type byte is kept raw so unknown types survive
/// decoding and can be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyFrame {
    pub frame_type: u8,
    pub payload: Vec<u8>,
}

impl ProxyFrame {
    pub const HEADER_SIZE: usize = 5;

    pub fn new(kind: FrameKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            frame_type: kind.as_u8(),
            payload: payload.into(),
        }
    }

    pub fn raw_out(data: &[u8]) -> Self {
        Self::new(FrameKind::RawOut, data)
    }

    pub fn raw_in(data: &[u8]) -> Self {
        Self::new(FrameKind::RawIn, data)
    }

    pub fn done() -> Self {
        Self::new(FrameKind::RawDone, Vec::new())
    }

    pub fn kind(&self) -> Option<FrameKind> {
        FrameKind::from_u8(self.frame_type)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_SIZE + self.payload.len());
        // Writing into a Vec cannot fail.
        let _ = write_frame(&mut buf, self);
        buf
    }
}

pub fn write_frame<W: Write>(w: &mut W, frame: &ProxyFrame) -> Result<(), ProxyError> {
    w.write_u32::<BigEndian>(frame.payload.len() as u32 + 1)?;
    w.write_u8(frame.frame_type)?;
    w.write_all(&frame.payload)?;
    w.flush()?;
    Ok(())
}

/// Read one frame, rejecting payloads larger than `max_payload`.
pub fn read_frame<R: Read>(r: &mut R, max_payload: usize) -> Result<ProxyFrame, ProxyError> {
    let total = r.read_u32::<BigEndian>()?;
    if total == 0 {
        return Err(ProxyError::InvalidLength);
    }
    let frame_type = r.read_u8()?;
    let len = (total - 1) as usize;
    if len > max_payload {
        // Skip the payload so the next read starts on a frame boundary.
        let skipped = io::copy(&mut (&mut *r).take(len as u64), &mut io::sink())?;
        if skipped < len as u64 {
            return Err(ProxyError::Closed);
        }
        return Err(ProxyError::FrameTooLarge {
            len,
            max: max_payload,
        });
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(ProxyFrame {
        frame_type,
        payload,
    })
}
