//! Inbound container classifier.
//!
//! The gimbal host does not stick to one framing. Every bulk-OUT transfer is
//! run through [`MATCHERS`] in order and the first plausible layout wins. The
//! zero-padded no-length variants are tried before the length-prefixed ones,
//! most padding first, so `00 00 00 01 00 ..` is read as Pad3 rather than as a
//! Pad1 header with a garbage type.

use byteorder::{ByteOrder, LittleEndian};

use super::constants::MAX_PARAMS;
use super::container::{ContainerHeader, ContainerType, FrameError, Layout};

/// Shortest transfer any matcher can accept.
pub const MIN_FRAME_LEN: usize = 8;

/// `(raw type, code, tid)` pulled out by a matcher.
type RawFields = (u16, u16, u32);

struct Matcher {
    layout: Layout,
    probe: fn(&[u8]) -> Option<RawFields>,
}

fn fields_at(b: &[u8], ty: usize, code: usize, tid: usize) -> RawFields {
    (
        LittleEndian::read_u16(&b[ty..ty + 2]),
        LittleEndian::read_u16(&b[code..code + 2]),
        LittleEndian::read_u32(&b[tid..tid + 4]),
    )
}

fn probe_pad3(b: &[u8]) -> Option<RawFields> {
    (b.len() >= 11 && b[..3] == [0, 0, 0]).then(|| fields_at(b, 3, 5, 7))
}

fn probe_pad2(b: &[u8]) -> Option<RawFields> {
    (b.len() >= 10 && b[..2] == [0, 0]).then(|| fields_at(b, 2, 4, 6))
}

fn probe_pad1(b: &[u8]) -> Option<RawFields> {
    (b.len() >= 9 && b[0] == 0).then(|| fields_at(b, 1, 3, 5))
}

fn probe_standard(b: &[u8]) -> Option<RawFields> {
    (b.len() >= 12).then(|| fields_at(b, 4, 6, 8))
}

fn probe_alternate(b: &[u8]) -> Option<RawFields> {
    (b.len() >= 12).then(|| fields_at(b, 10, 4, 6))
}

/// Ordered matcher table. Order is significant.
const MATCHERS: [Matcher; 5] = [
    Matcher { layout: Layout::Pad3, probe: probe_pad3 },
    Matcher { layout: Layout::Pad2, probe: probe_pad2 },
    Matcher { layout: Layout::Pad1, probe: probe_pad1 },
    Matcher { layout: Layout::Standard, probe: probe_standard },
    Matcher { layout: Layout::Alternate, probe: probe_alternate },
];

/// A classified inbound container, borrowing the raw transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub layout: Layout,
    pub header: ContainerHeader,
    params: [u32; MAX_PARAMS],
    param_count: usize,
    raw: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn container_type(&self) -> ContainerType {
        self.header.container_type
    }

    pub fn code(&self) -> u16 {
        self.header.code
    }

    pub fn transaction_id(&self) -> u32 {
        self.header.transaction_id
    }

    /// Bytes before params/payload.
    pub fn header_len(&self) -> usize {
        self.layout.header_len()
    }

    /// Params decoded from the bytes after the header, at most five.
    pub fn params(&self) -> &[u32] {
        &self.params[..self.param_count]
    }

    pub fn param(&self, idx: usize) -> Option<u32> {
        self.params().get(idx).copied()
    }

    /// Everything after the header. For DATA containers this is the payload.
    pub fn tail(&self) -> &'a [u8] {
        &self.raw[self.header_len()..]
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }
}

/// Classify one bulk-OUT transfer.
pub fn classify(raw: &[u8]) -> Result<Frame<'_>, FrameError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(FrameError::BufferTooSmall {
            expected: MIN_FRAME_LEN,
            actual: raw.len(),
        });
    }

    for m in &MATCHERS {
        let Some((ty, code, tid)) = (m.probe)(raw) else {
            continue;
        };
        let Some(container_type) = ContainerType::from_u16(ty) else {
            continue;
        };

        let header_len = m.layout.header_len();
        let param_count = ((raw.len() - header_len) / 4).min(MAX_PARAMS);
        let mut params = [0u32; MAX_PARAMS];
        for (i, p) in params.iter_mut().take(param_count).enumerate() {
            let off = header_len + i * 4;
            *p = LittleEndian::read_u32(&raw[off..off + 4]);
        }

        return Ok(Frame {
            layout: m.layout,
            header: ContainerHeader::new(container_type, code, tid),
            params,
            param_count,
            raw,
        });
    }

    Err(FrameError::UnknownLayout { len: raw.len() })
}
