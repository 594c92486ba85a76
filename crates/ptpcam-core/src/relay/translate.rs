//! Layout translation between the gimbal host and a real camera.
//!
//! The camera only understands standard containers. Host containers are
//! classified and rebuilt in standard layout. Camera containers go back in
//! standard layout unless [`ReplyLayout::Mirror`] asks for the host's own.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::protocol::constants::*;
use crate::protocol::{
    classify, command_container, data_container, read_std_header, write_header, ContainerType,
    FrameError, Layout,
};

/// Largest RAW_IN frame the device buffers.
pub const RAW_IN_CHUNK: usize = TX_BUF_SIZE;

/// Layout used for containers sent back to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyLayout {
    /// Camera bytes, standard layout.
    #[default]
    Standard,
    /// Same layout as the host's command. Opt-in only.
    Mirror,
}

impl FromStr for ReplyLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mirror" | "auto" => Ok(ReplyLayout::Mirror),
            "standard" | "camera" => Ok(ReplyLayout::Standard),
            other => Err(format!("unknown reply layout '{other}'")),
        }
    }
}

impl fmt::Display for ReplyLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyLayout::Mirror => write!(f, "mirror"),
            ReplyLayout::Standard => write!(f, "standard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Command,
    Data,
}

/// A host container rebuilt for the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translated {
    pub container: Vec<u8>,
    pub stage: Stage,
    pub op: u16,
    pub transaction_id: u32,
    pub layout: Layout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCommand {
    code: u16,
    transaction_id: u32,
    layout: Layout,
}

#[derive(Debug, Default)]
pub struct Translator {
    pending: Option<PendingCommand>,
    reply_layout: ReplyLayout,
}

impl Translator {
    pub fn new(reply_layout: ReplyLayout) -> Self {
        Self {
            pending: None,
            reply_layout,
        }
    }

    /// Rebuild a host OUT transfer as a standard container. `None` means the
    /// container type is not forwarded.
    pub fn host_to_camera(&mut self, raw: &[u8]) -> Result<Option<Translated>, FrameError> {
        let frame = classify(raw)?;
        match frame.container_type() {
            ContainerType::Command => {
                let (code, tid) = (frame.code(), frame.transaction_id());
                self.pending = Some(PendingCommand {
                    code,
                    transaction_id: tid,
                    layout: frame.layout,
                });
                debug!(layout = %frame.layout, op = format_args!("0x{:04X}", code), tid, "COMMAND to camera");
                Ok(Some(Translated {
                    container: command_container(code, tid, frame.params()),
                    stage: Stage::Command,
                    op: code,
                    transaction_id: tid,
                    layout: frame.layout,
                }))
            }
            ContainerType::Data => {
                // DATA belongs to the last COMMAND, whatever the host put in its header.
                let (op, tid, layout) = match self.pending {
                    Some(p) => (p.code, p.transaction_id, p.layout),
                    None => (frame.code(), frame.transaction_id(), frame.layout),
                };
                debug!(layout = %layout, op = format_args!("0x{:04X}", op), tid, len = frame.tail().len(), "DATA to camera");
                Ok(Some(Translated {
                    container: data_container(op, tid, frame.tail()),
                    stage: Stage::Data,
                    op,
                    transaction_id: tid,
                    layout,
                }))
            }
            other => {
                debug!(container_type = %other, "Not forwarded to camera");
                Ok(None)
            }
        }
    }

    /// Rebuild a camera container for the host. Returns its type with the bytes.
    pub fn camera_to_host(
        &mut self,
        container: &[u8],
        request: &Translated,
    ) -> Result<(ContainerType, Vec<u8>), FrameError> {
        let (_, header) = read_std_header(container)?;
        let mut code = header.code;
        let mut payload = &container[STD_HEADER_LEN.min(container.len())..];

        let is_response = header.container_type == ContainerType::Response;
        if is_response
            && request.op == PTP_OC_OPEN_SESSION
            && code == PTP_RC_SESSION_ALREADY_OPEN
        {
            info!("Camera session already open, reporting OK to host");
            code = PTP_RC_OK;
            payload = &[];
        }
        if is_response {
            self.pending = None;
        }

        let out = match self.reply_layout {
            ReplyLayout::Standard if code == header.code => container.to_vec(),
            ReplyLayout::Standard => build(Layout::Standard, header.container_type, code, header.transaction_id, payload),
            ReplyLayout::Mirror => build(request.layout, header.container_type, code, header.transaction_id, payload),
        };
        Ok((header.container_type, out))
    }
}

fn build(layout: Layout, ty: ContainerType, code: u16, tid: u32, payload: &[u8]) -> Vec<u8> {
    let total = STD_HEADER_LEN + payload.len();
    let header = write_header(layout, total as u32, ty, code, tid);
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    // A bare RESPONSE in a short layout is still sent as 12 bytes.
    if ty == ContainerType::Response && payload.is_empty() && out.len() < STD_HEADER_LEN {
        out.resize(STD_HEADER_LEN, 0);
    }
    out
}

/// Split a container into the IN transfers the device replays: chunks of at
/// most [`RAW_IN_CHUNK`] bytes, then a ZLP if it ends on a packet boundary.
pub fn container_transfers(container: &[u8]) -> Vec<Vec<u8>> {
    if container.is_empty() {
        return vec![Vec::new()];
    }
    let mut transfers: Vec<Vec<u8>> = container.chunks(RAW_IN_CHUNK).map(<[u8]>::to_vec).collect();
    if container.len() % MAX_PACKET_SIZE == 0 {
        transfers.push(Vec::new());
    }
    transfers
}
