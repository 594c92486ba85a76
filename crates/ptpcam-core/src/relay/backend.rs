//! Answer sources for the relay client.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::translate::{container_transfers, ReplyLayout, Stage, Translator};
use crate::bus::MockBus;
use crate::camera::{CameraError, PtpCamera};
use crate::engine::{LegacyResponder, PtpResponder};
use crate::events::PtpObserver;
use crate::protocol::constants::*;
use crate::protocol::ContainerType;

/// Containers read from the camera per forwarded OUT.
const CAMERA_READ_BUDGET: usize = 8;
/// Short wait after a COMMAND, so a two-stage op can send its DATA.
const AFTER_COMMAND_TIMEOUT: Duration = Duration::from_millis(200);
const READ_TIMEOUT: Duration = Duration::from_millis(4000);

/// Produces the IN transfers that answer one host OUT transfer.
pub trait RelayBackend {
    /// IN transfers to replay, in order. Empty entries are ZLPs.
    fn exchange(&mut self, out: &[u8]) -> Vec<Vec<u8>>;
}

/// In-process camera: a legacy responder over a capturing bus.
pub struct EmulatedBackend {
    responder: LegacyResponder,
    bus: MockBus,
}

impl EmulatedBackend {
    pub fn new(observer: Arc<dyn PtpObserver>) -> Self {
        let mut responder = LegacyResponder::new(observer);
        let mut bus = MockBus::new();
        responder.on_interface_open(&mut bus, 0);
        bus.clear();
        Self { responder, bus }
    }

    pub fn responder(&self) -> &LegacyResponder {
        &self.responder
    }
}

impl Default for EmulatedBackend {
    fn default() -> Self {
        Self::new(Arc::new(crate::events::NullObserver))
    }
}

impl RelayBackend for EmulatedBackend {
    fn exchange(&mut self, out: &[u8]) -> Vec<Vec<u8>> {
        let mut transfers = Vec::new();
        self.responder.on_out_complete(&mut self.bus, out);
        loop {
            let batch = self.bus.take_in_transfers();
            if batch.is_empty() {
                break;
            }
            for data in batch {
                transfers.push(data);
                self.responder.on_in_complete(&mut self.bus, EP_BULK_IN);
            }
        }
        transfers
    }
}

/// Real camera over USB, with layout translation.
pub struct CameraBackend {
    camera: PtpCamera,
    translator: Translator,
}

impl CameraBackend {
    pub fn new(mut camera: PtpCamera, reply_layout: ReplyLayout) -> Self {
        camera.close_stale_session();
        Self {
            camera,
            translator: Translator::new(reply_layout),
        }
    }

    pub fn open(vid: Option<u16>, pid: Option<u16>, reply_layout: ReplyLayout) -> Result<Self, CameraError> {
        Ok(Self::new(PtpCamera::open(vid, pid)?, reply_layout))
    }
}

impl RelayBackend for CameraBackend {
    fn exchange(&mut self, out: &[u8]) -> Vec<Vec<u8>> {
        let request = match self.translator.host_to_camera(out) {
            Ok(Some(t)) => t,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, len = out.len(), "Cannot translate host container");
                return Vec::new();
            }
        };
        if let Err(e) = self.camera.send(&request.container) {
            warn!(error = %e, "Camera write failed");
            return Vec::new();
        }

        let timeout = match request.stage {
            Stage::Command => AFTER_COMMAND_TIMEOUT,
            Stage::Data => READ_TIMEOUT,
        };

        let mut transfers = Vec::new();
        for _ in 0..CAMERA_READ_BUDGET {
            let container = match self.camera.read_container(timeout) {
                Ok(c) => c,
                Err(CameraError::Timeout { .. }) if request.stage == Stage::Command => {
                    debug!(op = format_args!("0x{:04X}", request.op), "Camera waiting for DATA stage");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Camera read failed");
                    break;
                }
            };
            let (ty, reply) = match self.translator.camera_to_host(&container, &request) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, len = container.len(), "Bad container from camera");
                    break;
                }
            };
            info!(container_type = %ty, len = reply.len(), "Camera container relayed");
            transfers.extend(container_transfers(&reply));
            if ty == ContainerType::Response {
                break;
            }
        }
        transfers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{command_container, read_std_header};

    #[test]
    fn test_emulated_device_info_transfers() {
        let mut backend = EmulatedBackend::default();
        let ins = backend.exchange(&command_container(PTP_OC_GET_DEVICE_INFO, 1, &[]));
        assert_eq!(ins.len(), 2);
        assert_eq!(ins[0].len(), 259);
        let (_, hdr) = read_std_header(&ins[1]).unwrap();
        assert_eq!((hdr.container_type, hdr.code), (ContainerType::Response, PTP_RC_OK));
    }

    #[test]
    fn test_emulated_9209_chunks() {
        let mut backend = EmulatedBackend::default();
        let ins = backend.exchange(&command_container(PTP_OC_SONY_9209, 3, &[]));
        let lens: Vec<usize> = ins.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![512, 511, 12]);
    }

    #[test]
    fn test_emulated_two_stage_rec() {
        let mut backend = EmulatedBackend::default();
        assert!(backend
            .exchange(&command_container(PTP_OC_SONY_REC, 5, &[REC_FULL_PRESS]))
            .is_empty());
        let ins = backend.exchange(&crate::protocol::data_container(PTP_OC_SONY_REC, 5, &[0x02]));
        assert_eq!(ins.len(), 1);
        assert!(backend.responder().is_recording());
    }

    #[test]
    fn test_emulated_garbage_yields_nothing() {
        let mut backend = EmulatedBackend::default();
        assert!(backend.exchange(&[0xFF; 4]).is_empty());
    }
}
