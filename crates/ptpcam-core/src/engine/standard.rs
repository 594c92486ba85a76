//! Standard personality: strict PIMA 15740 framing, minimal operation set.

use std::borrow::Cow;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, info, warn};

use super::control::{handle_control, ControlRequest, ControlResponse};
use super::legacy::arm_out;
use super::state::{Session, Transaction};
use super::stream::{send_response, StreamStep};
use super::PtpResponder;
use crate::bus::UsbBus;
use crate::catalog::minimal_device_info;
use crate::events::{Direction, NullObserver, PtpEvent, PtpObserver, ResetReason};
use crate::protocol::constants::*;

/// Identity strings reported in DeviceInfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
}

pub struct StandardResponder {
    identity: DeviceIdentity,
    session: Session,
    txn: Transaction,
    observer: Arc<dyn PtpObserver>,
}

impl StandardResponder {
    pub fn new(identity: DeviceIdentity, observer: Arc<dyn PtpObserver>) -> Self {
        Self {
            identity,
            session: Session::default(),
            txn: Transaction::new(),
            observer,
        }
    }

    pub fn with_identity(identity: DeviceIdentity) -> Self {
        Self::new(identity, Arc::new(NullObserver))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn emit(&self, event: PtpEvent) {
        self.observer.on_event(&event);
    }

    fn clear_all(&mut self, reason: ResetReason) {
        self.txn.reset();
        self.session.session_id = None;
        self.emit(PtpEvent::Reset { reason });
    }

    fn handle<B: UsbBus>(&mut self, bus: &mut B, data: &[u8]) {
        let clen = LittleEndian::read_u32(&data[0..4]);
        let ctype = LittleEndian::read_u16(&data[4..6]);
        let code = LittleEndian::read_u16(&data[6..8]);
        let tid = LittleEndian::read_u32(&data[8..12]);

        debug!(
            len = clen,
            container_type = ctype,
            code = format_args!("0x{:04X}", code),
            tid,
            rx = data.len(),
            "PTP-STD container"
        );
        self.emit(PtpEvent::Container {
            direction: Direction::Out,
            summary: format!("std type={ctype} 0x{code:04X} tid={tid}"),
            length: data.len(),
        });

        if (clen as usize) < STD_HEADER_LEN || clen as usize > data.len() {
            // Only single-transfer containers are supported.
            send_response(bus, PTP_RC_GENERAL_ERROR, tid);
            return;
        }
        if ctype != PTP_CT_COMMAND {
            send_response(bus, PTP_RC_GENERAL_ERROR, tid);
            return;
        }

        self.txn.begin_command(bus, code, tid);
        match code {
            PTP_OC_GET_DEVICE_INFO => {
                let info = minimal_device_info(
                    &self.identity.manufacturer,
                    &self.identity.model,
                    &self.identity.serial,
                );
                if let Err(e) = self.txn.start_stream(bus, code, tid, Cow::Owned(info), true) {
                    warn!(error = %e, "DeviceInfo stream not started");
                    send_response(bus, PTP_RC_GENERAL_ERROR, tid);
                }
            }
            PTP_OC_OPEN_SESSION => {
                let rc = if self.session.is_open() {
                    PTP_RC_SESSION_ALREADY_OPEN
                } else if clen < 16 {
                    PTP_RC_INVALID_PARAMETER
                } else {
                    match LittleEndian::read_u32(&data[12..16]) {
                        0 => PTP_RC_INVALID_PARAMETER,
                        sid => {
                            info!(sid, "OpenSession");
                            self.session.session_id = Some(sid);
                            PTP_RC_OK
                        }
                    }
                };
                send_response(bus, rc, tid);
            }
            _ => send_response(bus, PTP_RC_OPERATION_NOT_SUPPORTED, tid),
        }
    }
}

impl PtpResponder for StandardResponder {
    fn on_bus_reset(&mut self) {
        self.session.reset();
        self.clear_all(ResetReason::Bus);
    }

    fn on_interface_open<B: UsbBus>(&mut self, bus: &mut B, interface: u8) {
        self.session.open_interface(interface);
        self.emit(PtpEvent::InterfaceOpened { interface });
        arm_out(bus);
    }

    fn on_control_request<B: UsbBus>(
        &mut self,
        bus: &mut B,
        req: &ControlRequest,
        data_out: &[u8],
    ) -> ControlResponse {
        let outcome = handle_control(bus, req, data_out, self.session.interface);
        if outcome.reset {
            self.clear_all(ResetReason::ClassRequest);
        }
        outcome.response
    }

    fn on_out_complete<B: UsbBus>(&mut self, bus: &mut B, data: &[u8]) {
        if data.len() >= STD_HEADER_LEN {
            self.handle(bus, data);
        } else {
            debug!(len = data.len(), "Short OUT transfer dropped");
        }
        arm_out(bus);
    }

    fn on_in_complete<B: UsbBus>(&mut self, bus: &mut B, ep: u8) {
        if ep != EP_BULK_IN {
            return;
        }
        if let Some(StreamStep::Finished {
            respond_tid: Some(tid),
            ..
        }) = self.txn.on_in_complete(bus)
        {
            send_response(bus, PTP_RC_OK, tid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;
    use crate::catalog::DeviceInfo;
    use crate::protocol::{command_container, data_container, read_std_header, ContainerType};

    fn setup() -> (StandardResponder, MockBus) {
        let mut r = StandardResponder::with_identity(DeviceIdentity {
            manufacturer: "Sony".into(),
            model: "ILCE-5100".into(),
            serial: "0001".into(),
        });
        let mut bus = MockBus::new();
        r.on_interface_open(&mut bus, 0);
        bus.clear();
        (r, bus)
    }

    fn last_response(bus: &MockBus) -> (u16, u32) {
        let ins = bus.in_transfers();
        let (_, hdr) = read_std_header(ins.last().unwrap()).unwrap();
        assert_eq!(hdr.container_type, ContainerType::Response);
        (hdr.code, hdr.transaction_id)
    }

    #[test]
    fn test_short_transfer_dropped() {
        let (mut r, mut bus) = setup();
        r.on_out_complete(&mut bus, &[0u8; 11]);
        assert!(bus.in_transfers().is_empty());
        assert_eq!(bus.out_arms(), 1);
    }

    #[test]
    fn test_bad_length_general_error() {
        let (mut r, mut bus) = setup();
        let mut cmd = command_container(PTP_OC_GET_DEVICE_INFO, 3, &[]);
        cmd[0] = 40;
        r.on_out_complete(&mut bus, &cmd);
        assert_eq!(last_response(&bus), (PTP_RC_GENERAL_ERROR, 3));

        bus.clear();
        cmd[0] = 8;
        r.on_out_complete(&mut bus, &cmd);
        assert_eq!(last_response(&bus), (PTP_RC_GENERAL_ERROR, 3));
    }

    #[test]
    fn test_non_command_general_error() {
        let (mut r, mut bus) = setup();
        r.on_out_complete(&mut bus, &data_container(PTP_OC_SONY_REC, 4, &[2]));
        assert_eq!(last_response(&bus), (PTP_RC_GENERAL_ERROR, 4));
    }

    #[test]
    fn test_device_info_then_ok() {
        let (mut r, mut bus) = setup();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_GET_DEVICE_INFO, 1, &[]));
        let data = bus.take_in_transfers();
        assert_eq!(data.len(), 1);
        let info = DeviceInfo::from_bytes(&data[0][STD_HEADER_LEN..]).unwrap();
        assert_eq!(info.model, "ILCE-5100");
        assert_eq!(info.operations, vec![PTP_OC_GET_DEVICE_INFO, PTP_OC_OPEN_SESSION]);

        r.on_in_complete(&mut bus, EP_BULK_IN);
        assert_eq!(last_response(&bus), (PTP_RC_OK, 1));
    }

    #[test]
    fn test_open_session_rules() {
        let (mut r, mut bus) = setup();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 1, &[]));
        assert_eq!(last_response(&bus), (PTP_RC_INVALID_PARAMETER, 1));

        r.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 2, &[0]));
        assert_eq!(last_response(&bus), (PTP_RC_INVALID_PARAMETER, 2));

        r.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 3, &[1]));
        assert_eq!(last_response(&bus), (PTP_RC_OK, 3));
        assert_eq!(r.session().session_id, Some(1));

        r.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 4, &[2]));
        assert_eq!(last_response(&bus), (PTP_RC_SESSION_ALREADY_OPEN, 4));
    }

    #[test]
    fn test_other_ops_not_supported() {
        let (mut r, mut bus) = setup();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_GET_STORAGE_IDS, 5, &[]));
        assert_eq!(last_response(&bus), (PTP_RC_OPERATION_NOT_SUPPORTED, 5));
    }

    #[test]
    fn test_ext_event_data_not_stalled() {
        let (mut r, mut bus) = setup();
        let req = ControlRequest {
            request_type: 0xA1,
            request: PTP_REQ_GET_EXT_EVENT_DATA,
            value: 0,
            index: 0,
            length: 16,
        };
        assert_eq!(
            r.on_control_request(&mut bus, &req, &[]),
            ControlResponse::Data(vec![0; 16])
        );
    }
}
