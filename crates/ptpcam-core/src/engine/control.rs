//! EP0 control requests.
//!
//! Still Image class requests addressed to the PTP interface are answered
//! here for every personality. Nothing in this module ever stalls: the gimbal
//! host drops a camera that rejects any of its class requests.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, info};

use crate::bus::UsbBus;
use crate::protocol::constants::*;

const REQ_TYPE_MASK: u8 = 0x60;
const REQ_TYPE_STANDARD: u8 = 0x00;
const REQ_TYPE_CLASS: u8 = 0x20;
const REQ_RECIPIENT_MASK: u8 = 0x1F;
const REQ_RECIPIENT_INTERFACE: u8 = 0x01;
const REQ_RECIPIENT_ENDPOINT: u8 = 0x02;

pub const REQ_CLEAR_FEATURE: u8 = 0x01;
pub const FEATURE_ENDPOINT_HALT: u16 = 0x0000;

/// USB SETUP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl ControlRequest {
    pub const SIZE: usize = 8;

    pub fn from_setup(setup: &[u8; Self::SIZE]) -> Self {
        Self {
            request_type: setup[0],
            request: setup[1],
            value: LittleEndian::read_u16(&setup[2..4]),
            index: LittleEndian::read_u16(&setup[4..6]),
            length: LittleEndian::read_u16(&setup[6..8]),
        }
    }

    pub fn is_device_to_host(&self) -> bool {
        self.request_type & 0x80 != 0
    }

    pub fn is_standard(&self) -> bool {
        self.request_type & REQ_TYPE_MASK == REQ_TYPE_STANDARD
    }

    pub fn is_class(&self) -> bool {
        self.request_type & REQ_TYPE_MASK == REQ_TYPE_CLASS
    }

    pub fn to_interface(&self) -> bool {
        self.request_type & REQ_RECIPIENT_MASK == REQ_RECIPIENT_INTERFACE
    }

    pub fn to_endpoint(&self) -> bool {
        self.request_type & REQ_RECIPIENT_MASK == REQ_RECIPIENT_ENDPOINT
    }
}

/// How the device stack should finish a control transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    /// IN data stage with these bytes.
    Data(Vec<u8>),
    /// Zero-length status stage.
    Ack,
    /// Not ours; the device stack decides.
    Unhandled,
}

/// Result of [`handle_control`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlOutcome {
    pub response: ControlResponse,
    /// Class RESET was received; the caller must clear its transaction state.
    pub reset: bool,
}

impl From<ControlResponse> for ControlOutcome {
    fn from(response: ControlResponse) -> Self {
        Self {
            response,
            reset: false,
        }
    }
}

/// Answer a control request for the PTP interface `interface`.
pub fn handle_control<B: UsbBus>(
    bus: &mut B,
    req: &ControlRequest,
    data_out: &[u8],
    interface: u8,
) -> ControlOutcome {
    if req.is_standard() && req.to_endpoint() {
        if req.request == REQ_CLEAR_FEATURE && req.value == FEATURE_ENDPOINT_HALT {
            let ep = req.index as u8;
            clear_if_stalled(bus, ep);
        }
        return ControlResponse::Ack.into();
    }

    if !req.is_class() || !req.to_interface() || req.index as u8 != interface {
        return ControlResponse::Unhandled.into();
    }

    debug!(
        req = format_args!("0x{:02X}", req.request),
        w_length = req.length,
        "Still Image class request"
    );

    let capped = (req.length as usize).min(CTRL_BUF_SIZE);
    match req.request {
        PTP_REQ_GET_DEVICE_STATUS => {
            let mut status = [0u8; 4];
            LittleEndian::write_u16(&mut status[0..2], 4);
            LittleEndian::write_u16(&mut status[2..4], PTP_RC_OK);
            ControlResponse::Data(status.to_vec()).into()
        }
        PTP_REQ_CANCEL => {
            let n = data_out.len().min(capped);
            debug!(len = n, data = ?&data_out[..n], "CANCEL request discarded");
            ControlResponse::Ack.into()
        }
        PTP_REQ_RESET => {
            info!("Class RESET");
            bus.abort_in(EP_BULK_IN);
            clear_if_stalled(bus, EP_BULK_OUT);
            clear_if_stalled(bus, EP_BULK_IN);
            ControlOutcome {
                response: ControlResponse::Ack,
                reset: true,
            }
        }
        PTP_REQ_GET_EXT_EVENT_DATA => ControlResponse::Data(vec![0u8; capped]).into(),
        _ => ControlResponse::Ack.into(),
    }
}

fn clear_if_stalled<B: UsbBus>(bus: &mut B, ep: u8) {
    if bus.is_stalled(ep) {
        if let Err(e) = bus.clear_stall(ep) {
            tracing::warn!(ep = format_args!("0x{:02X}", ep), error = %e, "clear stall failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusOp, MockBus};

    fn class_req(request: u8, length: u16) -> ControlRequest {
        ControlRequest {
            request_type: 0xA1,
            request,
            value: 0,
            index: 0,
            length,
        }
    }

    #[test]
    fn test_from_setup() {
        let req = ControlRequest::from_setup(&[0xA1, 0x67, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00]);
        assert!(req.is_class());
        assert!(req.to_interface());
        assert!(req.is_device_to_host());
        assert_eq!(req.request, PTP_REQ_GET_DEVICE_STATUS);
        assert_eq!(req.length, 4);
    }

    #[test]
    fn test_get_device_status() {
        let mut bus = MockBus::new();
        let out = handle_control(&mut bus, &class_req(PTP_REQ_GET_DEVICE_STATUS, 4), &[], 0);
        assert_eq!(out.response, ControlResponse::Data(vec![0x04, 0x00, 0x01, 0x20]));
        assert!(!out.reset);
    }

    #[test]
    fn test_ext_event_data_capped() {
        let mut bus = MockBus::new();
        let out = handle_control(&mut bus, &class_req(PTP_REQ_GET_EXT_EVENT_DATA, 200), &[], 0);
        assert_eq!(out.response, ControlResponse::Data(vec![0u8; 64]));
    }

    #[test]
    fn test_cancel_and_unknown_are_acked() {
        let mut bus = MockBus::new();
        let mut cancel = class_req(PTP_REQ_CANCEL, 6);
        cancel.request_type = 0x21;
        let out = handle_control(&mut bus, &cancel, &[0x01, 0x40, 0x05, 0, 0, 0], 0);
        assert_eq!(out.response, ControlResponse::Ack);
        let out = handle_control(&mut bus, &class_req(0x7F, 0), &[], 0);
        assert_eq!(out.response, ControlResponse::Ack);
    }

    #[test]
    fn test_reset_clears_stalls() {
        let mut bus = MockBus::new();
        bus.stall(EP_BULK_IN);
        bus.stall(EP_BULK_OUT);
        let mut reset = class_req(PTP_REQ_RESET, 0);
        reset.request_type = 0x21;
        let out = handle_control(&mut bus, &reset, &[], 0);
        assert!(out.reset);
        assert_eq!(out.response, ControlResponse::Ack);
        assert!(!bus.is_stalled(EP_BULK_IN));
        assert!(!bus.is_stalled(EP_BULK_OUT));
        assert_eq!(bus.ops()[0], BusOp::AbortIn { ep: EP_BULK_IN });
    }

    #[test]
    fn test_clear_feature_halt() {
        let mut bus = MockBus::new();
        bus.stall(EP_BULK_IN);
        let req = ControlRequest {
            request_type: 0x02,
            request: REQ_CLEAR_FEATURE,
            value: FEATURE_ENDPOINT_HALT,
            index: EP_BULK_IN as u16,
            length: 0,
        };
        let out = handle_control(&mut bus, &req, &[], 0);
        assert_eq!(out.response, ControlResponse::Ack);
        assert_eq!(bus.ops(), &[BusOp::ClearStall { ep: EP_BULK_IN }]);

        // Not stalled: still ACKed, nothing to clear.
        let out = handle_control(&mut bus, &req, &[], 0);
        assert_eq!(out.response, ControlResponse::Ack);
        assert_eq!(bus.ops().len(), 1);
    }

    #[test]
    fn test_foreign_requests_unhandled() {
        let mut bus = MockBus::new();
        // Wrong interface.
        let mut req = class_req(PTP_REQ_GET_DEVICE_STATUS, 4);
        req.index = 1;
        assert_eq!(handle_control(&mut bus, &req, &[], 0).response, ControlResponse::Unhandled);
        // Standard device request.
        let get_desc = ControlRequest {
            request_type: 0x80,
            request: 0x06,
            value: 0x0100,
            index: 0,
            length: 18,
        };
        assert_eq!(
            handle_control(&mut bus, &get_desc, &[], 0).response,
            ControlResponse::Unhandled
        );
    }
}
