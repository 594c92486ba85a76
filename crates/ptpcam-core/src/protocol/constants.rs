//! Protocol constants for PTP over USB (PIMA 15740 subset).
//!
//! Only the codes the emulated camera and the gimbal host actually exchange
//! are listed here, plus the vendor operations observed from the host when it
//! talks to a Sony ILCE-5100.

// ============================================================================
// Container Types
// ============================================================================

pub const PTP_CT_COMMAND: u16 = 1;
pub const PTP_CT_DATA: u16 = 2;
pub const PTP_CT_RESPONSE: u16 = 3;
pub const PTP_CT_EVENT: u16 = 4;

// ============================================================================
// Operation Codes
// ============================================================================

pub const PTP_OC_GET_DEVICE_INFO: u16 = 0x1001;
pub const PTP_OC_OPEN_SESSION: u16 = 0x1002;
pub const PTP_OC_CLOSE_SESSION: u16 = 0x1003;
pub const PTP_OC_GET_STORAGE_IDS: u16 = 0x1004;
pub const PTP_OC_GET_STORAGE_INFO: u16 = 0x1005;
pub const PTP_OC_GET_NUM_OBJECTS: u16 = 0x1006;
pub const PTP_OC_GET_OBJECT_HANDLES: u16 = 0x1007;

/// Sony vendor dataset (8 zero bytes).
pub const PTP_OC_SONY_9201: u16 = 0x9201;
/// Sony vendor dataset (supported property list).
pub const PTP_OC_SONY_9202: u16 = 0x9202;
/// Sony REC button. Two-stage: COMMAND, then host->device DATA.
pub const PTP_OC_SONY_REC: u16 = 0x9207;
/// Sony vendor dataset (~1 KB property descriptions).
pub const PTP_OC_SONY_9209: u16 = 0x9209;

// ============================================================================
// Response Codes
// ============================================================================

pub const PTP_RC_OK: u16 = 0x2001;
pub const PTP_RC_GENERAL_ERROR: u16 = 0x2002;
pub const PTP_RC_SESSION_NOT_OPEN: u16 = 0x2003;
pub const PTP_RC_OPERATION_NOT_SUPPORTED: u16 = 0x2005;
pub const PTP_RC_INVALID_PARAMETER: u16 = 0x201D;
pub const PTP_RC_SESSION_ALREADY_OPEN: u16 = 0x201E;

// ============================================================================
// REC button press levels (COMMAND param0 of 0x9207)
// ============================================================================

/// Half press. Acknowledged, never starts or stops recording.
pub const REC_HALF_PRESS: u32 = 0x0000_D2C1;
/// Full press. The DATA payload decides start/stop.
pub const REC_FULL_PRESS: u32 = 0x0000_D2C8;

/// First DATA payload byte: start recording.
pub const REC_PAYLOAD_PRESS: u8 = 0x02;
/// First DATA payload byte: stop recording.
pub const REC_PAYLOAD_RELEASE: u8 = 0x01;

// ============================================================================
// Still Image class requests (PIMA 15740-2000 D.5.2)
// ============================================================================

pub const PTP_REQ_CANCEL: u8 = 0x64;
pub const PTP_REQ_GET_EXT_EVENT_DATA: u8 = 0x65;
pub const PTP_REQ_RESET: u8 = 0x66;
pub const PTP_REQ_GET_DEVICE_STATUS: u8 = 0x67;

// ============================================================================
// USB
// ============================================================================

/// Still Image interface class triple.
pub const PTP_ITF_CLASS: u8 = 0x06;
pub const PTP_ITF_SUBCLASS: u8 = 0x01;
pub const PTP_ITF_PROTOCOL: u8 = 0x01;

pub const EP_BULK_OUT: u8 = 0x02;
pub const EP_BULK_IN: u8 = 0x81;
/// Event endpoint, standard personality only.
pub const EP_EVENT_IN: u8 = 0x83;

/// Full-speed bulk max packet size.
pub const MAX_PACKET_SIZE: usize = 64;
/// Largest single bulk-OUT transfer the engine accepts.
pub const RX_BUF_SIZE: usize = 64;
/// Largest single bulk-IN transfer the engine submits.
pub const TX_BUF_SIZE: usize = 512;
/// Control data stage cap.
pub const CTRL_BUF_SIZE: usize = 64;

/// Standard container header length.
pub const STD_HEADER_LEN: usize = 12;
/// Maximum number of COMMAND parameters.
pub const MAX_PARAMS: usize = 5;

/// Human readable operation name for logs.
pub fn op_name(code: u16) -> Option<&'static str> {
    match code {
        PTP_OC_GET_DEVICE_INFO => Some("GetDeviceInfo"),
        PTP_OC_OPEN_SESSION => Some("OpenSession"),
        PTP_OC_CLOSE_SESSION => Some("CloseSession"),
        PTP_OC_GET_STORAGE_IDS => Some("GetStorageIDs"),
        PTP_OC_GET_STORAGE_INFO => Some("GetStorageInfo"),
        PTP_OC_GET_NUM_OBJECTS => Some("GetNumObjects"),
        PTP_OC_GET_OBJECT_HANDLES => Some("GetObjectHandles"),
        PTP_OC_SONY_9201 => Some("Sony 0x9201"),
        PTP_OC_SONY_9202 => Some("Sony 0x9202"),
        PTP_OC_SONY_REC => Some("Sony REC"),
        PTP_OC_SONY_9209 => Some("Sony 0x9209"),
        _ => None,
    }
}
