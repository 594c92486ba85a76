//! Host-side access to a real PTP camera over USB.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use nusb::io::{EndpointRead, EndpointWrite};
use nusb::transfer::{Bulk, In, Out};
use nusb::{MaybeFuture, list_devices};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::catalog::DeviceInfo;
use crate::protocol::constants::*;
use crate::protocol::{command_container, read_std_header, ContainerHeader, ContainerType, FrameError};

/// Upper bound on a container read from the camera.
pub const MAX_CONTAINER_LEN: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("No PTP camera found (VID={vid:?} PID={pid:?})")]
    NotFound { vid: Option<u16>, pid: Option<u16> },

    #[error("Failed to open camera: {0}")]
    OpenFailed(String),

    #[error("Failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("Bulk {direction} endpoint not found")]
    EndpointNotFound { direction: &'static str },

    #[error("Camera timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Bad container from camera: {0}")]
    BadContainer(#[from] FrameError),

    #[error("Container length {0} out of range")]
    BadLength(u32),

    #[error("Camera answered 0x{code:04X} to 0x{op:04X}")]
    Rejected { op: u16, code: u16 },

    #[error("Unexpected {got} container while waiting for {wanted}")]
    UnexpectedContainer { got: ContainerType, wanted: ContainerType },

    #[error("Malformed dataset: {0}")]
    Dataset(String),
}

/// An opened PTP interface with its bulk endpoints.
pub struct PtpCamera {
    reader: EndpointRead<Bulk>,
    writer: EndpointWrite<Bulk>,
    vid: u16,
    pid: u16,
    interface: u8,
}

impl PtpCamera {
    /// Open the first Still Image interface, optionally filtered by VID/PID.
    #[instrument(level = "info")]
    pub fn open(vid: Option<u16>, pid: Option<u16>) -> Result<Self, CameraError> {
        let devices = list_devices()
            .wait()
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        for device_info in devices {
            if vid.is_some_and(|v| v != device_info.vendor_id())
                || pid.is_some_and(|p| p != device_info.product_id())
            {
                continue;
            }
            let ptp_interface = device_info.interfaces().find(|i| {
                i.class() == PTP_ITF_CLASS
                    && i.subclass() == PTP_ITF_SUBCLASS
                    && i.protocol() == PTP_ITF_PROTOCOL
            });
            if let Some(itf) = ptp_interface {
                let number = itf.interface_number();
                return Self::open_device_info(device_info, number);
            }
        }

        Err(CameraError::NotFound { vid, pid })
    }

    fn open_device_info(device_info: nusb::DeviceInfo, number: u8) -> Result<Self, CameraError> {
        let vid = device_info.vendor_id();
        let pid = device_info.product_id();
        info!(
            vendor_id = %format!("{:04X}", vid),
            product_id = %format!("{:04X}", pid),
            interface = number,
            "Found PTP camera"
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        let interface = device
            .detach_and_claim_interface(number)
            .wait()
            .map_err(|e| CameraError::ClaimInterfaceFailed {
                interface: number,
                message: e.to_string(),
            })?;

        let mut in_endpoint: u8 = 0;
        let mut out_endpoint: u8 = 0;
        for config in device.configurations() {
            for iface in config.interfaces() {
                if iface.interface_number() != number {
                    continue;
                }
                for alt in iface.alt_settings() {
                    for ep in alt.endpoints() {
                        if ep.transfer_type() != nusb::descriptors::TransferType::Bulk {
                            continue;
                        }
                        if ep.direction() == nusb::transfer::Direction::In {
                            in_endpoint = ep.address();
                        } else {
                            out_endpoint = ep.address();
                        }
                    }
                }
            }
        }
        if in_endpoint == 0 {
            return Err(CameraError::EndpointNotFound { direction: "IN" });
        }
        if out_endpoint == 0 {
            return Err(CameraError::EndpointNotFound { direction: "OUT" });
        }

        let reader = interface
            .endpoint::<Bulk, In>(in_endpoint)
            .map_err(|e| CameraError::Transfer(e.to_string()))?
            .reader(4096);
        let writer = interface
            .endpoint::<Bulk, Out>(out_endpoint)
            .map_err(|e| CameraError::Transfer(e.to_string()))?
            .writer(4096);

        info!(
            in_ep = %format!("0x{:02X}", in_endpoint),
            out_ep = %format!("0x{:02X}", out_endpoint),
            "Camera opened"
        );
        Ok(Self {
            reader,
            writer,
            vid,
            pid,
            interface: number,
        })
    }

    pub fn vendor_id(&self) -> u16 {
        self.vid
    }

    pub fn product_id(&self) -> u16 {
        self.pid
    }

    pub fn interface_number(&self) -> u8 {
        self.interface
    }

    /// Write one container to bulk OUT.
    #[instrument(skip(self, data), fields(len = data.len()))]
    pub fn send(&mut self, data: &[u8]) -> Result<(), CameraError> {
        self.writer
            .write_all(data)
            .and_then(|_| self.writer.flush())
            .map_err(|e| CameraError::Transfer(e.to_string()))
    }

    /// Read one whole container, using its length field to find the end.
    pub fn read_container(&mut self, timeout: Duration) -> Result<Vec<u8>, CameraError> {
        self.reader.set_read_timeout(timeout);
        let timeout_ms = timeout.as_millis() as u64;
        let map = |e: std::io::Error| match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => CameraError::Timeout { timeout_ms },
            _ => CameraError::Transfer(e.to_string()),
        };

        let mut container = vec![0u8; STD_HEADER_LEN];
        self.reader.read_exact(&mut container).map_err(map)?;
        let total = LittleEndian::read_u32(&container[0..4]);
        if (total as usize) < STD_HEADER_LEN || total as usize > MAX_CONTAINER_LEN {
            return Err(CameraError::BadLength(total));
        }
        container.resize(total as usize, 0);
        self.reader
            .read_exact(&mut container[STD_HEADER_LEN..])
            .map_err(map)?;
        debug!(len = total, "Container from camera");
        Ok(container)
    }

    /// Read containers until a RESPONSE, returning its code.
    pub fn read_response(&mut self, timeout: Duration) -> Result<ContainerHeader, CameraError> {
        loop {
            let container = self.read_container(timeout)?;
            let (_, header) = read_std_header(&container)?;
            if header.container_type == ContainerType::Response {
                return Ok(header);
            }
        }
    }

    /// COMMAND with no DATA phase, expecting a RESPONSE.
    pub fn command(
        &mut self,
        code: u16,
        tid: u32,
        params: &[u32],
        timeout: Duration,
    ) -> Result<u16, CameraError> {
        self.send(&command_container(code, tid, params))?;
        Ok(self.read_response(timeout)?.code)
    }

    /// Close any session a previous host left open. Failures are only logged.
    pub fn close_stale_session(&mut self) {
        let timeout = Duration::from_millis(1200);
        match self.command(PTP_OC_CLOSE_SESSION, 1, &[], timeout) {
            Ok(PTP_RC_OK) => {
                info!("Closed stale camera session");
                return;
            }
            Ok(code) => debug!(code = format_args!("0x{:04X}", code), "Preflight CloseSession"),
            Err(e) => debug!(error = %e, "Preflight CloseSession failed"),
        }
        match self.command(PTP_OC_OPEN_SESSION, 2, &[1], timeout) {
            Ok(code) => debug!(code = format_args!("0x{:04X}", code), "Preflight OpenSession"),
            Err(e) => debug!(error = %e, "Preflight OpenSession failed"),
        }
        match self.command(PTP_OC_CLOSE_SESSION, 3, &[], timeout) {
            Ok(code) => debug!(code = format_args!("0x{:04X}", code), "Preflight CloseSession"),
            Err(e) => debug!(error = %e, "Preflight CloseSession failed"),
        }
    }

    /// OpenSession, GetDeviceInfo, CloseSession.
    #[instrument(skip(self))]
    pub fn device_info(&mut self) -> Result<DeviceInfo, CameraError> {
        let timeout = Duration::from_secs(4);
        match self.command(PTP_OC_OPEN_SESSION, 1, &[1], timeout)? {
            PTP_RC_OK | PTP_RC_SESSION_ALREADY_OPEN => {}
            code => {
                return Err(CameraError::Rejected {
                    op: PTP_OC_OPEN_SESSION,
                    code,
                });
            }
        }

        self.send(&command_container(PTP_OC_GET_DEVICE_INFO, 2, &[]))?;
        let data = self.read_container(timeout)?;
        let (_, header) = read_std_header(&data)?;
        if header.container_type != ContainerType::Data {
            return Err(CameraError::UnexpectedContainer {
                got: header.container_type,
                wanted: ContainerType::Data,
            });
        }
        let response = self.read_response(timeout)?;
        if response.code != PTP_RC_OK {
            return Err(CameraError::Rejected {
                op: PTP_OC_GET_DEVICE_INFO,
                code: response.code,
            });
        }
        let info = DeviceInfo::from_bytes(&data[STD_HEADER_LEN..])
            .map_err(|e| CameraError::Dataset(e.to_string()))?;

        if let Err(e) = self.command(PTP_OC_CLOSE_SESSION, 3, &[], timeout) {
            debug!(error = %e, "CloseSession after probe failed");
        }
        Ok(info)
    }
}
