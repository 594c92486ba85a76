//! USB/IP device server.
//!
//! Exports one emulated camera. The server thread is the only context that
//! calls into the responder: URBs are read, turned into completions, and the
//! IN transfers the responder submits are matched against parked IN URBs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, trace, warn};

use super::protocol::*;
use crate::bus::{BusError, UsbBus};
use crate::descriptors::{DeviceDescriptors, CONFIG_VALUE, DESC_CONFIGURATION, DESC_DEVICE, DESC_STRING};
use crate::engine::{ControlRequest, ControlResponse, PtpResponder};
use crate::protocol::constants::*;

const REQ_GET_STATUS: u8 = 0x00;
const REQ_SET_ADDRESS: u8 = 0x05;
const REQ_GET_DESCRIPTOR: u8 = 0x06;
const REQ_GET_CONFIGURATION: u8 = 0x08;
const REQ_SET_CONFIGURATION: u8 = 0x09;
const REQ_GET_INTERFACE: u8 = 0x0A;
const REQ_SET_INTERFACE: u8 = 0x0B;

// ============================================================================
// Bus seen by the responder
// ============================================================================

/// Endpoint state behind the [`UsbBus`] handed to the responder.
#[derive(Debug, Default)]
pub struct EndpointBus {
    out_armed: Option<usize>,
    in_queue: HashMap<u8, VecDeque<Vec<u8>>>,
    stalled: HashSet<u8>,
}

impl EndpointBus {
    fn take_out_arm(&mut self) -> Option<usize> {
        self.out_armed.take()
    }

    fn pop_in(&mut self, ep: u8) -> Option<Vec<u8>> {
        self.in_queue.get_mut(&ep)?.pop_front()
    }

    pub fn queued_in(&self, ep: u8) -> usize {
        self.in_queue.get(&ep).map_or(0, VecDeque::len)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl UsbBus for EndpointBus {
    fn arm_out(&mut self, _ep: u8, max_len: usize) -> Result<(), BusError> {
        self.out_armed = Some(max_len);
        Ok(())
    }

    fn submit_in(&mut self, ep: u8, data: &[u8]) -> Result<(), BusError> {
        if data.len() > TX_BUF_SIZE {
            return Err(BusError::TooLarge {
                ep,
                len: data.len(),
                max: TX_BUF_SIZE,
            });
        }
        self.in_queue.entry(ep).or_default().push_back(data.to_vec());
        Ok(())
    }

    fn abort_in(&mut self, ep: u8) -> usize {
        let dropped = self.in_queue.remove(&ep).map_or(0, |q| q.len());
        if dropped > 0 {
            debug!(ep = format_args!("0x{:02X}", ep), dropped, "Queued IN transfers aborted");
        }
        dropped
    }

    fn is_stalled(&self, ep: u8) -> bool {
        self.stalled.contains(&ep)
    }

    fn clear_stall(&mut self, ep: u8) -> Result<(), BusError> {
        self.stalled.remove(&ep);
        Ok(())
    }
}

// ============================================================================
// Device
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParkedUrb {
    seqnum: u32,
    len: u32,
}

/// One exported device and its responder.
pub struct UsbIpDevice<R: PtpResponder> {
    responder: R,
    descriptors: DeviceDescriptors,
    exported: ExportedDevice,
    bus: EndpointBus,
    parked: HashMap<u8, VecDeque<ParkedUrb>>,
    configuration: u8,
}

impl<R: PtpResponder> UsbIpDevice<R> {
    pub fn new(responder: R, descriptors: DeviceDescriptors, bus_id: &str) -> Self {
        let exported = ExportedDevice::new(bus_id, &descriptors);
        Self {
            responder,
            descriptors,
            exported,
            bus: EndpointBus::default(),
            parked: HashMap::new(),
            configuration: 0,
        }
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    pub fn exported(&self) -> &ExportedDevice {
        &self.exported
    }

    pub fn bus(&self) -> &EndpointBus {
        &self.bus
    }

    /// Accept hosts on `addr` forever, one at a time.
    #[instrument(skip(self), fields(bus_id = %self.exported.bus_id))]
    pub fn serve(&mut self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).with_context(|| format!("binding {addr}"))?;
        info!(
            addr = %listener.local_addr()?,
            vid = format_args!("{:04X}", self.exported.vid),
            pid = format_args!("{:04X}", self.exported.pid),
            "USB/IP server listening"
        );

        for conn in listener.incoming() {
            let mut stream = match conn {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "USB/IP accept failed");
                    continue;
                }
            };
            let peer = stream.peer_addr().ok();
            let _ = stream.set_nodelay(true);
            info!(peer = ?peer, "USB/IP host connected");
            match self.handle_connection(&mut stream) {
                Ok(()) | Err(UsbIpError::Closed) => info!(peer = ?peer, "USB/IP host gone"),
                Err(e) => warn!(peer = ?peer, error = %e, "USB/IP session ended"),
            }
        }
        Ok(())
    }

    /// Run one host connection through the operation and URB phases.
    pub fn handle_connection<S: Read + Write>(&mut self, stream: &mut S) -> Result<(), UsbIpError> {
        match read_op_request(stream)? {
            OpRequest::DevList => {
                debug!("OP_REQ_DEVLIST");
                write_devlist_reply(stream, &self.exported)?;
                Ok(())
            }
            OpRequest::Import { bus_id } => {
                if bus_id != self.exported.bus_id {
                    write_import_reply(stream, None)?;
                    return Err(UsbIpError::UnknownBusId {
                        requested: bus_id,
                        exported: self.exported.bus_id.clone(),
                    });
                }
                info!(bus_id = %bus_id, "Device imported");
                write_import_reply(stream, Some(&self.exported))?;

                let result = loop {
                    let cmd = match read_urb_command(stream) {
                        Ok(c) => c,
                        Err(e) => break Err(e),
                    };
                    if let Err(e) = self.handle_urb(cmd, stream) {
                        break Err(e);
                    }
                };
                self.detach();
                result
            }
        }
    }

    /// Host went away: equivalent of a bus reset.
    fn detach(&mut self) {
        self.parked.clear();
        self.bus.reset();
        self.configuration = 0;
        self.responder.on_bus_reset();
    }

    pub fn handle_urb<W: Write>(&mut self, cmd: UrbCommand, w: &mut W) -> Result<(), UsbIpError> {
        match cmd {
            UrbCommand::Submit(submit) => self.handle_submit(submit, w),
            UrbCommand::Unlink {
                seqnum,
                unlink_seqnum,
            } => {
                let mut found = false;
                for queue in self.parked.values_mut() {
                    if let Some(pos) = queue.iter().position(|u| u.seqnum == unlink_seqnum) {
                        queue.remove(pos);
                        found = true;
                        break;
                    }
                }
                debug!(seqnum, unlink_seqnum, found, "CMD_UNLINK");
                let status = if found { ECONNRESET } else { 0 };
                write_ret_unlink(w, seqnum, status)?;
                Ok(())
            }
        }
    }

    fn handle_submit<W: Write>(&mut self, cmd: CmdSubmit, w: &mut W) -> Result<(), UsbIpError> {
        if cmd.ep == 0 {
            return self.handle_control(cmd, w);
        }

        let addr = cmd.endpoint_address();
        if self.descriptors.endpoint(addr).is_none() || self.bus.is_stalled(addr) {
            debug!(ep = format_args!("0x{:02X}", addr), "URB on unusable endpoint");
            write_ret_submit(w, cmd.seqnum, EPIPE, 0, &[])?;
            return Ok(());
        }

        if cmd.is_in() {
            trace!(seqnum = cmd.seqnum, ep = format_args!("0x{:02X}", addr), "IN URB parked");
            self.parked.entry(addr).or_default().push_back(ParkedUrb {
                seqnum: cmd.seqnum,
                len: cmd.transfer_buffer_length,
            });
            return self.flush_in(w);
        }

        // The device side receives in units of the armed buffer size.
        let mut rest = cmd.data.as_slice();
        loop {
            let max = self.bus.take_out_arm().unwrap_or_else(|| {
                debug!("Bulk OUT data with no receive armed");
                RX_BUF_SIZE
            });
            let n = rest.len().min(max.max(1));
            self.responder.on_out_complete(&mut self.bus, &rest[..n]);
            rest = &rest[n..];
            self.flush_in(w)?;
            if rest.is_empty() {
                break;
            }
        }
        write_ret_submit(w, cmd.seqnum, 0, cmd.data.len() as u32, &[])?;
        self.flush_in(w)
    }

    /// Complete parked IN URBs with whatever the responder has submitted.
    fn flush_in<W: Write>(&mut self, w: &mut W) -> Result<(), UsbIpError> {
        loop {
            let ready = self
                .parked
                .iter()
                .filter(|(ep, q)| !q.is_empty() && self.bus.queued_in(**ep) > 0)
                .map(|(ep, _)| *ep)
                .min();
            let Some(ep) = ready else {
                return Ok(());
            };
            let (Some(urb), Some(mut data)) = (
                self.parked.get_mut(&ep).and_then(VecDeque::pop_front),
                self.bus.pop_in(ep),
            ) else {
                return Ok(());
            };
            if data.len() > urb.len as usize {
                warn!(
                    ep = format_args!("0x{:02X}", ep),
                    len = data.len(),
                    urb_len = urb.len,
                    "IN data larger than URB, truncated"
                );
                data.truncate(urb.len as usize);
            }
            trace!(seqnum = urb.seqnum, len = data.len(), "IN URB completed");
            write_ret_submit(w, urb.seqnum, 0, data.len() as u32, &data)?;
            self.responder.on_in_complete(&mut self.bus, ep);
        }
    }

    fn handle_control<W: Write>(&mut self, cmd: CmdSubmit, w: &mut W) -> Result<(), UsbIpError> {
        let req = ControlRequest::from_setup(&cmd.setup);
        let response = if req.is_standard() && !req.to_endpoint() {
            self.standard_request(&req)
        } else {
            self.responder.on_control_request(&mut self.bus, &req, &cmd.data)
        };

        match response {
            ControlResponse::Data(mut data) => {
                data.truncate(req.length as usize);
                write_ret_submit(w, cmd.seqnum, 0, data.len() as u32, &data)?;
            }
            ControlResponse::Ack => {
                write_ret_submit(w, cmd.seqnum, 0, cmd.data.len() as u32, &[])?;
            }
            ControlResponse::Unhandled => {
                debug!(
                    request_type = format_args!("0x{:02X}", req.request_type),
                    request = format_args!("0x{:02X}", req.request),
                    "Control request stalled"
                );
                write_ret_submit(w, cmd.seqnum, EPIPE, 0, &[])?;
            }
        }
        // SET_CONFIGURATION and RESET may have produced IN data.
        self.flush_in(w)
    }

    fn standard_request(&mut self, req: &ControlRequest) -> ControlResponse {
        match req.request {
            REQ_GET_DESCRIPTOR => {
                let index = (req.value & 0xFF) as u8;
                match (req.value >> 8) as u8 {
                    DESC_DEVICE => ControlResponse::Data(self.descriptors.device().to_vec()),
                    DESC_CONFIGURATION => ControlResponse::Data(self.descriptors.configuration()),
                    DESC_STRING => self
                        .descriptors
                        .string(index)
                        .map_or(ControlResponse::Unhandled, ControlResponse::Data),
                    // No qualifier or BOS: full-speed only.
                    _ => ControlResponse::Unhandled,
                }
            }
            REQ_SET_CONFIGURATION => {
                let value = req.value as u8;
                info!(configuration = value, "SET_CONFIGURATION");
                self.configuration = value;
                if value == CONFIG_VALUE {
                    self.responder.on_interface_open(&mut self.bus, 0);
                }
                ControlResponse::Ack
            }
            REQ_GET_CONFIGURATION => ControlResponse::Data(vec![self.configuration]),
            REQ_GET_STATUS => ControlResponse::Data(vec![0, 0]),
            REQ_GET_INTERFACE => ControlResponse::Data(vec![0]),
            REQ_SET_ADDRESS | REQ_SET_INTERFACE => ControlResponse::Ack,
            _ => ControlResponse::Unhandled,
        }
    }
}
