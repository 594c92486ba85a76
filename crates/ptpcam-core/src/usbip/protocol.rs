//! USB/IP wire format, device side.
//!
//! Two phases share the socket. Before import the host sends operation
//! requests (`OP_REQ_*`, 8-byte header). After a successful import the
//! stream carries URB commands with a fixed 48-byte header. All integers
//! are big-endian.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::descriptors::DeviceDescriptors;

pub const USBIP_VERSION: u16 = 0x0111;

pub const OP_REQ_DEVLIST: u16 = 0x8005;
pub const OP_REP_DEVLIST: u16 = 0x0005;
pub const OP_REQ_IMPORT: u16 = 0x8003;
pub const OP_REP_IMPORT: u16 = 0x0003;

pub const USBIP_CMD_SUBMIT: u32 = 0x0001;
pub const USBIP_CMD_UNLINK: u32 = 0x0002;
pub const USBIP_RET_SUBMIT: u32 = 0x0003;
pub const USBIP_RET_UNLINK: u32 = 0x0004;

pub const USBIP_DIR_OUT: u32 = 0;
pub const USBIP_DIR_IN: u32 = 1;

pub const URB_HEADER_SIZE: usize = 48;

/// Full speed, matching the 64-byte bulk endpoints.
pub const USB_SPEED_FULL: u32 = 2;

// Linux errno values carried in RET_* status.
pub const ECONNRESET: i32 = -104;
pub const EPIPE: i32 = -32;

const PATH_LEN: usize = 256;
const BUSID_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum UsbIpError {
    #[error("Unsupported USB/IP version 0x{0:04X}")]
    BadVersion(u16),

    #[error("Unknown operation 0x{0:04X}")]
    UnknownOp(u16),

    #[error("Unknown URB command 0x{0:08X}")]
    UnknownCommand(u32),

    #[error("Host asked for bus id '{requested}', exporting '{exported}'")]
    UnknownBusId { requested: String, exported: String },

    #[error("Transfer buffer length {0} is too large")]
    BadLength(u32),

    #[error("Connection closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for UsbIpError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            UsbIpError::Closed
        } else {
            UsbIpError::Io(e)
        }
    }
}

// ============================================================================
// Operation phase
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpRequest {
    DevList,
    Import { bus_id: String },
}

pub fn read_op_request<R: Read>(r: &mut R) -> Result<OpRequest, UsbIpError> {
    let version = r.read_u16::<BigEndian>()?;
    let code = r.read_u16::<BigEndian>()?;
    let _status = r.read_u32::<BigEndian>()?;
    if version != USBIP_VERSION {
        return Err(UsbIpError::BadVersion(version));
    }
    match code {
        OP_REQ_DEVLIST => Ok(OpRequest::DevList),
        OP_REQ_IMPORT => {
            let mut raw = [0u8; BUSID_LEN];
            r.read_exact(&mut raw)?;
            Ok(OpRequest::Import {
                bus_id: c_string(&raw),
            })
        }
        other => Err(UsbIpError::UnknownOp(other)),
    }
}

fn c_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn write_fixed<W: Write>(w: &mut W, text: &str, len: usize) -> io::Result<()> {
    let mut buf = vec![0u8; len];
    let n = text.len().min(len - 1);
    buf[..n].copy_from_slice(&text.as_bytes()[..n]);
    w.write_all(&buf)
}

fn write_op_header<W: Write>(w: &mut W, code: u16, status: u32) -> io::Result<()> {
    w.write_u16::<BigEndian>(USBIP_VERSION)?;
    w.write_u16::<BigEndian>(code)?;
    w.write_u32::<BigEndian>(status)
}

/// The exported device as the host sees it before import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDevice {
    pub path: String,
    pub bus_id: String,
    pub busnum: u32,
    pub devnum: u32,
    pub vid: u16,
    pub pid: u16,
    pub bcd_device: u16,
    pub num_interfaces: u8,
    pub interface: (u8, u8, u8),
}

impl ExportedDevice {
    pub fn new(bus_id: &str, desc: &DeviceDescriptors) -> Self {
        let busnum = bus_id
            .split('-')
            .next()
            .and_then(|b| b.parse().ok())
            .unwrap_or(1);
        Self {
            path: format!("/sys/devices/platform/ptpcam/usb{busnum}/{bus_id}"),
            bus_id: bus_id.to_string(),
            busnum,
            devnum: 2,
            vid: desc.vid,
            pid: desc.pid,
            bcd_device: desc.bcd_device,
            num_interfaces: 1,
            interface: desc.interface_triple(),
        }
    }

    pub fn devid(&self) -> u32 {
        (self.busnum << 16) | self.devnum
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_fixed(w, &self.path, PATH_LEN)?;
        write_fixed(w, &self.bus_id, BUSID_LEN)?;
        w.write_u32::<BigEndian>(self.busnum)?;
        w.write_u32::<BigEndian>(self.devnum)?;
        w.write_u32::<BigEndian>(USB_SPEED_FULL)?;
        w.write_u16::<BigEndian>(self.vid)?;
        w.write_u16::<BigEndian>(self.pid)?;
        w.write_u16::<BigEndian>(self.bcd_device)?;
        // Device class/subclass/protocol: per interface.
        w.write_all(&[0, 0, 0])?;
        w.write_u8(crate::descriptors::CONFIG_VALUE)?;
        w.write_u8(1)?;
        w.write_u8(self.num_interfaces)
    }
}

pub fn write_devlist_reply<W: Write>(w: &mut W, dev: &ExportedDevice) -> io::Result<()> {
    write_op_header(w, OP_REP_DEVLIST, 0)?;
    w.write_u32::<BigEndian>(1)?;
    dev.write_to(w)?;
    let (class, subclass, protocol) = dev.interface;
    w.write_all(&[class, subclass, protocol, 0])?;
    w.flush()
}

/// `dev` is `None` when the import is refused.
pub fn write_import_reply<W: Write>(w: &mut W, dev: Option<&ExportedDevice>) -> io::Result<()> {
    match dev {
        Some(dev) => {
            write_op_header(w, OP_REP_IMPORT, 0)?;
            dev.write_to(w)?;
        }
        None => write_op_header(w, OP_REP_IMPORT, 1)?,
    }
    w.flush()
}

// ============================================================================
// URB phase
// ============================================================================

/// CMD_SUBMIT with its OUT data, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdSubmit {
    pub seqnum: u32,
    pub devid: u32,
    pub direction: u32,
    pub ep: u32,
    pub transfer_flags: u32,
    pub transfer_buffer_length: u32,
    pub interval: u32,
    pub setup: [u8; 8],
    pub data: Vec<u8>,
}

impl CmdSubmit {
    pub fn is_in(&self) -> bool {
        self.direction == USBIP_DIR_IN
    }

    /// USB endpoint address including the direction bit.
    pub fn endpoint_address(&self) -> u8 {
        let num = (self.ep & 0x0F) as u8;
        if self.is_in() { num | 0x80 } else { num }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrbCommand {
    Submit(CmdSubmit),
    Unlink { seqnum: u32, unlink_seqnum: u32 },
}

/// Largest OUT payload accepted in one URB.
const MAX_URB_DATA: u32 = 1 << 20;

pub fn read_urb_command<R: Read>(r: &mut R) -> Result<UrbCommand, UsbIpError> {
    let command = r.read_u32::<BigEndian>()?;
    let seqnum = r.read_u32::<BigEndian>()?;
    let devid = r.read_u32::<BigEndian>()?;
    let direction = r.read_u32::<BigEndian>()?;
    let ep = r.read_u32::<BigEndian>()?;

    match command {
        USBIP_CMD_SUBMIT => {
            let transfer_flags = r.read_u32::<BigEndian>()?;
            let transfer_buffer_length = r.read_u32::<BigEndian>()?;
            let _start_frame = r.read_u32::<BigEndian>()?;
            let _number_of_packets = r.read_u32::<BigEndian>()?;
            let interval = r.read_u32::<BigEndian>()?;
            let mut setup = [0u8; 8];
            r.read_exact(&mut setup)?;

            if transfer_buffer_length > MAX_URB_DATA {
                return Err(UsbIpError::BadLength(transfer_buffer_length));
            }
            let mut data = Vec::new();
            if direction == USBIP_DIR_OUT && transfer_buffer_length > 0 {
                data = vec![0u8; transfer_buffer_length as usize];
                r.read_exact(&mut data)?;
            }
            Ok(UrbCommand::Submit(CmdSubmit {
                seqnum,
                devid,
                direction,
                ep,
                transfer_flags,
                transfer_buffer_length,
                interval,
                setup,
                data,
            }))
        }
        USBIP_CMD_UNLINK => {
            let unlink_seqnum = r.read_u32::<BigEndian>()?;
            let mut pad = [0u8; 24];
            r.read_exact(&mut pad)?;
            Ok(UrbCommand::Unlink {
                seqnum,
                unlink_seqnum,
            })
        }
        other => Err(UsbIpError::UnknownCommand(other)),
    }
}

fn write_urb_header<W: Write>(w: &mut W, command: u32, seqnum: u32) -> io::Result<()> {
    w.write_u32::<BigEndian>(command)?;
    w.write_u32::<BigEndian>(seqnum)?;
    // devid, direction and ep are zero in replies.
    w.write_all(&[0u8; 12])
}

/// RET_SUBMIT. `data` is IN data and must be empty for OUT URBs, where
/// `actual_length` reports how much was consumed.
pub fn write_ret_submit<W: Write>(
    w: &mut W,
    seqnum: u32,
    status: i32,
    actual_length: u32,
    data: &[u8],
) -> io::Result<()> {
    write_urb_header(w, USBIP_RET_SUBMIT, seqnum)?;
    w.write_i32::<BigEndian>(status)?;
    w.write_u32::<BigEndian>(actual_length)?;
    w.write_u32::<BigEndian>(0)?;
    w.write_u32::<BigEndian>(0)?;
    w.write_u32::<BigEndian>(0)?;
    w.write_all(&[0u8; 8])?;
    w.write_all(data)?;
    w.flush()
}

pub fn write_ret_unlink<W: Write>(w: &mut W, seqnum: u32, status: i32) -> io::Result<()> {
    write_urb_header(w, USBIP_RET_UNLINK, seqnum)?;
    w.write_i32::<BigEndian>(status)?;
    w.write_all(&[0u8; 24])?;
    w.flush()
}
