//! USB/IP export of the emulated camera.
//!
//! Lets a Linux host attach the emulator with `usbip attach -r <host> -b 1-1`
//! and talk to it through the regular kernel PTP path.

pub mod protocol;
pub mod server;

pub use protocol::{ExportedDevice, UsbIpError, USBIP_VERSION};
pub use server::{EndpointBus, UsbIpDevice};
