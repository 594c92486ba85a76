//! PTPCam-Core: a PTP still-camera emulator for USB device stacks.
//!
//! This crate answers a gimbal or other PTP host as if it were a Sony camera,
//! and can alternatively tunnel the host's traffic to a PC that either
//! emulates the camera or relays it to a real one.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Constants, container header codec, layout classifier
//! - **Catalog**: Canned DATA payloads and dataset encoding
//! - **Bus**: Device-side USB stack abstraction (USB/IP, mock)
//! - **Engine**: Transaction state, TX streaming, control requests and the
//!   standard, legacy and raw-proxy personalities
//! - **Events**: Observer pattern and the REC event dispatcher
//! - **Proxy**: Framed TCP transport to the PC relay
//! - **Relay**: PC-side peer of the proxy, with emulated and real-camera backends
//! - **USB/IP**: Exports the emulated device to a Linux host
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ptpcam_core::descriptors::DeviceDescriptors;
//! use ptpcam_core::engine::{LegacyResponder, Personality, Responder};
//! use ptpcam_core::events::TracingObserver;
//! use ptpcam_core::usbip::UsbIpDevice;
//! use ptpcam_core::DeviceConfig;
//!
//! let config = DeviceConfig::default();
//! let responder: Responder =
//!     Responder::Legacy(LegacyResponder::new(Arc::new(TracingObserver)));
//! let descriptors = DeviceDescriptors::new(Personality::Legacy, &config.usb);
//! let mut device = UsbIpDevice::new(responder, descriptors, &config.usbip.bus_id);
//! device.serve(config.usbip.bind_addr()?).expect("USB/IP server failed");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bus;
pub mod camera;
pub mod catalog;
pub mod config;
pub mod descriptors;
pub mod engine;
pub mod events;
pub mod protocol;
pub mod proxy;
pub mod relay;
pub mod usbip;

// Re-exports for convenience
pub use bus::{BusError, MockBus, UsbBus};
pub use camera::{CameraError, PtpCamera};
pub use catalog::{DeviceInfo, minimal_device_info};
pub use config::{ConfigError, DeviceConfig, UsbIdentity};
pub use descriptors::DeviceDescriptors;
pub use engine::{
    LegacyResponder, Personality, PtpResponder, Responder, StandardResponder,
};
pub use events::{
    NullObserver, ObserverSet, PtpEvent, PtpObserver, RecEvent, RecEventDispatcher,
    TracingObserver,
};
pub use protocol::{ContainerType, Frame, FrameError, Layout, classify};
pub use proxy::{ProxyError, ProxyFrame, ProxyServer, RawProxyBridge, RelayLink};
pub use relay::{CameraBackend, EmulatedBackend, RelayBackend, RelayClient, ReplyLayout};
pub use usbip::{UsbIpDevice, UsbIpError};
