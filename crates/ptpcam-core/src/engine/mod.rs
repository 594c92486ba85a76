//! PTP responder engine.
//!
//! A responder is driven entirely by device-stack callbacks. It owns all of
//! its state and mutates it through `&mut self`, so the stack must deliver
//! callbacks from a single context.

pub mod control;
pub mod legacy;
pub mod standard;
pub mod state;
pub mod stream;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bus::UsbBus;
use crate::proxy::{ProxyServer, RawProxyBridge, RelayLink};

pub use control::{handle_control, ControlOutcome, ControlRequest, ControlResponse};
pub use legacy::LegacyResponder;
pub use standard::{DeviceIdentity, StandardResponder};
pub use state::{PendingOp, Phase, Session, Transaction};
pub use stream::{send_response, StreamError, StreamStep, TxStream};

/// Callbacks a personality answers.
pub trait PtpResponder {
    /// USB bus reset or disconnect.
    fn on_bus_reset(&mut self);

    /// Host selected the PTP interface. Must arm the first bulk-OUT receive.
    fn on_interface_open<B: UsbBus>(&mut self, bus: &mut B, interface: u8);

    /// A control request the device stack did not answer itself.
    fn on_control_request<B: UsbBus>(
        &mut self,
        bus: &mut B,
        req: &ControlRequest,
        data_out: &[u8],
    ) -> ControlResponse;

    /// A bulk-OUT transfer completed with `data`. Must re-arm OUT.
    fn on_out_complete<B: UsbBus>(&mut self, bus: &mut B, data: &[u8]);

    /// An IN transfer on `ep` finished.
    fn on_in_complete<B: UsbBus>(&mut self, bus: &mut B, ep: u8);
}

/// Which device the emulator presents. Fixed at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Personality {
    Standard,
    #[default]
    Legacy,
    RawProxy,
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Personality::Standard => write!(f, "standard"),
            Personality::Legacy => write!(f, "legacy"),
            Personality::RawProxy => write!(f, "raw-proxy"),
        }
    }
}

impl FromStr for Personality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Personality::Standard),
            "legacy" => Ok(Personality::Legacy),
            "raw-proxy" | "raw" => Ok(Personality::RawProxy),
            other => Err(format!("unknown personality '{other}'")),
        }
    }
}

/// The selected personality.
pub enum Responder<L: RelayLink = ProxyServer> {
    Standard(StandardResponder),
    Legacy(LegacyResponder),
    RawProxy(RawProxyBridge<L>),
}

impl<L: RelayLink> Responder<L> {
    pub fn personality(&self) -> Personality {
        match self {
            Responder::Standard(_) => Personality::Standard,
            Responder::Legacy(_) => Personality::Legacy,
            Responder::RawProxy(_) => Personality::RawProxy,
        }
    }
}

impl<L: RelayLink> PtpResponder for Responder<L> {
    fn on_bus_reset(&mut self) {
        match self {
            Responder::Standard(r) => r.on_bus_reset(),
            Responder::Legacy(r) => r.on_bus_reset(),
            Responder::RawProxy(r) => r.on_bus_reset(),
        }
    }

    fn on_interface_open<B: UsbBus>(&mut self, bus: &mut B, interface: u8) {
        match self {
            Responder::Standard(r) => r.on_interface_open(bus, interface),
            Responder::Legacy(r) => r.on_interface_open(bus, interface),
            Responder::RawProxy(r) => r.on_interface_open(bus, interface),
        }
    }

    fn on_control_request<B: UsbBus>(
        &mut self,
        bus: &mut B,
        req: &ControlRequest,
        data_out: &[u8],
    ) -> ControlResponse {
        match self {
            Responder::Standard(r) => r.on_control_request(bus, req, data_out),
            Responder::Legacy(r) => r.on_control_request(bus, req, data_out),
            Responder::RawProxy(r) => r.on_control_request(bus, req, data_out),
        }
    }

    fn on_out_complete<B: UsbBus>(&mut self, bus: &mut B, data: &[u8]) {
        match self {
            Responder::Standard(r) => r.on_out_complete(bus, data),
            Responder::Legacy(r) => r.on_out_complete(bus, data),
            Responder::RawProxy(r) => r.on_out_complete(bus, data),
        }
    }

    fn on_in_complete<B: UsbBus>(&mut self, bus: &mut B, ep: u8) {
        match self {
            Responder::Standard(r) => r.on_in_complete(bus, ep),
            Responder::Legacy(r) => r.on_in_complete(bus, ep),
            Responder::RawProxy(r) => r.on_in_complete(bus, ep),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;
    use crate::protocol::constants::*;
    use crate::protocol::{command_container, read_std_header};
    use crate::proxy::{MockRelay, ProxyFrame};

    #[test]
    fn test_personality_names() {
        for p in [
            Personality::Standard,
            Personality::Legacy,
            Personality::RawProxy,
        ] {
            assert_eq!(p.to_string().parse::<Personality>(), Ok(p));
        }
        assert!("webcam".parse::<Personality>().is_err());
    }

    #[test]
    fn test_responder_dispatches() {
        let mut bus = MockBus::new();
        let mut r: Responder<MockRelay> = Responder::Legacy(LegacyResponder::default());
        r.on_interface_open(&mut bus, 0);
        r.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 1, &[1]));
        let (_, hdr) = read_std_header(&bus.in_transfers()[0]).unwrap();
        assert_eq!(hdr.code, PTP_RC_OK);
        assert_eq!(r.personality(), Personality::Legacy);
    }

    #[test]
    fn test_raw_responder_forwards() {
        let relay = MockRelay::connected();
        relay.queue_reply(ProxyFrame::done());
        let mut bus = MockBus::new();
        let mut r = Responder::RawProxy(RawProxyBridge::with_link(relay.clone()));
        r.on_interface_open(&mut bus, 0);
        r.on_out_complete(&mut bus, &[1, 2]);
        assert_eq!(relay.sent(), vec![ProxyFrame::raw_out(&[1, 2])]);
        assert!(bus.in_transfers().is_empty());
    }
}
