//! Raw proxy personality.
//!
//! Nothing is parsed. Each bulk-OUT transfer goes to the relay as RAW_OUT,
//! the relay's RAW_IN frames are collected until RAW_DONE, and then replayed
//! onto bulk IN one per completion.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::frame::{FrameKind, ProxyError, ProxyFrame};
use super::server::RelayLink;
use crate::bus::UsbBus;
use crate::engine::control::{handle_control, ControlRequest, ControlResponse};
use crate::engine::PtpResponder;
use crate::events::{Direction, NullObserver, PtpEvent, PtpObserver, ResetReason};
use crate::protocol::constants::*;

pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(1500);
pub const DEFAULT_FRAME_BUDGET: usize = 8;

/// Per-OUT limits on waiting for the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    pub frame_timeout: Duration,
    /// Frames read per RAW_OUT, RAW_DONE included.
    pub frame_budget: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            frame_budget: DEFAULT_FRAME_BUDGET,
        }
    }
}

pub struct RawProxyBridge<L: RelayLink> {
    link: L,
    settings: RelaySettings,
    queue: VecDeque<Vec<u8>>,
    interface: u8,
    observer: Arc<dyn PtpObserver>,
}

impl<L: RelayLink> RawProxyBridge<L> {
    pub fn new(link: L, settings: RelaySettings, observer: Arc<dyn PtpObserver>) -> Self {
        Self {
            link,
            settings,
            queue: VecDeque::new(),
            interface: 0,
            observer,
        }
    }

    pub fn with_link(link: L) -> Self {
        Self::new(link, RelaySettings::default(), Arc::new(NullObserver))
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// IN frames still waiting to be replayed.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn emit(&self, event: PtpEvent) {
        self.observer.on_event(&event);
    }

    /// Forward one OUT transfer and collect the relay's answer.
    fn forward(&mut self, data: &[u8]) -> Result<(), ProxyError> {
        self.link.send_frame(&ProxyFrame::raw_out(data))?;

        for _ in 0..self.settings.frame_budget {
            let frame = match self.link.recv_frame(self.settings.frame_timeout) {
                Ok(f) => f,
                Err(ProxyError::Timeout) => {
                    debug!(queued = self.queue.len(), "Relay went quiet");
                    break;
                }
                Err(e @ ProxyError::FrameTooLarge { .. }) => {
                    warn!(error = %e, "Relay frame skipped");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match frame.kind() {
                Some(FrameKind::RawIn) => self.queue.push_back(frame.payload),
                Some(FrameKind::RawDone) => break,
                _ => {
                    warn!(
                        frame_type = format_args!("0x{:02X}", frame.frame_type),
                        "Unexpected frame from relay"
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    fn send_next<B: UsbBus>(&mut self, bus: &mut B) {
        let Some(data) = self.queue.pop_front() else {
            return;
        };
        self.emit(PtpEvent::Container {
            direction: Direction::In,
            summary: "raw".into(),
            length: data.len(),
        });
        if let Err(e) = bus.submit_in(EP_BULK_IN, &data) {
            warn!(error = %e, len = data.len(), "Replay IN submit failed");
        }
    }

    fn arm_out<B: UsbBus>(&self, bus: &mut B) {
        if let Err(e) = bus.arm_out(EP_BULK_OUT, RX_BUF_SIZE) {
            warn!(error = %e, "bulk OUT re-arm failed");
        }
    }
}

impl<L: RelayLink> PtpResponder for RawProxyBridge<L> {
    fn on_bus_reset(&mut self) {
        self.queue.clear();
        self.emit(PtpEvent::Reset {
            reason: ResetReason::Bus,
        });
    }

    fn on_interface_open<B: UsbBus>(&mut self, bus: &mut B, interface: u8) {
        self.interface = interface;
        self.queue.clear();
        self.emit(PtpEvent::InterfaceOpened { interface });
        self.arm_out(bus);
    }

    fn on_control_request<B: UsbBus>(
        &mut self,
        bus: &mut B,
        req: &ControlRequest,
        data_out: &[u8],
    ) -> ControlResponse {
        let outcome = handle_control(bus, req, data_out, self.interface);
        if outcome.reset {
            self.queue.clear();
            self.emit(PtpEvent::Reset {
                reason: ResetReason::ClassRequest,
            });
        }
        outcome.response
    }

    fn on_out_complete<B: UsbBus>(&mut self, bus: &mut B, data: &[u8]) {
        self.emit(PtpEvent::Container {
            direction: Direction::Out,
            summary: "raw".into(),
            length: data.len(),
        });

        if !self.link.is_connected() {
            debug!(len = data.len(), "No relay client, OUT dropped");
            self.arm_out(bus);
            return;
        }

        if !self.queue.is_empty() {
            debug!(stale = self.queue.len(), "New OUT discards unreplayed frames");
            self.queue.clear();
        }
        if let Err(e) = self.forward(data) {
            warn!(error = %e, "Relay exchange failed");
        }
        info!(len = data.len(), frames = self.queue.len(), "Relayed OUT");

        // The host polls IN right after its OUT; have data ready first.
        self.send_next(bus);
        self.arm_out(bus);
    }

    fn on_in_complete<B: UsbBus>(&mut self, bus: &mut B, ep: u8) {
        if ep == EP_BULK_IN {
            self.send_next(bus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusOp, MockBus};
    use crate::proxy::MockRelay;

    fn setup(relay: &MockRelay) -> (RawProxyBridge<MockRelay>, MockBus) {
        let mut bridge = RawProxyBridge::with_link(relay.clone());
        let mut bus = MockBus::new();
        bridge.on_interface_open(&mut bus, 0);
        bus.clear();
        (bridge, bus)
    }

    #[test]
    fn test_forward_and_replay_two_frames() {
        let relay = MockRelay::connected();
        relay.queue_reply(ProxyFrame::raw_in(&[0x10; 12]));
        relay.queue_reply(ProxyFrame::raw_in(&[0x20; 12]));
        relay.queue_reply(ProxyFrame::done());
        let (mut bridge, mut bus) = setup(&relay);

        bridge.on_out_complete(&mut bus, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(relay.sent(), vec![ProxyFrame::raw_out(&[0xAA, 0xBB, 0xCC])]);
        assert_eq!(
            relay.sent()[0].to_bytes(),
            vec![0, 0, 0, 4, 0x10, 0xAA, 0xBB, 0xCC]
        );
        // First IN goes out before OUT is re-armed.
        assert_eq!(
            bus.ops(),
            &[
                BusOp::In {
                    ep: EP_BULK_IN,
                    data: vec![0x10; 12]
                },
                BusOp::ArmOut {
                    ep: EP_BULK_OUT,
                    max_len: RX_BUF_SIZE
                },
            ]
        );

        bridge.on_in_complete(&mut bus, EP_BULK_IN);
        bridge.on_in_complete(&mut bus, EP_BULK_IN);
        assert_eq!(bus.in_transfers(), vec![vec![0x10; 12], vec![0x20; 12]]);
        assert_eq!(bridge.queued(), 0);

        // Queue exhausted: a further completion submits nothing.
        bridge.on_in_complete(&mut bus, EP_BULK_IN);
        assert_eq!(bus.in_transfers().len(), 2);
    }

    #[test]
    fn test_no_client_only_rearms() {
        let relay = MockRelay::default();
        let (mut bridge, mut bus) = setup(&relay);
        bridge.on_out_complete(&mut bus, &[1, 2, 3]);
        assert!(relay.sent().is_empty());
        assert_eq!(
            bus.ops(),
            &[BusOp::ArmOut {
                ep: EP_BULK_OUT,
                max_len: RX_BUF_SIZE
            }]
        );
    }

    #[test]
    fn test_timeout_keeps_collected_frames() {
        let relay = MockRelay::connected();
        relay.queue_reply(ProxyFrame::raw_in(&[1]));
        let (mut bridge, mut bus) = setup(&relay);
        bridge.on_out_complete(&mut bus, &[0]);
        assert_eq!(bus.in_transfers(), vec![vec![1]]);
        assert_eq!(bus.out_arms(), 1);
    }

    #[test]
    fn test_empty_raw_in_is_zlp() {
        let relay = MockRelay::connected();
        relay.queue_reply(ProxyFrame::raw_in(&[7; 64]));
        relay.queue_reply(ProxyFrame::raw_in(&[]));
        relay.queue_reply(ProxyFrame::done());
        let (mut bridge, mut bus) = setup(&relay);
        bridge.on_out_complete(&mut bus, &[0]);
        bridge.on_in_complete(&mut bus, EP_BULK_IN);
        assert_eq!(bus.in_transfers(), vec![vec![7; 64], vec![]]);
    }

    #[test]
    fn test_frame_budget_bounds_collection() {
        let relay = MockRelay::connected();
        for i in 0..10u8 {
            relay.queue_reply(ProxyFrame::raw_in(&[i]));
        }
        let (mut bridge, mut bus) = setup(&relay);
        bridge.on_out_complete(&mut bus, &[0]);
        // One sent, seven queued, two left unread on the link.
        assert_eq!(bridge.queued(), 7);
        assert_eq!(relay.pending_replies(), 2);
    }

    #[test]
    fn test_unexpected_type_stops_collection() {
        let relay = MockRelay::connected();
        relay.queue_reply(ProxyFrame::raw_in(&[1]));
        relay.queue_reply(ProxyFrame::raw_out(&[9]));
        relay.queue_reply(ProxyFrame::raw_in(&[2]));
        let (mut bridge, mut bus) = setup(&relay);
        bridge.on_out_complete(&mut bus, &[0]);
        bridge.on_in_complete(&mut bus, EP_BULK_IN);
        assert_eq!(bus.in_transfers(), vec![vec![1]]);
        assert_eq!(relay.pending_replies(), 1);
    }

    #[test]
    fn test_new_out_discards_stale_queue() {
        let relay = MockRelay::connected();
        relay.queue_reply(ProxyFrame::raw_in(&[1]));
        relay.queue_reply(ProxyFrame::raw_in(&[2]));
        relay.queue_reply(ProxyFrame::done());
        let (mut bridge, mut bus) = setup(&relay);
        bridge.on_out_complete(&mut bus, &[0]);
        assert_eq!(bridge.queued(), 1);

        relay.queue_reply(ProxyFrame::raw_in(&[3]));
        relay.queue_reply(ProxyFrame::done());
        bus.clear();
        bridge.on_out_complete(&mut bus, &[0]);
        bridge.on_in_complete(&mut bus, EP_BULK_IN);
        assert_eq!(bus.in_transfers(), vec![vec![3]]);
    }

    #[test]
    fn test_class_reset_clears_queue() {
        let relay = MockRelay::connected();
        relay.queue_reply(ProxyFrame::raw_in(&[1]));
        relay.queue_reply(ProxyFrame::raw_in(&[2]));
        relay.queue_reply(ProxyFrame::done());
        let (mut bridge, mut bus) = setup(&relay);
        bridge.on_out_complete(&mut bus, &[0]);

        let reset = ControlRequest {
            request_type: 0x21,
            request: PTP_REQ_RESET,
            value: 0,
            index: 0,
            length: 0,
        };
        assert_eq!(
            bridge.on_control_request(&mut bus, &reset, &[]),
            ControlResponse::Ack
        );
        assert_eq!(bridge.queued(), 0);
    }

    #[test]
    fn test_oversized_relay_frame_skipped() {
        use crate::proxy::{read_frame, write_frame, ProxyServer, MAX_FRAME_PAYLOAD};
        use std::net::TcpStream;
        use std::thread;
        use std::time::Instant;

        let server = ProxyServer::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut relay = TcpStream::connect(server.local_addr()).unwrap();
        let start = Instant::now();
        while !server.is_connected() {
            assert!(start.elapsed() < Duration::from_secs(5), "relay never accepted");
            thread::sleep(Duration::from_millis(10));
        }
        let answer = thread::spawn(move || {
            let out = read_frame(&mut relay, MAX_FRAME_PAYLOAD).unwrap();
            write_frame(&mut relay, &ProxyFrame::raw_in(&[0x77; 600])).unwrap();
            write_frame(&mut relay, &ProxyFrame::raw_in(&[0x11; 12])).unwrap();
            write_frame(&mut relay, &ProxyFrame::done()).unwrap();
            (out, relay)
        });

        let mut bridge = RawProxyBridge::with_link(server);
        let mut bus = MockBus::new();
        bridge.on_interface_open(&mut bus, 0);
        bus.clear();
        bridge.on_out_complete(&mut bus, &[0xAA]);

        let (out, _relay) = answer.join().unwrap();
        assert_eq!(out, ProxyFrame::raw_out(&[0xAA]));
        assert_eq!(bus.in_transfers(), vec![vec![0x11; 12]]);
        assert_eq!(bridge.queued(), 0);
        assert!(bridge.link().is_connected());
    }
}
