//! Event system for UI decoupling.
//!
//! Responders report what they are doing through a [`PtpObserver`]: short
//! status-line labels, container traffic, resets and REC button events. The
//! CLI wires these onto `tracing`, and REC events additionally go through a
//! [`RecEventDispatcher`] so slow subscribers never block the USB callback
//! context.

use std::fmt;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Queue depth between publishers and the dispatcher thread.
pub const REC_QUEUE_LEN: usize = 8;
/// Maximum number of REC subscribers.
pub const REC_MAX_SUBSCRIBERS: usize = 4;
/// Bytes of the 0x9207 DATA payload kept in an event.
pub const REC_PAYLOAD_MAX: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecEventKind {
    Start,
    Stop,
}

impl fmt::Display for RecEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecEventKind::Start => write!(f, "START"),
            RecEventKind::Stop => write!(f, "STOP"),
        }
    }
}

/// Recording started or stopped on the host's command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecEvent {
    pub kind: RecEventKind,
    /// Recording state after applying the event.
    pub recording: bool,
    pub transaction_id: u32,
    pub timestamp: DateTime<Utc>,
    payload: [u8; REC_PAYLOAD_MAX],
    payload_len: usize,
}

impl RecEvent {
    pub fn new(kind: RecEventKind, transaction_id: u32, payload: &[u8]) -> Self {
        let payload_len = payload.len().min(REC_PAYLOAD_MAX);
        let mut buf = [0u8; REC_PAYLOAD_MAX];
        buf[..payload_len].copy_from_slice(&payload[..payload_len]);
        Self {
            kind,
            recording: kind == RecEventKind::Start,
            transaction_id,
            timestamp: Utc::now(),
            payload: buf,
            payload_len,
        }
    }

    /// Raw DATA payload, truncated to [`REC_PAYLOAD_MAX`].
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_len]
    }
}

/// Why the engine dropped its transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    Bus,
    ClassRequest,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::Bus => write!(f, "bus reset"),
            ResetReason::ClassRequest => write!(f, "class RESET"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device.
    Out,
    /// Device to host.
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => write!(f, "OUT"),
            Direction::In => write!(f, "IN"),
        }
    }
}

/// Events emitted by a responder.
#[derive(Debug, Clone)]
pub enum PtpEvent {
    /// PTP interface opened by the host.
    InterfaceOpened { interface: u8 },
    /// All transaction state cleared.
    Reset { reason: ResetReason },
    /// Short status-line label for the current operation.
    Status { line: &'static str },
    /// Container seen on the bulk pipe.
    Container {
        direction: Direction,
        summary: String,
        length: usize,
    },
    /// REC button start/stop.
    Recording(RecEvent),
}

/// Observer trait for receiving responder events.
pub trait PtpObserver: Send + Sync {
    fn on_event(&self, event: &PtpEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl PtpObserver for NullObserver {
    fn on_event(&self, _event: &PtpEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl PtpObserver for TracingObserver {
    fn on_event(&self, event: &PtpEvent) {
        match event {
            PtpEvent::InterfaceOpened { interface } => {
                tracing::info!(interface, "PTP interface opened");
            }
            PtpEvent::Reset { reason } => {
                tracing::info!(reason = %reason, "Transaction state reset");
            }
            PtpEvent::Status { line } => {
                tracing::debug!(status = line, "Status");
            }
            PtpEvent::Container {
                direction,
                summary,
                length,
            } => {
                tracing::trace!(dir = %direction, len = length, "{}", summary);
            }
            PtpEvent::Recording(ev) => {
                tracing::info!(
                    kind = %ev.kind,
                    tid = ev.transaction_id,
                    payload = ?ev.payload(),
                    "Recording {}",
                    if ev.recording { "started" } else { "stopped" }
                );
            }
        }
    }
}

/// Forwards every event to each inner observer in order.
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn PtpObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn PtpObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl PtpObserver for ObserverSet {
    fn on_event(&self, event: &PtpEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventError {
    #[error("At most {max} REC subscribers are supported")]
    TooManySubscribers { max: usize },
    #[error("Subscriber list poisoned")]
    Poisoned,
}

type Subscriber = Box<dyn Fn(&RecEvent) + Send + 'static>;

/// Bounded REC event queue with a dispatcher thread.
///
/// [`publish`](Self::publish) never blocks: when the queue is full the event
/// is dropped. Subscribers run on the dispatcher thread.
pub struct RecEventDispatcher {
    tx: Option<SyncSender<RecEvent>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    worker: Option<JoinHandle<()>>,
}

impl RecEventDispatcher {
    pub fn start() -> Self {
        let (tx, rx) = mpsc::sync_channel(REC_QUEUE_LEN);
        let subscribers: Arc<Mutex<Vec<Subscriber>>> = Arc::new(Mutex::new(Vec::new()));
        let worker = Self::spawn_worker(rx, Arc::clone(&subscribers));
        Self {
            tx: Some(tx),
            subscribers,
            worker,
        }
    }

    fn spawn_worker(
        rx: Receiver<RecEvent>,
        subscribers: Arc<Mutex<Vec<Subscriber>>>,
    ) -> Option<JoinHandle<()>> {
        let spawned = thread::Builder::new()
            .name("rec-events".into())
            .spawn(move || {
                for ev in rx {
                    let Ok(subs) = subscribers.lock() else {
                        break;
                    };
                    for sub in subs.iter() {
                        sub(&ev);
                    }
                }
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn REC event dispatcher");
                None
            }
        }
    }

    pub fn subscribe<F>(&self, f: F) -> Result<(), EventError>
    where
        F: Fn(&RecEvent) + Send + 'static,
    {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| EventError::Poisoned)?;
        if subs.len() >= REC_MAX_SUBSCRIBERS {
            return Err(EventError::TooManySubscribers {
                max: REC_MAX_SUBSCRIBERS,
            });
        }
        subs.push(Box::new(f));
        Ok(())
    }

    /// Queue an event. Returns `false` when it was dropped.
    pub fn publish(&self, ev: RecEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(ev) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                tracing::warn!(kind = %ev.kind, tid = ev.transaction_id, "REC event queue full, dropping");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl PtpObserver for RecEventDispatcher {
    fn on_event(&self, event: &PtpEvent) {
        if let PtpEvent::Recording(ev) = event {
            self.publish(ev.clone());
        }
    }
}

impl Drop for RecEventDispatcher {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn test_rec_event_truncates_payload() {
        let ev = RecEvent::new(RecEventKind::Start, 7, &[2, 0, 0, 0, 0, 9, 9]);
        assert_eq!(ev.payload(), &[2, 0, 0, 0, 0]);
        assert!(ev.recording);
        assert_eq!(ev.transaction_id, 7);

        let stop = RecEvent::new(RecEventKind::Stop, 8, &[1]);
        assert!(!stop.recording);
        assert_eq!(stop.payload(), &[1]);
    }

    #[test]
    fn test_dispatcher_delivers_to_subscribers() {
        let dispatcher = RecEventDispatcher::start();
        let (tx, rx) = channel();
        let tx2 = tx.clone();
        dispatcher.subscribe(move |ev| tx.send((1, ev.kind)).unwrap()).unwrap();
        dispatcher.subscribe(move |ev| tx2.send((2, ev.kind)).unwrap()).unwrap();

        assert!(dispatcher.publish(RecEvent::new(RecEventKind::Start, 1, &[2])));

        let mut got = vec![
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        ];
        got.sort_by_key(|(n, _)| *n);
        assert_eq!(got, vec![(1, RecEventKind::Start), (2, RecEventKind::Start)]);
    }

    #[test]
    fn test_subscriber_limit() {
        let dispatcher = RecEventDispatcher::start();
        for _ in 0..REC_MAX_SUBSCRIBERS {
            dispatcher.subscribe(|_| {}).unwrap();
        }
        assert_eq!(
            dispatcher.subscribe(|_| {}),
            Err(EventError::TooManySubscribers {
                max: REC_MAX_SUBSCRIBERS
            })
        );
    }

    #[test]
    fn test_publish_drops_when_full() {
        let dispatcher = RecEventDispatcher::start();
        let (block_tx, block_rx) = channel::<()>();
        let block_rx = Mutex::new(block_rx);
        // The first event parks the worker so the queue fills up behind it.
        dispatcher
            .subscribe(move |_| {
                let _ = block_rx.lock().unwrap().recv();
            })
            .unwrap();

        let mut accepted = 0;
        for tid in 0..(REC_QUEUE_LEN as u32 + 4) {
            if dispatcher.publish(RecEvent::new(RecEventKind::Stop, tid, &[1])) {
                accepted += 1;
            }
        }
        assert!(accepted <= REC_QUEUE_LEN + 1);
        assert!(accepted < REC_QUEUE_LEN + 4);

        drop(block_tx);
    }

    #[test]
    fn test_observer_forwards_recording_only() {
        let dispatcher = RecEventDispatcher::start();
        let (tx, rx) = channel();
        dispatcher.subscribe(move |ev| tx.send(ev.transaction_id).unwrap()).unwrap();

        dispatcher.on_event(&PtpEvent::Status { line: "get info" });
        dispatcher.on_event(&PtpEvent::Recording(RecEvent::new(RecEventKind::Start, 42, &[2])));

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 42);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
