//! Transaction state shared by the container-parsing personalities.

use std::borrow::Cow;
use std::fmt;

use tracing::{debug, warn};

use super::stream::{StreamError, StreamStep, TxStream};
use crate::bus::UsbBus;
use crate::protocol::EP_BULK_IN;

/// Interface-open lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub interface: u8,
    pub mounted: bool,
    /// Last opened session id. `None` when no session is open.
    pub session_id: Option<u32>,
}

impl Session {
    pub fn open_interface(&mut self, interface: u8) {
        self.interface = interface;
        self.mounted = true;
    }

    pub fn is_open(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn reset(&mut self) {
        self.mounted = false;
        self.session_id = None;
    }
}

/// A two-stage operation waiting for its host-to-device DATA phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOp {
    pub code: u16,
    pub transaction_id: u32,
    pub param0: u32,
}

impl PendingOp {
    pub fn matches(&self, code: u16, tid: u32) -> bool {
        self.code == code && self.transaction_id == tid
    }
}

/// The single active bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingData(PendingOp),
    Streaming(TxStream),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "IDLE"),
            Phase::AwaitingData(op) => write!(f, "AWAITING_DATA(0x{:04X})", op.code),
            Phase::Streaming(s) => write!(f, "STREAMING(0x{:04X})", s.op_code()),
        }
    }
}

/// Owns the [`Phase`] and enforces that only one operation is in flight.
#[derive(Debug, Default)]
pub struct Transaction {
    phase: Phase,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn pending(&self) -> Option<&PendingOp> {
        match &self.phase {
            Phase::AwaitingData(op) => Some(op),
            _ => None,
        }
    }

    fn goto(&mut self, next: Phase) {
        if self.phase != next {
            debug!(from = %self.phase, to = %next, "Phase change");
        }
        self.phase = next;
    }

    /// Drop whatever is in flight.
    pub fn reset(&mut self) {
        self.goto(Phase::Idle);
    }

    /// A new COMMAND arrived. Anything still in flight is superseded, and
    /// chunks of a superseded stream still queued on bulk IN are dropped.
    pub fn begin_command<B: UsbBus>(&mut self, bus: &mut B, code: u16, tid: u32) {
        if !self.is_idle() {
            warn!(
                phase = %self.phase,
                op = format_args!("0x{:04X}", code),
                tid,
                "New command supersedes unfinished operation"
            );
            if matches!(self.phase, Phase::Streaming(_)) {
                bus.abort_in(EP_BULK_IN);
            }
            self.reset();
        }
    }

    pub fn await_data(&mut self, op: PendingOp) {
        self.goto(Phase::AwaitingData(op));
    }

    /// Take the pending two-stage op if `(code, tid)` matches it.
    pub fn take_pending(&mut self, code: u16, tid: u32) -> Option<PendingOp> {
        let op = match &self.phase {
            Phase::AwaitingData(op) if op.matches(code, tid) => *op,
            _ => return None,
        };
        self.goto(Phase::Idle);
        Some(op)
    }

    /// Start streaming a DATA phase and submit its first transfer.
    pub fn start_stream<B: UsbBus>(
        &mut self,
        bus: &mut B,
        op_code: u16,
        tid: u32,
        payload: Cow<'static, [u8]>,
        respond_after: bool,
    ) -> Result<(), StreamError> {
        if let Phase::Streaming(active) = &self.phase {
            return Err(StreamError::AlreadyActive {
                active: active.op_code(),
                requested: op_code,
            });
        }
        let mut stream = TxStream::new(op_code, tid, payload, respond_after);
        stream.begin(bus);
        self.goto(Phase::Streaming(stream));
        Ok(())
    }

    /// Bulk-IN completion. Returns the finished stream, if this completion
    /// ended one.
    pub fn on_in_complete<B: UsbBus>(&mut self, bus: &mut B) -> Option<StreamStep> {
        let Phase::Streaming(stream) = &mut self.phase else {
            return None;
        };
        match stream.advance(bus) {
            StreamStep::Sent => None,
            done => {
                self.goto(Phase::Idle);
                Some(done)
            }
        }
    }
}
