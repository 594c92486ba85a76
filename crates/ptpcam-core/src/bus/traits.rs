//! USB device stack capability used by the responders.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Endpoint 0x{ep:02X} is not open")]
    EndpointNotOpen { ep: u8 },

    #[error("Endpoint 0x{ep:02X} already has a transfer in flight")]
    Busy { ep: u8 },

    #[error("Transfer of {len} bytes exceeds {max} on endpoint 0x{ep:02X}")]
    TooLarge { ep: u8, len: usize, max: usize },

    #[error("Host disconnected")]
    Disconnected,
}

/// Endpoint operations a PTP responder needs from the device stack.
///
/// Completions come back through
/// [`PtpResponder`](crate::engine::PtpResponder) callbacks; these calls only
/// queue work.
pub trait UsbBus {
    /// Queue a bulk-OUT receive of up to `max_len` bytes.
    fn arm_out(&mut self, ep: u8, max_len: usize) -> Result<(), BusError>;

    /// Queue an IN transfer. An empty slice is a zero-length packet.
    fn submit_in(&mut self, ep: u8, data: &[u8]) -> Result<(), BusError>;

    /// Drop IN transfers queued on `ep` that the host has not collected yet.
    /// Returns how many were dropped.
    fn abort_in(&mut self, ep: u8) -> usize;

    fn is_stalled(&self, ep: u8) -> bool;

    fn clear_stall(&mut self, ep: u8) -> Result<(), BusError>;
}
