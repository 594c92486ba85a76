//! Recording bus for unit tests and the in-process relay backend.

use std::collections::HashSet;

use super::traits::{BusError, UsbBus};

/// One call made against the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    ArmOut { ep: u8, max_len: usize },
    In { ep: u8, data: Vec<u8> },
    AbortIn { ep: u8 },
    ClearStall { ep: u8 },
}

/// Bus that records every operation instead of touching hardware.
#[derive(Debug, Default)]
pub struct MockBus {
    ops: Vec<BusOp>,
    stalled: HashSet<u8>,
    connected: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// All recorded operations.
    pub fn ops(&self) -> &[BusOp] {
        &self.ops
    }

    /// Drain recorded operations.
    pub fn take_ops(&mut self) -> Vec<BusOp> {
        std::mem::take(&mut self.ops)
    }

    /// Payloads of every IN transfer, in submission order.
    pub fn in_transfers(&self) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::In { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Drain only the IN transfers, dropping the other records.
    pub fn take_in_transfers(&mut self) -> Vec<Vec<u8>> {
        let ins = self.in_transfers();
        self.ops.clear();
        ins
    }

    pub fn out_arms(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, BusOp::ArmOut { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Simulate a host-side halt on `ep`.
    pub fn stall(&mut self, ep: u8) {
        self.stalled.insert(ep);
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }
}

impl UsbBus for MockBus {
    fn arm_out(&mut self, ep: u8, max_len: usize) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::Disconnected);
        }
        self.ops.push(BusOp::ArmOut { ep, max_len });
        Ok(())
    }

    fn submit_in(&mut self, ep: u8, data: &[u8]) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::Disconnected);
        }
        self.ops.push(BusOp::In {
            ep,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn abort_in(&mut self, ep: u8) -> usize {
        self.ops.push(BusOp::AbortIn { ep });
        0
    }

    fn is_stalled(&self, ep: u8) -> bool {
        self.stalled.contains(&ep)
    }

    fn clear_stall(&mut self, ep: u8) -> Result<(), BusError> {
        self.stalled.remove(&ep);
        self.ops.push(BusOp::ClearStall { ep });
        Ok(())
    }
}
