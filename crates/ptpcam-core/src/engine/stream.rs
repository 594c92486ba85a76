//! Streaming TX: device-to-host DATA phases larger than one IN transfer.
//!
//! The first IN transfer carries the 12-byte standard DATA header and as much
//! payload as fits in [`TX_BUF_SIZE`]. Each IN completion sends the next chunk
//! with no header. When the whole container is a multiple of the bulk max
//! packet size the host needs a ZLP to see the end of the transfer.

use std::borrow::Cow;

use thiserror::Error;
use tracing::{debug, warn};

use crate::bus::UsbBus;
use crate::protocol::{ContainerType, EP_BULK_IN, MAX_PACKET_SIZE, STD_HEADER_LEN, TX_BUF_SIZE};
use crate::protocol::{response_container, write_std_header};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream for op 0x{active:04X} still active, cannot start op 0x{requested:04X}")]
    AlreadyActive { active: u16, requested: u16 },
}

/// What the next IN completion produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStep {
    /// Another transfer was submitted; the stream continues.
    Sent,
    /// The stream finished. `respond_tid` is set when the caller owes the
    /// host a RESPONSE for that transaction.
    Finished { op_code: u16, respond_tid: Option<u32> },
}

/// One in-flight DATA phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStream {
    op_code: u16,
    transaction_id: u32,
    payload: Cow<'static, [u8]>,
    offset: usize,
    need_zlp: bool,
    zlp_sent: bool,
    respond_after: bool,
}

impl TxStream {
    pub fn new(
        op_code: u16,
        transaction_id: u32,
        payload: Cow<'static, [u8]>,
        respond_after: bool,
    ) -> Self {
        let need_zlp = (STD_HEADER_LEN + payload.len()) % MAX_PACKET_SIZE == 0;
        Self {
            op_code,
            transaction_id,
            payload,
            offset: 0,
            need_zlp,
            zlp_sent: false,
            respond_after,
        }
    }

    pub fn op_code(&self) -> u16 {
        self.op_code
    }

    pub fn transaction_id(&self) -> u32 {
        self.transaction_id
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total_len(&self) -> usize {
        STD_HEADER_LEN + self.payload.len()
    }

    pub fn need_zlp(&self) -> bool {
        self.need_zlp
    }

    /// Submit the header plus the first payload chunk.
    pub fn begin<B: UsbBus>(&mut self, bus: &mut B) {
        let first = self.payload.len().min(TX_BUF_SIZE - STD_HEADER_LEN);
        let mut buf = Vec::with_capacity(STD_HEADER_LEN + first);
        buf.extend_from_slice(
            write_std_header(
                self.total_len() as u32,
                ContainerType::Data,
                self.op_code,
                self.transaction_id,
            )
            .as_bytes(),
        );
        buf.extend_from_slice(&self.payload[..first]);
        self.offset = first;
        debug!(
            op = format_args!("0x{:04X}", self.op_code),
            tid = self.transaction_id,
            total = self.total_len(),
            first = buf.len(),
            zlp = self.need_zlp,
            "DATA stream start"
        );
        submit(bus, &buf);
    }

    /// Advance after an IN completion.
    pub fn advance<B: UsbBus>(&mut self, bus: &mut B) -> StreamStep {
        if self.offset < self.payload.len() {
            let end = (self.offset + TX_BUF_SIZE).min(self.payload.len());
            let chunk = &self.payload[self.offset..end];
            submit(bus, chunk);
            self.offset = end;
            return StreamStep::Sent;
        }

        if self.need_zlp && !self.zlp_sent {
            self.zlp_sent = true;
            submit(bus, &[]);
            return StreamStep::Sent;
        }

        StreamStep::Finished {
            op_code: self.op_code,
            respond_tid: self.respond_after.then_some(self.transaction_id),
        }
    }
}

/// Submit a 12-byte standard RESPONSE container.
pub fn send_response<B: UsbBus>(bus: &mut B, code: u16, tid: u32) {
    debug!(code = format_args!("0x{:04X}", code), tid, "RESPONSE");
    submit(bus, response_container(code, tid).as_bytes());
}

fn submit<B: UsbBus>(bus: &mut B, data: &[u8]) {
    if let Err(e) = bus.submit_in(EP_BULK_IN, data) {
        warn!(error = %e, len = data.len(), "bulk IN submit failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;
    use crate::protocol::{read_std_header, PTP_RC_OK};

    fn run_to_end(stream: &mut TxStream, bus: &mut MockBus) -> StreamStep {
        stream.begin(bus);
        loop {
            match stream.advance(bus) {
                StreamStep::Sent => continue,
                done => return done,
            }
        }
    }

    #[test]
    fn test_small_payload_single_transfer() {
        let mut bus = MockBus::new();
        let mut s = TxStream::new(0x1006, 3, Cow::Borrowed(&[0u8; 4]), true);
        let step = run_to_end(&mut s, &mut bus);

        let ins = bus.in_transfers();
        assert_eq!(ins.len(), 1);
        assert_eq!(ins[0].len(), 16);
        let (len, hdr) = read_std_header(&ins[0]).unwrap();
        assert_eq!(len, 16);
        assert_eq!(hdr.container_type, ContainerType::Data);
        assert_eq!(hdr.code, 0x1006);
        assert_eq!(
            step,
            StreamStep::Finished {
                op_code: 0x1006,
                respond_tid: Some(3)
            }
        );
    }

    #[test]
    fn test_large_payload_chunks() {
        let payload: Vec<u8> = (0..1011u32).map(|i| i as u8).collect();
        let mut bus = MockBus::new();
        let mut s = TxStream::new(0x9209, 9, Cow::Owned(payload.clone()), true);
        run_to_end(&mut s, &mut bus);

        let ins = bus.in_transfers();
        // 12+500, then 511 remaining in one chunk. 1023 is not 64-aligned.
        assert_eq!(ins.iter().map(Vec::len).collect::<Vec<_>>(), vec![512, 511]);
        let mut joined: Vec<u8> = ins.concat();
        let body = joined.split_off(STD_HEADER_LEN);
        assert_eq!(body, payload);
    }

    #[test]
    fn test_zlp_only_when_aligned() {
        for len in [0usize, 1, 51, 52, 53, 116, 500, 1012, 1011] {
            let mut bus = MockBus::new();
            let mut s = TxStream::new(0x9209, 1, Cow::Owned(vec![0xAB; len]), false);
            run_to_end(&mut s, &mut bus);
            let zlps = bus.in_transfers().iter().filter(|t| t.is_empty()).count();
            let aligned = (12 + len) % 64 == 0;
            assert_eq!(zlps, aligned as usize, "payload len {len}");
        }
    }

    #[test]
    fn test_no_response_when_not_requested() {
        let mut bus = MockBus::new();
        let mut s = TxStream::new(0x1001, 1, Cow::Borrowed(&[1, 2]), false);
        assert_eq!(
            run_to_end(&mut s, &mut bus),
            StreamStep::Finished {
                op_code: 0x1001,
                respond_tid: None
            }
        );
    }

    #[test]
    fn test_send_response_bytes() {
        let mut bus = MockBus::new();
        send_response(&mut bus, PTP_RC_OK, 5);
        assert_eq!(
            bus.in_transfers(),
            vec![vec![0x0C, 0, 0, 0, 0x03, 0, 0x01, 0x20, 0x05, 0, 0, 0]]
        );
    }
}
