//! Legacy personality: impersonates a Sony ILCE-5100 for the gimbal host.
//!
//! Inbound containers go through the layout classifier, so every framing the
//! host uses is accepted. Answers are always standard layout. Read operations
//! are served from the response catalog; the REC button (0x9207) is a
//! two-stage operation whose DATA phase carries start/stop.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::control::{handle_control, ControlRequest, ControlResponse};
use super::state::{PendingOp, Session, Transaction};
use super::stream::{send_response, StreamStep};
use super::PtpResponder;
use crate::bus::UsbBus;
use crate::catalog;
use crate::events::{
    Direction, NullObserver, PtpEvent, PtpObserver, RecEvent, RecEventKind, ResetReason,
};
use crate::protocol::constants::*;
use crate::protocol::{classify, ContainerType, Frame};

pub struct LegacyResponder {
    session: Session,
    txn: Transaction,
    recording: bool,
    /// Last received op, used to label the final RESPONSE.
    last_op: u16,
    observer: Arc<dyn PtpObserver>,
}

impl Default for LegacyResponder {
    fn default() -> Self {
        Self::new(Arc::new(NullObserver))
    }
}

impl LegacyResponder {
    pub fn new(observer: Arc<dyn PtpObserver>) -> Self {
        Self {
            session: Session::default(),
            txn: Transaction::new(),
            recording: false,
            last_op: 0,
            observer,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transaction(&self) -> &Transaction {
        &self.txn
    }

    fn emit(&self, event: PtpEvent) {
        self.observer.on_event(&event);
    }

    fn status(&self, line: &'static str) {
        self.emit(PtpEvent::Status { line });
    }

    fn clear_all(&mut self, reason: ResetReason) {
        self.txn.reset();
        self.session.session_id = None;
        self.emit(PtpEvent::Reset { reason });
    }

    fn respond<B: UsbBus>(&mut self, bus: &mut B, code: u16, tid: u32) {
        send_response(bus, code, tid);
        self.status(response_label(self.last_op, code));
    }

    fn stream<B: UsbBus>(&mut self, bus: &mut B, code: u16, tid: u32) {
        let Some(payload) = catalog::lookup(code) else {
            self.respond(bus, PTP_RC_OPERATION_NOT_SUPPORTED, tid);
            return;
        };
        match self.txn.start_stream(bus, code, tid, payload, true) {
            Ok(()) => self.status(data_label(code)),
            Err(e) => warn!(error = %e, "stream not started"),
        }
    }

    fn on_command<B: UsbBus>(&mut self, bus: &mut B, frame: &Frame<'_>) {
        let code = frame.code();
        let tid = frame.transaction_id();
        let p0 = frame.param(0);

        if code != PTP_OC_SONY_9209 {
            info!(
                op = op_name(code).unwrap_or("unknown"),
                code = format_args!("0x{:04X}", code),
                tid,
                layout = %frame.layout,
                "PTP command"
            );
        }
        self.txn.begin_command(bus, code, tid);

        match code {
            PTP_OC_OPEN_SESSION => {
                let sid = p0.unwrap_or(0);
                self.session.session_id = Some(sid);
                debug!(sid, "OpenSession");
                self.respond(bus, PTP_RC_OK, tid);
            }
            PTP_OC_CLOSE_SESSION => {
                debug!(sid = ?self.session.session_id, "CloseSession");
                self.session.session_id = None;
                self.respond(bus, PTP_RC_OK, tid);
            }
            PTP_OC_SONY_REC => {
                let param0 = p0.unwrap_or(0);
                debug!(tid, p0 = format_args!("{:08X}", param0), "REC waiting for DATA");
                self.txn.await_data(PendingOp {
                    code,
                    transaction_id: tid,
                    param0,
                });
            }
            _ => self.stream(bus, code, tid),
        }
    }

    fn on_data<B: UsbBus>(&mut self, bus: &mut B, frame: &Frame<'_>) {
        let code = frame.code();
        let tid = frame.transaction_id();
        let Some(op) = self.txn.take_pending(code, tid) else {
            debug!(
                code = format_args!("0x{:04X}", code),
                tid,
                pending = ?self.txn.pending(),
                "DATA without matching pending op, dropped"
            );
            return;
        };

        let payload = frame.tail();
        debug!(
            p0 = format_args!("{:08X}", op.param0),
            len = payload.len(),
            first = payload.first().copied().unwrap_or(0),
            "REC DATA"
        );

        if op.param0 == REC_FULL_PRESS {
            match payload.first() {
                Some(&REC_PAYLOAD_PRESS) => self.apply_rec(RecEventKind::Start, tid, payload),
                Some(&REC_PAYLOAD_RELEASE) => self.apply_rec(RecEventKind::Stop, tid, payload),
                Some(other) => debug!(payload0 = other, "REC full press: unknown payload"),
                None => debug!("REC full press: empty payload"),
            }
        } else {
            debug!("REC DATA ignored (not a full press)");
        }
        self.respond(bus, PTP_RC_OK, tid);
    }

    fn apply_rec(&mut self, kind: RecEventKind, tid: u32, payload: &[u8]) {
        self.recording = kind == RecEventKind::Start;
        self.emit(PtpEvent::Recording(RecEvent::new(kind, tid, payload)));
        self.status(match kind {
            RecEventKind::Start => "rec start",
            RecEventKind::Stop => "rec stop",
        });
    }
}

impl PtpResponder for LegacyResponder {
    fn on_bus_reset(&mut self) {
        self.session.reset();
        self.clear_all(ResetReason::Bus);
    }

    fn on_interface_open<B: UsbBus>(&mut self, bus: &mut B, interface: u8) {
        self.session.open_interface(interface);
        self.emit(PtpEvent::InterfaceOpened { interface });
        arm_out(bus);
    }

    fn on_control_request<B: UsbBus>(
        &mut self,
        bus: &mut B,
        req: &ControlRequest,
        data_out: &[u8],
    ) -> ControlResponse {
        let outcome = handle_control(bus, req, data_out, self.session.interface);
        if outcome.reset {
            self.clear_all(ResetReason::ClassRequest);
        }
        outcome.response
    }

    fn on_out_complete<B: UsbBus>(&mut self, bus: &mut B, data: &[u8]) {
        match classify(data) {
            Ok(frame) => {
                self.emit(PtpEvent::Container {
                    direction: Direction::Out,
                    summary: format!(
                        "{} {} 0x{:04X} tid={}",
                        frame.layout,
                        frame.container_type(),
                        frame.code(),
                        frame.transaction_id()
                    ),
                    length: data.len(),
                });
                self.last_op = frame.code();
                self.status(receive_label(frame.code()));

                match frame.container_type() {
                    ContainerType::Command => self.on_command(bus, &frame),
                    ContainerType::Data => self.on_data(bus, &frame),
                    other => debug!(container_type = %other, "Ignoring container"),
                }
            }
            Err(e) => debug!(error = %e, len = data.len(), "Unparseable OUT transfer dropped"),
        }
        arm_out(bus);
    }

    fn on_in_complete<B: UsbBus>(&mut self, bus: &mut B, ep: u8) {
        if ep != EP_BULK_IN {
            return;
        }
        if let Some(StreamStep::Finished {
            respond_tid: Some(tid),
            ..
        }) = self.txn.on_in_complete(bus)
        {
            self.respond(bus, PTP_RC_OK, tid);
        }
    }
}

pub(crate) fn arm_out<B: UsbBus>(bus: &mut B) {
    if let Err(e) = bus.arm_out(EP_BULK_OUT, RX_BUF_SIZE) {
        warn!(error = %e, "bulk OUT re-arm failed");
    }
}

fn receive_label(code: u16) -> &'static str {
    match code {
        PTP_OC_OPEN_SESSION => "open sess",
        PTP_OC_GET_DEVICE_INFO => "get info",
        PTP_OC_GET_STORAGE_IDS => "stor ids",
        PTP_OC_GET_STORAGE_INFO => "stor info",
        PTP_OC_GET_NUM_OBJECTS => "num objs",
        PTP_OC_GET_OBJECT_HANDLES => "obj hndl",
        PTP_OC_CLOSE_SESSION => "close",
        c if c < 0x1000 => "vendor",
        _ => "other",
    }
}

fn data_label(code: u16) -> &'static str {
    match code {
        PTP_OC_GET_DEVICE_INFO => "send info",
        PTP_OC_GET_STORAGE_IDS => "send ids",
        PTP_OC_GET_STORAGE_INFO => "send stor",
        PTP_OC_GET_NUM_OBJECTS => "send num",
        PTP_OC_GET_OBJECT_HANDLES => "send hndl",
        _ => "send",
    }
}

fn response_label(last_op: u16, code: u16) -> &'static str {
    match (code, last_op) {
        (PTP_RC_OK, PTP_OC_OPEN_SESSION) => "open ok",
        (PTP_RC_OK, PTP_OC_GET_DEVICE_INFO) => "info ok",
        (PTP_RC_OK, PTP_OC_GET_STORAGE_IDS) => "ids ok",
        (PTP_RC_OK, PTP_OC_GET_STORAGE_INFO) => "stor ok",
        (PTP_RC_OK, PTP_OC_GET_NUM_OBJECTS) => "num ok",
        (PTP_RC_OK, PTP_OC_GET_OBJECT_HANDLES) => "hndl ok",
        (PTP_RC_OK, PTP_OC_CLOSE_SESSION) => "close ok",
        (PTP_RC_OK, _) => "ok",
        (PTP_RC_OPERATION_NOT_SUPPORTED, _) => "unsup",
        _ => "resp",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusOp, MockBus};
    use crate::protocol::{
        command_container, data_container, read_std_header, write_header, Layout,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PtpEvent>>);

    impl PtpObserver for Recorder {
        fn on_event(&self, event: &PtpEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn rec_events(&self) -> Vec<RecEvent> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    PtpEvent::Recording(r) => Some(r.clone()),
                    _ => None,
                })
                .collect()
        }

        fn status_lines(&self) -> Vec<&'static str> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    PtpEvent::Status { line } => Some(*line),
                    _ => None,
                })
                .collect()
        }
    }

    fn setup() -> (LegacyResponder, MockBus, Arc<Recorder>) {
        let rec = Arc::new(Recorder::default());
        let mut r = LegacyResponder::new(rec.clone());
        let mut bus = MockBus::new();
        r.on_interface_open(&mut bus, 0);
        bus.clear();
        (r, bus, rec)
    }

    /// Drive IN completions until the responder stops submitting.
    fn drain(r: &mut LegacyResponder, bus: &mut MockBus) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let ins = bus.take_in_transfers();
            if ins.is_empty() {
                return out;
            }
            for _ in &ins {
                r.on_in_complete(bus, EP_BULK_IN);
            }
            out.extend(ins);
        }
    }

    fn response_code(raw: &[u8]) -> (ContainerType, u16, u32) {
        let (len, hdr) = read_std_header(raw).unwrap();
        assert_eq!(len as usize, raw.len());
        (hdr.container_type, hdr.code, hdr.transaction_id)
    }

    #[test]
    fn test_interface_open_arms_out() {
        let mut r = LegacyResponder::default();
        let mut bus = MockBus::new();
        r.on_interface_open(&mut bus, 0);
        assert_eq!(
            bus.ops(),
            &[BusOp::ArmOut {
                ep: EP_BULK_OUT,
                max_len: RX_BUF_SIZE
            }]
        );
        assert!(r.session().mounted);
    }

    #[test]
    fn test_pad3_open_session_responds_ok() {
        let (mut r, mut bus, rec) = setup();
        let raw = [
            0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x10, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
            0x00, 0x00,
        ];
        r.on_out_complete(&mut bus, &raw);

        let ins = bus.in_transfers();
        assert_eq!(ins.len(), 1);
        assert_eq!(response_code(&ins[0]), (ContainerType::Response, PTP_RC_OK, 0));
        assert_eq!(r.session().session_id, Some(1));
        assert_eq!(bus.out_arms(), 1);
        assert_eq!(rec.status_lines(), vec!["open sess", "open ok"]);
    }

    #[test]
    fn test_get_device_info_stream_then_single_ok() {
        let (mut r, mut bus, _) = setup();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_GET_DEVICE_INFO, 2, &[]));
        let ins = drain(&mut r, &mut bus);

        // 12 + 247 = 259 bytes, one transfer, no ZLP, then exactly one OK.
        assert_eq!(ins.len(), 2);
        assert_eq!(ins[0].len(), 259);
        let (len, hdr) = read_std_header(&ins[0]).unwrap();
        assert_eq!(len, 259);
        assert_eq!(hdr.container_type, ContainerType::Data);
        assert_eq!(hdr.code, PTP_OC_GET_DEVICE_INFO);
        assert_eq!(&ins[0][12..], &catalog::tables::DEVICE_INFO[..]);
        assert_eq!(response_code(&ins[1]), (ContainerType::Response, PTP_RC_OK, 2));
        assert!(r.transaction().is_idle());
    }

    #[test]
    fn test_vendor_9209_streams_two_chunks() {
        let (mut r, mut bus, _) = setup();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_SONY_9209, 11, &[]));
        let ins = drain(&mut r, &mut bus);
        assert_eq!(
            ins.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![512, 511, 12]
        );
        assert_eq!(response_code(&ins[2]).1, PTP_RC_OK);
    }

    #[test]
    fn test_storage_ids_and_empty_arrays() {
        let (mut r, mut bus, _) = setup();
        for (code, len) in [
            (PTP_OC_GET_STORAGE_IDS, 8),
            (PTP_OC_GET_NUM_OBJECTS, 4),
            (PTP_OC_GET_OBJECT_HANDLES, 4),
        ] {
            r.on_out_complete(&mut bus, &command_container(code, 3, &[0x0001_0000]));
            let ins = drain(&mut r, &mut bus);
            assert_eq!(ins.len(), 2, "op 0x{code:04X}");
            assert_eq!(ins[0].len(), 12 + len);
            assert_eq!(response_code(&ins[1]).1, PTP_RC_OK);
        }
    }

    #[test]
    fn test_close_session_no_data_phase() {
        let (mut r, mut bus, _) = setup();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 1, &[5]));
        r.on_out_complete(&mut bus, &command_container(PTP_OC_CLOSE_SESSION, 2, &[]));
        let ins = bus.in_transfers();
        assert_eq!(ins.len(), 2);
        assert_eq!(response_code(&ins[1]), (ContainerType::Response, PTP_RC_OK, 2));
        assert_eq!(r.session().session_id, None);
    }

    #[test]
    fn test_unknown_op_not_supported() {
        let (mut r, mut bus, rec) = setup();
        r.on_out_complete(&mut bus, &command_container(0x9999, 4, &[]));
        let ins = bus.in_transfers();
        assert_eq!(
            response_code(&ins[0]),
            (ContainerType::Response, PTP_RC_OPERATION_NOT_SUPPORTED, 4)
        );
        assert_eq!(rec.status_lines(), vec!["other", "unsup"]);
    }

    fn press(r: &mut LegacyResponder, bus: &mut MockBus, tid: u32, level: u32, payload: &[u8]) {
        // COMMAND in pad2 framing, DATA in pad1 framing, like the host mixes them.
        let mut cmd = write_header(Layout::Pad2, 0, ContainerType::Command, PTP_OC_SONY_REC, tid)
            .as_bytes()
            .to_vec();
        cmd.extend_from_slice(&level.to_le_bytes());
        r.on_out_complete(bus, &cmd);
        assert!(bus.in_transfers().is_empty(), "no RESPONSE before DATA");

        let mut data = write_header(Layout::Pad1, 0, ContainerType::Data, PTP_OC_SONY_REC, tid)
            .as_bytes()
            .to_vec();
        data.extend_from_slice(payload);
        r.on_out_complete(bus, &data);
    }

    #[test]
    fn test_rec_start_stop() {
        let (mut r, mut bus, rec) = setup();

        press(&mut r, &mut bus, 10, REC_FULL_PRESS, &[0x02, 0, 0, 0, 0]);
        assert!(r.is_recording());
        assert_eq!(
            response_code(&bus.take_in_transfers()[0]),
            (ContainerType::Response, PTP_RC_OK, 10)
        );

        press(&mut r, &mut bus, 11, REC_FULL_PRESS, &[0x01, 0, 0, 0, 0]);
        assert!(!r.is_recording());
        assert_eq!(bus.take_in_transfers().len(), 1);

        let events = rec.rec_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, RecEventKind::Start);
        assert_eq!(events[0].transaction_id, 10);
        assert!(events[0].recording);
        assert_eq!(events[0].payload(), &[0x02, 0, 0, 0, 0]);
        assert_eq!(events[1].kind, RecEventKind::Stop);
        assert!(!events[1].recording);
        assert!(rec.status_lines().contains(&"rec start"));
        assert!(rec.status_lines().contains(&"rec stop"));
    }

    #[test]
    fn test_rec_half_press_acknowledged_only() {
        let (mut r, mut bus, rec) = setup();
        press(&mut r, &mut bus, 3, REC_HALF_PRESS, &[0x02]);
        assert!(!r.is_recording());
        assert!(rec.rec_events().is_empty());
        assert_eq!(response_code(&bus.in_transfers()[0]).1, PTP_RC_OK);
    }

    #[test]
    fn test_rec_data_mismatch_dropped() {
        let (mut r, mut bus, rec) = setup();
        r.on_out_complete(
            &mut bus,
            &command_container(PTP_OC_SONY_REC, 20, &[REC_FULL_PRESS]),
        );
        r.on_out_complete(&mut bus, &data_container(PTP_OC_SONY_REC, 21, &[0x02]));

        assert!(bus.in_transfers().is_empty());
        assert!(rec.rec_events().is_empty());
        assert!(r.transaction().pending().is_some());
        // OUT re-armed for both transfers.
        assert_eq!(bus.out_arms(), 2);

        // The matching DATA still completes the operation.
        r.on_out_complete(&mut bus, &data_container(PTP_OC_SONY_REC, 20, &[0x02]));
        assert!(r.is_recording());
        assert_eq!(bus.in_transfers().len(), 1);
    }

    #[test]
    fn test_rec_empty_payload_still_ok() {
        let (mut r, mut bus, rec) = setup();
        press(&mut r, &mut bus, 6, REC_FULL_PRESS, &[]);
        assert!(rec.rec_events().is_empty());
        assert_eq!(response_code(&bus.in_transfers()[0]).1, PTP_RC_OK);
    }

    #[test]
    fn test_unparseable_and_response_containers_dropped() {
        let (mut r, mut bus, _) = setup();
        r.on_out_complete(&mut bus, &[1, 2, 3]);
        let resp = write_header(Layout::Standard, 12, ContainerType::Response, PTP_RC_OK, 1);
        r.on_out_complete(&mut bus, resp.as_bytes());
        assert!(bus.in_transfers().is_empty());
        assert_eq!(bus.out_arms(), 2);
    }

    #[test]
    fn test_class_reset_recovers() {
        let (mut r, mut bus, _) = setup();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_SONY_9209, 1, &[]));
        assert!(!r.transaction().is_idle());
        bus.stall(EP_BULK_IN);

        let reset = ControlRequest {
            request_type: 0x21,
            request: PTP_REQ_RESET,
            value: 0,
            index: 0,
            length: 0,
        };
        assert_eq!(r.on_control_request(&mut bus, &reset, &[]), ControlResponse::Ack);
        assert!(r.transaction().is_idle());
        assert!(!bus.is_stalled(EP_BULK_IN));

        // A completion from the abandoned stream must not resurrect it.
        bus.clear();
        r.on_in_complete(&mut bus, EP_BULK_IN);
        assert!(bus.in_transfers().is_empty());

        r.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 2, &[1]));
        assert_eq!(
            response_code(&bus.in_transfers()[0]),
            (ContainerType::Response, PTP_RC_OK, 2)
        );

        bus.clear();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_GET_DEVICE_INFO, 3, &[]));
        let ins = drain(&mut r, &mut bus);
        assert_eq!(ins.len(), 2);
        assert_eq!(ins[0].len(), 259);
        assert_eq!(response_code(&ins[0]), (ContainerType::Data, PTP_OC_GET_DEVICE_INFO, 3));
        assert_eq!(response_code(&ins[1]), (ContainerType::Response, PTP_RC_OK, 3));
        assert!(r.transaction().is_idle());
    }

    #[test]
    fn test_command_supersedes_pending_rec() {
        let (mut r, mut bus, _) = setup();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_SONY_REC, 1, &[REC_FULL_PRESS]));
        r.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 2, &[1]));
        assert!(r.transaction().pending().is_none());
        assert_eq!(bus.in_transfers().len(), 1);
    }

    #[test]
    fn test_bus_reset_clears_session() {
        let (mut r, mut bus, _) = setup();
        r.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 1, &[9]));
        r.on_bus_reset();
        assert!(!r.session().mounted);
        assert_eq!(r.session().session_id, None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(receive_label(0x0123), "vendor");
        assert_eq!(receive_label(PTP_OC_SONY_9201), "other");
        assert_eq!(data_label(PTP_OC_GET_STORAGE_INFO), "send stor");
        assert_eq!(data_label(PTP_OC_SONY_9202), "send");
        assert_eq!(response_label(PTP_OC_GET_DEVICE_INFO, PTP_RC_OK), "info ok");
        assert_eq!(response_label(PTP_OC_SONY_REC, PTP_RC_OK), "ok");
        assert_eq!(response_label(0, PTP_RC_GENERAL_ERROR), "resp");
    }
}
