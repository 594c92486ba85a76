//! PC side of the raw proxy link.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, instrument, warn};

use super::backend::RelayBackend;
use crate::proxy::{read_frame, write_frame, FrameKind, ProxyError, ProxyFrame};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// RAW_OUT payloads are single bulk-OUT transfers.
const MAX_RAW_OUT: usize = 64 * 1024;

/// Answers RAW_OUT frames from a backend.
pub struct RelayClient<B: RelayBackend> {
    backend: B,
    exchanges: u64,
}

impl<B: RelayBackend> RelayClient<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            exchanges: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Connect to the device's proxy port and serve until it hangs up.
    #[instrument(skip(self))]
    pub fn connect_and_run(&mut self, device: &str) -> Result<()> {
        let addr: SocketAddr = device
            .to_socket_addrs()
            .with_context(|| format!("resolving {device}"))?
            .next()
            .ok_or_else(|| anyhow!("no address for {device}"))?;
        let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .with_context(|| format!("connecting to {addr}"))?;
        let _ = stream.set_nodelay(true);
        info!(addr = %addr, "Connected to raw proxy");

        self.run(&mut stream)?;
        info!(exchanges = self.exchanges, "Device closed the link");
        Ok(())
    }

    /// Serve one link. Returns `Ok` when the device closes it.
    pub fn run<S: Read + Write>(&mut self, stream: &mut S) -> Result<(), ProxyError> {
        loop {
            let frame = match read_frame(stream, MAX_RAW_OUT) {
                Ok(f) => f,
                Err(ProxyError::Closed) => return Ok(()),
                Err(e) => return Err(e),
            };
            if frame.kind() != Some(FrameKind::RawOut) {
                warn!(
                    frame_type = format_args!("0x{:02X}", frame.frame_type),
                    len = frame.payload.len(),
                    "Unexpected frame from device"
                );
                continue;
            }
            debug!(len = frame.payload.len(), head = ?&frame.payload[..frame.payload.len().min(12)], "RAW_OUT");

            let transfers = self.backend.exchange(&frame.payload);
            for data in &transfers {
                write_frame(stream, &ProxyFrame::raw_in(data))?;
            }
            write_frame(stream, &ProxyFrame::done())?;
            self.exchanges += 1;
            debug!(frames = transfers.len(), "RAW_DONE");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{MAX_FRAME_PAYLOAD, ProxyServer, RawProxyBridge, RelayLink};
    use crate::bus::MockBus;
    use crate::engine::PtpResponder;
    use crate::protocol::constants::*;
    use crate::protocol::{command_container, read_std_header, ContainerType};
    use crate::relay::EmulatedBackend;
    use std::io::Cursor;
    use std::thread;
    use std::time::Instant;

    struct Echo;

    impl RelayBackend for Echo {
        fn exchange(&mut self, out: &[u8]) -> Vec<Vec<u8>> {
            vec![out.to_vec(), Vec::new()]
        }
    }

    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_run_answers_each_raw_out() {
        let mut input = ProxyFrame::raw_out(&[0xAA]).to_bytes();
        input.extend(ProxyFrame::new(FrameKind::RawDone, Vec::new()).to_bytes());
        input.extend(ProxyFrame::raw_out(&[0xBB]).to_bytes());
        let mut link = Duplex {
            input: Cursor::new(input),
            output: Vec::new(),
        };

        let mut client = RelayClient::new(Echo);
        client.run(&mut link).unwrap();
        assert_eq!(client.exchanges(), 2);

        let mut out = Cursor::new(link.output);
        let mut frames = Vec::new();
        while let Ok(f) = read_frame(&mut out, MAX_FRAME_PAYLOAD) {
            frames.push(f);
        }
        assert_eq!(
            frames,
            vec![
                ProxyFrame::raw_in(&[0xAA]),
                ProxyFrame::raw_in(&[]),
                ProxyFrame::done(),
                ProxyFrame::raw_in(&[0xBB]),
                ProxyFrame::raw_in(&[]),
                ProxyFrame::done(),
            ]
        );
    }

    #[test]
    fn test_bridge_and_relay_over_loopback() {
        let server = ProxyServer::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let device = server.local_addr().to_string();
        let relay = thread::spawn(move || {
            let mut client = RelayClient::new(EmulatedBackend::default());
            let _ = client.connect_and_run(&device);
            client.exchanges()
        });

        let start = Instant::now();
        while !server.is_connected() {
            assert!(start.elapsed() < Duration::from_secs(5), "relay never connected");
            thread::sleep(Duration::from_millis(10));
        }

        let mut bridge = RawProxyBridge::with_link(server);
        let mut bus = MockBus::new();
        bridge.on_interface_open(&mut bus, 0);
        bridge.on_out_complete(&mut bus, &command_container(PTP_OC_OPEN_SESSION, 1, &[1]));

        let ins = bus.in_transfers();
        assert_eq!(ins.len(), 1);
        let (_, hdr) = read_std_header(&ins[0]).unwrap();
        assert_eq!((hdr.container_type, hdr.code), (ContainerType::Response, PTP_RC_OK));

        drop(bridge);
        assert_eq!(relay.join().unwrap(), 1);
    }
}
