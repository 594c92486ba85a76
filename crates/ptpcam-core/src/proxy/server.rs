//! Device-side TCP endpoint of the relay protocol.
//!
//! One client at a time. A new connection displaces the previous one, and a
//! client that went away is noticed the next time the bridge asks.

use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::frame::{read_frame, write_frame, ProxyError, ProxyFrame, MAX_FRAME_PAYLOAD};

/// Frame-level link to the relay, as seen by the bridge.
pub trait RelayLink {
    fn is_connected(&self) -> bool;

    fn send_frame(&self, frame: &ProxyFrame) -> Result<(), ProxyError>;

    /// Wait up to `timeout` for the next frame.
    fn recv_frame(&self, timeout: Duration) -> Result<ProxyFrame, ProxyError>;
}

type ClientSlot = Arc<Mutex<Option<TcpStream>>>;

pub struct ProxyServer {
    client: ClientSlot,
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl ProxyServer {
    /// Bind `addr` and start accepting relay clients in the background.
    #[instrument(level = "info")]
    pub fn bind(addr: SocketAddr) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind(addr).map_err(ProxyError::Io)?;
        let local_addr = listener.local_addr().map_err(ProxyError::Io)?;
        let client: ClientSlot = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));

        let accept_thread = {
            let client = Arc::clone(&client);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("proxy-accept".into())
                .spawn(move || accept_loop(listener, client, stop))
                .map_err(ProxyError::Io)?
        };

        info!(addr = %local_addr, "Raw proxy listening");
        Ok(Self {
            client,
            local_addr,
            stop,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Clone the current client stream so no lock is held across I/O.
    fn stream(&self) -> Result<TcpStream, ProxyError> {
        let slot = self.client.lock().map_err(|_| ProxyError::NotConnected)?;
        match slot.as_ref() {
            Some(s) => s.try_clone().map_err(ProxyError::Io),
            None => Err(ProxyError::NotConnected),
        }
    }

    fn drop_client(&self) {
        if let Ok(mut slot) = self.client.lock() {
            if let Some(old) = slot.take() {
                let _ = old.shutdown(Shutdown::Both);
                info!("Relay client disconnected");
            }
        }
    }
}

impl RelayLink for ProxyServer {
    fn is_connected(&self) -> bool {
        let Ok(stream) = self.stream() else {
            return false;
        };
        if stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut probe = [0u8; 1];
        let alive = match stream.peek(&mut probe) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => e.kind() == ErrorKind::WouldBlock,
        };
        let _ = stream.set_nonblocking(false);
        if !alive {
            self.drop_client();
        }
        alive
    }

    fn send_frame(&self, frame: &ProxyFrame) -> Result<(), ProxyError> {
        let mut stream = self.stream()?;
        write_frame(&mut stream, frame)
    }

    fn recv_frame(&self, timeout: Duration) -> Result<ProxyFrame, ProxyError> {
        let mut stream = self.stream()?;
        stream.set_read_timeout(Some(timeout)).map_err(ProxyError::Io)?;
        let result = read_frame(&mut stream, MAX_FRAME_PAYLOAD);
        // Framing can no longer be trusted after these.
        if let Err(e @ (ProxyError::InvalidLength | ProxyError::Closed | ProxyError::Io(_))) = &result {
            warn!(error = %e, "Relay link out of sync, dropping client");
            self.drop_client();
        }
        result
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Wake the blocking accept.
        let _ = TcpStream::connect(self.local_addr);
        self.drop_client();
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(listener: TcpListener, client: ClientSlot, stop: Arc<AtomicBool>) {
    for conn in listener.incoming() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let stream = match conn {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Relay accept failed");
                continue;
            }
        };
        let peer = stream.peer_addr().ok();
        let _ = stream.set_nodelay(true);

        let Ok(mut slot) = client.lock() else {
            warn!("Client slot poisoned, stopping accept loop");
            break;
        };
        if let Some(old) = slot.replace(stream) {
            debug!("Displacing previous relay client");
            let _ = old.shutdown(Shutdown::Both);
        }
        info!(peer = ?peer, "Relay client connected");
    }
}
