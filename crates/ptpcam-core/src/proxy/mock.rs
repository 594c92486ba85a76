//! Scripted relay for bridge tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::frame::{ProxyError, ProxyFrame};
use super::server::RelayLink;

#[derive(Debug, Default)]
struct MockRelayState {
    connected: bool,
    replies: VecDeque<ProxyFrame>,
    sent: Vec<ProxyFrame>,
}

/// Relay that answers from a queue and records what it was sent.
///
/// Clones share state, so a test can keep one handle while the bridge owns
/// another. An empty queue behaves like a relay that never answers.
#[derive(Debug, Clone, Default)]
pub struct MockRelay {
    state: Arc<Mutex<MockRelayState>>,
}

impl MockRelay {
    pub fn connected() -> Self {
        let relay = Self::default();
        relay.set_connected(true);
        relay
    }

    pub fn set_connected(&self, connected: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.connected = connected;
        }
    }

    pub fn queue_reply(&self, frame: ProxyFrame) {
        if let Ok(mut s) = self.state.lock() {
            s.replies.push_back(frame);
        }
    }

    pub fn sent(&self) -> Vec<ProxyFrame> {
        self.state.lock().map(|s| s.sent.clone()).unwrap_or_default()
    }

    pub fn pending_replies(&self) -> usize {
        self.state.lock().map(|s| s.replies.len()).unwrap_or(0)
    }
}

impl RelayLink for MockRelay {
    fn is_connected(&self) -> bool {
        self.state.lock().map(|s| s.connected).unwrap_or(false)
    }

    fn send_frame(&self, frame: &ProxyFrame) -> Result<(), ProxyError> {
        let mut s = self.state.lock().map_err(|_| ProxyError::NotConnected)?;
        if !s.connected {
            return Err(ProxyError::NotConnected);
        }
        s.sent.push(frame.clone());
        Ok(())
    }

    fn recv_frame(&self, _timeout: Duration) -> Result<ProxyFrame, ProxyError> {
        let mut s = self.state.lock().map_err(|_| ProxyError::NotConnected)?;
        s.replies.pop_front().ok_or(ProxyError::Timeout)
    }
}
