//! Raw proxy: framed TCP relay transport and the bridge personality.

pub mod bridge;
pub mod frame;
pub mod mock;
pub mod server;

pub use bridge::{RawProxyBridge, RelaySettings, DEFAULT_FRAME_BUDGET, DEFAULT_FRAME_TIMEOUT};
pub use frame::{
    read_frame, write_frame, FrameKind, ProxyError, ProxyFrame, FRAME_RAW_DONE, FRAME_RAW_IN,
    FRAME_RAW_OUT, MAX_FRAME_PAYLOAD,
};
pub use mock::MockRelay;
pub use server::{ProxyServer, RelayLink};
