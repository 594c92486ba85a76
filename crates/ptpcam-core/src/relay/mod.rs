//! Relay: the PC-side peer of the raw proxy personality.
//!
//! The device forwards every bulk-OUT transfer as RAW_OUT. The relay answers
//! each one with RAW_IN frames and a closing RAW_DONE, either from an
//! in-process emulated camera or from a real camera on the local USB bus.

pub mod backend;
pub mod client;
pub mod translate;

pub use backend::{CameraBackend, EmulatedBackend, RelayBackend};
pub use client::RelayClient;
pub use translate::{container_transfers, ReplyLayout, Stage, Translated, Translator};
