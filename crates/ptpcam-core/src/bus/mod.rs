//! Device-side USB stack abstraction.
//!
//! The engine never talks to hardware directly. It arms OUT transfers and
//! submits IN transfers through a [`UsbBus`], and is driven by the stack's
//! completion callbacks. The USB/IP server is the production implementation;
//! [`MockBus`] records everything for tests.

pub mod mock;
pub mod traits;

pub use mock::{BusOp, MockBus};
pub use traits::{BusError, UsbBus};
