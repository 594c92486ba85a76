//! PTP container protocol: constants, header codec and inbound classifier.

pub mod classify;
pub mod constants;
pub mod container;

pub use classify::{classify, Frame, MIN_FRAME_LEN};
pub use constants::*;
pub use container::{
    command_container, data_container, read_std_header, response_container, write_header,
    write_std_header, ContainerHeader, ContainerType, EncodedHeader, FrameError, Layout,
};
