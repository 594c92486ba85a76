//! Response catalog: the DATA phase payload for each read operation the
//! legacy personality answers.

pub mod dataset;
pub mod tables;

use std::borrow::Cow;

use crate::protocol::constants::*;

pub use dataset::{storage_info, minimal_device_info, DatasetError, DatasetWriter, DeviceInfo};

/// Empty PTP array (`u32` count of zero).
static EMPTY_ARRAY: [u8; 4] = [0; 4];

/// Payload streamed for `code`, or `None` when the operation has no DATA
/// phase in the catalog.
pub fn lookup(code: u16) -> Option<Cow<'static, [u8]>> {
    let payload: Cow<'static, [u8]> = match code {
        PTP_OC_GET_DEVICE_INFO => Cow::Borrowed(&tables::DEVICE_INFO),
        PTP_OC_GET_STORAGE_IDS => Cow::Borrowed(&tables::STORAGE_IDS),
        PTP_OC_GET_STORAGE_INFO => Cow::Owned(storage_info()),
        PTP_OC_GET_NUM_OBJECTS | PTP_OC_GET_OBJECT_HANDLES => Cow::Borrowed(&EMPTY_ARRAY),
        PTP_OC_SONY_9201 => Cow::Borrowed(&tables::SONY_9201),
        PTP_OC_SONY_9202 => Cow::Borrowed(&tables::SONY_9202),
        PTP_OC_SONY_9209 => Cow::Borrowed(&tables::SONY_9209),
        _ => return None,
    };
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_sizes() {
        assert_eq!(lookup(PTP_OC_GET_DEVICE_INFO).map(|p| p.len()), Some(247));
        assert_eq!(lookup(PTP_OC_GET_STORAGE_IDS).map(|p| p.len()), Some(8));
        assert_eq!(lookup(PTP_OC_GET_NUM_OBJECTS).map(|p| p.len()), Some(4));
        assert_eq!(lookup(PTP_OC_SONY_9202).map(|p| p.len()), Some(84));
        assert_eq!(lookup(PTP_OC_SONY_9209).map(|p| p.len()), Some(1011));
    }

    #[test]
    fn test_lookup_storage_info_is_computed() {
        assert!(matches!(lookup(PTP_OC_GET_STORAGE_INFO), Some(Cow::Owned(_))));
    }

    #[test]
    fn test_lookup_misses() {
        assert!(lookup(PTP_OC_OPEN_SESSION).is_none());
        assert!(lookup(PTP_OC_CLOSE_SESSION).is_none());
        assert!(lookup(PTP_OC_SONY_REC).is_none());
        assert!(lookup(0x9999).is_none());
    }
}
