//! PTP dataset encoding: strings, StorageInfo and a minimal DeviceInfo.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use thiserror::Error;

use crate::protocol::constants::*;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Truncated dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid UTF-16 in PTP string")]
    InvalidString,
}

/// PTP strings carry at most 255 UTF-16 units including the terminator.
const MAX_STRING_CHARS: usize = 254;

/// Little-endian dataset builder.
#[derive(Debug, Default, Clone)]
pub struct DatasetWriter {
    buf: Vec<u8>,
}

impl DatasetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        let mut b = [0u8; 2];
        LittleEndian::write_u16(&mut b, v);
        self.buf.extend_from_slice(&b);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        let mut b = [0u8; 4];
        LittleEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        let mut b = [0u8; 8];
        LittleEndian::write_u64(&mut b, v);
        self.buf.extend_from_slice(&b);
        self
    }

    /// `u32` count followed by `u16` entries.
    pub fn u16_array(&mut self, items: &[u16]) -> &mut Self {
        self.u32(items.len() as u32);
        for &i in items {
            self.u16(i);
        }
        self
    }

    /// PTP string: count byte (chars + terminator), UTF-16LE chars, `00 00`.
    /// An empty string is the single byte `00`.
    pub fn string(&mut self, s: &str) -> &mut Self {
        if s.is_empty() {
            return self.u8(0);
        }
        let units: Vec<u16> = s.encode_utf16().take(MAX_STRING_CHARS).collect();
        self.u8(units.len() as u8 + 1);
        for u in units {
            self.u16(u);
        }
        self.u16(0)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// StorageInfo for the single fixed storage the camera reports.
pub fn storage_info() -> Vec<u8> {
    const GIB: u64 = 1024 * 1024 * 1024;
    let mut w = DatasetWriter::new();
    w.u16(0x0002) // fixed RAM
        .u16(0x0002) // generic hierarchical
        .u16(0x0000) // read-write
        .u64(32 * GIB)
        .u64(31 * GIB)
        .u32(0xFFFF_FFFF)
        .string("Internal Storage")
        .string("SONY");
    w.finish()
}

/// Minimal DeviceInfo advertised by the standard personality.
pub fn minimal_device_info(manufacturer: &str, model: &str, serial: &str) -> Vec<u8> {
    let mut w = DatasetWriter::new();
    w.u16(100) // standard version
        .u32(0) // vendor extension id
        .u16(100) // vendor extension version
        .string("")
        .u16(0) // functional mode
        .u16_array(&[PTP_OC_GET_DEVICE_INFO, PTP_OC_OPEN_SESSION])
        .u16_array(&[]) // events
        .u16_array(&[]) // device properties
        .u16_array(&[]) // capture formats
        .u16_array(&[]) // image formats
        .string(manufacturer)
        .string(model)
        .string("1.00")
        .string(serial);
    w.finish()
}

/// Decoded DeviceInfo dataset, as reported by a real camera.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub standard_version: u16,
    pub vendor_extension_id: u32,
    pub vendor_extension_version: u16,
    pub vendor_extension_desc: String,
    pub functional_mode: u16,
    pub operations: Vec<u16>,
    pub events: Vec<u16>,
    pub device_properties: Vec<u16>,
    pub capture_formats: Vec<u16>,
    pub image_formats: Vec<u16>,
    pub manufacturer: String,
    pub model: String,
    pub device_version: String,
    pub serial_number: String,
}

impl DeviceInfo {
    pub fn from_bytes(data: &[u8]) -> Result<Self, DatasetError> {
        let mut c = Cursor::new(data);
        Ok(Self {
            standard_version: c.read_u16::<LittleEndian>()?,
            vendor_extension_id: c.read_u32::<LittleEndian>()?,
            vendor_extension_version: c.read_u16::<LittleEndian>()?,
            vendor_extension_desc: read_string(&mut c)?,
            functional_mode: c.read_u16::<LittleEndian>()?,
            operations: read_u16_array(&mut c)?,
            events: read_u16_array(&mut c)?,
            device_properties: read_u16_array(&mut c)?,
            capture_formats: read_u16_array(&mut c)?,
            image_formats: read_u16_array(&mut c)?,
            manufacturer: read_string(&mut c)?,
            model: read_string(&mut c)?,
            device_version: read_string(&mut c)?,
            serial_number: read_string(&mut c)?,
        })
    }
}

fn read_u16_array<R: Read>(r: &mut R) -> Result<Vec<u16>, DatasetError> {
    let n = r.read_u32::<LittleEndian>()?;
    // Cap the preallocation; a bogus count fails on read instead.
    let mut out = Vec::with_capacity((n as usize).min(256));
    for _ in 0..n {
        out.push(r.read_u16::<LittleEndian>()?);
    }
    Ok(out)
}

/// Read a PTP string. The terminator is included in the count byte.
pub fn read_string<R: Read>(r: &mut R) -> Result<String, DatasetError> {
    let n = r.read_u8()? as usize;
    let mut units = Vec::with_capacity(n);
    for _ in 0..n {
        units.push(r.read_u16::<LittleEndian>()?);
    }
    while units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16(&units).map_err(|_| DatasetError::InvalidString)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tables;

    #[test]
    fn test_ptp_string_encoding() {
        let mut w = DatasetWriter::new();
        w.string("SONY");
        assert_eq!(
            w.finish(),
            vec![0x05, b'S', 0, b'O', 0, b'N', 0, b'Y', 0, 0, 0]
        );
    }

    #[test]
    fn test_empty_string_is_single_zero() {
        let mut w = DatasetWriter::new();
        w.string("");
        assert_eq!(w.finish(), vec![0x00]);
    }

    #[test]
    fn test_storage_info_layout() {
        let si = storage_info();
        // 3*u16 + 2*u64 + u32 = 26, then 1+17*2 and 1+5*2.
        assert_eq!(si.len(), 26 + 35 + 11);
        assert_eq!(&si[0..6], &[2, 0, 2, 0, 0, 0]);
        assert_eq!(LittleEndian::read_u64(&si[6..14]), 32 << 30);
        assert_eq!(LittleEndian::read_u64(&si[14..22]), 31 << 30);
        assert_eq!(LittleEndian::read_u32(&si[22..26]), 0xFFFF_FFFF);
        assert_eq!(si[26], 17);
    }

    #[test]
    fn test_minimal_device_info_parses() {
        let raw = minimal_device_info("Sony", "ILCE-5100", "0001");
        let info = DeviceInfo::from_bytes(&raw).unwrap();
        assert_eq!(info.standard_version, 100);
        assert_eq!(info.vendor_extension_version, 100);
        assert!(info.vendor_extension_desc.is_empty());
        assert_eq!(info.operations, vec![0x1001, 0x1002]);
        assert!(info.events.is_empty());
        assert_eq!(info.manufacturer, "Sony");
        assert_eq!(info.model, "ILCE-5100");
        assert_eq!(info.device_version, "1.00");
        assert_eq!(info.serial_number, "0001");
    }

    #[test]
    fn test_captured_device_info_parses() {
        let info = DeviceInfo::from_bytes(&tables::DEVICE_INFO).unwrap();
        assert_eq!(info.vendor_extension_id, 0x11);
        assert_eq!(info.vendor_extension_desc, "Sony PTP Extensions");
        assert!(info.operations.contains(&PTP_OC_SONY_REC));
        assert_eq!(info.manufacturer, "Sony Corporation");
        assert_eq!(info.model, "ILCE-5100");
        assert_eq!(info.device_version, "3.0");
    }

    #[test]
    fn test_truncated_device_info() {
        assert!(matches!(
            DeviceInfo::from_bytes(&[0x64, 0x00, 0x11]),
            Err(DatasetError::Io(_))
        ));
    }
}
