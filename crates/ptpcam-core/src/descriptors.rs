//! USB descriptors presented by the emulated camera.
//!
//! Every personality exposes one configuration with a single Still Image
//! interface. The standard personality adds the interrupt IN endpoint that
//! PIMA 15740 asks for; the others expose bulk OUT/IN only, which is what
//! the gimbal host enumerates against.

use byteorder::{ByteOrder, LittleEndian};

use crate::config::UsbIdentity;
use crate::engine::Personality;
use crate::protocol::constants::*;

pub const DESC_DEVICE: u8 = 0x01;
pub const DESC_CONFIGURATION: u8 = 0x02;
pub const DESC_STRING: u8 = 0x03;
pub const DESC_INTERFACE: u8 = 0x04;
pub const DESC_ENDPOINT: u8 = 0x05;

pub const LANGID_EN_US: u16 = 0x0409;
pub const CONFIG_VALUE: u8 = 1;

const STR_MANUFACTURER: u8 = 1;
const STR_PRODUCT: u8 = 2;
const STR_SERIAL: u8 = 3;
const STR_INTERFACE: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Bulk,
    Interrupt,
}

impl TransferKind {
    fn attributes(self) -> u8 {
        match self {
            TransferKind::Bulk => 0x02,
            TransferKind::Interrupt => 0x03,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDesc {
    pub address: u8,
    pub kind: TransferKind,
    pub max_packet: u16,
    pub interval: u8,
}

impl EndpointDesc {
    const fn bulk(address: u8) -> Self {
        Self {
            address,
            kind: TransferKind::Bulk,
            max_packet: MAX_PACKET_SIZE as u16,
            interval: 0,
        }
    }

    pub fn is_in(&self) -> bool {
        self.address & 0x80 != 0
    }

    pub fn number(&self) -> u8 {
        self.address & 0x0F
    }
}

/// Complete descriptor set for one personality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptors {
    pub vid: u16,
    pub pid: u16,
    pub bcd_device: u16,
    pub endpoints: Vec<EndpointDesc>,
    strings: Vec<String>,
}

impl DeviceDescriptors {
    pub fn new(personality: Personality, identity: &UsbIdentity) -> Self {
        let mut endpoints = Vec::with_capacity(3);
        if personality == Personality::Standard {
            endpoints.push(EndpointDesc {
                address: EP_EVENT_IN,
                kind: TransferKind::Interrupt,
                max_packet: MAX_PACKET_SIZE as u16,
                interval: 1,
            });
        }
        endpoints.push(EndpointDesc::bulk(EP_BULK_OUT));
        endpoints.push(EndpointDesc::bulk(EP_BULK_IN));

        Self {
            vid: identity.vid,
            pid: identity.pid,
            bcd_device: identity.bcd_device,
            endpoints,
            strings: vec![
                identity.manufacturer.clone(),
                identity.product.clone(),
                identity.serial.clone(),
                "PTP".into(),
            ],
        }
    }

    /// 18-byte device descriptor.
    pub fn device(&self) -> [u8; 18] {
        let mut d = [0u8; 18];
        d[0] = 18;
        d[1] = DESC_DEVICE;
        LittleEndian::write_u16(&mut d[2..4], 0x0200);
        // Class is declared per interface.
        d[4] = 0x00;
        d[5] = 0x00;
        d[6] = 0x00;
        d[7] = MAX_PACKET_SIZE as u8;
        LittleEndian::write_u16(&mut d[8..10], self.vid);
        LittleEndian::write_u16(&mut d[10..12], self.pid);
        LittleEndian::write_u16(&mut d[12..14], self.bcd_device);
        d[14] = STR_MANUFACTURER;
        d[15] = STR_PRODUCT;
        d[16] = STR_SERIAL;
        d[17] = 1;
        d
    }

    /// Configuration descriptor followed by its interface and endpoints.
    pub fn configuration(&self) -> Vec<u8> {
        let total = 9 + 9 + 7 * self.endpoints.len();
        let mut buf = Vec::with_capacity(total);

        let mut cfg = [0u8; 9];
        cfg[0] = 9;
        cfg[1] = DESC_CONFIGURATION;
        LittleEndian::write_u16(&mut cfg[2..4], total as u16);
        cfg[4] = 1;
        cfg[5] = CONFIG_VALUE;
        cfg[6] = 0;
        // Bus powered, 100 mA.
        cfg[7] = 0x80;
        cfg[8] = 50;
        buf.extend_from_slice(&cfg);

        buf.extend_from_slice(&[
            9,
            DESC_INTERFACE,
            0,
            0,
            self.endpoints.len() as u8,
            PTP_ITF_CLASS,
            PTP_ITF_SUBCLASS,
            PTP_ITF_PROTOCOL,
            STR_INTERFACE,
        ]);

        for ep in &self.endpoints {
            let mut e = [0u8; 7];
            e[0] = 7;
            e[1] = DESC_ENDPOINT;
            e[2] = ep.address;
            e[3] = ep.kind.attributes();
            LittleEndian::write_u16(&mut e[4..6], ep.max_packet);
            e[6] = ep.interval;
            buf.extend_from_slice(&e);
        }
        buf
    }

    /// String descriptor `index`. Index 0 is the language table.
    pub fn string(&self, index: u8) -> Option<Vec<u8>> {
        if index == 0 {
            let mut d = vec![4, DESC_STRING, 0, 0];
            LittleEndian::write_u16(&mut d[2..4], LANGID_EN_US);
            return Some(d);
        }
        let text = self.strings.get(index as usize - 1)?;
        let units: Vec<u16> = text.encode_utf16().take(126).collect();
        let mut d = vec![0u8; 2 + units.len() * 2];
        d[0] = d.len() as u8;
        d[1] = DESC_STRING;
        LittleEndian::write_u16_into(&units, &mut d[2..]);
        Some(d)
    }

    pub fn endpoint(&self, address: u8) -> Option<&EndpointDesc> {
        self.endpoints.iter().find(|e| e.address == address)
    }

    /// `(class, subclass, protocol)` of the single interface.
    pub fn interface_triple(&self) -> (u8, u8, u8) {
        (PTP_ITF_CLASS, PTP_ITF_SUBCLASS, PTP_ITF_PROTOCOL)
    }
}
