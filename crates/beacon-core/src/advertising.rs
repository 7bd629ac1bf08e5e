//! Advertising payload and the radio interface that broadcasts it
//!
//! The payload is assembled once at startup and handed to the radio every
//! time the advertising window opens. It encodes to the legacy 31-byte
//! advertising PDU (flags + 16-bit service list) and a scan response holding
//! the complete local name.

use heapless::{String, Vec};

use crate::error::RadioError;

/// Maximum length of a legacy advertising or scan response PDU.
pub const MAX_AD_LEN: usize = 31;

/// Longest complete local name that fits in the scan response.
pub const MAX_NAME_LEN: usize = MAX_AD_LEN - 2;

// AD types
const AD_FLAGS: u8 = 0x01;
const AD_UUID16_ALL: u8 = 0x03;
const AD_NAME_COMPLETE: u8 = 0x09;

/// LE General Discoverable Mode
pub const LE_GENERAL_DISCOVERABLE: u8 = 0x02;
/// BR/EDR Not Supported
pub const BR_EDR_NOT_SUPPORTED: u8 = 0x04;

/// Heart Rate service
pub const UUID_HEART_RATE: u16 = 0x180D;
/// Battery service
pub const UUID_BATTERY: u16 = 0x180F;
/// Current Time service
pub const UUID_CURRENT_TIME: u16 = 0x1805;

/// Services listed in the advertising data.
pub const ADVERTISED_SERVICES: [u16; 3] = [UUID_HEART_RATE, UUID_BATTERY, UUID_CURRENT_TIME];

/// Raw bytes of one encoded PDU.
pub type AdBuffer = Vec<u8, MAX_AD_LEN>;

/// Connectable advertising payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingPayload {
    pub flags: u8,
    pub service_uuids: Vec<u16, 4>,
    pub name: String<MAX_NAME_LEN>,
}

impl AdvertisingPayload {
    /// Build the payload for `name`, truncating it to what fits in the scan
    /// response.
    pub fn new(name: &str) -> Self {
        let mut truncated = String::new();
        for c in name.chars() {
            if truncated.push(c).is_err() {
                log::warn!("Device name truncated to {} bytes", truncated.len());
                break;
            }
        }

        let mut service_uuids = Vec::new();
        for uuid in ADVERTISED_SERVICES {
            // Capacity 4 > 3 services
            let _ = service_uuids.push(uuid);
        }

        Self {
            flags: LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED,
            service_uuids,
            name: truncated,
        }
    }

    /// Flags and complete 16-bit service list.
    pub fn advertising_data(&self) -> AdBuffer {
        let mut buf = AdBuffer::new();

        push_structure(&mut buf, AD_FLAGS, &[self.flags]);

        let mut uuids: Vec<u8, 8> = Vec::new();
        for uuid in &self.service_uuids {
            let _ = uuids.extend_from_slice(&uuid.to_le_bytes());
        }
        push_structure(&mut buf, AD_UUID16_ALL, &uuids);

        buf
    }

    /// Complete local name.
    pub fn scan_response(&self) -> AdBuffer {
        let mut buf = AdBuffer::new();
        push_structure(&mut buf, AD_NAME_COMPLETE, self.name.as_bytes());
        buf
    }
}

/// Append one `[len, type, data..]` AD structure, skipping it if it doesn't fit.
fn push_structure(buf: &mut AdBuffer, ad_type: u8, data: &[u8]) {
    let needed = data.len() + 2;
    if buf.len() + needed > MAX_AD_LEN {
        log::warn!("AD structure 0x{:02x} does not fit, skipped", ad_type);
        return;
    }

    // Length covers the type byte and the data
    let _ = buf.push((data.len() + 1) as u8);
    let _ = buf.push(ad_type);
    let _ = buf.extend_from_slice(data);
}

/// Trait for the wireless stack's advertising control.
pub trait Advertiser {
    /// Become connectable and discoverable with `payload`.
    fn start_advertising(
        &mut self,
        payload: &AdvertisingPayload,
    ) -> impl Future<Output = Result<(), RadioError>>;

    /// Stop advertising. Existing connections are not affected.
    fn stop_advertising(&mut self) -> impl Future<Output = Result<(), RadioError>>;
}
