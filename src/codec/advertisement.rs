//! advertisement.rs
//! Legacy advertisement framing around the telemetry payload.
//!
//! Layout (each structure is `len, type, data...`, `len` counting type + data):
//! - flags: `02 01 06`
//! - complete local name: `len 09 <name>`
//! - manufacturer specific: `len FF <id lo> <id hi> <payload>`
//!
//! The whole advertisement is capped at 31 bytes, which is what bounds the byte budget
//! handed to the buffer drain.

pub const MAX_ADVERTISEMENT_BYTES: usize = 31;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
pub const AD_TYPE_MANUFACTURER: u8 = 0xFF;

/// LE general discoverable, BR/EDR not supported.
const FLAGS_STRUCTURE: [u8; 3] = [0x02, AD_TYPE_FLAGS, 0x06];
// len + type + 16-bit identifier
const MANUFACTURER_OVERHEAD: usize = 4;

/// Fixed prefix (flags + name) and source identifier for one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementLayout {
    prefix: Vec<u8>,
    source_id: u16,
}

impl AdvertisementLayout {
    pub fn new(device_name: &str, source_id: u16) -> Self {
        let name = device_name.as_bytes();
        let mut prefix = Vec::with_capacity(FLAGS_STRUCTURE.len() + 2 + name.len());
        prefix.extend_from_slice(&FLAGS_STRUCTURE);
        prefix.push((name.len() + 1) as u8);
        prefix.push(AD_TYPE_COMPLETE_NAME);
        prefix.extend_from_slice(name);
        Self { prefix, source_id }
    }

    pub fn source_id(&self) -> u16 {
        self.source_id
    }

    /// Bytes left for the codec payload once all fixed structures are in place.
    pub fn max_payload(&self) -> usize {
        MAX_ADVERTISEMENT_BYTES.saturating_sub(self.prefix.len() + MANUFACTURER_OVERHEAD)
    }

    /// Wrap a payload. Returns `None` if the result would exceed the advertisement cap.
    pub fn build(&self, payload: &[u8]) -> Option<Vec<u8>> {
        if payload.len() > self.max_payload() {
            return None;
        }
        let mut out = Vec::with_capacity(self.prefix.len() + MANUFACTURER_OVERHEAD + payload.len());
        out.extend_from_slice(&self.prefix);
        out.push((payload.len() + 3) as u8);
        out.push(AD_TYPE_MANUFACTURER);
        out.extend_from_slice(&self.source_id.to_le_bytes());
        out.extend_from_slice(payload);
        Some(out)
    }
}

/// Fields recovered from a received advertisement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAdvertisement {
    pub local_name: Option<String>,
    /// (manufacturer identifier, data) in the order they appeared.
    pub manufacturer: Vec<(u16, Vec<u8>)>,
}

impl ParsedAdvertisement {
    pub fn manufacturer_data(&self, source_id: u16) -> Option<&[u8]> {
        self.manufacturer
            .iter()
            .find(|(id, _)| *id == source_id)
            .map(|(_, data)| data.as_slice())
    }
}

/// Walk the AD structures of `bytes`. Stops at a zero length or a structure that runs
/// past the end; whatever was read up to that point is returned.
pub fn parse_advertisement(bytes: &[u8]) -> ParsedAdvertisement {
    let mut parsed = ParsedAdvertisement::default();
    let mut pos = 0;

    while pos < bytes.len() {
        let len = bytes[pos] as usize;
        if len == 0 || pos + 1 + len > bytes.len() {
            break;
        }
        let ad_type = bytes[pos + 1];
        let data = &bytes[pos + 2..pos + 1 + len];

        match ad_type {
            AD_TYPE_COMPLETE_NAME => {
                parsed.local_name = Some(String::from_utf8_lossy(data).into_owned());
            }
            AD_TYPE_MANUFACTURER if data.len() >= 2 => {
                let id = u16::from_le_bytes([data[0], data[1]]);
                parsed.manufacturer.push((id, data[2..].to_vec()));
            }
            _ => {}
        }
        pos += 1 + len;
    }

    parsed
}
