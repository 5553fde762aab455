//! Payload codec: bit packing, frame layout and the advertisement wrapper.

pub mod bits;
pub mod frame;
pub mod advertisement;

pub use frame::{
    BounceEvent, Coordinate, DecodeStatus, DecodedFrame, Frame, FrameHeader, decode, encode,
};

/// Lowercase hex, no separators.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
