//! frame.rs
//! Telemetry frame layout and the symmetric encoder/decoder.
//!
//! Wire form, MSB-first:
//! - header (15 bits): goal team (2) | ball x (7) | ball y (6)
//! - zero or more bounce records (27 bits each): angle (8) | speed (8) | frame (7) | quadrant (4)
//! - zero padding up to the next byte boundary
//!
//! Field values are masked to their width on construction, so anything that reaches the
//! encoder is already in range.

use std::fmt;

use serde::Serialize;

use crate::codec::bits::{BitReader, BitWriter};

pub const GOAL_BITS: u32 = 2;
pub const X_BITS: u32 = 7;
pub const Y_BITS: u32 = 6;
pub const HEADER_BITS: u32 = GOAL_BITS + X_BITS + Y_BITS;

pub const ANGLE_BITS: u32 = 8;
pub const SPEED_BITS: u32 = 8;
pub const FRAME_BITS: u32 = 7;
pub const QUADRANT_BITS: u32 = 4;
pub const BOUNCE_BITS: u32 = ANGLE_BITS + SPEED_BITS + FRAME_BITS + QUADRANT_BITS;

/// Smallest frame the encoder can produce: a padded header.
pub const MIN_FRAME_BYTES: usize = (HEADER_BITS as usize).div_ceil(8);

#[inline]
const fn truncate(value: u8, width: u32) -> u8 {
    value & ((1u16 << width) - 1) as u8
}

/// Padded byte length of a frame carrying `bounces` records.
pub fn frame_len(bounces: usize) -> usize {
    (HEADER_BITS as usize + bounces * BOUNCE_BITS as usize).div_ceil(8)
}

/// Largest record count whose padded frame fits `budget` bytes.
pub fn bounces_within(budget: usize) -> usize {
    let bits = budget.saturating_mul(8);
    bits.saturating_sub(HEADER_BITS as usize) / BOUNCE_BITS as usize
}

/// Last known ball position, quantised to 7 x 6 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Coordinate {
    x: u8,
    y: u8,
}

impl Coordinate {
    pub const fn new(x: u8, y: u8) -> Self {
        Self {
            x: truncate(x, X_BITS),
            y: truncate(y, Y_BITS),
        }
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }
}

/// One detected bounce. Immutable once built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct BounceEvent {
    angle: u8,
    speed: u8,
    frame: u8,
    quadrant: u8,
}

impl BounceEvent {
    pub const fn new(angle: u8, speed: u8, frame: u8, quadrant: u8) -> Self {
        Self {
            angle,
            speed,
            frame: truncate(frame, FRAME_BITS),
            quadrant: truncate(quadrant, QUADRANT_BITS),
        }
    }

    pub fn angle(&self) -> u8 {
        self.angle
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn frame(&self) -> u8 {
        self.frame
    }

    pub fn quadrant(&self) -> u8 {
        self.quadrant
    }

    fn write(&self, w: &mut BitWriter) {
        w.push(self.angle as u32, ANGLE_BITS);
        w.push(self.speed as u32, SPEED_BITS);
        w.push(self.frame as u32, FRAME_BITS);
        w.push(self.quadrant as u32, QUADRANT_BITS);
    }

    fn read(r: &mut BitReader<'_>) -> Option<Self> {
        if r.remaining() < BOUNCE_BITS as usize {
            return None;
        }
        let angle = r.read(ANGLE_BITS)? as u8;
        let speed = r.read(SPEED_BITS)? as u8;
        let frame = r.read(FRAME_BITS)? as u8;
        let quadrant = r.read(QUADRANT_BITS)? as u8;
        Some(Self::new(angle, speed, frame, quadrant))
    }
}

/// Fixed 15-bit prefix of every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FrameHeader {
    goal: u8,
    position: Coordinate,
}

impl FrameHeader {
    pub const fn new(goal: u8, position: Coordinate) -> Self {
        Self {
            goal: truncate(goal, GOAL_BITS),
            position,
        }
    }

    /// 0 = no goal, 1 = left side scored, 2 = right side scored.
    pub fn goal(&self) -> u8 {
        self.goal
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }
}

/// Header plus the bounce records packed after it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub header: FrameHeader,
    pub bounces: Vec<BounceEvent>,
}

impl Frame {
    pub fn new(header: FrameHeader, bounces: Vec<BounceEvent>) -> Self {
        Self { header, bounces }
    }

    /// Padded size this frame encodes to.
    pub fn encoded_len(&self) -> usize {
        frame_len(self.bounces.len())
    }
}

/// Serialise a frame. Output length is always `frame.encoded_len()`.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(frame.encoded_len());
    w.push(frame.header.goal as u32, GOAL_BITS);
    w.push(frame.header.position.x as u32, X_BITS);
    w.push(frame.header.position.y as u32, Y_BITS);
    for bounce in &frame.bounces {
        bounce.write(&mut w);
    }
    w.finish()
}

/// How much of the input could be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecodeStatus {
    Complete,
    /// Fewer than 15 bits were supplied; header fields are defaults, not data.
    IncompleteHeader { available_bits: usize },
}

/// Result of decoding one payload. Never an error: malformed input is described here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedFrame {
    pub frame: Frame,
    pub status: DecodeStatus,
    /// Bits left after the last whole record, reported as padding.
    pub trailing_bits: usize,
}

impl DecodedFrame {
    pub fn is_complete(&self) -> bool {
        self.status == DecodeStatus::Complete
    }
}

/// Parse a payload produced by [`encode`]. Pure: same bytes in, same result out.
pub fn decode(bytes: &[u8]) -> DecodedFrame {
    let mut r = BitReader::new(bytes);

    if r.remaining() < HEADER_BITS as usize {
        return DecodedFrame {
            frame: Frame::default(),
            status: DecodeStatus::IncompleteHeader {
                available_bits: r.remaining(),
            },
            trailing_bits: 0,
        };
    }

    // The length check above guarantees these reads succeed.
    let goal = r.read(GOAL_BITS).unwrap_or_default() as u8;
    let x = r.read(X_BITS).unwrap_or_default() as u8;
    let y = r.read(Y_BITS).unwrap_or_default() as u8;
    let header = FrameHeader::new(goal, Coordinate::new(x, y));

    let mut bounces = Vec::with_capacity(r.remaining() / BOUNCE_BITS as usize);
    while let Some(bounce) = BounceEvent::read(&mut r) {
        bounces.push(bounce);
    }

    DecodedFrame {
        frame: Frame::new(header, bounces),
        status: DecodeStatus::Complete,
        trailing_bits: r.remaining(),
    }
}

fn goal_label(goal: u8) -> String {
    match goal {
        0 => "none".to_string(),
        1 => "left".to_string(),
        2 => "right".to_string(),
        other => other.to_string(),
    }
}

impl fmt::Display for DecodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let DecodeStatus::IncompleteHeader { available_bits } = self.status {
            return write!(f, "<incomplete header: {} bits>", available_bits);
        }

        let header = &self.frame.header;
        write!(
            f,
            "goal:{} x:{} y:{}",
            goal_label(header.goal()),
            header.position().x(),
            header.position().y()
        )?;
        for (idx, b) in self.frame.bounces.iter().enumerate() {
            write!(
                f,
                " bounce{} angle:{} speed:{} frame:{} quad:{}",
                idx + 1,
                b.angle(),
                b.speed(),
                b.frame(),
                b.quadrant()
            )?;
        }
        if self.trailing_bits >= 8 {
            write!(f, " <trailing {} bits>", self.trailing_bits)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worked_frame() -> Frame {
        Frame::new(
            FrameHeader::new(1, Coordinate::new(65, 30)),
            vec![BounceEvent::new(200, 50, 10, 3)],
        )
    }

    #[test]
    fn worked_vector_encodes_to_known_bytes() {
        assert_eq!(encode(&worked_frame()), vec![0x60, 0xBD, 0x90, 0x64, 0x28, 0xC0]);
    }

    #[test]
    fn worked_vector_decodes_with_six_padding_bits() {
        let decoded = decode(&[0x60, 0xBD, 0x90, 0x64, 0x28, 0xC0]);
        assert!(decoded.is_complete());
        assert_eq!(decoded.frame, worked_frame());
        assert_eq!(decoded.trailing_bits, 6);
    }

    #[test]
    fn header_only_frame_is_two_bytes() {
        let frame = Frame::new(FrameHeader::new(2, Coordinate::new(127, 63)), Vec::new());
        let bytes = encode(&frame);
        assert_eq!(bytes.len(), MIN_FRAME_BYTES);
        // 10 1111111 111111 0
        assert_eq!(bytes, vec![0xBF, 0xFE]);
        let decoded = decode(&bytes);
        assert_eq!(decoded.frame, frame);
        assert_eq!(decoded.trailing_bits, 1);
    }

    #[test]
    fn construction_masks_out_of_range_values() {
        let c = Coordinate::new(0xFF, 0xFF);
        assert_eq!((c.x(), c.y()), (127, 63));
        let b = BounceEvent::new(255, 255, 0xFF, 0xFF);
        assert_eq!((b.frame(), b.quadrant()), (127, 15));
        assert_eq!(FrameHeader::new(7, c).goal(), 3);
    }

    #[test]
    fn short_input_reports_incomplete_header() {
        for bytes in [&[][..], &[0xFF][..]] {
            let decoded = decode(bytes);
            assert_eq!(
                decoded.status,
                DecodeStatus::IncompleteHeader { available_bits: bytes.len() * 8 }
            );
            assert_eq!(decoded.frame, Frame::default());
        }
    }

    #[test]
    fn size_helpers_agree() {
        assert_eq!(frame_len(0), 2);
        assert_eq!(frame_len(1), 6);
        assert_eq!(frame_len(2), 9);
        assert_eq!(bounces_within(9), 2);
        assert_eq!(bounces_within(8), 1);
        assert_eq!(bounces_within(1), 0);
        for n in 0..10 {
            assert!(frame_len(bounces_within(frame_len(n))) == frame_len(n));
        }
    }

    #[test]
    fn display_names_goal_side() {
        let text = decode(&encode(&worked_frame())).to_string();
        assert_eq!(text, "goal:left x:65 y:30 bounce1 angle:200 speed:50 frame:10 quad:3");
    }
}
