//! bits.rs
//! MSB-first bit accumulator used by the frame codec.
//!
//! Fields are appended high bit first; the final partial byte is padded with zero bits
//! in its low-order positions. The reader walks the same layout and never panics on
//! short input: a read that would run past the end returns `None`.

/// Widest field the accumulator accepts in one call.
pub const MAX_FIELD_BITS: u32 = 32;

#[inline]
fn mask(width: u32) -> u64 {
    if width == 0 { 0 } else { (1u64 << width) - 1 }
}

/// Appends fixed-width unsigned fields into a byte vector.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    // Pending bits, right-aligned. Never holds 8 or more between calls.
    acc: u64,
    acc_bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            acc: 0,
            acc_bits: 0,
        }
    }

    /// Append the low `width` bits of `value`. Higher bits are discarded.
    pub fn push(&mut self, value: u32, width: u32) {
        debug_assert!(width <= MAX_FIELD_BITS);
        let width = width.min(MAX_FIELD_BITS);
        if width == 0 {
            return;
        }

        self.acc = (self.acc << width) | (value as u64 & mask(width));
        self.acc_bits += width;

        while self.acc_bits >= 8 {
            self.acc_bits -= 8;
            self.bytes.push((self.acc >> self.acc_bits) as u8);
        }
        self.acc &= mask(self.acc_bits);
    }

    /// Total bits appended so far, padding excluded.
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.acc_bits as usize
    }

    /// Length in bytes once padded.
    pub fn padded_len(&self) -> usize {
        self.bit_len().div_ceil(8)
    }

    /// Pad the trailing partial byte with zeros and return the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.acc_bits > 0 {
            let pad = 8 - self.acc_bits;
            self.bytes.push((self.acc << pad) as u8);
        }
        self.bytes
    }
}

/// Reads fixed-width fields back out of an MSB-first byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Read `width` bits, or `None` without consuming anything if fewer remain.
    pub fn read(&mut self, width: u32) -> Option<u32> {
        let width = width.min(MAX_FIELD_BITS) as usize;
        if width > self.remaining() {
            return None;
        }

        let mut value: u64 = 0;
        let mut left = width;
        while left > 0 {
            let byte = self.data[self.position / 8];
            let offset = self.position % 8;
            let take = left.min(8 - offset);
            let bits = (byte >> (8 - offset - take)) as u64 & mask(take as u32);
            value = (value << take) | bits;
            self.position += take;
            left -= take;
        }
        Some(value as u32)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() * 8 - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }
}
