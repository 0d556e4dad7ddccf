//! Bitstream writing
//!
//! A big-endian bit writer with a 32-bit cache word, plus the MPEG audio
//! CRC-16 used for error-protected frames.

use crate::error::{EncodingError, EncodingResult};

/// CRC-16 generator polynomial used by MPEG audio (x^16 + x^15 + x^2 + 1)
const CRC16_POLYNOMIAL: u16 = 0x8005;

/// Initial CRC register value
pub const CRC16_INIT: u16 = 0xffff;

/// Bit writer over a growable byte buffer
#[derive(Debug)]
pub struct BitstreamWriter {
    data: Vec<u8>,
    /// Bit stream cache
    cache: u32,
    /// Free bits in cache
    cache_bits: u32,
}

impl BitstreamWriter {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            cache: 0,
            cache_bits: 32,
        }
    }

    /// Write the low `n` bits of `val`, most significant first
    pub fn put_bits(&mut self, val: u32, n: u32) -> EncodingResult<()> {
        if n > 32 {
            return Err(EncodingError::Bitstream(format!(
                "cannot write {} bits at a time",
                n
            )));
        }
        if n < 32 && (val >> n) != 0 {
            return Err(EncodingError::Bitstream(format!(
                "upper bits are not all zeros: val=0x{:X}, n={}",
                val, n
            )));
        }
        if n == 0 {
            return Ok(());
        }

        if self.cache_bits > n {
            self.cache_bits -= n;
            self.cache |= val << self.cache_bits;
        } else {
            let remaining = n - self.cache_bits;
            self.cache |= val.checked_shr(remaining).unwrap_or(0);
            self.data.extend_from_slice(&self.cache.to_be_bytes());
            self.cache_bits = 32 - remaining;
            self.cache = if remaining == 0 {
                0
            } else {
                val << self.cache_bits
            };
        }
        Ok(())
    }

    /// Write `count` zero bytes
    pub fn put_zero_bytes(&mut self, count: usize) -> EncodingResult<()> {
        for _ in 0..count {
            self.put_bits(0, 8)?;
        }
        Ok(())
    }

    /// Number of bits written so far
    pub fn bits_count(&self) -> usize {
        self.data.len() * 8 + (32 - self.cache_bits) as usize
    }

    /// Whether the written length is a whole number of bytes
    pub fn is_byte_aligned(&self) -> bool {
        self.cache_bits % 8 == 0
    }

    /// Move the cached bits to the buffer, zero-filling the last partial byte
    pub fn flush(&mut self) {
        if self.cache_bits < 32 {
            let bits_in_cache = 32 - self.cache_bits;
            let bytes_to_write = ((bits_in_cache + 7) / 8) as usize;
            self.data
                .extend_from_slice(&self.cache.to_be_bytes()[..bytes_to_write]);
            self.cache = 0;
            self.cache_bits = 32;
        }
    }

    /// Take every byte written so far, leaving cached bits in place
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

/// Feed the low `bits` bits of `value` into a CRC-16 register
pub fn crc16_update(mut crc: u16, value: u32, bits: u32) -> u16 {
    for shift in (0..bits).rev() {
        let bit = (value >> shift) & 1 != 0;
        let carry = crc & 0x8000 != 0;
        crc <<= 1;
        if carry ^ bit {
            crc ^= CRC16_POLYNOMIAL;
        }
    }
    crc
}
