//! Per-frame encoding seam
//!
//! The sample window hands one analysis window at a time to a
//! [`FrameEncoder`]. Psychoacoustics, quantization and Huffman coding live
//! behind that trait. [`SilentFrameEncoder`] is a complete implementation
//! that emits legal Layer III frames with empty main data; decoders play
//! them back as silence of the right length, which makes it useful for
//! exercising timing, container and pipeline behaviour on its own.

use crate::bitstream::{crc16_update, BitstreamWriter, CRC16_INIT};
use crate::error::{EncodingError, EncodingResult};
use crate::params::{BitrateSelection, ResolvedParams, HEADER_BYTES};
use crate::tables::GRANULE_SIZE;
use crate::types::{BitrateIndex, MpegVersion, StereoMode, StereoSubmode};

/// Layer field of the frame header for Layer III
const LAYER_III: u32 = 0b01;

/// One analysis window, oldest sample first
#[derive(Debug, Clone, Copy)]
pub struct FrameWindow<'a> {
    channels: [&'a [f32]; 2],
    channels_out: usize,
}

impl<'a> FrameWindow<'a> {
    pub fn new(left: &'a [f32], right: &'a [f32], channels_out: usize) -> Self {
        Self {
            channels: [left, right],
            channels_out,
        }
    }

    /// Samples of one channel; the right channel of a mono window is empty
    pub fn channel(&self, ch: usize) -> &'a [f32] {
        if ch < self.channels_out {
            self.channels[ch]
        } else {
            &[]
        }
    }

    pub fn channels_out(&self) -> usize {
        self.channels_out
    }

    /// Window length per channel
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels[0].is_empty()
    }
}

/// Bytes and bookkeeping for one encoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub bitrate_index: BitrateIndex,
    pub submode: StereoSubmode,
}

/// Encodes one frame from an analysis window
pub trait FrameEncoder {
    fn encode_frame(
        &mut self,
        window: &FrameWindow<'_>,
        params: &ResolvedParams,
    ) -> EncodingResult<EncodedFrame>;

    /// Bytes still held back at end of stream, padded to a whole byte
    fn flush_bits(&mut self, params: &ResolvedParams) -> EncodingResult<Vec<u8>>;
}

impl<T: FrameEncoder + ?Sized> FrameEncoder for Box<T> {
    fn encode_frame(
        &mut self,
        window: &FrameWindow<'_>,
        params: &ResolvedParams,
    ) -> EncodingResult<EncodedFrame> {
        (**self).encode_frame(window, params)
    }

    fn flush_bits(&mut self, params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
        (**self).flush_bits(params)
    }
}

/// Slot bookkeeping for the padding bit
#[derive(Debug, Clone, Copy)]
struct SlotClock {
    whole_slots: usize,
    frac_slots: f64,
    lag: f64,
}

impl SlotClock {
    fn new(params: &ResolvedParams, kbps: u32) -> Self {
        let avg_slots = (params.granules * GRANULE_SIZE) as f64 / params.out_samplerate as f64
            * (1000.0 * kbps as f64 / 8.0);
        let whole_slots = avg_slots as usize;
        let frac_slots = avg_slots - whole_slots as f64;
        Self {
            whole_slots,
            frac_slots,
            lag: -frac_slots,
        }
    }

    /// Whether the next frame carries the padding slot
    fn next_padding(&mut self) -> bool {
        if self.frac_slots <= 0.0 {
            return false;
        }
        let padding = self.lag <= self.frac_slots - 1.0;
        self.lag += if padding { 1.0 } else { 0.0 } - self.frac_slots;
        padding
    }
}

/// Writes header-and-side-info-only frames
#[derive(Debug)]
pub struct SilentFrameEncoder {
    clock: Option<SlotClock>,
    bs: BitstreamWriter,
}

impl Default for SilentFrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SilentFrameEncoder {
    pub fn new() -> Self {
        Self {
            clock: None,
            bs: BitstreamWriter::new(2048),
        }
    }

    fn bitrate(params: &ResolvedParams) -> (BitrateIndex, u32) {
        match params.bitrate {
            BitrateSelection::Cbr { index, kbps } => (index, kbps),
            BitrateSelection::FreeFormat { kbps } => (BitrateIndex::FREE, kbps),
            BitrateSelection::Vbr { min, min_kbps, .. } => (min, min_kbps),
        }
    }

    fn submode(params: &ResolvedParams) -> StereoSubmode {
        if params.mode == StereoMode::JointStereo && params.force_ms {
            StereoSubmode::Ms
        } else {
            StereoSubmode::Lr
        }
    }

    /// The 32-bit frame header
    fn header(params: &ResolvedParams, index: BitrateIndex, padding: bool, submode: StereoSubmode) -> u32 {
        let mode_extension = if params.mode == StereoMode::JointStereo {
            submode.mode_extension()
        } else {
            0
        };
        let fields: [(u32, u32); 13] = [
            (0x7ff, 11),
            (params.version.header_bits(), 2),
            (LAYER_III, 2),
            (u32::from(!params.error_protection), 1),
            (u32::from(index.value()), 4),
            (u32::from(params.samplerate_index), 2),
            (u32::from(padding), 1),
            (0, 1),
            (params.mode.header_bits(), 2),
            (mode_extension, 2),
            (u32::from(params.copyright), 1),
            (u32::from(params.original), 1),
            (params.emphasis.header_bits(), 2),
        ];
        fields
            .iter()
            .fold(0u32, |word, &(value, bits)| (word << bits) | value)
    }
}

impl FrameEncoder for SilentFrameEncoder {
    fn encode_frame(
        &mut self,
        window: &FrameWindow<'_>,
        params: &ResolvedParams,
    ) -> EncodingResult<EncodedFrame> {
        if window.len() < params.frame_size {
            return Err(EncodingError::InvalidDataLength {
                expected: params.frame_size,
                actual: window.len(),
            });
        }

        let (index, kbps) = Self::bitrate(params);
        let clock = self.clock.get_or_insert_with(|| SlotClock::new(params, kbps));
        let padding = clock.next_padding();
        let frame_bytes = clock.whole_slots + usize::from(padding);
        if frame_bytes < params.sideinfo_len {
            return Err(EncodingError::FrameEncoder(format!(
                "{} kbps leaves {} bytes per frame, side info needs {}",
                kbps, frame_bytes, params.sideinfo_len
            )));
        }

        let submode = Self::submode(params);
        let header = Self::header(params, index, padding, submode);
        let side_info = params.side_info_bytes();

        self.bs.put_bits(header, 32)?;
        if params.error_protection {
            let mut crc = crc16_update(CRC16_INIT, header & 0xffff, 16);
            for _ in 0..side_info {
                crc = crc16_update(crc, 0, 8);
            }
            self.bs.put_bits(u32::from(crc), 16)?;
        }
        self.bs.put_zero_bytes(side_info)?;
        self.bs.put_zero_bytes(frame_bytes - params.sideinfo_len)?;
        debug_assert_eq!(self.bs.bits_count(), frame_bytes * 8);
        self.bs.flush();

        log::trace!(
            "frame: {} bytes, bitrate index {}, padding {}",
            frame_bytes,
            index.value(),
            padding
        );

        Ok(EncodedFrame {
            bytes: self.bs.take_bytes(),
            bitrate_index: index,
            submode,
        })
    }

    fn flush_bits(&mut self, _params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
        self.bs.flush();
        Ok(self.bs.take_bytes())
    }
}

/// Nominal frame length in bytes for a bitrate, without padding
pub fn frame_length(version: MpegVersion, kbps: u32, sample_rate: u32) -> usize {
    let granules = version.granules();
    (granules * GRANULE_SIZE) * 1000 * kbps as usize / (8 * sample_rate as usize)
}

/// Decoded view of a frame header, for inspection and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version_bits: u32,
    pub protected: bool,
    pub bitrate_index: u8,
    pub samplerate_index: u8,
    pub padding: bool,
    pub mode_bits: u32,
    pub mode_extension: u32,
}

impl FrameHeader {
    /// Parses the first four bytes of a frame
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let word = u32::from_be_bytes(bytes.get(..HEADER_BYTES)?.try_into().ok()?);
        if word >> 21 != 0x7ff || (word >> 17) & 0b11 != LAYER_III {
            return None;
        }
        Some(Self {
            version_bits: (word >> 19) & 0b11,
            protected: (word >> 16) & 1 == 0,
            bitrate_index: ((word >> 12) & 0xf) as u8,
            samplerate_index: ((word >> 10) & 0b11) as u8,
            padding: (word >> 9) & 1 == 1,
            mode_bits: (word >> 6) & 0b11,
            mode_extension: (word >> 4) & 0b11,
        })
    }
}
