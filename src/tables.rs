//! Lookup tables and constants for encoder parameter resolution
//!
//! Sample rate and bitrate tables for the three MPEG versions, scalefactor
//! band partitions, and the quality-indexed tables used to derive VBR
//! compression ratios and masking adjustments.

use crate::types::{BitrateIndex, MpegVersion, BITRATE_INDEX_COUNT};
use lazy_static::lazy_static;

/// Samples per granule
pub const GRANULE_SIZE: usize = 576;

/// Samples in a two-granule frame, the largest frame size
pub const SAMPLES_PER_FRAME: usize = 2 * GRANULE_SIZE;

/// Encoder delay in samples
pub const ENCDELAY: usize = 576;

/// Delay introduced by the MDCT overlap
pub const MDCTDELAY: usize = 48;

/// FFT block size of the psychoacoustic analysis
pub const BLKSIZE: usize = 1024;

/// Offset of the FFT window relative to the frame start
pub const FFTOFFSET: usize = 224 + MDCTDELAY;

/// Capacity of the per-channel analysis window
pub const MFSIZE: usize = 3 * SAMPLES_PER_FRAME + ENCDELAY - MDCTDELAY;

/// Number of polyphase subbands
pub const SUBBANDS: usize = 32;

/// Sample rates for different MPEG versions
pub const SAMPLE_RATES: [u32; 9] = [
    44100, 48000, 32000, // MPEG-1
    22050, 24000, 16000, // MPEG-2
    11025, 12000, 8000,  // MPEG-2.5
];

/// Bitrates in kbps, `[row][index]`; row 0 is MPEG-2/2.5, row 1 is MPEG-1
pub const BITRATE_TABLE: [[u32; BITRATE_INDEX_COUNT + 1]; 2] = [
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];

/// Compression ratio targeted by each VBR quality index
pub const VBR_COMPRESSION_RATIO: [f64; 10] = [5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0];

/// ABR masking adjustment in dB per VBR quality index
pub const ABR_MASKING_DB: [f64; 10] = [-5.0, -3.75, -2.5, -1.25, 0.0, 0.4, 0.8, 1.2, 1.6, 2.0];

/// ATH lowering in dB per VBR quality index
pub const ATH_VBR_LOWER: [f64; 10] = [16.0, 12.0, 8.0, 4.0, 0.0, -4.0, -8.0, -12.0, -16.0, -20.0];

lazy_static! {
    /// Linear masking factor derived from [`ABR_MASKING_DB`]
    pub static ref ABR_MASKING_LOWER: [f64; 10] = {
        let mut table = [0.0; 10];
        for (dst, db) in table.iter_mut().zip(ABR_MASKING_DB.iter()) {
            *dst = 10f64.powf(0.1 * db);
        }
        table
    };
}

/// Scalefactor band boundaries for one sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalefactorBands {
    /// Long block boundaries (22 bands)
    pub long: [u16; 23],
    /// Short block boundaries (13 bands)
    pub short: [u16; 14],
}

const LSF_LONG: [u16; 23] = [
    0, 6, 12, 18, 24, 30, 36, 44, 54, 66, 80, 96, 116, 140, 168, 200, 238, 284, 336, 396, 464, 522, 576,
];

/// Scalefactor band tables indexed by `samplerate_index + 3 * is_mpeg1 + 6 * is_mpeg25`
pub const SCALEFACTOR_BANDS: [ScalefactorBands; 9] = [
    // 22.05 kHz
    ScalefactorBands {
        long: LSF_LONG,
        short: [0, 4, 8, 12, 18, 24, 32, 42, 56, 74, 100, 132, 174, 192],
    },
    // 24 kHz
    ScalefactorBands {
        long: [0, 6, 12, 18, 24, 30, 36, 44, 54, 66, 80, 96, 114, 136, 162, 194, 232, 278, 332, 394, 464, 540, 576],
        short: [0, 4, 8, 12, 18, 26, 36, 48, 62, 80, 104, 136, 180, 192],
    },
    // 16 kHz
    ScalefactorBands {
        long: LSF_LONG,
        short: [0, 4, 8, 12, 18, 26, 36, 48, 62, 80, 104, 134, 174, 192],
    },
    // 44.1 kHz
    ScalefactorBands {
        long: [0, 4, 8, 12, 16, 20, 24, 30, 36, 44, 52, 62, 74, 90, 110, 134, 162, 196, 238, 288, 342, 418, 576],
        short: [0, 4, 8, 12, 16, 22, 30, 40, 52, 66, 84, 106, 136, 192],
    },
    // 48 kHz
    ScalefactorBands {
        long: [0, 4, 8, 12, 16, 20, 24, 30, 36, 42, 50, 60, 72, 88, 106, 128, 156, 190, 230, 276, 330, 384, 576],
        short: [0, 4, 8, 12, 16, 22, 28, 38, 50, 64, 80, 100, 126, 192],
    },
    // 32 kHz
    ScalefactorBands {
        long: [0, 4, 8, 12, 16, 20, 24, 30, 36, 44, 54, 66, 82, 102, 126, 156, 194, 240, 296, 364, 448, 550, 576],
        short: [0, 4, 8, 12, 16, 22, 30, 42, 58, 78, 104, 138, 180, 192],
    },
    // 11.025 kHz
    ScalefactorBands {
        long: LSF_LONG,
        short: [0, 4, 8, 12, 18, 26, 36, 48, 62, 80, 104, 134, 174, 192],
    },
    // 12 kHz
    ScalefactorBands {
        long: LSF_LONG,
        short: [0, 4, 8, 12, 18, 26, 36, 48, 62, 80, 104, 134, 174, 192],
    },
    // 8 kHz
    ScalefactorBands {
        long: [0, 12, 24, 36, 48, 60, 72, 88, 108, 132, 160, 192, 232, 280, 336, 400, 476, 566, 568, 570, 572, 574, 576],
        short: [0, 8, 16, 24, 36, 52, 72, 96, 124, 160, 162, 164, 166, 192],
    },
];

/// Snaps an arbitrary frequency up to the nearest MPEG output sample rate
pub fn map_to_mp3_frequency(freq: f64) -> u32 {
    const LADDER: [u32; 8] = [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100];
    LADDER
        .iter()
        .copied()
        .find(|&rate| freq <= rate as f64)
        .unwrap_or(48000)
}

/// MPEG version and in-version index of a sample rate
pub fn samplerate_index(sample_rate: u32) -> Option<(MpegVersion, u8)> {
    let position = SAMPLE_RATES.iter().position(|&rate| rate == sample_rate)?;
    let version = match position / 3 {
        0 => MpegVersion::Mpeg1,
        1 => MpegVersion::Mpeg2,
        _ => MpegVersion::Mpeg25,
    };
    Some((version, (position % 3) as u8))
}

/// Bitrate in kbps for an index of the given version
pub fn bitrate_kbps(version: MpegVersion, index: BitrateIndex) -> u32 {
    BITRATE_TABLE[version.bitrate_row()][index.as_usize()]
}

/// Index of an exact legal bitrate, searching the non-free entries
pub fn bitrate_index(version: MpegVersion, kbps: u32) -> Option<BitrateIndex> {
    let row = &BITRATE_TABLE[version.bitrate_row()];
    (1..=BITRATE_INDEX_COUNT)
        .find(|&i| row[i] == kbps)
        .and_then(|i| BitrateIndex::new(i as u8))
}

/// Closest legal bitrate to `kbps`; ties resolve to the lower rate
pub fn nearest_bitrate(version: MpegVersion, kbps: f64) -> u32 {
    let row = &BITRATE_TABLE[version.bitrate_row()];
    let mut best = row[1];
    for &candidate in &row[2..] {
        if (candidate as f64 - kbps).abs() < (best as f64 - kbps).abs() {
            best = candidate;
        }
    }
    best
}

/// The 14 legal bitrates of a version in index order
pub fn legal_bitrates(version: MpegVersion) -> [u32; BITRATE_INDEX_COUNT] {
    let mut out = [0; BITRATE_INDEX_COUNT];
    out.copy_from_slice(&BITRATE_TABLE[version.bitrate_row()][1..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_constants() {
        assert_eq!(FFTOFFSET, 272);
        assert_eq!(MFSIZE, 3984);
        assert_eq!(ENCDELAY - MDCTDELAY, 528);
    }

    #[test]
    fn test_map_to_mp3_frequency() {
        assert_eq!(map_to_mp3_frequency(0.97 * 44100.0), 44100);
        assert_eq!(map_to_mp3_frequency(0.97 * 48000.0), 48000);
        assert_eq!(map_to_mp3_frequency(8000.0), 8000);
        assert_eq!(map_to_mp3_frequency(8001.0), 11025);
        assert_eq!(map_to_mp3_frequency(96000.0), 48000);
    }

    #[test]
    fn test_samplerate_index() {
        assert_eq!(samplerate_index(44100), Some((MpegVersion::Mpeg1, 0)));
        assert_eq!(samplerate_index(24000), Some((MpegVersion::Mpeg2, 1)));
        assert_eq!(samplerate_index(8000), Some((MpegVersion::Mpeg25, 2)));
        assert_eq!(samplerate_index(96000), None);
    }

    #[test]
    fn test_nearest_bitrate() {
        assert_eq!(nearest_bitrate(MpegVersion::Mpeg1, 128.0), 128);
        assert_eq!(nearest_bitrate(MpegVersion::Mpeg1, 127.9), 128);
        assert_eq!(nearest_bitrate(MpegVersion::Mpeg1, 1.0), 32);
        assert_eq!(nearest_bitrate(MpegVersion::Mpeg1, 1000.0), 320);
        // Equidistant between 144 and 160
        assert_eq!(nearest_bitrate(MpegVersion::Mpeg2, 152.0), 144);
    }

    #[test]
    fn test_bitrate_index_lookup() {
        assert_eq!(bitrate_index(MpegVersion::Mpeg1, 128).map(|i| i.value()), Some(9));
        assert_eq!(bitrate_index(MpegVersion::Mpeg25, 8).map(|i| i.value()), Some(1));
        assert_eq!(bitrate_index(MpegVersion::Mpeg1, 130), None);
        assert_eq!(bitrate_index(MpegVersion::Mpeg1, 0), None);
    }

    #[test]
    fn test_abr_masking_lower() {
        assert!((ABR_MASKING_LOWER[4] - 1.0).abs() < 1e-12);
        assert!(ABR_MASKING_LOWER[0] < ABR_MASKING_LOWER[9]);
    }

    #[test]
    fn test_scalefactor_bands_monotonic() {
        for bands in SCALEFACTOR_BANDS.iter() {
            assert!(bands.long.windows(2).all(|w| w[0] < w[1]));
            assert!(bands.short.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(bands.long[22], 576);
            assert_eq!(bands.short[13], 192);
        }
    }
}
