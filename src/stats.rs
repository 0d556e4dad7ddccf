//! Frame statistics
//!
//! A passive histogram of produced frames keyed by bitrate index and stereo
//! submode. Only the sample window writes to it; everything else reads
//! snapshots.

use crate::tables;
use crate::types::{BitrateIndex, MpegVersion, StereoSubmode, BITRATE_INDEX_COUNT, STEREO_SUBMODE_COUNT};

/// Bitrate-by-submode frame histogram
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub struct FrameStats {
    version: MpegVersion,
    counts: [[u32; STEREO_SUBMODE_COUNT]; BITRATE_INDEX_COUNT + 1],
}

impl FrameStats {
    pub fn new(version: MpegVersion) -> Self {
        Self {
            version,
            counts: [[0; STEREO_SUBMODE_COUNT]; BITRATE_INDEX_COUNT + 1],
        }
    }

    /// Count one completed frame
    pub fn record(&mut self, index: BitrateIndex, submode: StereoSubmode) {
        let cell = &mut self.counts[index.as_usize()][submode.index()];
        *cell = cell.saturating_add(1);
    }

    /// Frames per bitrate index 1..=14
    pub fn bitrate_histogram(&self) -> [u32; BITRATE_INDEX_COUNT] {
        let mut out = [0; BITRATE_INDEX_COUNT];
        for (dst, row) in out.iter_mut().zip(&self.counts[1..]) {
            *dst = row.iter().sum();
        }
        out
    }

    /// Frames per stereo submode, free-format frames included
    pub fn stereo_mode_histogram(&self) -> [u32; STEREO_SUBMODE_COUNT] {
        let mut out = [0; STEREO_SUBMODE_COUNT];
        for row in &self.counts {
            for (dst, &count) in out.iter_mut().zip(row) {
                *dst += count;
            }
        }
        out
    }

    /// Frames per bitrate index 1..=14 and submode
    pub fn bitrate_stereo_mode_histogram(&self) -> [[u32; STEREO_SUBMODE_COUNT]; BITRATE_INDEX_COUNT] {
        let mut out = [[0; STEREO_SUBMODE_COUNT]; BITRATE_INDEX_COUNT];
        out.copy_from_slice(&self.counts[1..]);
        out
    }

    /// The kbps value of each histogram slot
    pub fn bitrate_kbps(&self) -> [u32; BITRATE_INDEX_COUNT] {
        tables::legal_bitrates(self.version)
    }

    pub fn count(&self, index: BitrateIndex, submode: StereoSubmode) -> u32 {
        self.counts[index.as_usize()][submode.index()]
    }

    pub fn total_frames(&self) -> u64 {
        self.counts.iter().flatten().map(|&c| u64::from(c)).sum()
    }

    /// Frame-weighted mean bitrate of the table-indexed frames
    pub fn mean_bitrate_kbps(&self) -> Option<f64> {
        let hist = self.bitrate_histogram();
        let frames: u64 = hist.iter().map(|&c| u64::from(c)).sum();
        if frames == 0 {
            return None;
        }
        let weighted: u64 = hist
            .iter()
            .zip(self.bitrate_kbps().iter())
            .map(|(&count, &kbps)| u64::from(count) * u64::from(kbps))
            .sum();
        Some(weighted as f64 / frames as f64)
    }
}
