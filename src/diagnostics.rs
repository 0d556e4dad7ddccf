//! Encoder state snapshots
//!
//! Serialises the resolved parameters together with the frame statistics
//! and stream counters to JSON, for comparing runs and for bug reports.
//!
//! This module is only available when the "diagnostics" feature is enabled.

use crate::encoder::Encoder;
use crate::frame::FrameEncoder;
use crate::params::ResolvedParams;
use crate::stats::FrameStats;
use crate::tags::TagWriter;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stream counters at the time of the snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StreamCounters {
    pub frame_num: u64,
    pub total_frames: u64,
    pub samples_owed: i64,
    pub encoder_padding: usize,
    pub pending_bytes: usize,
}

/// Everything a resolved encoder knows about its stream
#[derive(Debug, Clone, Serialize)]
pub struct EncoderSnapshot {
    pub captured_at: DateTime<Utc>,
    pub params: ResolvedParams,
    pub stats: FrameStats,
    pub counters: StreamCounters,
}

impl EncoderSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<F: FrameEncoder, T: TagWriter> Encoder<F, T> {
    /// Captures the current state, `None` until the parameters are resolved
    pub fn snapshot(&self) -> Option<EncoderSnapshot> {
        let session = self.session().ok()?;
        Some(EncoderSnapshot {
            captured_at: Utc::now(),
            params: session.params.clone(),
            stats: session.stats.clone(),
            counters: StreamCounters {
                frame_num: session.frame_num,
                total_frames: session.total_frames,
                samples_owed: session.buffer.samples_owed(),
                encoder_padding: session.encoder_padding,
                pending_bytes: session.pending.len(),
            },
        })
    }
}
