//! Stream tag seam
//!
//! Tag serialisation (ID3v1/ID3v2, Xing/VBR headers) happens behind
//! [`TagWriter`]. The encoder asks it for bytes at fixed points of the
//! stream: before the first frame, in place of the VBR header frame, after
//! the last frame, and once more when the VBR header is rewritten over its
//! placeholder.

use crate::error::{EncodingError, EncodingResult};
use crate::params::ResolvedParams;
use std::io::{Seek, SeekFrom, Write};

pub trait TagWriter {
    /// Bytes placed ahead of everything else in the stream
    fn leading_tag(&mut self, _params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Placeholder reserving room for the VBR header
    fn vbr_placeholder(&mut self, _params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Called once per produced frame with its length in bytes
    fn record_frame(&mut self, _frame_bytes: usize) {}

    /// Bytes appended after the last frame
    fn trailing_tag(&mut self, _params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Final VBR header. `quality` is the VBR quality scaled to 0..=100.
    fn vbr_tag(&mut self, _params: &ResolvedParams, _quality: u32) -> EncodingResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Writes no tags at all
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTags;

impl TagWriter for NoTags {}

impl<T: TagWriter + ?Sized> TagWriter for Box<T> {
    fn leading_tag(&mut self, params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
        (**self).leading_tag(params)
    }

    fn vbr_placeholder(&mut self, params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
        (**self).vbr_placeholder(params)
    }

    fn record_frame(&mut self, frame_bytes: usize) {
        (**self).record_frame(frame_bytes)
    }

    fn trailing_tag(&mut self, params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
        (**self).trailing_tag(params)
    }

    fn vbr_tag(&mut self, params: &ResolvedParams, quality: u32) -> EncodingResult<Vec<u8>> {
        (**self).vbr_tag(params, quality)
    }
}

/// VBR quality 0..=9 scaled to the 0..=100 range stored in the header
pub fn vbr_tag_quality(vbr_q: u8) -> u32 {
    u32::from(vbr_q) * 100 / 9
}

/// Writes `tag` at byte `offset` of `sink`.
///
/// Returns `Ok(false)` without writing when the sink cannot seek, so that
/// unseekable outputs keep their stream intact.
pub fn rewrite_at<S: Write + Seek>(sink: &mut S, offset: u64, tag: &[u8]) -> EncodingResult<bool> {
    if sink.seek(SeekFrom::Start(offset)).is_err() {
        log::debug!("output is not seekable, VBR header left as placeholder");
        return Ok(false);
    }
    sink.write_all(tag)
        .and_then(|_| sink.flush())
        .map_err(|e| EncodingError::Tag(e.to_string()))?;
    Ok(true)
}
