//! End of stream
//!
//! Flushing pushes frames of silence through the sample window until every
//! submitted sample has left it in a completed frame. The silence itself is
//! not owed to the output: each padding block's samples are taken back off
//! the owed counter right after it is submitted, so only real input keeps
//! the loop going. Once the counter reaches zero the frame encoder releases
//! its buffered bits and the trailing tag is appended.

use crate::encoder::Encoder;
use crate::error::Result;
use crate::frame::FrameEncoder;
use crate::tags::{rewrite_at, vbr_tag_quality, TagWriter};
use std::io::{Seek, Write};

impl<F: FrameEncoder, T: TagWriter> Encoder<F, T> {
    /// Drains the stream into `out`.
    ///
    /// Calling it again only adds padding if more input arrived in between.
    pub fn flush(&mut self, out: &mut [u8]) -> Result<usize> {
        self.finish_stream()?;
        self.session_mut()?.drain_into(out)
    }

    pub fn flush_to_vec(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        self.finish_stream()?;
        self.session_mut()?.drain_to_vec(out)
    }

    /// Flushes into `out` and closes the handle.
    ///
    /// If the flushed bytes do not fit, the handle stays open so the call can
    /// be repeated with a larger buffer.
    pub fn finish(&mut self, out: &mut [u8]) -> Result<usize> {
        let n = self.flush(out)?;
        self.close()?;
        Ok(n)
    }

    pub fn finish_to_vec(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let n = self.flush_to_vec(out)?;
        self.close()?;
        Ok(n)
    }

    fn finish_stream(&mut self) -> Result<()> {
        let (session, frame_encoder, tags) = self.parts_mut()?;
        let frame_size = session.params.frame_size;
        let frames_before = session.frame_num;

        let mut blocks = 0;
        while session.buffer.samples_owed() > 0 {
            session.load_silence(frame_size);
            session.submit_loaded(frame_encoder, tags)?;
            session.buffer.discount_padding(frame_size);
            blocks += 1;
        }
        if blocks > 0 {
            session.encoder_padding = session.buffer.settle();
        }

        let tail = frame_encoder.flush_bits(&session.params)?;
        session.pending.try_reserve(tail.len())?;
        session.pending.extend_from_slice(&tail);

        if !session.trailing_written {
            let tag = tags.trailing_tag(&session.params)?;
            session.pending.try_reserve(tag.len())?;
            session.pending.extend_from_slice(&tag);
            session.trailing_written = true;
        }

        log::debug!(
            "flushed {} padding blocks into {} frames, encoder padding {}",
            blocks,
            session.frame_num - frames_before,
            session.encoder_padding
        );
        Ok(())
    }

    /// Writes the final VBR header over its placeholder in `sink`.
    ///
    /// `sink` must hold the stream as written so far, starting at offset 0.
    /// Returns `Ok(false)` when no VBR header is written for this stream or
    /// the sink cannot seek.
    pub fn update_vbr_tag<S: Write + Seek>(&mut self, sink: &mut S) -> Result<bool> {
        let (session, _, tags) = self.parts_mut()?;
        if !session.params.write_vbr_tag {
            return Ok(false);
        }
        let tag = tags.vbr_tag(&session.params, vbr_tag_quality(session.params.vbr_q))?;
        if tag.is_empty() {
            return Ok(false);
        }
        Ok(rewrite_at(sink, session.leading_len as u64, &tag)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EncoderConfig;
    use crate::encoder::Encoder;
    use crate::error::{EncoderError, EncodingResult};
    use crate::frame::{FrameHeader, SilentFrameEncoder};
    use crate::params::ResolvedParams;
    use crate::tags::TagWriter;
    use crate::types::VbrMode;
    use std::io::Cursor;

    #[derive(Default)]
    struct MarkerTags {
        frames: usize,
    }

    impl TagWriter for MarkerTags {
        fn leading_tag(&mut self, _params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
            Ok(b"ID3".to_vec())
        }

        fn vbr_placeholder(&mut self, _params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
            Ok(vec![0; 4])
        }

        fn record_frame(&mut self, _frame_bytes: usize) {
            self.frames += 1;
        }

        fn trailing_tag(&mut self, _params: &ResolvedParams) -> EncodingResult<Vec<u8>> {
            Ok(b"TAG".to_vec())
        }

        fn vbr_tag(&mut self, _params: &ResolvedParams, quality: u32) -> EncodingResult<Vec<u8>> {
            Ok(vec![b'X', self.frames as u8, quality as u8, b'!'])
        }
    }

    #[test]
    fn test_flush_fresh_encoder() {
        let mut encoder = Encoder::default();
        encoder.init_params().unwrap();
        let mut out = vec![0u8; 4096];

        let n = encoder.flush(&mut out).unwrap();
        // Two padding blocks fill the first window, one frame comes out
        assert_eq!(encoder.frame_num(), Some(1));
        assert_eq!(n, 418);
        assert_eq!(encoder.samples_owed(), Some(0));
        assert_eq!(encoder.encoder_padding(), Some(288));
        assert!(FrameHeader::parse(&out[..n]).is_some());
    }

    #[test]
    fn test_flush_covers_all_input() {
        let mut encoder = Encoder::default();
        encoder.init_params().unwrap();
        let mut out = Vec::new();
        encoder
            .encode_buffer_to_vec(&vec![0; 10_000], &vec![0; 10_000], &mut out)
            .unwrap();
        encoder.flush_to_vec(&mut out).unwrap();

        let frames = encoder.frame_num().unwrap() as usize;
        assert_eq!(encoder.samples_owed(), Some(0));
        // Every submitted sample plus the encoder delay fits in the frames
        assert!(frames * 1152 >= 10_000 + 864);
        assert_eq!(frames * 1152 - encoder.encoder_padding().unwrap(), 10_000 + 864);
    }

    #[test]
    fn test_second_flush_adds_nothing() {
        let mut encoder = Encoder::default();
        encoder.init_params().unwrap();
        let mut out = Vec::new();
        encoder.flush_to_vec(&mut out).unwrap();
        let frames = encoder.frame_num();
        let padding = encoder.encoder_padding();

        assert_eq!(encoder.flush_to_vec(&mut out).unwrap(), 0);
        assert_eq!(encoder.frame_num(), frames);
        assert_eq!(encoder.encoder_padding(), padding);
    }

    #[test]
    fn test_flush_after_close_fails() {
        let mut encoder = Encoder::default();
        encoder.init_params().unwrap();
        encoder.close().unwrap();
        let mut out = [0u8; 8];
        assert!(matches!(encoder.flush(&mut out), Err(EncoderError::NotInitialized)));
    }

    #[test]
    fn test_finish_flushes_then_closes() {
        let mut encoder = Encoder::default();
        encoder.init_params().unwrap();
        let mut out = vec![0u8; 4096];
        encoder.encode_buffer(&vec![0; 3000], &vec![0; 3000], &mut out).unwrap();

        let mut tiny = [0u8; 4];
        assert!(matches!(
            encoder.finish(&mut tiny),
            Err(EncoderError::BufferTooSmall { available: 4, .. })
        ));
        assert!(encoder.is_initialized());

        let n = encoder.finish(&mut out).unwrap();
        // 864 + 3000 samples span four frames, two of them came out earlier
        assert_eq!(n, 2 * 418);
        assert!(FrameHeader::parse(&out[..n]).is_some());
        assert!(encoder.is_closed());
        assert!(matches!(
            encoder.encode_buffer(&[0; 16], &[0; 16], &mut out),
            Err(EncoderError::NotInitialized)
        ));
        assert!(matches!(encoder.finish(&mut out), Err(EncoderError::NotInitialized)));
    }

    #[test]
    fn test_finish_to_vec_matches_flush() {
        let pcm = vec![5i16; 5000];
        let mut flushed = Vec::new();
        let mut a = Encoder::default();
        a.init_params().unwrap();
        a.encode_buffer_to_vec(&pcm, &pcm, &mut flushed).unwrap();
        a.flush_to_vec(&mut flushed).unwrap();

        let mut finished = Vec::new();
        let mut b = Encoder::default();
        b.init_params().unwrap();
        b.encode_buffer_to_vec(&pcm, &pcm, &mut finished).unwrap();
        b.finish_to_vec(&mut finished).unwrap();

        assert_eq!(flushed, finished);
        assert!(b.is_closed());
    }

    #[test]
    fn test_tags_surround_frames() {
        let mut config = EncoderConfig::default();
        config.set_vbr(VbrMode::Mtrh).unwrap();
        let mut encoder =
            Encoder::with_collaborators(config, SilentFrameEncoder::new(), MarkerTags::default());
        encoder.init_params().unwrap();
        assert!(encoder.params().unwrap().write_vbr_tag);

        let mut stream = Vec::new();
        encoder
            .encode_buffer_to_vec(&vec![0; 4000], &vec![0; 4000], &mut stream)
            .unwrap();
        encoder.flush_to_vec(&mut stream).unwrap();
        encoder.flush_to_vec(&mut stream).unwrap();

        assert_eq!(&stream[..7], b"ID3\0\0\0\0");
        assert!(FrameHeader::parse(&stream[7..]).is_some());
        assert_eq!(&stream[stream.len() - 3..], b"TAG");
        assert_eq!(stream.windows(3).filter(|w| *w == b"TAG").count(), 1);

        let frames = encoder.frame_num().unwrap() as u8;
        let mut sink = Cursor::new(stream);
        assert!(encoder.update_vbr_tag(&mut sink).unwrap());
        let stream = sink.into_inner();
        assert_eq!(&stream[..7], &[b'I', b'D', b'3', b'X', frames, 44, b'!']);
    }

    #[test]
    fn test_cbr_stream_skips_vbr_tag() {
        let mut encoder =
            Encoder::with_collaborators(EncoderConfig::default(), SilentFrameEncoder::new(), MarkerTags::default());
        encoder.init_params().unwrap();
        let mut sink = Cursor::new(Vec::new());
        assert!(!encoder.update_vbr_tag(&mut sink).unwrap());
        assert!(sink.into_inner().is_empty());
    }
}
