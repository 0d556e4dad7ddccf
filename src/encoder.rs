//! Encoder session
//!
//! [`Encoder`] is the single context object of a stream. It starts out
//! holding a mutable [`EncoderConfig`]; [`Encoder::init_params`] resolves the
//! configuration and allocates the sample window, after which PCM can be fed
//! through the `encode_*` calls. End of stream is handled in `flush.rs`.
//!
//! Encoded bytes are collected in an internal queue and handed to the caller
//! only when they fit the caller's buffer as a whole, so a too small output
//! buffer never receives a truncated write. The bytes stay queued and come
//! out with the next call. While bytes are queued, a call whose buffer cannot
//! take them fails before consuming any input, so the queue never grows past
//! one call's output.

use crate::buffer::SampleBuffer;
use crate::config::EncoderConfig;
use crate::error::{EncoderError, InputDataError, Result};
use crate::frame::{FrameEncoder, SilentFrameEncoder};
use crate::params::{resolve, ResolvedParams};
use crate::pcm_utils::{deinterleave_pcm_interleaved, downmix_to_mono, pcm_to_float};
use crate::resample::Resampler;
use crate::stats::FrameStats;
use crate::tables::SAMPLES_PER_FRAME;
use crate::tags::{NoTags, TagWriter};

/// Lifecycle of an encoder handle
enum State {
    Configuring,
    Ready(Box<Session>),
    Closed,
}

/// Everything that exists between `init_params` and `close`
pub(crate) struct Session {
    pub(crate) params: ResolvedParams,
    pub(crate) buffer: SampleBuffer,
    pub(crate) stats: FrameStats,
    pub(crate) frame_num: u64,
    pub(crate) total_frames: u64,
    pub(crate) pending: Vec<u8>,
    /// Length of the leading tag, where the VBR header placeholder starts
    pub(crate) leading_len: usize,
    pub(crate) encoder_padding: usize,
    pub(crate) trailing_written: bool,
    samples: [Vec<f32>; 2],
    pcm: [Vec<i16>; 2],
}

impl Session {
    fn new(params: ResolvedParams, buffer: SampleBuffer, pending: Vec<u8>, leading_len: usize) -> Self {
        Self {
            stats: FrameStats::new(params.version),
            frame_num: 0,
            total_frames: params.total_frames_estimate,
            pending,
            leading_len,
            encoder_padding: 0,
            trailing_written: false,
            samples: [Vec::new(), Vec::new()],
            pcm: [Vec::new(), Vec::new()],
            params,
            buffer,
        }
    }

    /// Converts 16-bit input to scaled floats in the sample scratch,
    /// downmixing when a stereo input is encoded as mono
    fn load_pcm(&mut self, left: &[i16], right: &[i16]) -> Result<()> {
        let stereo_in = self.params.channels_in == 2;
        if stereo_in && left.len() != right.len() {
            return Err(InputDataError::ChannelLengthMismatch {
                left: left.len(),
                right: right.len(),
            }
            .into());
        }

        let [l, r] = &mut self.samples;
        pcm_to_float(left, self.params.input_scale[0], l);
        if stereo_in {
            pcm_to_float(right, self.params.input_scale[1], r);
            if self.params.channels_out == 1 {
                downmix_to_mono(l, r);
                r.clear();
            }
        } else {
            r.clear();
        }
        Ok(())
    }

    fn load_interleaved(&mut self, pcm: &[i16]) -> Result<()> {
        let mut channels = std::mem::take(&mut self.pcm);
        let result = deinterleave_pcm_interleaved(pcm, self.params.channels_in as usize, &mut channels)
            .map_err(EncoderError::from)
            .and_then(|_| self.load_pcm(&channels[0], &channels[1]));
        self.pcm = channels;
        result
    }

    pub(crate) fn load_silence(&mut self, samples: usize) {
        let channels = self.params.channels_out as usize;
        for (ch, buffer) in self.samples.iter_mut().enumerate() {
            buffer.clear();
            if ch < channels {
                buffer.resize(samples, 0.0);
            }
        }
    }

    /// Pushes the sample scratch through the window, queueing every frame
    pub(crate) fn submit_loaded<F, T>(&mut self, frame_encoder: &mut F, tags: &mut T) -> Result<usize>
    where
        F: FrameEncoder + ?Sized,
        T: TagWriter + ?Sized,
    {
        let Session {
            params,
            buffer,
            stats,
            frame_num,
            total_frames,
            pending,
            samples,
            ..
        } = self;

        buffer.submit([samples[0].as_slice(), samples[1].as_slice()], params, frame_encoder, |frame| {
            pending.try_reserve(frame.bytes.len())?;
            pending.extend_from_slice(&frame.bytes);
            stats.record(frame.bitrate_index, frame.submode);
            tags.record_frame(frame.bytes.len());
            *frame_num += 1;
            *total_frames = (*total_frames).max(*frame_num);
            Ok(())
        })
    }

    /// Refuses new input while earlier bytes still wait for a larger buffer
    fn ensure_room(&self, available: usize) -> Result<()> {
        let needed = self.pending.len();
        if needed > available {
            return Err(EncoderError::BufferTooSmall { needed, available });
        }
        Ok(())
    }

    /// Moves the queued bytes into `out` if they all fit
    pub(crate) fn drain_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let n = self.pending.len();
        if n > out.len() {
            return Err(EncoderError::BufferTooSmall {
                needed: n,
                available: out.len(),
            });
        }
        out[..n].copy_from_slice(&self.pending);
        self.pending.clear();
        Ok(n)
    }

    pub(crate) fn drain_to_vec(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let n = self.pending.len();
        out.try_reserve(n)?;
        out.append(&mut self.pending);
        Ok(n)
    }
}

/// MP3 encoder handle.
///
/// `F` encodes single frames and `T` writes stream tags; the defaults emit
/// silent frames and no tags.
pub struct Encoder<F = SilentFrameEncoder, T = NoTags> {
    config: EncoderConfig,
    frame_encoder: F,
    tags: T,
    resampler: Option<Box<dyn Resampler + Send>>,
    state: State,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self::with_collaborators(config, SilentFrameEncoder::new(), NoTags)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(EncoderConfig::default())
    }
}

impl<F: FrameEncoder, T: TagWriter> Encoder<F, T> {
    pub fn with_collaborators(config: EncoderConfig, frame_encoder: F, tags: T) -> Self {
        Self {
            config,
            frame_encoder,
            tags,
            resampler: None,
            state: State::Configuring,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn frame_encoder(&self) -> &F {
        &self.frame_encoder
    }

    pub fn tag_writer(&self) -> &T {
        &self.tags
    }

    /// Mutable configuration, available until the parameters are resolved
    pub fn config_mut(&mut self) -> Option<&mut EncoderConfig> {
        match self.state {
            State::Configuring => Some(&mut self.config),
            _ => None,
        }
    }

    /// Installs a custom rate converter, used only when the stream resamples
    pub fn set_resampler<R: Resampler + Send + 'static>(&mut self, resampler: R) {
        match &mut self.state {
            State::Ready(session) => session.buffer.set_resampler(Box::new(resampler)),
            _ => self.resampler = Some(Box::new(resampler)),
        }
    }

    /// Resolves the configuration and allocates the stream state.
    ///
    /// On failure the handle stays unconfigured. Calling it again on a
    /// resolved handle does nothing.
    pub fn init_params(&mut self) -> Result<()> {
        match self.state {
            State::Closed => return Err(EncoderError::AlreadyClosed),
            State::Ready(_) => {
                log::debug!("parameters already resolved");
                return Ok(());
            }
            State::Configuring => {}
        }

        let params = resolve(&self.config)?;
        let mut buffer = SampleBuffer::new(&params)?;
        if let Some(resampler) = self.resampler.take() {
            buffer.set_resampler(resampler);
        }

        let mut pending = self.tags.leading_tag(&params)?;
        let leading_len = pending.len();
        if params.write_vbr_tag {
            let placeholder = self.tags.vbr_placeholder(&params)?;
            pending.extend_from_slice(&placeholder);
        }

        for line in params.summary() {
            log::info!("{}", line);
        }
        log::debug!(
            "resolved: {} Hz -> {} Hz, {:?}, {} kbps, frame {} samples",
            params.in_samplerate,
            params.out_samplerate,
            params.mode,
            params.nominal_kbps(),
            params.frame_size
        );

        self.state = State::Ready(Box::new(Session::new(params, buffer, pending, leading_len)));
        Ok(())
    }

    /// Encodes separate left and right channels into `out`.
    ///
    /// For mono input `right` is ignored. Returns the number of bytes
    /// written, which may include bytes queued by an earlier call. If bytes
    /// from an earlier call do not fit `out`, nothing is consumed and the same
    /// input must be passed again with a larger buffer.
    pub fn encode_buffer(&mut self, left: &[i16], right: &[i16], out: &mut [u8]) -> Result<usize> {
        self.session()?.ensure_room(out.len())?;
        self.encode_with(|session| session.load_pcm(left, right))?;
        self.session_mut()?.drain_into(out)
    }

    pub fn encode_buffer_to_vec(&mut self, left: &[i16], right: &[i16], out: &mut Vec<u8>) -> Result<usize> {
        self.encode_with(|session| session.load_pcm(left, right))?;
        self.session_mut()?.drain_to_vec(out)
    }

    /// Encodes interleaved samples, `[l0, r0, l1, r1, ..]` for stereo input
    pub fn encode_buffer_interleaved(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize> {
        self.session()?.ensure_room(out.len())?;
        self.encode_with(|session| session.load_interleaved(pcm))?;
        self.session_mut()?.drain_into(out)
    }

    pub fn encode_buffer_interleaved_to_vec(&mut self, pcm: &[i16], out: &mut Vec<u8>) -> Result<usize> {
        self.encode_with(|session| session.load_interleaved(pcm))?;
        self.session_mut()?.drain_to_vec(out)
    }

    /// Encodes one frame's worth of samples from a fixed two-channel block
    pub fn encode_legacy(&mut self, block: &[[i16; SAMPLES_PER_FRAME]; 2], out: &mut [u8]) -> Result<usize> {
        let n = self.session()?.params.frame_size;
        self.encode_buffer(&block[0][..n], &block[1][..n], out)
    }

    fn encode_with<L>(&mut self, load: L) -> Result<usize>
    where
        L: FnOnce(&mut Session) -> Result<()>,
    {
        let Self {
            state,
            frame_encoder,
            tags,
            ..
        } = self;
        let session = match state {
            State::Ready(session) => session,
            _ => return Err(EncoderError::NotInitialized),
        };
        load(&mut **session)?;
        session.submit_loaded(frame_encoder, tags)
    }

    pub(crate) fn session(&self) -> Result<&Session> {
        match &self.state {
            State::Ready(session) => Ok(&**session),
            _ => Err(EncoderError::NotInitialized),
        }
    }

    pub(crate) fn session_mut(&mut self) -> Result<&mut Session> {
        match &mut self.state {
            State::Ready(session) => Ok(&mut **session),
            _ => Err(EncoderError::NotInitialized),
        }
    }

    /// Splits the handle into its stream state and collaborators
    pub(crate) fn parts_mut(&mut self) -> Result<(&mut Session, &mut F, &mut T)> {
        match &mut self.state {
            State::Ready(session) => Ok((&mut **session, &mut self.frame_encoder, &mut self.tags)),
            _ => Err(EncoderError::NotInitialized),
        }
    }

    /// Releases the stream state. The handle cannot be used afterwards.
    pub fn close(&mut self) -> Result<()> {
        if let State::Closed = self.state {
            return Err(EncoderError::AlreadyClosed);
        }
        if let State::Ready(session) = &self.state {
            log::debug!(
                "closing after {} frames, {} bytes never collected",
                session.frame_num,
                session.pending.len()
            );
        }
        self.state = State::Closed;
        self.resampler = None;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    pub fn params(&self) -> Option<&ResolvedParams> {
        self.session().ok().map(|s| &s.params)
    }

    pub fn stats(&self) -> Option<&FrameStats> {
        self.session().ok().map(|s| &s.stats)
    }

    /// Frames produced so far
    pub fn frame_num(&self) -> Option<u64> {
        self.session().ok().map(|s| s.frame_num)
    }

    /// Estimated frame count of the whole stream, never below `frame_num`
    pub fn total_frames(&self) -> Option<u64> {
        self.session().ok().map(|s| s.total_frames)
    }

    pub fn frame_size(&self) -> Option<usize> {
        self.session().ok().map(|s| s.params.frame_size)
    }

    pub fn encoder_delay(&self) -> Option<usize> {
        self.session().ok().map(|s| s.params.encoder_delay)
    }

    /// Submitted samples not yet covered by a completed frame
    pub fn samples_owed(&self) -> Option<i64> {
        self.session().ok().map(|s| s.buffer.samples_owed())
    }

    /// Zero samples appended by the flush beyond the real data
    pub fn encoder_padding(&self) -> Option<usize> {
        self.session().ok().map(|s| s.encoder_padding)
    }

    /// Bytes produced but not yet handed out
    pub fn pending_bytes(&self) -> Option<usize> {
        self.session().ok().map(|s| s.pending.len())
    }

    /// Logs the resolved configuration summary
    pub fn print_config(&self) -> Result<()> {
        let session = self.session()?;
        for line in session.params.summary() {
            log::info!("{}", line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoMode;

    fn ready() -> Encoder {
        let mut encoder = Encoder::default();
        encoder.init_params().unwrap();
        encoder
    }

    #[test]
    fn test_calls_before_init_fail() {
        let mut encoder = Encoder::default();
        let mut out = [0u8; 16];
        assert!(matches!(
            encoder.encode_buffer(&[0; 4], &[0; 4], &mut out),
            Err(EncoderError::NotInitialized)
        ));
        assert!(encoder.params().is_none());
        assert!(encoder.config_mut().is_some());
    }

    #[test]
    fn test_config_is_frozen_after_init() {
        let mut encoder = ready();
        assert!(encoder.config_mut().is_none());
        assert!(encoder.is_initialized());
        assert!(encoder.init_params().is_ok());
    }

    #[test]
    fn test_failed_init_leaves_handle_unconfigured() {
        let mut encoder = Encoder::default();
        encoder.config_mut().unwrap().set_quality(0).unwrap();
        assert!(matches!(
            encoder.init_params(),
            Err(EncoderError::NotImplemented { quality: 0 })
        ));
        assert!(!encoder.is_initialized());
        assert!(encoder.config_mut().is_some());
    }

    #[test]
    fn test_owed_tracks_submitted_samples() {
        let mut encoder = ready();
        let block = vec![100i16; 1000];
        let mut out = vec![0u8; 8192];
        for _ in 0..5 {
            encoder.encode_buffer(&block, &block, &mut out).unwrap();
        }
        let frames = encoder.frame_num().unwrap() as i64;
        assert_eq!(frames, 4);
        assert_eq!(encoder.samples_owed().unwrap(), 864 + 5000 - 1152 * frames);
    }

    #[test]
    fn test_small_output_buffer_keeps_bytes_queued() {
        let mut encoder = ready();
        let block = vec![0i16; 1152 * 2];
        let mut tiny = [0u8; 8];
        let err = encoder.encode_buffer(&block, &block, &mut tiny).unwrap_err();
        assert!(matches!(err, EncoderError::BufferTooSmall { needed: 418, available: 8 }));
        assert_eq!(tiny, [0u8; 8]);
        assert_eq!(encoder.pending_bytes(), Some(418));

        let mut out = vec![0u8; 1024];
        assert_eq!(encoder.encode_buffer(&[], &[], &mut out).unwrap(), 418);
        assert_eq!(encoder.pending_bytes(), Some(0));
    }

    #[test]
    fn test_queued_bytes_block_new_input() {
        let mut encoder = ready();
        let block = vec![0i16; 1152 * 2];
        let mut tiny = [0u8; 8];
        assert!(encoder.encode_buffer(&block, &block, &mut tiny).is_err());
        let frames = encoder.frame_num();
        let owed = encoder.samples_owed();

        // The same small buffer again: the input is refused, not queued
        let err = encoder.encode_buffer(&block, &block, &mut tiny).unwrap_err();
        assert!(matches!(err, EncoderError::BufferTooSmall { needed: 418, available: 8 }));
        assert_eq!(encoder.pending_bytes(), Some(418));
        assert_eq!(encoder.frame_num(), frames);
        assert_eq!(encoder.samples_owed(), owed);

        let mut out = vec![0u8; 4096];
        let n = encoder.encode_buffer(&block, &block, &mut out).unwrap();
        assert!(n > 418);
        assert_eq!(encoder.pending_bytes(), Some(0));
    }

    /// Encodes silent frames until `remaining` runs out, then fails
    struct FailAfter {
        inner: SilentFrameEncoder,
        remaining: usize,
    }

    impl FrameEncoder for FailAfter {
        fn encode_frame(
            &mut self,
            window: &crate::frame::FrameWindow<'_>,
            params: &ResolvedParams,
        ) -> crate::error::EncodingResult<crate::frame::EncodedFrame> {
            if self.remaining == 0 {
                return Err(crate::error::EncodingError::FrameEncoder("out of frames".into()));
            }
            self.remaining -= 1;
            self.inner.encode_frame(window, params)
        }

        fn flush_bits(&mut self, params: &ResolvedParams) -> crate::error::EncodingResult<Vec<u8>> {
            self.inner.flush_bits(params)
        }
    }

    #[test]
    fn test_stats_match_queued_frames_after_failure() {
        let frame_encoder = FailAfter {
            inner: SilentFrameEncoder::new(),
            remaining: 2,
        };
        let mut encoder = Encoder::with_collaborators(EncoderConfig::default(), frame_encoder, NoTags);
        encoder.init_params().unwrap();

        let block = vec![0i16; 1152 * 4];
        let mut out = Vec::new();
        assert!(matches!(
            encoder.encode_buffer_to_vec(&block, &block, &mut out),
            Err(EncoderError::Encoding(_))
        ));
        assert_eq!(encoder.frame_num(), Some(2));
        assert_eq!(encoder.stats().unwrap().total_frames(), 2);
        // Both frames carry the padding slot at 128 kbps, 44.1 kHz
        assert_eq!(encoder.pending_bytes(), Some(2 * 418));
    }

    #[test]
    fn test_interleaved_matches_planar() {
        let left: Vec<i16> = (0..3000).map(|i| (i % 200) as i16).collect();
        let right: Vec<i16> = (0..3000).map(|i| -((i % 300) as i16)).collect();
        let interleaved: Vec<i16> = left.iter().zip(&right).flat_map(|(&l, &r)| [l, r]).collect();

        let mut planar = ready();
        let mut a = Vec::new();
        planar.encode_buffer_to_vec(&left, &right, &mut a).unwrap();

        let mut packed = ready();
        let mut b = Vec::new();
        packed.encode_buffer_interleaved_to_vec(&interleaved, &mut b).unwrap();

        assert_eq!(a, b);
        assert_eq!(planar.samples_owed(), packed.samples_owed());
    }

    #[test]
    fn test_ragged_interleaved_input_is_rejected() {
        let mut encoder = ready();
        let mut out = Vec::new();
        let err = encoder
            .encode_buffer_interleaved_to_vec(&[1, 2, 3], &mut out)
            .unwrap_err();
        assert!(matches!(err, EncoderError::InputData(InputDataError::InvalidLength { .. })));
        assert_eq!(err.code(), -5);
    }

    #[test]
    fn test_legacy_block_uses_frame_size() {
        let mut encoder = ready();
        let block = [[0i16; SAMPLES_PER_FRAME]; 2];
        let mut out = vec![0u8; 4096];
        encoder.encode_legacy(&block, &mut out).unwrap();
        assert_eq!(encoder.samples_owed(), Some(864 + 1152));
    }

    #[test]
    fn test_stereo_input_encoded_as_mono() {
        let mut config = EncoderConfig::default();
        config.set_mode(Some(StereoMode::Mono)).unwrap();
        let mut encoder = Encoder::new(config);
        encoder.init_params().unwrap();
        assert_eq!(encoder.params().unwrap().channels_out, 1);

        let mut out = Vec::new();
        encoder
            .encode_buffer_to_vec(&[10; 3000], &[20; 3000], &mut out)
            .unwrap();
        assert_eq!(encoder.frame_num(), Some(2));
    }

    #[test]
    fn test_close_twice() {
        let mut encoder = ready();
        assert!(encoder.close().is_ok());
        assert!(encoder.is_closed());
        assert!(matches!(encoder.close(), Err(EncoderError::AlreadyClosed)));
        assert!(matches!(encoder.init_params(), Err(EncoderError::AlreadyClosed)));
        let mut out = [0u8; 4];
        assert!(matches!(
            encoder.encode_buffer(&[], &[], &mut out),
            Err(EncoderError::NotInitialized)
        ));
    }
}
