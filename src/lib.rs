//! # lame-control
//!
//! Control layer of an MPEG-1/2/2.5 Layer III encoder.
//!
//! The crate resolves user level settings (bitrate or compression ratio,
//! VBR mode, quality, filter cutoffs) into a consistent set of MPEG-legal
//! encoding parameters, and turns PCM blocks of any length into fixed-size,
//! look-ahead compensated analysis windows for a per-frame encoder.
//!
//! Psychoacoustics, quantization and Huffman coding are plugged in through
//! [`FrameEncoder`]; stream tags through [`TagWriter`]. The built-in
//! [`SilentFrameEncoder`] writes valid frames with empty main data.
//!
//! ```no_run
//! use lame_control::{Encoder, EncoderConfig};
//!
//! let config = EncoderConfig::default().bitrate(192)?;
//! let mut encoder = Encoder::new(config);
//! encoder.init_params()?;
//!
//! let mut mp3 = Vec::new();
//! let silence = vec![0i16; 44100];
//! encoder.encode_buffer_to_vec(&silence, &silence, &mut mp3)?;
//! encoder.flush_to_vec(&mut mp3)?;
//! encoder.close()?;
//! # Ok::<(), lame_control::EncoderError>(())
//! ```

pub mod bitstream;
pub mod buffer;
pub mod config;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod encoder;
pub mod error;
pub mod filter;
mod flush;
pub mod frame;
pub mod params;
pub mod pcm_utils;
pub mod resample;
pub mod stats;
pub mod tables;
pub mod tags;
pub mod types;

pub use buffer::SampleBuffer;
pub use config::EncoderConfig;
pub use encoder::Encoder;
pub use error::{ConfigError, EncoderError, EncodingError, InputDataError, RateError, Result};
pub use filter::{BandAmplitudes, FilterEdge, FilterResponse};
pub use frame::{EncodedFrame, FrameEncoder, FrameHeader, FrameWindow, SilentFrameEncoder};
pub use params::{resolve, BitrateSelection, FeatureFlags, ResolvedParams};
pub use resample::{LinearResampler, Resampler};
pub use stats::FrameStats;
pub use tags::{NoTags, TagWriter};
pub use types::{
    AmpMode, BitrateIndex, Container, Emphasis, MpegVersion, StereoMode, StereoSubmode, VbrMode,
};
