//! Error types for the encoder control layer
//!
//! Every fallible operation in the crate returns one of the enums below.
//! Configuration setters return [`ConfigError`] directly; everything that
//! runs after parameter resolution surfaces an [`EncoderError`].

use thiserror::Error;

/// Main error type for the encoder control layer
#[derive(Debug, Error)]
pub enum EncoderError {
    /// A configuration value was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A sample rate or bitrate could not be mapped onto the MPEG tables
    #[error("Unsupported rate: {0}")]
    UnsupportedRate(#[from] RateError),

    /// The requested quality level has no implementation
    #[error("Quality level {quality} is not implemented")]
    NotImplemented { quality: u8 },

    /// The caller-supplied output buffer cannot hold the produced bytes
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Samples were submitted before parameters were resolved, or after close
    #[error("Encoder parameters are not initialised")]
    NotInitialized,

    /// `close` was called on an encoder that is already closed
    #[error("Encoder is already closed")]
    AlreadyClosed,

    /// Appending to the analysis window would exceed its capacity
    #[error("Sample window overflow: {requested} samples requested, capacity {capacity}")]
    Overflow { requested: usize, capacity: usize },

    /// Window or output storage could not be allocated
    #[error("Memory allocation error")]
    AllocationFailure,

    /// PCM input did not have the expected shape
    #[error("Input data error: {0}")]
    InputData(#[from] InputDataError),

    /// The frame encoder, bitstream or tag writer failed
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

impl EncoderError {
    /// Legacy integer status code for callers that still speak the C API.
    ///
    /// Buffer-size failures map to `-1`, allocation failures to `-2` and
    /// lifecycle misuse to `-3`, the values the original library returned.
    pub fn code(&self) -> i32 {
        match self {
            EncoderError::BufferTooSmall { .. } => -1,
            EncoderError::AllocationFailure => -2,
            EncoderError::NotInitialized | EncoderError::AlreadyClosed => -3,
            EncoderError::Config(_) | EncoderError::UnsupportedRate(_) => -1,
            EncoderError::NotImplemented { .. } => -2,
            EncoderError::Overflow { .. } => -4,
            EncoderError::InputData(_) => -5,
            EncoderError::Encoding(_) => -6,
        }
    }
}

impl From<std::collections::TryReserveError> for EncoderError {
    fn from(_: std::collections::TryReserveError) -> Self {
        EncoderError::AllocationFailure
    }
}

/// Configuration validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Channel count outside 1..=2
    #[error("Invalid channel count: {0}")]
    InvalidChannels(u8),

    /// Input sample rate of zero
    #[error("Invalid input sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// Bitrate above the largest free-format rate
    #[error("Invalid bitrate: {0} kbps")]
    InvalidBitrate(u32),

    /// Quality outside 0..=9
    #[error("Invalid quality level: {0}")]
    InvalidQuality(u8),

    /// VBR quality outside 0..=9
    #[error("Invalid VBR quality level: {0}")]
    InvalidVbrQuality(u8),

    /// Compression ratio that is negative or not finite
    #[error("Invalid compression ratio: {0}")]
    InvalidCompressionRatio(f64),

    /// Scale factor that is not finite
    #[error("Invalid scale factor: {0}")]
    InvalidScale(f32),

    /// Raw stereo mode code with no matching mode
    #[error("Unknown stereo mode code: {0}")]
    UnknownStereoMode(i32),

    /// Raw VBR mode code with no matching mode
    #[error("Unknown VBR mode code: {0}")]
    UnknownVbrMode(i32),

    /// Raw emphasis code with no matching emphasis
    #[error("Unknown emphasis code: {0}")]
    UnknownEmphasis(i32),

    /// VBR minimum bitrate above the VBR maximum bitrate
    #[error("VBR minimum bitrate {min} kbps exceeds maximum {max} kbps")]
    VbrRangeInverted { min: u32, max: u32 },
}

/// Rate mapping failures raised during parameter resolution
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RateError {
    /// Output sample rate not in any MPEG table
    #[error("sample rate {0} Hz is not a legal MPEG output rate")]
    SampleRate(u32),

    /// Bitrate not in the table of the resolved MPEG version
    #[error("bitrate {kbps} kbps is not legal at {sample_rate} Hz")]
    Bitrate { kbps: u32, sample_rate: u32 },
}

/// Input data validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputDataError {
    /// Left and right channel blocks have different lengths
    #[error("Channel length mismatch: left has {left} samples, right has {right}")]
    ChannelLengthMismatch { left: usize, right: usize },

    /// Interleaved input length is not a multiple of the channel count
    #[error("Invalid PCM data length: expected a multiple of {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Errors raised by the per-frame collaborators
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodingError {
    /// The frame encoder rejected a window
    #[error("Frame encoder error: {0}")]
    FrameEncoder(String),

    /// Bitstream writing error
    #[error("Bitstream writing error: {0}")]
    Bitstream(String),

    /// The tag writer failed
    #[error("Tag writer error: {0}")]
    Tag(String),

    /// Invalid data length for processing
    #[error("Invalid data length: expected {expected}, got {actual}")]
    InvalidDataLength { expected: usize, actual: usize },
}

/// Specialized result types for different modules
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type EncodingResult<T> = std::result::Result<T, EncodingError>;
pub type Result<T> = std::result::Result<T, EncoderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors_share_legacy_code() {
        assert_eq!(EncoderError::NotInitialized.code(), -3);
        assert_eq!(EncoderError::AlreadyClosed.code(), -3);
    }

    #[test]
    fn test_buffer_too_small_message() {
        let err = EncoderError::BufferTooSmall { needed: 417, available: 100 };
        assert_eq!(err.code(), -1);
        assert_eq!(
            err.to_string(),
            "Output buffer too small: need 417 bytes, have 100"
        );
    }

    #[test]
    fn test_nested_errors_convert() {
        let err: EncoderError = RateError::SampleRate(96000).into();
        assert!(matches!(err, EncoderError::UnsupportedRate(RateError::SampleRate(96000))));

        let err: EncoderError = ConfigError::InvalidQuality(12).into();
        assert!(err.to_string().contains("Invalid quality level: 12"));
    }
}
