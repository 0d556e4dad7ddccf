//! Configuration management for the encoder control layer
//!
//! [`EncoderConfig`] holds the user-level intent: rates, channel layout,
//! bitrate or compression ratio, rate-control mode, quality and filter
//! cutoffs. Every `set_*` method validates its argument before touching the
//! struct, so a rejected call leaves the configuration exactly as it was.
//! The builder-style methods without the `set_` prefix wrap the same setters
//! and return the same errors.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Container, Emphasis, StereoMode, VbrMode};

/// Largest free-format bitrate accepted, in kbps
pub const MAX_FREE_FORMAT_KBPS: u32 = 640;

/// Compression ratio applied when neither bitrate nor ratio is set
pub const DEFAULT_COMPRESSION_RATIO: f64 = 11.025;

/// User-level encoder configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderConfig {
    /// Input channel count (1 or 2)
    pub num_channels: u8,
    /// Input sample rate in Hz
    pub in_samplerate: u32,
    /// Output sample rate in Hz, 0 to derive it
    pub out_samplerate: u32,
    /// Total number of input samples per channel, if known
    pub num_samples: u64,
    /// Global input scale
    pub scale: f32,
    /// Additional scale for the left channel
    pub scale_left: f32,
    /// Additional scale for the right channel
    pub scale_right: f32,
    /// Stereo mode, `None` to let resolution pick one
    pub mode: Option<StereoMode>,
    /// Force mid/side coding in joint stereo
    pub force_ms: bool,
    /// Target CBR bitrate in kbps, 0 if unset
    pub brate: u32,
    /// Target compression ratio, 0 if unset
    pub compression_ratio: f64,
    /// Rate control mode
    pub vbr: VbrMode,
    /// VBR quality, 0 (best) to 9
    pub vbr_q: u8,
    /// ABR mean bitrate in kbps
    pub vbr_mean_bitrate_kbps: u32,
    /// VBR minimum bitrate in kbps, 0 for the table minimum
    pub vbr_min_bitrate_kbps: u32,
    /// VBR maximum bitrate in kbps, 0 for the table maximum
    pub vbr_max_bitrate_kbps: u32,
    /// Lowpass cutoff in Hz, 0 for automatic
    pub lowpass_freq: u32,
    /// Lowpass transition width in Hz
    pub lowpass_width: Option<u32>,
    /// Highpass cutoff in Hz, 0 for none
    pub highpass_freq: u32,
    /// Highpass transition width in Hz
    pub highpass_width: Option<u32>,
    /// Algorithm quality, 0 (best) to 9
    pub quality: u8,
    /// Write free-format frames
    pub free_format: bool,
    /// Destination container
    pub container: Container,
    /// Protect frames with a CRC
    pub error_protection: bool,
    /// Write a VBR header frame
    pub write_vbr_tag: bool,
    /// Copyright header bit
    pub copyright: bool,
    /// Original header bit
    pub original: bool,
    /// Pre-emphasis header field
    pub emphasis: Emphasis,
    /// Frame analysis mode
    pub analysis: bool,
    /// Whether the output is seekable and can receive the VBR header rewrite
    pub output_addressable: bool,
    /// Experimental psychoacoustic tuning
    pub exp_nspsytune: bool,
    /// Experimental quantizer switch
    pub experimental_y: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            num_channels: 2,
            in_samplerate: 44100,
            out_samplerate: 0,
            num_samples: u32::MAX as u64,
            scale: 1.0,
            scale_left: 1.0,
            scale_right: 1.0,
            mode: None,
            force_ms: false,
            brate: 0,
            compression_ratio: 0.0,
            vbr: VbrMode::Off,
            vbr_q: 4,
            vbr_mean_bitrate_kbps: 128,
            vbr_min_bitrate_kbps: 0,
            vbr_max_bitrate_kbps: 0,
            lowpass_freq: 0,
            lowpass_width: None,
            highpass_freq: 0,
            highpass_width: None,
            quality: 5,
            free_format: false,
            container: Container::Mp3,
            error_protection: false,
            write_vbr_tag: true,
            copyright: false,
            original: true,
            emphasis: Emphasis::None,
            analysis: false,
            output_addressable: true,
            exp_nspsytune: false,
            experimental_y: false,
        }
    }
}

impl EncoderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_num_channels(&mut self, channels: u8) -> ConfigResult<()> {
        if !(1..=2).contains(&channels) {
            return Err(ConfigError::InvalidChannels(channels));
        }
        self.num_channels = channels;
        Ok(())
    }

    pub fn set_in_samplerate(&mut self, rate: u32) -> ConfigResult<()> {
        if rate == 0 {
            return Err(ConfigError::InvalidSampleRate(rate));
        }
        self.in_samplerate = rate;
        Ok(())
    }

    /// Output rate, 0 to derive it. Legality is checked at resolution.
    pub fn set_out_samplerate(&mut self, rate: u32) -> ConfigResult<()> {
        self.out_samplerate = rate;
        Ok(())
    }

    pub fn set_num_samples(&mut self, samples: u64) -> ConfigResult<()> {
        self.num_samples = samples;
        Ok(())
    }

    pub fn set_scale(&mut self, scale: f32) -> ConfigResult<()> {
        self.scale = check_scale(scale)?;
        Ok(())
    }

    pub fn set_scale_left(&mut self, scale: f32) -> ConfigResult<()> {
        self.scale_left = check_scale(scale)?;
        Ok(())
    }

    pub fn set_scale_right(&mut self, scale: f32) -> ConfigResult<()> {
        self.scale_right = check_scale(scale)?;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Option<StereoMode>) -> ConfigResult<()> {
        self.mode = mode;
        Ok(())
    }

    pub fn set_force_ms(&mut self, force_ms: bool) -> ConfigResult<()> {
        self.force_ms = force_ms;
        Ok(())
    }

    pub fn set_brate(&mut self, kbps: u32) -> ConfigResult<()> {
        if kbps > MAX_FREE_FORMAT_KBPS {
            return Err(ConfigError::InvalidBitrate(kbps));
        }
        self.brate = kbps;
        Ok(())
    }

    pub fn set_compression_ratio(&mut self, ratio: f64) -> ConfigResult<()> {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(ConfigError::InvalidCompressionRatio(ratio));
        }
        self.compression_ratio = ratio;
        Ok(())
    }

    pub fn set_vbr(&mut self, vbr: VbrMode) -> ConfigResult<()> {
        self.vbr = vbr;
        Ok(())
    }

    pub fn set_vbr_q(&mut self, q: u8) -> ConfigResult<()> {
        if q > 9 {
            return Err(ConfigError::InvalidVbrQuality(q));
        }
        self.vbr_q = q;
        Ok(())
    }

    pub fn set_vbr_mean_bitrate_kbps(&mut self, kbps: u32) -> ConfigResult<()> {
        if kbps > MAX_FREE_FORMAT_KBPS {
            return Err(ConfigError::InvalidBitrate(kbps));
        }
        self.vbr_mean_bitrate_kbps = kbps;
        Ok(())
    }

    pub fn set_vbr_min_bitrate_kbps(&mut self, kbps: u32) -> ConfigResult<()> {
        if kbps > MAX_FREE_FORMAT_KBPS {
            return Err(ConfigError::InvalidBitrate(kbps));
        }
        self.vbr_min_bitrate_kbps = kbps;
        Ok(())
    }

    pub fn set_vbr_max_bitrate_kbps(&mut self, kbps: u32) -> ConfigResult<()> {
        if kbps > MAX_FREE_FORMAT_KBPS {
            return Err(ConfigError::InvalidBitrate(kbps));
        }
        self.vbr_max_bitrate_kbps = kbps;
        Ok(())
    }

    pub fn set_lowpass_freq(&mut self, hz: u32) -> ConfigResult<()> {
        self.lowpass_freq = hz;
        Ok(())
    }

    pub fn set_lowpass_width(&mut self, hz: Option<u32>) -> ConfigResult<()> {
        self.lowpass_width = hz;
        Ok(())
    }

    pub fn set_highpass_freq(&mut self, hz: u32) -> ConfigResult<()> {
        self.highpass_freq = hz;
        Ok(())
    }

    pub fn set_highpass_width(&mut self, hz: Option<u32>) -> ConfigResult<()> {
        self.highpass_width = hz;
        Ok(())
    }

    pub fn set_quality(&mut self, quality: u8) -> ConfigResult<()> {
        if quality > 9 {
            return Err(ConfigError::InvalidQuality(quality));
        }
        self.quality = quality;
        Ok(())
    }

    pub fn set_free_format(&mut self, free_format: bool) -> ConfigResult<()> {
        self.free_format = free_format;
        Ok(())
    }

    pub fn set_container(&mut self, container: Container) -> ConfigResult<()> {
        self.container = container;
        Ok(())
    }

    pub fn set_error_protection(&mut self, enabled: bool) -> ConfigResult<()> {
        self.error_protection = enabled;
        Ok(())
    }

    pub fn set_write_vbr_tag(&mut self, enabled: bool) -> ConfigResult<()> {
        self.write_vbr_tag = enabled;
        Ok(())
    }

    pub fn set_copyright(&mut self, copyright: bool) -> ConfigResult<()> {
        self.copyright = copyright;
        Ok(())
    }

    pub fn set_original(&mut self, original: bool) -> ConfigResult<()> {
        self.original = original;
        Ok(())
    }

    pub fn set_emphasis(&mut self, emphasis: Emphasis) -> ConfigResult<()> {
        self.emphasis = emphasis;
        Ok(())
    }

    pub fn set_analysis(&mut self, analysis: bool) -> ConfigResult<()> {
        self.analysis = analysis;
        Ok(())
    }

    pub fn set_output_addressable(&mut self, addressable: bool) -> ConfigResult<()> {
        self.output_addressable = addressable;
        Ok(())
    }

    pub fn set_exp_nspsytune(&mut self, enabled: bool) -> ConfigResult<()> {
        self.exp_nspsytune = enabled;
        Ok(())
    }

    pub fn set_experimental_y(&mut self, enabled: bool) -> ConfigResult<()> {
        self.experimental_y = enabled;
        Ok(())
    }

    /// Set input channels (builder style)
    pub fn channels(mut self, channels: u8) -> ConfigResult<Self> {
        self.set_num_channels(channels)?;
        Ok(self)
    }

    /// Set input sample rate (builder style)
    pub fn sample_rate(mut self, rate: u32) -> ConfigResult<Self> {
        self.set_in_samplerate(rate)?;
        Ok(self)
    }

    /// Set CBR bitrate (builder style)
    pub fn bitrate(mut self, kbps: u32) -> ConfigResult<Self> {
        self.set_brate(kbps)?;
        Ok(self)
    }

    /// Set rate control mode (builder style)
    pub fn vbr_mode(mut self, vbr: VbrMode) -> Self {
        self.vbr = vbr;
        self
    }

    /// Set stereo mode (builder style)
    pub fn stereo_mode(mut self, mode: StereoMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set algorithm quality (builder style)
    pub fn with_quality(mut self, quality: u8) -> ConfigResult<Self> {
        self.set_quality(quality)?;
        Ok(self)
    }

    /// Re-check every field with a setter-level constraint.
    ///
    /// Public fields can be written directly, so resolution calls this before
    /// it reads anything.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=2).contains(&self.num_channels) {
            return Err(ConfigError::InvalidChannels(self.num_channels));
        }
        if self.in_samplerate == 0 {
            return Err(ConfigError::InvalidSampleRate(self.in_samplerate));
        }
        if self.quality > 9 {
            return Err(ConfigError::InvalidQuality(self.quality));
        }
        if self.vbr_q > 9 {
            return Err(ConfigError::InvalidVbrQuality(self.vbr_q));
        }
        for kbps in [
            self.brate,
            self.vbr_mean_bitrate_kbps,
            self.vbr_min_bitrate_kbps,
            self.vbr_max_bitrate_kbps,
        ] {
            if kbps > MAX_FREE_FORMAT_KBPS {
                return Err(ConfigError::InvalidBitrate(kbps));
            }
        }
        if !self.compression_ratio.is_finite() || self.compression_ratio < 0.0 {
            return Err(ConfigError::InvalidCompressionRatio(self.compression_ratio));
        }
        for scale in [self.scale, self.scale_left, self.scale_right] {
            check_scale(scale)?;
        }
        Ok(())
    }
}

fn check_scale(scale: f32) -> ConfigResult<f32> {
    if scale.is_finite() {
        Ok(scale)
    } else {
        Err(ConfigError::InvalidScale(scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_config() {
        let config = EncoderConfig::default();
        assert_eq!(config.num_channels, 2);
        assert_eq!(config.in_samplerate, 44100);
        assert_eq!(config.quality, 5);
        assert_eq!(config.vbr_q, 4);
        assert_eq!(config.vbr_mean_bitrate_kbps, 128);
        assert!(config.mode.is_none());
        assert!(config.write_vbr_tag);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejected_setter_leaves_config_untouched() {
        let mut config = EncoderConfig::default();
        let before = config.clone();

        assert_eq!(config.set_num_channels(3), Err(ConfigError::InvalidChannels(3)));
        assert_eq!(config.set_quality(10), Err(ConfigError::InvalidQuality(10)));
        assert!(config.set_compression_ratio(f64::NAN).is_err());
        assert!(config.set_scale(f32::INFINITY).is_err());
        assert!(config.set_brate(1000).is_err());

        assert_eq!(config, before);
    }

    #[test]
    fn test_builder_chain() {
        let config = EncoderConfig::new()
            .channels(1)
            .and_then(|c| c.sample_rate(22050))
            .and_then(|c| c.bitrate(64))
            .unwrap()
            .vbr_mode(VbrMode::Abr)
            .stereo_mode(StereoMode::Mono);

        assert_eq!(config.num_channels, 1);
        assert_eq!(config.in_samplerate, 22050);
        assert_eq!(config.brate, 64);
        assert_eq!(config.vbr, VbrMode::Abr);
        assert_eq!(config.mode, Some(StereoMode::Mono));
    }

    #[test]
    fn test_validate_catches_direct_field_writes() {
        let mut config = EncoderConfig::default();
        config.quality = 42;
        assert_eq!(config.validate(), Err(ConfigError::InvalidQuality(42)));
    }

    prop_compose! {
        fn valid_channels()(ch in 1u8..=2) -> u8 { ch }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 50,
            ..ProptestConfig::default()
        })]

        #[test]
        fn test_quality_setter_accepts_exactly_0_to_9(q in 0u8..=255) {
            let mut config = EncoderConfig::default();
            let result = config.set_quality(q);
            prop_assert_eq!(result.is_ok(), q <= 9);
            prop_assert_eq!(config.quality, if q <= 9 { q } else { 5 });
        }

        #[test]
        fn test_valid_channels_accepted(ch in valid_channels()) {
            let mut config = EncoderConfig::default();
            prop_assert!(config.set_num_channels(ch).is_ok());
            prop_assert_eq!(config.num_channels, ch);
        }
    }
}
