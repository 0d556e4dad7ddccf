//! Parameter resolution
//!
//! [`resolve`] turns an [`EncoderConfig`] into a [`ResolvedParams`]: output
//! sample rate, MPEG version, bitrate table index or VBR range, frame
//! geometry, stereo mode, polyphase filter response and the quality-driven
//! feature flags. The decisions depend on each other (bitrate, sample rate,
//! compression ratio, stereo mode and lowpass band all feed into one
//! another), so they are applied in a fixed order and every intermediate
//! value is a local. The input configuration is never modified and nothing
//! is returned unless every step succeeds.

use crate::config::{EncoderConfig, DEFAULT_COMPRESSION_RATIO, MAX_FREE_FORMAT_KBPS};
use crate::error::{ConfigError, EncoderError, RateError, Result};
use crate::filter::FilterResponse;
use crate::tables::{
    self, ScalefactorBands, ABR_MASKING_LOWER, ATH_VBR_LOWER, BLKSIZE, ENCDELAY, FFTOFFSET,
    GRANULE_SIZE, SCALEFACTOR_BANDS, VBR_COMPRESSION_RATIO,
};
use crate::types::{AmpMode, BitrateIndex, Container, Emphasis, MpegVersion, StereoMode, VbrMode};

/// Ratio above which a CBR or ABR target forces a lower output sample rate
const MAX_RATIO_BEFORE_DOWNSAMPLE: f64 = 13.0;

/// Ratio the downsampled output rate aims for
const DOWNSAMPLE_TARGET_RATIO: f64 = 10.0;

/// Below this ratio an automatic stereo mode becomes plain stereo
const STEREO_RATIO_THRESHOLD: f64 = 9.0;

/// Highest automatic lowpass band while resampling
const RESAMPLE_LOWPASS_BAND: f64 = 29.0;

/// Frame header length in bytes
pub const HEADER_BYTES: usize = 4;

/// CRC length in bytes
pub const CRC_BYTES: usize = 2;

/// Bitrate decision for the stream
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub enum BitrateSelection {
    /// Constant bitrate at a table index
    Cbr { index: BitrateIndex, kbps: u32 },
    /// Free format at an arbitrary bitrate
    FreeFormat { kbps: u32 },
    /// Variable bitrate between two table indices
    Vbr {
        min: BitrateIndex,
        max: BitrateIndex,
        min_kbps: u32,
        max_kbps: u32,
        mean_kbps: u32,
    },
}

/// Algorithm switches selected by the quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub struct FeatureFlags {
    /// 0 = polyphase band weighting, 1 = FIR
    pub filter_type: u8,
    pub psymodel: bool,
    pub quantization: bool,
    pub noise_shaping: u8,
    pub noise_shaping_stop: u8,
    pub huffman_search: u8,
}

const fn features(
    psymodel: bool,
    quantization: bool,
    noise_shaping: u8,
    huffman_search: u8,
) -> FeatureFlags {
    FeatureFlags {
        filter_type: 0,
        psymodel,
        quantization,
        noise_shaping,
        noise_shaping_stop: 0,
        huffman_search,
    }
}

/// Effective quality and features per requested quality level.
///
/// Levels 8, 6 and 4 are aliases of 7, 5 and 3. Level 0 has no
/// implementation.
const QUALITY_TABLE: [Option<(u8, FeatureFlags)>; 10] = [
    None,
    Some((1, features(true, true, 2, 1))),
    Some((2, features(true, true, 1, 1))),
    Some((3, features(true, true, 1, 1))),
    Some((3, features(true, true, 1, 1))),
    Some((5, features(true, false, 1, 0))),
    Some((5, features(true, false, 1, 0))),
    Some((7, features(true, false, 0, 0))),
    Some((7, features(true, false, 0, 0))),
    Some((9, features(false, false, 0, 0))),
];

/// Looks up the effective quality level and feature flags
pub fn quality_features(quality: u8) -> Result<(u8, FeatureFlags)> {
    QUALITY_TABLE
        .get(quality as usize)
        .copied()
        .flatten()
        .ok_or(EncoderError::NotImplemented { quality })
}

/// Fully resolved, immutable encoding parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub struct ResolvedParams {
    pub channels_in: u8,
    pub channels_out: u8,
    pub mode: StereoMode,
    pub force_ms: bool,
    pub version: MpegVersion,
    /// Sample rate index within the version (0..=2)
    pub samplerate_index: u8,
    pub in_samplerate: u32,
    pub out_samplerate: u32,
    pub vbr: VbrMode,
    pub vbr_q: u8,
    pub bitrate: BitrateSelection,
    pub compression_ratio: f64,
    pub granules: usize,
    pub frame_size: usize,
    pub encoder_delay: usize,
    pub resample_ratio: f64,
    pub filter: FilterResponse,
    /// Index into [`SCALEFACTOR_BANDS`]
    pub scalefactor_table: usize,
    /// Header plus side info plus optional CRC, in bytes
    pub sideinfo_len: usize,
    pub features: FeatureFlags,
    /// Quality after VBR capping and alias folding
    pub quality: u8,
    pub masking_lower: f64,
    pub ath_vbr_lower: f64,
    pub sfb21_extra: bool,
    pub amp_mode: AmpMode,
    pub write_vbr_tag: bool,
    pub error_protection: bool,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: Emphasis,
    /// Input gain per channel, global scale already folded in
    pub input_scale: [f32; 2],
    /// Initial estimate of the number of frames in the stream
    pub total_frames_estimate: u64,
}

impl ResolvedParams {
    /// Whether input samples pass through the resampler
    pub fn is_resampling(&self) -> bool {
        self.resample_ratio != 1.0
    }

    /// Samples the analysis window must hold before a frame can be encoded
    pub fn window_needed(&self) -> usize {
        let fft = BLKSIZE + self.frame_size - FFTOFFSET;
        let mdct = 286 + GRANULE_SIZE * (1 + self.granules);
        fft.max(mdct)
    }

    /// Side info length without the header and CRC
    pub fn side_info_bytes(&self) -> usize {
        let crc = if self.error_protection { CRC_BYTES } else { 0 };
        self.sideinfo_len - HEADER_BYTES - crc
    }

    pub fn scalefactor_bands(&self) -> &'static ScalefactorBands {
        &SCALEFACTOR_BANDS[self.scalefactor_table]
    }

    /// Bitrate in kbps written to headers; the VBR minimum for VBR streams
    pub fn nominal_kbps(&self) -> u32 {
        match self.bitrate {
            BitrateSelection::Cbr { kbps, .. } | BitrateSelection::FreeFormat { kbps } => kbps,
            BitrateSelection::Vbr { min_kbps, .. } => min_kbps,
        }
    }

    /// Human readable configuration summary, one line per entry
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.channels_in == 2 && self.channels_out == 1 {
            lines.push("Autoconverting from stereo to mono. Setting encoding to mono mode.".to_string());
        }
        if self.is_resampling() {
            lines.push(format!(
                "Resampling:  input {} kHz  output {} kHz",
                1e-3 * self.in_samplerate as f64,
                1e-3 * self.out_samplerate as f64
            ));
        }
        if let Some(edge) = &self.filter.highpass {
            let (lo, hi) = edge.transition_hz(self.out_samplerate);
            lines.push(format!(
                "Using polyphase highpass filter, transition band: {:5.0} Hz - {:5.0} Hz",
                lo, hi
            ));
        }
        match &self.filter.lowpass {
            Some(edge) => {
                let (lo, hi) = edge.transition_hz(self.out_samplerate);
                lines.push(format!(
                    "Using polyphase lowpass  filter, transition band: {:5.0} Hz - {:5.0} Hz",
                    lo, hi
                ));
            }
            None => lines.push("polyphase lowpass filter disabled".to_string()),
        }
        if let BitrateSelection::FreeFormat { kbps } = self.bitrate {
            lines.push("Warning: many decoders cannot handle free format bitstreams".to_string());
            if kbps > 320 {
                lines.push(
                    "Warning: many decoders cannot handle free format bitrates >320 kbps".to_string(),
                );
            }
        }
        lines
    }
}

fn compression_ratio(out_samplerate: u32, channels: u8, kbps: f64) -> f64 {
    out_samplerate as f64 * 16.0 * channels as f64 / (1000.0 * kbps)
}

fn downsampled_rate(kbps: u32, channels: u8) -> u32 {
    tables::map_to_mp3_frequency(DOWNSAMPLE_TARGET_RATIO * 1000.0 * kbps as f64 / (16.0 * channels as f64))
}

fn vbr_bound(version: MpegVersion, kbps: u32, default: BitrateIndex, out: u32) -> Result<BitrateIndex> {
    if kbps == 0 {
        return Ok(default);
    }
    tables::bitrate_index(version, kbps)
        .ok_or_else(|| RateError::Bitrate { kbps, sample_rate: out }.into())
}

/// Resolves a configuration into encoding parameters
pub fn resolve(config: &EncoderConfig) -> Result<ResolvedParams> {
    config.validate()?;

    let channels_in = config.num_channels;
    let mut mode = config.mode;
    if channels_in == 1 {
        mode = Some(StereoMode::Mono);
    }
    let channels_out: u8 = if mode == Some(StereoMode::Mono) { 1 } else { 2 };
    let force_ms = config.force_ms && channels_out == 2;

    let mut vbr = config.vbr;
    let free_format = config.free_format && !vbr.is_variable();
    let in_samplerate = config.in_samplerate;
    let mut out_samplerate = config.out_samplerate;
    let mut brate = config.brate;
    let mut ratio = config.compression_ratio;

    if vbr == VbrMode::Off && brate == 0 && ratio == 0.0 {
        ratio = DEFAULT_COMPRESSION_RATIO;
    }

    if vbr == VbrMode::Off && ratio > 0.0 {
        if out_samplerate == 0 {
            out_samplerate = tables::map_to_mp3_frequency(0.97 * in_samplerate as f64);
        }
        let (version, _) =
            tables::samplerate_index(out_samplerate).ok_or(RateError::SampleRate(out_samplerate))?;
        let target = (out_samplerate as f64 * 16.0 * channels_out as f64 / (1000.0 * ratio)) as u32;
        brate = if free_format {
            if target == 0 || target > MAX_FREE_FORMAT_KBPS {
                return Err(ConfigError::InvalidBitrate(target).into());
            }
            target
        } else {
            tables::nearest_bitrate(version, target as f64)
        };
    }

    if vbr.is_variable() && brate >= 320 {
        vbr = VbrMode::Off;
    }

    if out_samplerate == 0 {
        out_samplerate = tables::map_to_mp3_frequency(0.97 * in_samplerate as f64);
        if vbr == VbrMode::Off && brate > 0 {
            let r = compression_ratio(out_samplerate, channels_out, brate as f64);
            if r > MAX_RATIO_BEFORE_DOWNSAMPLE {
                out_samplerate = downsampled_rate(brate, channels_out);
            }
        }
        if vbr == VbrMode::Abr && config.vbr_mean_bitrate_kbps > 0 {
            let mean = config.vbr_mean_bitrate_kbps;
            let r = compression_ratio(out_samplerate, channels_out, mean as f64);
            if r > MAX_RATIO_BEFORE_DOWNSAMPLE {
                out_samplerate = downsampled_rate(mean, channels_out);
            }
        }
    }

    let granules = if out_samplerate <= 24000 { 1 } else { 2 };
    let frame_size = GRANULE_SIZE * granules;
    let resample_ratio = in_samplerate as f64 / out_samplerate as f64;

    let rate_kbps = match vbr {
        VbrMode::Abr => config.vbr_mean_bitrate_kbps,
        VbrMode::Off => brate,
        _ => 1,
    };
    if rate_kbps == 0 {
        return Err(RateError::Bitrate { kbps: 0, sample_rate: out_samplerate }.into());
    }
    ratio = match vbr {
        VbrMode::Mt | VbrMode::Rh | VbrMode::Mtrh => VBR_COMPRESSION_RATIO[config.vbr_q as usize],
        VbrMode::Abr | VbrMode::Off => compression_ratio(out_samplerate, channels_out, rate_kbps as f64),
    };

    let mode = match mode {
        Some(mode) => mode,
        None if ratio < STEREO_RATIO_THRESHOLD => StereoMode::Stereo,
        None => StereoMode::JointStereo,
    };

    let filter = design_filters(config, ratio, resample_ratio, out_samplerate);

    let (version, samplerate_index) =
        tables::samplerate_index(out_samplerate).ok_or(RateError::SampleRate(out_samplerate))?;

    let mut masking_lower = 1.0;
    let mut ath_vbr_lower = 0.0;
    let bitrate = match vbr {
        VbrMode::Off if free_format => BitrateSelection::FreeFormat { kbps: brate },
        VbrMode::Off => {
            let index = tables::bitrate_index(version, brate).ok_or(RateError::Bitrate {
                kbps: brate,
                sample_rate: out_samplerate,
            })?;
            BitrateSelection::Cbr { index, kbps: brate }
        }
        _ => {
            let min = vbr_bound(version, config.vbr_min_bitrate_kbps, BitrateIndex::MIN, out_samplerate)?;
            let max = vbr_bound(version, config.vbr_max_bitrate_kbps, BitrateIndex::MAX, out_samplerate)?;
            let min_kbps = tables::bitrate_kbps(version, min);
            let max_kbps = tables::bitrate_kbps(version, max);
            if min > max {
                return Err(ConfigError::VbrRangeInverted { min: min_kbps, max: max_kbps }.into());
            }
            let mean_kbps = config.vbr_mean_bitrate_kbps.clamp(min_kbps, max_kbps);

            let q = config.vbr_q as usize;
            match vbr {
                VbrMode::Abr => {
                    masking_lower = ABR_MASKING_LOWER[q];
                    ath_vbr_lower = ATH_VBR_LOWER[q];
                }
                VbrMode::Rh | VbrMode::Mtrh => ath_vbr_lower = ATH_VBR_LOWER[q],
                _ => {}
            }
            BitrateSelection::Vbr { min, max, min_kbps, max_kbps, mean_kbps }
        }
    };

    let requested_quality = if vbr.is_variable() {
        config.quality.min(5)
    } else {
        config.quality
    };

    let write_vbr_tag = config.write_vbr_tag
        && vbr != VbrMode::Off
        && config.container != Container::Ogg
        && !config.analysis
        && config.output_addressable;

    let (quality, features) = quality_features(requested_quality)?;

    let is_mpeg1 = version == MpegVersion::Mpeg1;
    let scalefactor_table = samplerate_index as usize
        + 3 * usize::from(is_mpeg1)
        + 6 * usize::from(out_samplerate < 16000);

    let side_info = match (is_mpeg1, channels_out) {
        (true, 1) => 17,
        (true, _) => 32,
        (false, 1) => 9,
        (false, _) => 17,
    };
    let sideinfo_len = HEADER_BYTES
        + side_info
        + if config.error_protection { CRC_BYTES } else { 0 };

    let sfb21_extra = vbr.is_quality_controlled() && out_samplerate >= 32000;

    let experimental = config.exp_nspsytune || config.experimental_y;
    let amp_mode = match (vbr.is_quality_controlled(), experimental) {
        (true, true) => AmpMode::Mid,
        (true, false) if quality > 2 => AmpMode::All,
        (true, false) => AmpMode::Low,
        (false, true) => AmpMode::Max,
        (false, false) => AmpMode::All,
    };

    let total_frames_estimate =
        2 + (config.num_samples as f64 / (resample_ratio * frame_size as f64)) as u64;

    Ok(ResolvedParams {
        channels_in,
        channels_out,
        mode,
        force_ms,
        version,
        samplerate_index,
        in_samplerate,
        out_samplerate,
        vbr,
        vbr_q: config.vbr_q,
        bitrate,
        compression_ratio: ratio,
        granules,
        frame_size,
        encoder_delay: ENCDELAY,
        resample_ratio,
        filter,
        scalefactor_table,
        sideinfo_len,
        features,
        quality,
        masking_lower,
        ath_vbr_lower,
        sfb21_extra,
        amp_mode,
        write_vbr_tag,
        error_protection: config.error_protection,
        copyright: config.copyright,
        original: config.original,
        emphasis: config.emphasis,
        input_scale: [config.scale * config.scale_left, config.scale * config.scale_right],
        total_frames_estimate,
    })
}

fn design_filters(
    config: &EncoderConfig,
    ratio: f64,
    resample_ratio: f64,
    out_samplerate: u32,
) -> FilterResponse {
    let out = out_samplerate as f64;
    let mut lowpass = None;
    let mut highpass = None;

    if config.lowpass_freq == 0 {
        let mut band = (15.5 - 18.0 * (ratio / 16.0).log10()).floor();
        if resample_ratio != 1.0 && band > RESAMPLE_LOWPASS_BAND {
            band = RESAMPLE_LOWPASS_BAND;
        }
        if band > 0.0 && band < 31.0 {
            let edge = band / 31.0;
            lowpass = Some((edge, edge));
        }
    } else {
        let freq = config.lowpass_freq as f64;
        let lp2 = 2.0 * freq / out;
        let lp1 = config
            .lowpass_width
            .map_or(lp2, |width| (2.0 * (freq - width as f64) / out).max(0.0));
        lowpass = Some((lp1, lp2));
    }

    if config.highpass_freq > 0 {
        let freq = config.highpass_freq as f64;
        let hp1 = 2.0 * freq / out;
        let hp2 = config
            .highpass_width
            .map_or(hp1, |width| 2.0 * (freq + width as f64) / out);
        highpass = Some((hp1, hp2));
    }

    FilterResponse::design(lowpass, highpass)
}
