//! Shared enums and typed indices
//!
//! Small value types used across configuration, resolution and statistics.

use crate::error::{ConfigError, ConfigResult};
use std::convert::TryFrom;

/// Number of legal (non-free, non-forbidden) bitrate indices per MPEG version
pub const BITRATE_INDEX_COUNT: usize = 14;

/// Number of stereo submodes tracked by the frame statistics
pub const STEREO_SUBMODE_COUNT: usize = 4;

/// Stereo encoding modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub enum StereoMode {
    /// Standard stereo
    Stereo,
    /// Joint stereo (mid/side switching)
    JointStereo,
    /// Dual channel (independent channels)
    DualChannel,
    /// Mono
    Mono,
}

impl StereoMode {
    /// Two-bit mode field of the frame header
    pub fn header_bits(self) -> u32 {
        match self {
            StereoMode::Stereo => 0,
            StereoMode::JointStereo => 1,
            StereoMode::DualChannel => 2,
            StereoMode::Mono => 3,
        }
    }
}

impl TryFrom<i32> for StereoMode {
    type Error = ConfigError;

    fn try_from(code: i32) -> ConfigResult<Self> {
        match code {
            0 => Ok(StereoMode::Stereo),
            1 => Ok(StereoMode::JointStereo),
            2 => Ok(StereoMode::DualChannel),
            3 => Ok(StereoMode::Mono),
            other => Err(ConfigError::UnknownStereoMode(other)),
        }
    }
}

/// Rate control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub enum VbrMode {
    /// Constant bitrate
    #[default]
    Off,
    /// Quality-controlled VBR, Mark Taylor's search
    Mt,
    /// Quality-controlled VBR, Robert Hegemann's search
    Rh,
    /// Average bitrate
    Abr,
    /// Quality-controlled VBR, combined search
    Mtrh,
}

impl VbrMode {
    /// True for the quality-controlled family (`Mt`, `Rh`, `Mtrh`)
    pub fn is_quality_controlled(self) -> bool {
        matches!(self, VbrMode::Mt | VbrMode::Rh | VbrMode::Mtrh)
    }

    /// True for every mode except constant bitrate
    pub fn is_variable(self) -> bool {
        self != VbrMode::Off
    }
}

impl TryFrom<i32> for VbrMode {
    type Error = ConfigError;

    fn try_from(code: i32) -> ConfigResult<Self> {
        match code {
            0 => Ok(VbrMode::Off),
            1 => Ok(VbrMode::Mt),
            2 => Ok(VbrMode::Rh),
            3 => Ok(VbrMode::Abr),
            4 => Ok(VbrMode::Mtrh),
            other => Err(ConfigError::UnknownVbrMode(other)),
        }
    }
}

/// Pre-emphasis modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub enum Emphasis {
    /// No emphasis
    #[default]
    None,
    /// 50/15 microseconds emphasis
    Emphasis50_15,
    /// Reserved header value
    Reserved,
    /// CCITT J.17 emphasis
    CcittJ17,
}

impl Emphasis {
    pub fn header_bits(self) -> u32 {
        match self {
            Emphasis::None => 0,
            Emphasis::Emphasis50_15 => 1,
            Emphasis::Reserved => 2,
            Emphasis::CcittJ17 => 3,
        }
    }
}

impl TryFrom<i32> for Emphasis {
    type Error = ConfigError;

    fn try_from(code: i32) -> ConfigResult<Self> {
        match code {
            0 => Ok(Emphasis::None),
            1 => Ok(Emphasis::Emphasis50_15),
            2 => Ok(Emphasis::Reserved),
            3 => Ok(Emphasis::CcittJ17),
            other => Err(ConfigError::UnknownEmphasis(other)),
        }
    }
}

/// Output container the frames are destined for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub enum Container {
    #[default]
    Mp3,
    Ogg,
}

/// MPEG version enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub enum MpegVersion {
    /// MPEG-1
    Mpeg1,
    /// MPEG-2
    Mpeg2,
    /// MPEG-2.5
    Mpeg25,
}

impl MpegVersion {
    /// Two-bit version field of the frame header
    pub fn header_bits(self) -> u32 {
        match self {
            MpegVersion::Mpeg1 => 3,
            MpegVersion::Mpeg2 => 2,
            MpegVersion::Mpeg25 => 0,
        }
    }

    /// Row of the bitrate table; MPEG-2 and MPEG-2.5 share the LSF row
    pub fn bitrate_row(self) -> usize {
        match self {
            MpegVersion::Mpeg1 => 1,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 0,
        }
    }

    /// Granules per frame
    pub fn granules(self) -> usize {
        match self {
            MpegVersion::Mpeg1 => 2,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 1,
        }
    }
}

/// Index into a bitrate table row, 0 (free format) through 14
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub struct BitrateIndex(u8);

impl BitrateIndex {
    /// Free-format index
    pub const FREE: BitrateIndex = BitrateIndex(0);
    pub const MIN: BitrateIndex = BitrateIndex(1);
    pub const MAX: BitrateIndex = BitrateIndex(14);

    /// Wraps a raw index, rejecting the forbidden value 15 and above
    pub fn new(index: u8) -> Option<Self> {
        if index as usize <= BITRATE_INDEX_COUNT {
            Some(BitrateIndex(index))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Per-frame stereo coding decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub enum StereoSubmode {
    /// Left/right
    Lr,
    /// Left/right with intensity stereo
    LrIntensity,
    /// Mid/side
    Ms,
    /// Mid/side with intensity stereo
    MsIntensity,
}

impl StereoSubmode {
    pub fn index(self) -> usize {
        match self {
            StereoSubmode::Lr => 0,
            StereoSubmode::LrIntensity => 1,
            StereoSubmode::Ms => 2,
            StereoSubmode::MsIntensity => 3,
        }
    }

    /// Two-bit mode extension field written for joint stereo frames
    pub fn mode_extension(self) -> u32 {
        match self {
            StereoSubmode::Lr => 0,
            StereoSubmode::LrIntensity => 1,
            StereoSubmode::Ms => 2,
            StereoSubmode::MsIntensity => 3,
        }
    }
}

/// Amplification strategy handed to the quantizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub enum AmpMode {
    /// Amplify every distorted band
    All,
    /// Amplify the band with the largest distortion only
    Max,
    /// Amplify bands within 50% of the largest distortion
    Mid,
    /// Amplify bands with low distortion
    Low,
}
