//! Polyphase filter design
//!
//! The encoder applies lowpass and highpass filtering by weighting the 32
//! polyphase subbands rather than with a separate FIR stage. Band `b` is
//! centred at normalised frequency `b / 31` (1.0 is Nyquist). Bands outside
//! the pass region get weight 0, bands inside the transition region get a
//! raised-cosine weight, and the requested edges are snapped to the edges the
//! band layout can actually realise.

use crate::tables::SUBBANDS;
use std::f64::consts::FRAC_PI_2;
use std::ops::Index;

/// Half-width of one subband in normalised frequency units, times 31
const HALF_BAND: f64 = 0.75;

/// Highpass edges below this fraction of the smallest realisable edge are ignored
const HIGHPASS_MIN_FRACTION: f64 = 0.9;

/// Per-subband amplitude weights
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub struct BandAmplitudes([f64; SUBBANDS]);

impl BandAmplitudes {
    /// Unit weight in every band
    pub fn flat() -> Self {
        BandAmplitudes([1.0; SUBBANDS])
    }

    pub fn as_array(&self) -> &[f64; SUBBANDS] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }
}

impl Default for BandAmplitudes {
    fn default() -> Self {
        Self::flat()
    }
}

impl Index<usize> for BandAmplitudes {
    type Output = f64;

    fn index(&self, band: usize) -> &f64 {
        &self.0[band]
    }
}

/// One designed filter edge
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterEdge {
    /// Effective start of the transition, normalised
    pub edge1: f64,
    /// Effective end of the transition, normalised
    pub edge2: f64,
    /// First band fully stopped: the lowest zeroed band for a lowpass,
    /// the highest zeroed band for a highpass
    pub cutoff_band: usize,
    /// Bands carrying a fractional weight, if any
    pub transition: Option<(usize, usize)>,
    pub amplitudes: BandAmplitudes,
}

impl FilterEdge {
    /// Transition region in Hz for the given output rate
    pub fn transition_hz(&self, out_samplerate: u32) -> (f64, f64) {
        let nyquist = out_samplerate as f64 / 2.0;
        (self.edge1 * nyquist, self.edge2 * nyquist)
    }
}

/// Combined lowpass / highpass response
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterResponse {
    pub lowpass: Option<FilterEdge>,
    pub highpass: Option<FilterEdge>,
    /// A highpass was requested but was too low to realise
    pub highpass_disabled: bool,
}

impl FilterResponse {
    /// Designs both edges. Each pair is `(edge1, edge2)` in normalised units.
    pub fn design(lowpass: Option<(f64, f64)>, highpass: Option<(f64, f64)>) -> Self {
        let lowpass = lowpass
            .filter(|&(lp1, _)| lp1 > 0.0)
            .map(|(lp1, lp2)| design_lowpass(lp1, lp2));

        let mut highpass_disabled = false;
        let highpass = match highpass {
            Some((_, hp2)) if hp2 > 0.0 && hp2 < HIGHPASS_MIN_FRACTION * (HALF_BAND / 31.0) => {
                log::warn!("highpass filter disabled, highpass frequency too small");
                highpass_disabled = true;
                None
            }
            Some((hp1, hp2)) if hp2 > 0.0 => Some(design_highpass(hp1, hp2)),
            _ => None,
        };

        FilterResponse {
            lowpass,
            highpass,
            highpass_disabled,
        }
    }

    /// Product of both edges' weights for one band
    pub fn amplitude(&self, band: usize) -> f64 {
        let lp = self.lowpass.map_or(1.0, |edge| edge.amplitudes[band]);
        let hp = self.highpass.map_or(1.0, |edge| edge.amplitudes[band]);
        lp * hp
    }
}

fn band_freq(band: usize) -> f64 {
    band as f64 / 31.0
}

fn lowpass_taper(lp1: f64, lp2: f64, freq: f64) -> f64 {
    (FRAC_PI_2 * (lp1 - freq) / (lp2 - lp1)).cos()
}

fn highpass_taper(hp1: f64, hp2: f64, freq: f64) -> f64 {
    (FRAC_PI_2 * (hp2 - freq) / (hp2 - hp1)).cos()
}

/// Designs a lowpass edge from the requested transition `lp1..lp2`
pub fn design_lowpass(lp1: f64, lp2: f64) -> FilterEdge {
    let mut amp = [1.0; SUBBANDS];
    let mut cutoff_band = SUBBANDS;
    let mut transition: Option<(usize, usize)> = None;

    for (band, weight) in amp.iter_mut().enumerate() {
        let freq = band_freq(band);
        if freq >= lp2 {
            cutoff_band = cutoff_band.min(band);
            *weight = 0.0;
        }
        if lp1 < freq && freq < lp2 {
            transition = Some(widen(transition, band));
            *weight = lowpass_taper(lp1, lp2, freq);
        }
    }

    let first = transition.map_or(cutoff_band, |(lo, _)| lo);
    let edge1 = (first as f64 - HALF_BAND) / 31.0;
    let edge2 = cutoff_band as f64 / 31.0;

    if let Some((lo, hi)) = transition {
        for (band, weight) in amp.iter_mut().enumerate().take(hi + 1).skip(lo) {
            *weight = lowpass_taper(edge1, edge2, band_freq(band));
        }
    }

    FilterEdge {
        edge1,
        edge2,
        cutoff_band,
        transition,
        amplitudes: BandAmplitudes(amp),
    }
}

/// Designs a highpass edge from the requested transition `hp1..hp2`
pub fn design_highpass(hp1: f64, hp2: f64) -> FilterEdge {
    let mut amp = [1.0; SUBBANDS];
    let mut cutoff_band: Option<usize> = None;
    let mut transition: Option<(usize, usize)> = None;

    for (band, weight) in amp.iter_mut().enumerate() {
        let freq = band_freq(band);
        if freq <= hp1 {
            cutoff_band = Some(cutoff_band.map_or(band, |c| c.max(band)));
            *weight = 0.0;
        }
        if hp1 < freq && freq < hp2 {
            transition = Some(widen(transition, band));
            *weight = highpass_taper(hp1, hp2, freq);
        }
    }

    // Band 0 sits at frequency 0, so it is always at or below a non-negative edge.
    let cutoff_band = cutoff_band.unwrap_or(0);
    let edge1 = cutoff_band as f64 / 31.0;
    let last = transition.map_or(cutoff_band, |(_, hi)| hi);
    let edge2 = (last as f64 + HALF_BAND) / 31.0;

    if let Some((lo, hi)) = transition {
        for (band, weight) in amp.iter_mut().enumerate().take(hi + 1).skip(lo) {
            *weight = highpass_taper(edge1, edge2, band_freq(band));
        }
    }

    FilterEdge {
        edge1,
        edge2,
        cutoff_band,
        transition,
        amplitudes: BandAmplitudes(amp),
    }
}

fn widen(range: Option<(usize, usize)>, band: usize) -> (usize, usize) {
    match range {
        Some((lo, hi)) => (lo.min(band), hi.max(band)),
        None => (band, band),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sharp_lowpass_at_band_boundary() {
        // Equal edges at band 20: no transition, bands 20.. zeroed
        let edge = design_lowpass(20.0 / 31.0, 20.0 / 31.0);
        assert_eq!(edge.cutoff_band, 20);
        assert_eq!(edge.transition, None);
        assert!((edge.edge2 - 20.0 / 31.0).abs() < 1e-12);
        assert!((edge.edge1 - 19.25 / 31.0).abs() < 1e-12);
        for band in 0..20 {
            assert_eq!(edge.amplitudes[band], 1.0);
        }
        for band in 20..32 {
            assert_eq!(edge.amplitudes[band], 0.0);
        }
    }

    #[test]
    fn test_lowpass_transition_is_tapered() {
        let edge = design_lowpass(10.0 / 31.0, 15.0 / 31.0);
        assert_eq!(edge.transition, Some((11, 14)));
        assert_eq!(edge.cutoff_band, 15);
        assert!((edge.edge1 - 10.25 / 31.0).abs() < 1e-12);
        for band in 11..=14 {
            let amp = edge.amplitudes[band];
            assert!(amp > 0.0 && amp < 1.0, "band {} amp {}", band, amp);
        }
        for band in 11..14 {
            assert!(edge.amplitudes[band] > edge.amplitudes[band + 1]);
        }
    }

    #[test]
    fn test_highpass_mirrors_lowpass() {
        let edge = design_highpass(2.0 / 31.0, 5.0 / 31.0);
        assert_eq!(edge.cutoff_band, 2);
        assert_eq!(edge.transition, Some((3, 4)));
        assert!((edge.edge1 - 2.0 / 31.0).abs() < 1e-12);
        assert!((edge.edge2 - 4.75 / 31.0).abs() < 1e-12);
        assert_eq!(edge.amplitudes[0], 0.0);
        assert_eq!(edge.amplitudes[2], 0.0);
        assert!(edge.amplitudes[3] < edge.amplitudes[4]);
        assert_eq!(edge.amplitudes[5], 1.0);
    }

    #[test]
    fn test_tiny_highpass_is_disabled() {
        let response = FilterResponse::design(None, Some((0.001, 0.01)));
        assert!(response.highpass_disabled);
        assert!(response.highpass.is_none());
        assert_eq!(response.amplitude(0), 1.0);
    }

    #[test]
    fn test_lowpass_needs_positive_lower_edge() {
        let response = FilterResponse::design(Some((0.0, 0.5)), None);
        assert!(response.lowpass.is_none());
        assert!(FilterResponse::design(Some((0.4, 0.5)), None).lowpass.is_some());
    }

    #[test]
    fn test_unset_filters_are_flat() {
        let response = FilterResponse::design(None, None);
        assert!(response.lowpass.is_none());
        assert!(response.highpass.is_none());
        assert!(!response.highpass_disabled);
        assert!((0..32).all(|b| response.amplitude(b) == 1.0));
    }

    #[test]
    fn test_transition_hz() {
        let edge = design_lowpass(20.0 / 31.0, 20.0 / 31.0);
        let (lo, hi) = edge.transition_hz(44100);
        assert!((hi - 20.0 / 31.0 * 22050.0).abs() < 1e-9);
        assert!(lo < hi);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        #[test]
        fn test_lowpass_weights_are_bounded_and_monotonic(
            lp1 in 0.01f64..0.95,
            width in 0.0f64..0.3,
        ) {
            let edge = design_lowpass(lp1, (lp1 + width).min(1.0));
            for band in 0..32 {
                let amp = edge.amplitudes[band];
                prop_assert!((0.0..=1.0).contains(&amp));
                if band > 0 {
                    prop_assert!(amp <= edge.amplitudes[band - 1] + 1e-12);
                }
            }
            prop_assert!(edge.edge1 < edge.edge2);
        }

        #[test]
        fn test_highpass_weights_are_bounded_and_monotonic(
            hp1 in 0.03f64..0.5,
            width in 0.0f64..0.3,
        ) {
            let edge = design_highpass(hp1, hp1 + width);
            for band in 1..32 {
                prop_assert!((0.0..=1.0).contains(&edge.amplitudes[band]));
                prop_assert!(edge.amplitudes[band] + 1e-12 >= edge.amplitudes[band - 1]);
            }
        }
    }
}
