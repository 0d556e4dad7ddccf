//! Streaming sample rate conversion
//!
//! The sample window pulls converted samples in chunks of at most one frame,
//! so a resampler has to remember where it stopped in the input between
//! calls. [`Resampler`] is the seam for plugging in a higher quality
//! converter; [`LinearResampler`] is the built-in linear interpolator.

/// Maximum number of channels a resampler keeps state for
pub const MAX_CHANNELS: usize = 2;

/// Stateful per-channel rate converter
pub trait Resampler {
    /// Converts a prefix of `input` for `channel`, writing at most
    /// `output.len()` samples. Returns `(consumed, produced)`.
    ///
    /// Every channel must be driven with the same input lengths so the
    /// channels stay in step.
    fn resample(&mut self, channel: usize, input: &[f32], output: &mut [f32]) -> (usize, usize);

    /// Input over output sample rate
    fn ratio(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    /// Position of the next output, in input samples, relative to `prev`
    pos: f64,
    /// Last input sample that may still be interpolated from
    prev: f32,
}

/// Linear interpolation resampler
#[derive(Debug, Clone)]
pub struct LinearResampler {
    ratio: f64,
    channels: [ChannelState; MAX_CHANNELS],
}

impl LinearResampler {
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio,
            channels: [ChannelState::default(); MAX_CHANNELS],
        }
    }
}

impl Resampler for LinearResampler {
    fn resample(&mut self, channel: usize, input: &[f32], output: &mut [f32]) -> (usize, usize) {
        let state = &mut self.channels[channel];
        let available = input.len();

        // Sample k of the virtual sequence: 0 is `prev`, k >= 1 is input[k - 1]
        let sample = |k: usize, prev: f32| if k == 0 { prev } else { input[k - 1] };

        let mut produced = 0;
        while produced < output.len() {
            let base = state.pos.floor();
            let index = base as usize;
            if index + 1 > available {
                break;
            }
            let frac = (state.pos - base) as f32;
            let s0 = sample(index, state.prev);
            let s1 = sample(index + 1, state.prev);
            output[produced] = s0 + (s1 - s0) * frac;
            produced += 1;
            state.pos += self.ratio;
        }

        let consumed = (state.pos.floor() as usize).min(available);
        if consumed > 0 {
            state.prev = input[consumed - 1];
            state.pos -= consumed as f64;
        }
        (consumed, produced)
    }

    fn ratio(&self) -> f64 {
        self.ratio
    }
}
