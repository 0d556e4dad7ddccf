//! Sample window
//!
//! Input arrives in blocks of any length, while the frame encoder needs a
//! fixed look-ahead window of `needed` samples per channel. [`SampleBuffer`]
//! accumulates (and optionally resamples) input one frame-sized chunk at a
//! time and hands the oldest window to the encoder whenever enough samples
//! have piled up.
//!
//! The window starts with `ENCDELAY - MDCTDELAY` zero samples, and
//! `samples_owed` starts at `ENCDELAY + 288`: the number of samples the
//! stream still owes the output before every submitted sample has been
//! covered by a completed frame.

use crate::error::{EncoderError, InputDataError, Result};
use crate::frame::{EncodedFrame, FrameEncoder, FrameWindow};
use crate::params::ResolvedParams;
use crate::resample::{LinearResampler, Resampler};
use crate::tables::{ENCDELAY, MDCTDELAY, MFSIZE};

/// Zero samples the window is primed with
pub const WINDOW_PRIME: usize = ENCDELAY - MDCTDELAY;

/// Initial value of the owed-sample counter
pub const INITIAL_SAMPLES_OWED: i64 = (ENCDELAY + 288) as i64;

/// Per-channel analysis window
pub struct SampleBuffer {
    window: [Vec<f32>; 2],
    fill: usize,
    samples_owed: i64,
    frame_size: usize,
    needed: usize,
    channels_out: usize,
    resampler: Option<Box<dyn Resampler + Send>>,
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("fill", &self.fill)
            .field("samples_owed", &self.samples_owed)
            .field("frame_size", &self.frame_size)
            .field("needed", &self.needed)
            .field("channels_out", &self.channels_out)
            .field("resampling", &self.resampler.is_some())
            .finish()
    }
}

fn zeroed_channel() -> Result<Vec<f32>> {
    let mut channel = Vec::new();
    channel.try_reserve_exact(MFSIZE)?;
    channel.resize(MFSIZE, 0.0);
    Ok(channel)
}

impl SampleBuffer {
    /// Allocates the window for a resolved stream.
    ///
    /// A [`LinearResampler`] is installed when the input and output rates
    /// differ; [`SampleBuffer::set_resampler`] replaces it.
    pub fn new(params: &ResolvedParams) -> Result<Self> {
        let needed = params.window_needed();
        if needed + params.frame_size > MFSIZE {
            return Err(EncoderError::Overflow {
                requested: needed + params.frame_size,
                capacity: MFSIZE,
            });
        }

        let resampler: Option<Box<dyn Resampler + Send>> = if params.is_resampling() {
            Some(Box::new(LinearResampler::new(params.resample_ratio)))
        } else {
            None
        };

        Ok(Self {
            window: [zeroed_channel()?, zeroed_channel()?],
            fill: WINDOW_PRIME,
            samples_owed: INITIAL_SAMPLES_OWED,
            frame_size: params.frame_size,
            needed,
            channels_out: params.channels_out as usize,
            resampler,
        })
    }

    /// Replaces the rate converter. Ignored when no resampling takes place.
    pub fn set_resampler(&mut self, resampler: Box<dyn Resampler + Send>) {
        if self.resampler.is_some() {
            self.resampler = Some(resampler);
        }
    }

    /// Buffers `input` and encodes every window that fills up.
    ///
    /// `input` holds one slice per output channel; the right slice is ignored
    /// for mono output. `on_frame` receives each frame in order. Returns the
    /// number of frames produced. The first error stops the call; frames
    /// already handed to `on_frame` and shifted out of the window stay that way.
    pub fn submit<E, F>(
        &mut self,
        input: [&[f32]; 2],
        params: &ResolvedParams,
        encoder: &mut E,
        mut on_frame: F,
    ) -> Result<usize>
    where
        E: FrameEncoder + ?Sized,
        F: FnMut(EncodedFrame) -> Result<()>,
    {
        let channels = self.channels_out;
        if channels == 2 && input[0].len() != input[1].len() {
            return Err(InputDataError::ChannelLengthMismatch {
                left: input[0].len(),
                right: input[1].len(),
            }
            .into());
        }

        let mut rest = input;
        let mut frames = 0;

        while !rest[0].is_empty() {
            if self.fill + self.frame_size > MFSIZE {
                return Err(EncoderError::Overflow {
                    requested: self.fill + self.frame_size,
                    capacity: MFSIZE,
                });
            }

            let (consumed, produced) = match self.resampler.as_mut() {
                Some(resampler) => {
                    let mut step = (0, 0);
                    for ch in 0..channels {
                        let dst = &mut self.window[ch][self.fill..self.fill + self.frame_size];
                        step = resampler.resample(ch, rest[ch], dst);
                    }
                    step
                }
                None => {
                    let n = rest[0].len().min(self.frame_size);
                    for ch in 0..channels {
                        self.window[ch][self.fill..self.fill + n].copy_from_slice(&rest[ch][..n]);
                    }
                    (n, n)
                }
            };

            if consumed == 0 && produced == 0 {
                log::debug!("resampler made no progress with {} samples left", rest[0].len());
                break;
            }

            for ch in 0..channels {
                rest[ch] = &rest[ch][consumed..];
            }
            self.fill += produced;
            self.samples_owed += produced as i64;

            while self.fill >= self.needed {
                let frame = {
                    let view = FrameWindow::new(
                        &self.window[0][..self.needed],
                        &self.window[1][..self.needed],
                        channels,
                    );
                    encoder.encode_frame(&view, params)?
                };
                on_frame(frame)?;

                for ch in 0..channels {
                    self.window[ch].copy_within(self.frame_size..self.fill, 0);
                }
                self.fill -= self.frame_size;
                self.samples_owed -= self.frame_size as i64;
                frames += 1;
            }
        }

        Ok(frames)
    }

    /// Takes back the owed samples a block of flush padding added
    pub fn discount_padding(&mut self, samples: usize) {
        self.samples_owed -= samples as i64;
    }

    /// Zeroes the owed counter once it has gone non-positive and returns the
    /// overshoot, i.e. how many padding samples went into the last frame
    pub fn settle(&mut self) -> usize {
        let overshoot = (-self.samples_owed).max(0) as usize;
        self.samples_owed = self.samples_owed.max(0);
        overshoot
    }

    pub fn samples_owed(&self) -> i64 {
        self.samples_owed
    }

    /// Samples currently buffered per channel
    pub fn fill(&self) -> usize {
        self.fill
    }

    pub fn capacity(&self) -> usize {
        MFSIZE
    }

    pub fn needed(&self) -> usize {
        self.needed
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn is_resampling(&self) -> bool {
        self.resampler.is_some()
    }
}
