//! PCM audio data processing utilities
//!
//! Conversion of 16-bit PCM into the floating-point working format,
//! de-interleaving and the stereo to mono downmix.

use crate::error::InputDataError;

/// De-interleave interleaved PCM data into separate channel buffers
///
/// Takes PCM data in format [L0, R0, L1, R1, ..., LN, RN] and separates it
/// into individual channel buffers. The buffers are cleared first.
pub fn deinterleave_pcm_interleaved(
    pcm_data: &[i16],
    channels: usize,
    channel_buffers: &mut [Vec<i16>],
) -> Result<usize, InputDataError> {
    if channels == 0 || pcm_data.len() % channels != 0 {
        return Err(InputDataError::InvalidLength {
            expected: channels.max(1),
            actual: pcm_data.len(),
        });
    }
    let samples_per_channel = pcm_data.len() / channels;

    for buffer in channel_buffers.iter_mut().take(channels) {
        buffer.clear();
        buffer.reserve(samples_per_channel);
    }

    for frame in pcm_data.chunks_exact(channels) {
        for (buffer, &sample) in channel_buffers.iter_mut().zip(frame) {
            buffer.push(sample);
        }
    }
    Ok(samples_per_channel)
}

/// Converts 16-bit samples to `f32`, applying a gain, appending to `out`
pub fn pcm_to_float(pcm_data: &[i16], scale: f32, out: &mut Vec<f32>) {
    out.clear();
    out.reserve(pcm_data.len());
    if scale == 1.0 {
        out.extend(pcm_data.iter().map(|&s| s as f32));
    } else {
        out.extend(pcm_data.iter().map(|&s| s as f32 * scale));
    }
}

/// Averages `right` into `left` sample by sample
pub fn downmix_to_mono(left: &mut [f32], right: &[f32]) {
    for (l, &r) in left.iter_mut().zip(right) {
        *l = 0.5 * (*l + r);
    }
}
