//! Energy-flux onset strength envelope.
//!
//! RMS energy per frame, then the half-wave rectified frame-to-frame
//! difference. Vocals have soft attacks, so the envelope is kept continuous
//! rather than peak-picked: the tempo estimator and the beat tracker both
//! want the whole curve.

use crate::{Result, TimingError};

/// Onset strength per analysis frame.
#[derive(Debug, Clone)]
pub struct OnsetEnvelope {
    pub values: Vec<f32>,
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl OnsetEnvelope {
    /// Seconds between consecutive frames.
    pub fn frame_seconds(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate as f64
    }

    pub fn frame_to_seconds(&self, frame: usize) -> f64 {
        frame as f64 * self.frame_seconds()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Compute the onset envelope of mono samples.
///
/// Frame `i` is centered on sample `i * hop_size`, so envelope frame times
/// line up with where the energy actually changes. The first frame is always
/// zero.
pub fn onset_envelope(
    samples: &[f32],
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
) -> Result<OnsetEnvelope> {
    if frame_size == 0 || hop_size == 0 {
        return Err(TimingError::InvalidInput(format!(
            "frame size ({frame_size}) and hop size ({hop_size}) must be > 0"
        )));
    }

    let num_frames = if samples.is_empty() {
        0
    } else {
        samples.len().div_ceil(hop_size)
    };

    let energies: Vec<f32> = (0..num_frames)
        .map(|i| {
            let center = i * hop_size;
            let start = center.saturating_sub(frame_size / 2);
            let end = (center + frame_size - frame_size / 2).min(samples.len());
            let frame = &samples[start..end];
            let sum_sq: f32 = frame.iter().map(|&x| x * x).sum();
            (sum_sq / frame_size as f32).sqrt()
        })
        .collect();

    let mut values = Vec::with_capacity(num_frames);
    if num_frames > 0 {
        values.push(0.0);
    }
    values.extend(energies.windows(2).map(|w| (w[1] - w[0]).max(0.0)));

    Ok(OnsetEnvelope {
        values,
        hop_size,
        sample_rate,
    })
}
