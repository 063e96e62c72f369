use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::Waveform;
use crate::beats::{beat_times, track_beat_frames};
use crate::grid::{measures_from_beats, BeatGrid};
use crate::onset::onset_envelope;
use crate::tempo::estimate_tempo;
use crate::{Result, TimingError};

/// Tunables for timing analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingParams {
    /// RMS window length in samples.
    pub frame_size: usize,
    /// Samples between successive onset frames.
    pub hop_size: usize,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Penalty weight for inter-beat intervals that deviate from the tempo.
    pub tightness: f64,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
            tightness: 100.0,
        }
    }
}

/// Estimates tempo, beats and measure windows from audio.
#[derive(Debug, Clone, Default)]
pub struct TimingAnalyzer {
    params: TimingParams,
}

impl TimingAnalyzer {
    pub fn new(params: TimingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TimingParams {
        &self.params
    }

    pub fn analyze(&self, waveform: &Waveform) -> Result<BeatGrid> {
        let duration = waveform.duration_seconds();
        if waveform.samples.is_empty() {
            return Err(TimingError::InvalidInput("empty waveform".into()));
        }

        let envelope = onset_envelope(
            &waveform.samples,
            waveform.sample_rate,
            self.params.frame_size,
            self.params.hop_size,
        )?;

        let tempo = estimate_tempo(&envelope, self.params.min_bpm, self.params.max_bpm)
            .ok_or(TimingError::NoPulse { seconds: duration })?;

        let frames = track_beat_frames(&envelope, tempo.period_frames, self.params.tightness);
        let beats = beat_times(&envelope, &frames);
        debug!(beats = beats.len(), "beat tracking done");

        let (downbeats, measures) = measures_from_beats(&beats, duration)?;

        info!(
            tempo_bpm = format!("{:.1}", tempo.bpm),
            beats = beats.len(),
            measures = measures.len(),
            first_downbeat = downbeats.first().copied().unwrap_or_default(),
            "timing analysis complete"
        );

        Ok(BeatGrid {
            tempo_bpm: tempo.bpm,
            beats,
            downbeats,
            measures,
            duration,
        })
    }
}
