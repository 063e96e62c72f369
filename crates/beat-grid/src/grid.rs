use serde::{Deserialize, Serialize};

use crate::{Result, TimingError};

/// Beats per measure. Meter detection is out of scope; everything is 4/4.
pub const BEATS_PER_MEASURE: usize = 4;

/// Half-open time window `[start, end)` covering one measure, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureWindow {
    pub start: f64,
    pub end: f64,
}

impl MeasureWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// Result of timing analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatGrid {
    pub tempo_bpm: f64,
    pub beats: Vec<f64>,
    pub downbeats: Vec<f64>,
    pub measures: Vec<MeasureWindow>,
    /// Audio length in seconds; the final measure ends here.
    pub duration: f64,
}

impl BeatGrid {
    pub fn first_downbeat(&self) -> Option<f64> {
        self.downbeats.first().copied()
    }
}

/// Group beats into measures.
///
/// Every [`BEATS_PER_MEASURE`]th beat starting from the first is a downbeat.
/// Consecutive downbeats bound a measure and a final measure runs from the
/// last downbeat to `duration`. Material before the first downbeat belongs
/// to no measure.
pub fn measures_from_beats(beats: &[f64], duration: f64) -> Result<(Vec<f64>, Vec<MeasureWindow>)> {
    let downbeats: Vec<f64> = beats.iter().copied().step_by(BEATS_PER_MEASURE).collect();
    if downbeats.len() < 2 {
        return Err(TimingError::InsufficientDownbeats {
            found: downbeats.len(),
        });
    }

    let mut measures: Vec<MeasureWindow> = downbeats
        .windows(2)
        .map(|w| MeasureWindow {
            start: w[0],
            end: w[1],
        })
        .collect();

    if let Some(&last) = downbeats.last() {
        measures.push(MeasureWindow {
            start: last,
            end: duration.max(last),
        });
    }

    Ok((downbeats, measures))
}
