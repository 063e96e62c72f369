//! Timing analysis for a solo vocal recording.
//!
//! Turns a waveform into a tempo estimate, beat and downbeat timestamps, and
//! the per-measure time windows that the melody is segmented by:
//!
//! 1. frame RMS energy → half-wave rectified energy flux (onset envelope)
//! 2. autocorrelation of the envelope → global tempo
//! 3. dynamic-programming beat tracking against that tempo
//! 4. every 4th beat is a downbeat; consecutive downbeats bound a measure,
//!    and the last measure runs to the end of the audio
//!
//! Meter is always taken to be 4/4. Recordings in other meters still get
//! four-beat windows.

pub mod analyzer;
pub mod audio;
pub mod beats;
pub mod grid;
pub mod onset;
pub mod tempo;

pub use analyzer::{TimingAnalyzer, TimingParams};
pub use audio::{decode_wav, load_wav, Waveform};
pub use grid::{measures_from_beats, BeatGrid, MeasureWindow, BEATS_PER_MEASURE};

use std::path::PathBuf;

/// Errors from timing analysis.
#[derive(Debug, thiserror::Error)]
pub enum TimingError {
    #[error("failed to read audio {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("WAV decode error: {0}")]
    Decode(#[from] hound::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no periodic pulse found in {seconds:.2}s of audio")]
    NoPulse { seconds: f64 },

    #[error("found {found} downbeat(s); at least 2 are needed to form measures")]
    InsufficientDownbeats { found: usize },
}

pub type Result<T> = std::result::Result<T, TimingError>;
