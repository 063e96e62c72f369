//! Chord inference for a sung melody.
//!
//! A corpus of chord-annotated songs yields a chord vocabulary, a
//! chord-to-chord transition matrix and a per-chord pitch-class emission
//! matrix ([`CorpusModel`]). For each input melody, the vocabulary is cut down
//! to chords that fit the melody's key, each measure's pitch classes are
//! scored against every remaining chord, and Viterbi decoding picks one
//! chord per measure.

pub mod cache;
pub mod chord;
pub mod corpus;
pub mod decoder;
pub mod global;
pub mod key;
pub mod matrix;
pub mod observation;
pub mod pipeline;
pub mod pitch_table;
pub mod scale;
pub mod segment;
pub mod theory;
pub mod vocabulary;

pub use cache::ModelCache;
pub use chord::{Chord, ChordQuality};
pub use corpus::{load_corpus_dir, load_song_melody, CorpusBuilder, CorpusModel, Song};
pub use decoder::{ChordHmm, DecodedPath};
pub use key::{detect_key, KeyDetection, KeyEstimator, ProfileKeyEstimator};
pub use matrix::ProbabilityMatrix;
pub use observation::MeasureEvidence;
pub use pipeline::{harmonize, Harmonization, InferencePipeline, InferenceReport};
pub use pitch_table::PitchTable;
pub use scale::{KeyContext, KeyMode, KeyedModel, ScaleSet};
pub use segment::{segment_melody, Measure};
pub use theory::NoteName;
pub use vocabulary::{ChordId, Vocabulary};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Current model layout version — bump to invalidate cache.
pub const MODEL_VERSION: u32 = 1;

/// Numeric knobs of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Added to every pitch-table count before normalizing emission rows.
    pub smoothing: f64,
    /// Added to every bin of a measure's pitch-class histogram.
    pub epsilon: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            smoothing: 1.0,
            epsilon: 1e-10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{source_name}:{line}: {reason}")]
    MalformedRow {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error("unknown chord label: {0:?}")]
    UnknownChord(String),

    #[error("invalid note name: {0:?}")]
    InvalidNote(String),

    #[error("corpus contains no chords")]
    EmptyCorpus,

    #[error("key filtering left {size} chord(s); at least 2 are needed to decode")]
    VocabularyTooSmall { size: usize },

    #[error("{what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("row {row} sums to {sum}, not 1")]
    RowNotNormalized { row: usize, sum: f64 },

    #[error("invalid probability weight {0}")]
    InvalidProbability(f64),

    #[error("observation symbol {symbol} out of range for {symbols} symbols")]
    ObservationOutOfRange { symbol: usize, symbols: usize },

    #[error("global corpus model already initialized")]
    ModelAlreadyInitialized,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Timing(#[from] beat_grid::TimingError),

    #[error(transparent)]
    Melody(#[from] melody_notes::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
