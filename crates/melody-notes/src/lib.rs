pub mod midi;
pub mod midi_writer;
pub mod note;
pub mod transcribe;

pub use midi::{extract_tracks, melody_from_midi, TempoMap};
pub use midi_writer::melody_to_midi;
pub use note::{NoteEvent, PitchClass};
pub use transcribe::{MidiTranscription, Transcriber};

use std::path::PathBuf;

/// Errors from reading melody input.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no transcription found for {0}")]
    MissingTranscription(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
