use std::path::{Path, PathBuf};

use crate::midi::melody_from_midi;
use crate::note::NoteEvent;
use crate::{Error, Result};

/// Turns a vocal recording into melody note events.
///
/// The pitch-transcription model lives outside this workspace; implementors
/// adapt whatever it produces. Returned notes are ordered by onset and never
/// include zero-velocity events.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio_path: &Path) -> Result<Vec<NoteEvent>>;
}

/// Reads the MIDI file written by the external transcription model.
///
/// With no explicit path, looks next to the audio for a file of the same stem
/// with a `.mid` extension (`take1.wav` → `take1.mid`).
#[derive(Debug, Clone, Default)]
pub struct MidiTranscription {
    midi_path: Option<PathBuf>,
}

impl MidiTranscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_path(midi_path: impl Into<PathBuf>) -> Self {
        Self {
            midi_path: Some(midi_path.into()),
        }
    }

    fn resolve(&self, audio_path: &Path) -> Result<PathBuf> {
        let candidate = self
            .midi_path
            .clone()
            .unwrap_or_else(|| audio_path.with_extension("mid"));

        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(Error::MissingTranscription(candidate))
        }
    }
}

impl Transcriber for MidiTranscription {
    fn transcribe(&self, audio_path: &Path) -> Result<Vec<NoteEvent>> {
        let path = self.resolve(audio_path)?;
        let bytes = std::fs::read(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        let notes: Vec<NoteEvent> = melody_from_midi(&bytes)?
            .into_iter()
            .filter(NoteEvent::is_sounding)
            .collect();

        tracing::info!(path = %path.display(), notes = notes.len(), "loaded transcription");
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi_writer::melody_to_midi;
    use tempfile::TempDir;

    #[test]
    fn sibling_midi_is_found_from_audio_path() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("take1.wav");
        let midi = dir.path().join("take1.mid");
        std::fs::write(&midi, melody_to_midi(&[NoteEvent::new(0.0, 0.5, 62, 70)], 120.0)).unwrap();

        let notes = MidiTranscription::new().transcribe(&audio).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 62);
    }

    #[test]
    fn missing_midi_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = MidiTranscription::new()
            .transcribe(&dir.path().join("nothing.wav"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingTranscription(_)));
    }

    #[test]
    fn explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let midi = dir.path().join("elsewhere.mid");
        std::fs::write(&midi, melody_to_midi(&[NoteEvent::new(0.0, 0.5, 65, 70)], 90.0)).unwrap();

        let notes = MidiTranscription::at_path(&midi)
            .transcribe(Path::new("/does/not/matter.wav"))
            .unwrap();
        assert_eq!(notes[0].pitch, 65);
    }
}
