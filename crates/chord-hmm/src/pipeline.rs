use std::path::Path;
use std::sync::Arc;

use beat_grid::{load_wav, TimingAnalyzer, Waveform};
use melody_notes::{NoteEvent, Transcriber};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chord::Chord;
use crate::corpus::CorpusModel;
use crate::decoder::ChordHmm;
use crate::key::{KeyDetection, KeyEstimator, ProfileKeyEstimator};
use crate::observation::MeasureEvidence;
use crate::scale::{KeyContext, KeyedModel, ScaleSet};
use crate::segment::{segment_melody, Measure};
use crate::{ModelParams, Result};

/// Chords for a segmented melody in a known key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harmonization {
    /// Key-filtered vocabulary the decoder chose from.
    pub vocabulary: Vec<Chord>,
    /// One chord per measure.
    pub chords: Vec<Chord>,
    pub log_probability: f64,
}

/// Everything one inference run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceReport {
    pub tempo_bpm: f64,
    pub first_downbeat: f64,
    pub key: KeyDetection,
    pub measures: Vec<Measure>,
    pub vocabulary: Vec<Chord>,
    pub chords: Vec<Chord>,
    pub log_probability: f64,
}

/// Filter by key, score the measures, decode.
pub fn harmonize(
    model: &CorpusModel,
    key: KeyContext,
    measures: &[Measure],
    params: &ModelParams,
) -> Result<Harmonization> {
    let keyed = KeyedModel::restrict(model, &ScaleSet::new(key))?;
    let evidence = MeasureEvidence::new(measures, &keyed.emission, params.epsilon)?;
    let hmm = ChordHmm::new(keyed.vocabulary, &keyed.transitions, evidence.emission())?;
    let (chords, log_probability) = hmm.decode_measures(measures.len())?;

    Ok(Harmonization {
        vocabulary: hmm.vocabulary().chords().to_vec(),
        chords,
        log_probability,
    })
}

/// Audio + melody → chord per measure, against a fixed corpus model.
pub struct InferencePipeline<'m> {
    model: &'m CorpusModel,
    timing: TimingAnalyzer,
    key_estimator: Arc<dyn KeyEstimator>,
    params: ModelParams,
}

impl<'m> InferencePipeline<'m> {
    /// Create with the profile-correlation key estimator.
    pub fn new(model: &'m CorpusModel, timing: TimingAnalyzer, params: ModelParams) -> Self {
        Self::with_key_estimator(model, timing, params, Arc::new(ProfileKeyEstimator))
    }

    pub fn with_key_estimator(
        model: &'m CorpusModel,
        timing: TimingAnalyzer,
        params: ModelParams,
        key_estimator: Arc<dyn KeyEstimator>,
    ) -> Self {
        Self {
            model,
            timing,
            key_estimator,
            params,
        }
    }

    /// Load the recording, get its melody from `transcriber`, and infer.
    pub fn run(&self, audio_path: &Path, transcriber: &dyn Transcriber) -> Result<InferenceReport> {
        let waveform = load_wav(audio_path)?;
        let notes = transcriber.transcribe(audio_path)?;
        self.infer(&waveform, &notes)
    }

    pub fn infer(&self, waveform: &Waveform, notes: &[NoteEvent]) -> Result<InferenceReport> {
        let grid = self.timing.analyze(waveform)?;
        let measures = segment_melody(notes, &grid.measures);
        let key = self.key_estimator.estimate(notes);

        info!(
            measures = measures.len(),
            empty = measures.iter().filter(|m| m.is_empty()).count(),
            key = %key.key,
            "melody segmented"
        );

        let harmonization = harmonize(self.model, key.key, &measures, &self.params)?;

        info!(
            chords = harmonization.chords.len(),
            log_probability = harmonization.log_probability,
            "chord sequence decoded"
        );

        Ok(InferenceReport {
            tempo_bpm: grid.tempo_bpm,
            first_downbeat: grid.first_downbeat().unwrap_or_default(),
            key,
            measures,
            vocabulary: harmonization.vocabulary,
            chords: harmonization.chords,
            log_probability: harmonization.log_probability,
        })
    }
}
