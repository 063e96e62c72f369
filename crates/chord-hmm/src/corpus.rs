//! Corpus loading and model building.
//!
//! A corpus is a set of songs, each a time-ordered list of chord
//! annotations. From it we derive the chord vocabulary, the chord-to-chord
//! transition matrix, and (with a [`PitchTable`]) the base emission matrix.

use std::path::{Path, PathBuf};

use melody_notes::{melody_from_midi, NoteEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chord::Chord;
use crate::matrix::ProbabilityMatrix;
use crate::pitch_table::PitchTable;
use crate::vocabulary::{ChordId, Vocabulary};
use crate::{Error, ModelParams, Result, MODEL_VERSION};

/// Sentinel label opening every song in diagnostic output.
pub const START_SENTINEL: &str = "start_chord";
/// Sentinel label closing every song in diagnostic output.
pub const END_SENTINEL: &str = "end_chord";

/// Per-song chord annotation file inside a corpus song directory.
pub const CHORD_FILE: &str = "chord_midi.txt";

/// One annotated chord span, label as written in the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub start: f64,
    pub end: f64,
    pub label: String,
}

impl Annotation {
    pub fn new(start: f64, end: f64, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: u32,
    /// Directory name the song was loaded from (`"001"`).
    pub name: String,
    pub annotations: Vec<Annotation>,
}

impl Song {
    pub fn new(id: u32, annotations: Vec<Annotation>) -> Self {
        Self {
            id,
            name: id.to_string(),
            annotations,
        }
    }

    /// Chords in time order, with no-chord spans dropped and labels
    /// normalized. Unrecognized labels are skipped with a warning.
    pub fn chords(&self) -> Vec<Chord> {
        self.chord_spans().into_iter().map(|(_, _, c)| c).collect()
    }

    /// `(start, end, chord)` for every recognized chord, sorted by start.
    pub fn chord_spans(&self) -> Vec<(f64, f64, Chord)> {
        let mut spans: Vec<(f64, f64, Chord)> = self
            .annotations
            .iter()
            .filter_map(|a| match Chord::from_label(&a.label) {
                Ok(chord) => chord.map(|c| (a.start, a.end, c)),
                Err(_) => {
                    warn!(song = self.id, label = %a.label, "skipping unrecognized chord label");
                    None
                }
            })
            .collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));
        spans
    }
}

/// Parse tab-separated `start<TAB>end<TAB>label` rows.
///
/// `source` names the input in error messages.
pub fn parse_chord_rows(text: &str, source: &str) -> Result<Vec<Annotation>> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = |reason: String| Error::MalformedRow {
            source_name: source.to_string(),
            line: idx + 1,
            reason,
        };

        let cells: Vec<&str> = line.split('\t').map(str::trim).collect();
        let [start, end, label] = cells[..] else {
            return Err(malformed(format!("expected 3 tab-separated columns, found {}", cells.len())));
        };
        if label.is_empty() {
            return Err(malformed("empty chord label".into()));
        }

        let start: f64 = start
            .parse()
            .map_err(|_| malformed(format!("bad start time {start:?}")))?;
        let end: f64 = end
            .parse()
            .map_err(|_| malformed(format!("bad end time {end:?}")))?;

        rows.push(Annotation::new(start, end, label));
    }
    Ok(rows)
}

/// Load every song of a corpus directory.
///
/// Each numerically named subdirectory holds one song's [`CHORD_FILE`].
/// Anything else in the directory is ignored. Songs come back in numeric
/// order so ids are stable across runs.
pub fn load_corpus_dir(dir: &Path) -> Result<Vec<Song>> {
    let mut songs = Vec::new();
    for (id, name, path) in song_dirs(dir)? {
        let file = path.join(CHORD_FILE);
        let text = std::fs::read_to_string(&file).map_err(|source| Error::Io {
            path: file.clone(),
            source,
        })?;
        let annotations = parse_chord_rows(&text, &file.display().to_string())?;
        songs.push(Song {
            id,
            name,
            annotations,
        });
    }

    if songs.is_empty() {
        return Err(Error::EmptyCorpus);
    }
    info!(dir = %dir.display(), songs = songs.len(), "loaded chord corpus");
    Ok(songs)
}

/// Melody of a corpus song, read from `<dir>/<name>/<name>.mid`.
pub fn load_song_melody(dir: &Path, song: &Song) -> Result<Vec<NoteEvent>> {
    let path = dir.join(&song.name).join(format!("{}.mid", song.name));
    let bytes = std::fs::read(&path).map_err(|source| Error::Io {
        path: path.clone(),
        source,
    })?;
    Ok(melody_from_midi(&bytes)?)
}

fn song_dirs(dir: &Path) -> Result<Vec<(u32, String, PathBuf)>> {
    let entries = std::fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            continue;
        };
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            debug!(name, "skipping non-song directory");
            continue;
        }
        if let Ok(id) = name.parse::<u32>() {
            found.push((id, name, path));
        }
    }
    found.sort_by_key(|(id, _, _)| *id);
    Ok(found)
}

/// Everything inference needs from the corpus. Built once, then read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusModel {
    /// Model layout version; cache entries from other versions are ignored.
    pub version: u32,
    /// Content hash of the corpus and parameters the model was built from.
    pub fingerprint: String,
    pub songs: usize,
    pub vocabulary: Vocabulary,
    /// Per-song normalized chord transitions; the decoder's transition model.
    pub transitions: ProbabilityMatrix,
    /// Plain count transitions. Diagnostic only.
    pub raw_transitions: ProbabilityMatrix,
    /// Smoothed pitch-class distribution per chord, `|vocabulary|` × 12.
    pub emission: ProbabilityMatrix,
}

impl CorpusModel {
    pub fn transition(&self, from: ChordId, to: ChordId) -> f64 {
        self.transitions.get(from.index(), to.index())
    }

    pub fn emission_row(&self, chord: ChordId) -> &[f64] {
        self.emission.row(chord.index())
    }

    /// Confirm every matrix is shaped for the vocabulary. Models read back
    /// from storage go through this before use.
    pub fn validate(&self) -> Result<()> {
        let k = self.vocabulary.len();
        self.transitions.expect_shape("transition matrix", k, k)?;
        self.raw_transitions.expect_shape("raw transition matrix", k, k)?;
        self.emission.expect_shape("emission matrix", k, 12)?;
        Ok(())
    }

    /// Both transition variants as percentage CSVs: `(normalized, raw)`.
    pub fn transition_csvs(&self) -> Result<(String, String)> {
        let labels = self.vocabulary.labels();
        Ok((
            self.transitions.to_percent_csv(&labels, &labels)?,
            self.raw_transitions.to_percent_csv(&labels, &labels)?,
        ))
    }
}

/// Builds a [`CorpusModel`] from songs and a pitch table.
#[derive(Debug, Clone, Default)]
pub struct CorpusBuilder {
    params: ModelParams,
}

impl CorpusBuilder {
    pub fn new(params: ModelParams) -> Self {
        Self { params }
    }

    /// Pure function of `(songs, pitch_table, params)`.
    pub fn build(&self, songs: &[Song], pitch_table: &PitchTable) -> Result<CorpusModel> {
        let sequences: Vec<Vec<Chord>> = songs.iter().map(Song::chords).collect();

        let vocabulary = Vocabulary::new(sequences.iter().flatten().copied());
        if vocabulary.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let (weighted, raw) = count_transitions(&vocabulary, &sequences);
        let transitions = drop_sentinels(&vocabulary, weighted)?;
        let raw_transitions = drop_sentinels(&vocabulary, raw)?;
        let emission = self.emission_matrix(&vocabulary, pitch_table)?;

        let model = CorpusModel {
            version: MODEL_VERSION,
            fingerprint: self.fingerprint(songs, pitch_table),
            songs: songs.len(),
            vocabulary,
            transitions,
            raw_transitions,
            emission,
        };

        info!(
            songs = model.songs,
            vocabulary = model.vocabulary.len(),
            fingerprint = %model.fingerprint,
            "corpus model built"
        );
        Ok(model)
    }

    /// Pitch-table counts plus `smoothing` in every cell, row-normalized.
    /// Chords the table never saw get the smoothing mass alone.
    fn emission_matrix(&self, vocabulary: &Vocabulary, table: &PitchTable) -> Result<ProbabilityMatrix> {
        let mut missing = 0usize;
        let mut weights = Vec::with_capacity(vocabulary.len() * 12);
        for (_, chord) in vocabulary.iter() {
            let counts = table.counts(&chord).copied().unwrap_or_else(|| {
                missing += 1;
                [0.0; 12]
            });
            weights.extend(counts.iter().map(|c| c + self.params.smoothing));
        }
        if missing > 0 {
            warn!(missing, "chords without pitch-table counts get a flat emission row");
        }
        ProbabilityMatrix::from_weights(vocabulary.len(), 12, weights)
    }

    /// Content hash of the inputs [`build`](Self::build) would consume.
    /// Lets callers probe a model cache before building.
    pub fn fingerprint(&self, songs: &[Song], table: &PitchTable) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.params.smoothing.to_le_bytes());
        for song in songs {
            hasher.update(&song.id.to_le_bytes());
            for a in &song.annotations {
                hasher.update(&a.start.to_le_bytes());
                hasher.update(&a.end.to_le_bytes());
                hasher.update(a.label.as_bytes());
                hasher.update(&[0]);
            }
        }
        for (chord, counts) in table.iter() {
            hasher.update(chord.to_string().as_bytes());
            for c in counts {
                hasher.update(&c.to_le_bytes());
            }
        }
        hex::encode(&hasher.finalize().as_bytes()[..16])
    }
}

/// Transition weights over `vocabulary` plus two sentinel states.
///
/// Index `k` is the start sentinel and `k + 1` the end sentinel. Each song
/// contributes `start → c0 → … → cn → end`. The weighted variant scales
/// every pair by `1 / (n + 2)` so long songs don't dominate; the raw variant
/// counts 1 per pair. Pairs never cross song boundaries.
fn count_transitions(vocabulary: &Vocabulary, sequences: &[Vec<Chord>]) -> (Vec<f64>, Vec<f64>) {
    let k = vocabulary.len();
    let n = k + 2;
    let start = k;
    let end = k + 1;

    let mut weighted = vec![0.0; n * n];
    let mut raw = vec![0.0; n * n];

    for chords in sequences.iter().filter(|s| !s.is_empty()) {
        let states: Vec<usize> = std::iter::once(start)
            .chain(
                chords
                    .iter()
                    .filter_map(|c| vocabulary.id_of(c))
                    .map(ChordId::index),
            )
            .chain(std::iter::once(end))
            .collect();

        let scale = 1.0 / states.len() as f64;
        for pair in states.windows(2) {
            let cell = pair[0] * n + pair[1];
            weighted[cell] += scale;
            raw[cell] += 1.0;
        }
    }

    (weighted, raw)
}

/// Drop the sentinel rows and columns and row-normalize what remains.
fn drop_sentinels(vocabulary: &Vocabulary, counts: Vec<f64>) -> Result<ProbabilityMatrix> {
    let k = vocabulary.len();
    let n = k + 2;
    let values = (0..k)
        .flat_map(|r| counts[r * n..r * n + k].to_vec())
        .collect();
    ProbabilityMatrix::from_weights(k, k, values)
}
