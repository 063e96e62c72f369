use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chord::Chord;
use crate::corpus::CorpusModel;
use crate::matrix::ProbabilityMatrix;
use crate::theory::NoteName;
use crate::vocabulary::{ChordId, Vocabulary};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl KeyMode {
    /// `(letter steps, semitones)` of each scale degree above the tonic.
    /// Minor is natural minor.
    fn degrees(self) -> [(usize, i32); 7] {
        match self {
            KeyMode::Major => [(0, 0), (1, 2), (2, 4), (3, 5), (4, 7), (5, 9), (6, 11)],
            KeyMode::Minor => [(0, 0), (1, 2), (2, 3), (3, 5), (4, 7), (5, 8), (6, 10)],
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// Tonic and mode of the input melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyContext {
    pub tonic: NoteName,
    pub mode: KeyMode,
}

impl KeyContext {
    pub fn new(tonic: NoteName, mode: KeyMode) -> Self {
        Self { tonic, mode }
    }

    /// The seven scale tones spelled from the tonic.
    pub fn scale_tones(&self) -> Vec<NoteName> {
        self.mode
            .degrees()
            .iter()
            .map(|&(steps, semitones)| {
                self.tonic.above(steps, semitones).unwrap_or_else(|| {
                    NoteName::sharp_spelling(melody_notes::PitchClass::from_semitone(
                        self.tonic.pitch_class().index() as i32 + semitones,
                    ))
                })
            })
            .collect()
    }
}

impl fmt::Display for KeyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

/// Scale tones of a key together with every enharmonic spelling of them,
/// so `Db` passes in a key spelled with `C#` and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleSet {
    key: KeyContext,
    spellings: BTreeSet<NoteName>,
}

impl ScaleSet {
    pub fn new(key: KeyContext) -> Self {
        let spellings = key
            .scale_tones()
            .into_iter()
            .flat_map(NoteName::enharmonics)
            .collect();
        Self { key, spellings }
    }

    pub fn key(&self) -> KeyContext {
        self.key
    }

    pub fn contains(&self, note: NoteName) -> bool {
        self.spellings.contains(&note)
    }

    /// Root, third and fifth all in the scale.
    pub fn accepts(&self, chord: &Chord) -> bool {
        chord.components().iter().all(|n| self.contains(*n))
    }

    /// Ids of the chords of `vocabulary` this scale accepts, in order.
    pub fn filter(&self, vocabulary: &Vocabulary) -> Vec<ChordId> {
        vocabulary
            .iter()
            .filter(|(_, chord)| self.accepts(chord))
            .map(|(id, _)| id)
            .collect()
    }
}

/// The corpus model cut down to the chords that fit one song's key.
///
/// Vocabulary, transition rows and columns, and emission rows are selected
/// together from the same id list, so `ChordId`s of this vocabulary index
/// both matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedModel {
    pub key: KeyContext,
    pub vocabulary: Vocabulary,
    /// Id of each chord in the corpus vocabulary.
    pub corpus_ids: Vec<ChordId>,
    pub transitions: ProbabilityMatrix,
    /// `|vocabulary|` × 12 pitch-class distributions.
    pub emission: ProbabilityMatrix,
}

impl KeyedModel {
    /// Restrict `model` to the chords `scale` accepts. Transition rows are
    /// renormalized over the surviving chords.
    pub fn restrict(model: &CorpusModel, scale: &ScaleSet) -> Result<Self> {
        let ids = scale.filter(&model.vocabulary);
        let indices: Vec<usize> = ids.iter().map(|id| id.index()).collect();

        let vocabulary = model.vocabulary.subset(&ids);
        let transitions = model.transitions.select(&indices, &indices)?;
        let emission = model.emission.select_rows(&indices)?;

        let keyed = Self {
            key: scale.key(),
            vocabulary,
            corpus_ids: ids,
            transitions,
            emission,
        };
        keyed.check_alignment()?;

        debug!(chords = ?keyed.vocabulary.labels(), "key-filtered vocabulary");
        info!(
            key = %keyed.key,
            kept = keyed.vocabulary.len(),
            of = model.vocabulary.len(),
            "filtered chord vocabulary by key"
        );
        Ok(keyed)
    }

    fn check_alignment(&self) -> Result<()> {
        let k = self.vocabulary.len();
        self.transitions.expect_shape("key-filtered transitions", k, k)?;
        self.emission.expect_shape("key-filtered emission", k, 12)?;
        if self.corpus_ids.len() != k {
            return Err(crate::Error::DimensionMismatch {
                what: "key-filtered id map",
                expected: k,
                found: self.corpus_ids.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(tonic: &str, mode: KeyMode) -> KeyContext {
        KeyContext::new(tonic.parse().unwrap(), mode)
    }

    fn chord(label: &str) -> Chord {
        label.parse().unwrap()
    }

    fn names(notes: Vec<NoteName>) -> Vec<String> {
        notes.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn scale_spelling() {
        assert_eq!(
            names(key("D", KeyMode::Major).scale_tones()),
            vec!["D", "E", "F#", "G", "A", "B", "C#"]
        );
        assert_eq!(
            names(key("C", KeyMode::Minor).scale_tones()),
            vec!["C", "D", "Eb", "F", "G", "Ab", "Bb"]
        );
    }

    #[test]
    fn diatonic_triads_accepted() {
        let scale = ScaleSet::new(key("C", KeyMode::Major));
        for label in ["C:maj", "D:min", "E:min", "F:maj", "G:maj", "A:min", "B:dim", "G:7"] {
            assert!(scale.accepts(&chord(label)), "{label}");
        }
        for label in ["D:maj", "Bb:maj", "C:min", "E:maj"] {
            assert!(!scale.accepts(&chord(label)), "{label}");
        }
    }

    #[test]
    fn sharp_key_accepts_flat_spellings() {
        // C# major holds every pitch class of Db major
        let scale = ScaleSet::new(key("C#", KeyMode::Major));
        assert!(scale.accepts(&chord("Db:maj")));
        assert!(scale.accepts(&chord("Gb:maj")));
        assert!(scale.accepts(&chord("Bb:min")));
        assert!(scale.contains("F".parse().unwrap()));
    }

    #[test]
    fn flat_key_accepts_sharp_spellings() {
        let scale = ScaleSet::new(key("Db", KeyMode::Major));
        assert!(scale.accepts(&chord("C#:maj")));
        assert!(scale.accepts(&chord("F#:maj")));
        assert!(scale.accepts(&chord("A#:min")));
    }

    #[test]
    fn filter_is_idempotent() {
        let vocab = Vocabulary::new(
            ["C:maj", "C#:maj", "D:min", "E:maj", "F:maj", "G:maj", "A:min", "Bb:maj"]
                .map(chord),
        );
        let scale = ScaleSet::new(key("C", KeyMode::Major));
        let once = vocab.subset(&scale.filter(&vocab));
        let twice = once.subset(&scale.filter(&once));
        assert_eq!(once, twice);
        assert_eq!(once.labels(), vec!["C:maj", "D:min", "F:maj", "G:maj", "A:min"]);
    }
}
