use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chord::Chord;

/// Index of a chord within one particular [`Vocabulary`].
///
/// Ids are only meaningful against the vocabulary that issued them; matrix
/// rows and columns for that vocabulary are addressed by the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChordId(pub usize);

impl ChordId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ChordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered, de-duplicated chord set shared by every matrix built over it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    chords: Vec<Chord>,
}

impl Vocabulary {
    /// Sorted, de-duplicated vocabulary. Input order doesn't matter.
    pub fn new(chords: impl IntoIterator<Item = Chord>) -> Self {
        let set: BTreeSet<Chord> = chords.into_iter().collect();
        Self {
            chords: set.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn chord(&self, id: ChordId) -> Option<Chord> {
        self.chords.get(id.0).copied()
    }

    pub fn id_of(&self, chord: &Chord) -> Option<ChordId> {
        self.chords.binary_search(chord).ok().map(ChordId)
    }

    pub fn contains(&self, chord: &Chord) -> bool {
        self.id_of(chord).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = ChordId> {
        (0..self.chords.len()).map(ChordId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChordId, Chord)> + '_ {
        self.chords.iter().enumerate().map(|(i, c)| (ChordId(i), *c))
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn labels(&self) -> Vec<String> {
        self.chords.iter().map(ToString::to_string).collect()
    }

    /// Sub-vocabulary of the given ids, keeping this vocabulary's order.
    ///
    /// Because both vocabularies are sorted, position `i` of the result is
    /// the chord at `ids[i]` once `ids` is sorted, which is what matrix
    /// sub-selection relies on.
    pub fn subset(&self, ids: &[ChordId]) -> Self {
        Self::new(ids.iter().filter_map(|&id| self.chord(id)))
    }
}
