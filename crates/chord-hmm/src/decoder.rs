//! Viterbi decoding over the key-filtered chord vocabulary.
//!
//! Hidden states are chords. The observation alphabet is the measure index:
//! the emission matrix is `K × N` and the observed sequence is `0..N`, so all
//! melodic evidence is carried by the emission rows (see
//! [`crate::observation`]). Start probabilities are uniform.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chord::Chord;
use crate::matrix::ProbabilityMatrix;
use crate::vocabulary::{ChordId, Vocabulary};
use crate::{Error, Result};

/// Most likely state path and its natural-log probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedPath {
    pub states: Vec<ChordId>,
    pub log_probability: f64,
}

/// Categorical HMM over chords.
#[derive(Debug, Clone)]
pub struct ChordHmm {
    vocabulary: Vocabulary,
    log_start: Vec<f64>,
    log_transitions: Vec<f64>,
    log_emission: Vec<f64>,
    symbols: usize,
}

impl ChordHmm {
    /// Assemble the model. Fails if fewer than two chords survive key
    /// filtering or any matrix is not sized for the vocabulary.
    pub fn new(
        vocabulary: Vocabulary,
        transitions: &ProbabilityMatrix,
        emission: &ProbabilityMatrix,
    ) -> Result<Self> {
        let k = vocabulary.len();
        if k < 2 {
            return Err(Error::VocabularyTooSmall { size: k });
        }
        transitions.expect_shape("transition matrix", k, k)?;
        if emission.rows() != k {
            return Err(Error::DimensionMismatch {
                what: "emission rows",
                expected: k,
                found: emission.rows(),
            });
        }

        let symbols = emission.cols();
        let log_start = vec![(1.0 / k as f64).ln(); k];
        let log_transitions = (0..k)
            .flat_map(|r| transitions.row(r).iter().map(|p| p.ln()))
            .collect();
        let log_emission = (0..k)
            .flat_map(|r| emission.row(r).iter().map(|p| p.ln()))
            .collect();

        Ok(Self {
            vocabulary,
            log_start,
            log_transitions,
            log_emission,
            symbols,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn states(&self) -> usize {
        self.vocabulary.len()
    }

    /// Viterbi decode an observation sequence.
    ///
    /// Ties between predecessors go to the lowest state index, and ties
    /// between final states likewise, so equal inputs always give the same
    /// path.
    pub fn decode(&self, observations: &[usize]) -> Result<DecodedPath> {
        let k = self.states();
        let t_len = observations.len();
        if t_len == 0 {
            return Ok(DecodedPath {
                states: Vec::new(),
                log_probability: 0.0,
            });
        }
        if let Some(&bad) = observations.iter().find(|&&o| o >= self.symbols) {
            return Err(Error::ObservationOutOfRange {
                symbol: bad,
                symbols: self.symbols,
            });
        }

        let emit = |state: usize, symbol: usize| self.log_emission[state * self.symbols + symbol];
        let trans = |from: usize, to: usize| self.log_transitions[from * k + to];

        let mut delta: Vec<f64> = (0..k)
            .map(|s| self.log_start[s] + emit(s, observations[0]))
            .collect();
        let mut backpointers: Vec<Vec<usize>> = Vec::with_capacity(t_len.saturating_sub(1));

        for &obs in &observations[1..] {
            let mut next = vec![f64::NEG_INFINITY; k];
            let mut psi = vec![0usize; k];
            for (s, (slot, back)) in next.iter_mut().zip(psi.iter_mut()).enumerate() {
                let mut best_prev = 0;
                let mut best_score = delta[0] + trans(0, s);
                for prev in 1..k {
                    let score = delta[prev] + trans(prev, s);
                    if score > best_score {
                        best_score = score;
                        best_prev = prev;
                    }
                }
                *slot = best_score + emit(s, obs);
                *back = best_prev;
            }
            delta = next;
            backpointers.push(psi);
        }

        let mut last = 0;
        for s in 1..k {
            if delta[s] > delta[last] {
                last = s;
            }
        }
        let log_probability = delta[last];

        let mut path = vec![last; t_len];
        for t in (0..t_len - 1).rev() {
            path[t] = backpointers[t][path[t + 1]];
        }

        debug!(measures = t_len, log_probability, "viterbi decode");
        Ok(DecodedPath {
            states: path.into_iter().map(ChordId).collect(),
            log_probability,
        })
    }

    /// Decode the measure-index sequence `0..measures` and name the chords.
    pub fn decode_measures(&self, measures: usize) -> Result<(Vec<Chord>, f64)> {
        let observations: Vec<usize> = (0..measures).collect();
        let path = self.decode(&observations)?;
        let chords = path
            .states
            .iter()
            .map(|&id| {
                self.vocabulary.chord(id).ok_or(Error::DimensionMismatch {
                    what: "decoded state",
                    expected: self.states(),
                    found: id.index(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((chords, path.log_probability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vocab(labels: &[&str]) -> Vocabulary {
        Vocabulary::new(labels.iter().map(|l| l.parse::<Chord>().unwrap()))
    }

    fn matrix(rows: usize, cols: usize, values: &[f64]) -> ProbabilityMatrix {
        ProbabilityMatrix::from_weights(rows, cols, values.to_vec()).unwrap()
    }

    #[test]
    fn path_length_equals_observations() {
        let hmm = ChordHmm::new(
            vocab(&["C:maj", "G:maj", "A:min"]),
            &matrix(3, 3, &[1.0; 9]),
            &matrix(3, 5, &[1.0; 15]),
        )
        .unwrap();
        let path = hmm.decode(&[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(path.states.len(), 5);
        assert!(path.states.iter().all(|s| s.index() < 3));
    }

    #[test]
    fn follows_emission_evidence() {
        let hmm = ChordHmm::new(
            vocab(&["C:maj", "G:maj"]),
            &matrix(2, 2, &[0.5, 0.5, 0.5, 0.5]),
            &matrix(2, 3, &[0.8, 0.1, 0.8, 0.1, 0.8, 0.1]),
        )
        .unwrap();
        let path = hmm.decode(&[0, 1, 2]).unwrap();
        assert_eq!(path.states, vec![ChordId(0), ChordId(1), ChordId(0)]);
    }

    #[test]
    fn transitions_can_override_weak_evidence() {
        // C strongly prefers staying on C
        let hmm = ChordHmm::new(
            vocab(&["C:maj", "G:maj"]),
            &matrix(2, 2, &[0.95, 0.05, 0.5, 0.5]),
            &matrix(2, 2, &[0.9, 0.45, 0.1, 0.55]),
        )
        .unwrap();
        let path = hmm.decode(&[0, 1]).unwrap();
        assert_eq!(path.states, vec![ChordId(0), ChordId(0)]);
    }

    #[test]
    fn ties_go_to_first_state() {
        let hmm = ChordHmm::new(
            vocab(&["C:maj", "G:maj"]),
            &matrix(2, 2, &[1.0; 4]),
            &matrix(2, 2, &[1.0; 4]),
        )
        .unwrap();
        let path = hmm.decode(&[0, 1]).unwrap();
        assert_eq!(path.states, vec![ChordId(0), ChordId(0)]);
    }

    #[test]
    fn log_probability_of_known_path() {
        let hmm = ChordHmm::new(
            vocab(&["C:maj", "G:maj"]),
            &matrix(2, 2, &[0.9, 0.1, 0.1, 0.9]),
            &matrix(2, 1, &[1.0, 1.0]),
        )
        .unwrap();
        let path = hmm.decode(&[0]).unwrap();
        assert!((path.log_probability - 0.5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn decoding_is_deterministic() {
        let hmm = ChordHmm::new(
            vocab(&["C:maj", "F:maj", "G:maj"]),
            &matrix(3, 3, &[2.0, 1.0, 1.0, 1.0, 2.0, 1.0, 1.0, 1.0, 2.0]),
            &matrix(3, 4, &[3.0, 1.0, 2.0, 1.0, 1.0, 3.0, 1.0, 2.0, 2.0, 2.0, 3.0, 1.0]),
        )
        .unwrap();
        let first = hmm.decode(&[0, 1, 2, 3]).unwrap();
        for _ in 0..5 {
            assert_eq!(hmm.decode(&[0, 1, 2, 3]).unwrap(), first);
        }
    }

    #[test]
    fn single_chord_vocabulary_rejected() {
        let result = ChordHmm::new(vocab(&["C:maj"]), &matrix(1, 1, &[1.0]), &matrix(1, 2, &[1.0, 1.0]));
        assert!(matches!(result, Err(Error::VocabularyTooSmall { size: 1 })));
    }

    #[test]
    fn empty_vocabulary_rejected() {
        let result = ChordHmm::new(Vocabulary::default(), &matrix(0, 0, &[]), &matrix(0, 2, &[]));
        assert!(matches!(result, Err(Error::VocabularyTooSmall { size: 0 })));
    }

    #[test]
    fn mismatched_transitions_rejected() {
        let result = ChordHmm::new(
            vocab(&["C:maj", "G:maj"]),
            &matrix(3, 3, &[1.0; 9]),
            &matrix(2, 2, &[1.0; 4]),
        );
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn observation_out_of_range() {
        let hmm = ChordHmm::new(
            vocab(&["C:maj", "G:maj"]),
            &matrix(2, 2, &[1.0; 4]),
            &matrix(2, 2, &[1.0; 4]),
        )
        .unwrap();
        assert!(matches!(hmm.decode(&[0, 2]), Err(Error::ObservationOutOfRange { .. })));
    }
}
