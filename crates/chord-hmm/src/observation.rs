//! Per-measure melodic evidence.
//!
//! Each measure's pitch-class histogram is scored against every candidate
//! chord's emission row (dot product with the row's log2), giving an
//! `N × K` log-likelihood table. The decoder consumes the transpose, with
//! each chord's row softmaxed across measures, so measure indices act as
//! the observation symbols of a categorical HMM.

use melody_notes::PitchClass;
use tracing::debug;

use crate::matrix::ProbabilityMatrix;
use crate::segment::Measure;
use crate::vocabulary::ChordId;
use crate::{Error, Result};

/// Normalized pitch-class histogram with `epsilon` added to every bin.
///
/// An empty measure gives `epsilon` everywhere, which scores all chords
/// alike.
pub fn histogram(pitch_classes: &[PitchClass], epsilon: f64) -> [f64; 12] {
    let mut hist = [0.0; 12];
    for pc in pitch_classes {
        hist[pc.index()] += 1.0;
    }
    let len = pitch_classes.len();
    for h in &mut hist {
        if len > 0 {
            *h /= len as f64;
        }
        *h += epsilon;
    }
    hist
}

/// Log-likelihood scores and the emission matrix derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureEvidence {
    /// `scores[m][k]`: log2-likelihood of measure `m` under chord `k`.
    scores: Vec<Vec<f64>>,
    /// `K × N`; row `k` is chord `k`'s softmax over measures.
    emission: ProbabilityMatrix,
}

impl MeasureEvidence {
    /// Score `measures` against a `K × 12` pitch-class emission matrix.
    pub fn new(measures: &[Measure], chord_emission: &ProbabilityMatrix, epsilon: f64) -> Result<Self> {
        if chord_emission.cols() != 12 {
            return Err(Error::DimensionMismatch {
                what: "pitch-class emission columns",
                expected: 12,
                found: chord_emission.cols(),
            });
        }
        let k = chord_emission.rows();

        let log_rows: Vec<[f64; 12]> = (0..k)
            .map(|r| {
                let mut logs = [0.0; 12];
                for (l, p) in logs.iter_mut().zip(chord_emission.row(r)) {
                    *l = p.log2();
                }
                logs
            })
            .collect();

        let scores: Vec<Vec<f64>> = measures
            .iter()
            .map(|measure| {
                let hist = histogram(&measure.pitch_classes, epsilon);
                log_rows
                    .iter()
                    .map(|logs| hist.iter().zip(logs).map(|(h, l)| h * l).sum())
                    .collect()
            })
            .collect();

        let emission = transposed_softmax(&scores, k);
        debug!(measures = measures.len(), chords = k, "scored measures");

        Ok(Self { scores, emission })
    }

    pub fn measures(&self) -> usize {
        self.scores.len()
    }

    pub fn scores(&self) -> &[Vec<f64>] {
        &self.scores
    }

    /// `K × N` emission matrix for the decoder.
    pub fn emission(&self) -> &ProbabilityMatrix {
        &self.emission
    }

    pub fn into_emission(self) -> ProbabilityMatrix {
        self.emission
    }

    /// Softmax over chords of one measure's scores. Diagnostic view of how
    /// strongly the melody alone points at each chord.
    pub fn measure_distribution(&self, measure: usize) -> Option<Vec<f64>> {
        self.scores.get(measure).map(|row| softmax(row))
    }

    /// Highest-scoring chord for each measure, ignoring transitions.
    pub fn best_per_measure(&self) -> Vec<Option<ChordId>> {
        self.scores
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
                        Some((_, b)) if b >= s => best,
                        _ => Some((i, s)),
                    })
                    .map(|(i, _)| ChordId(i))
            })
            .collect()
    }
}

/// Transpose `N × K` scores and softmax each chord's row across measures.
/// NaN from degenerate rows becomes 0.
fn transposed_softmax(scores: &[Vec<f64>], k: usize) -> ProbabilityMatrix {
    let n = scores.len();
    let mut values = Vec::with_capacity(k * n);
    for chord in 0..k {
        let row: Vec<f64> = scores.iter().map(|m| m[chord]).collect();
        values.extend(softmax(&row));
    }
    ProbabilityMatrix::from_softmax_rows(k, n, values)
}

/// Max-shifted softmax. Non-finite outputs are zeroed.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter()
        .map(|e| {
            let p = e / total;
            if p.is_finite() {
                p
            } else {
                0.0
            }
        })
        .collect()
}
