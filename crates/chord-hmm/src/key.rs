use melody_notes::{NoteEvent, PitchClass};
use serde::{Deserialize, Serialize};

use crate::scale::{KeyContext, KeyMode};
use crate::theory::{Accidental, Letter, NoteName};

/// Krumhansl-Kessler major key profile (duration-weighted perception studies).
const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor key profile.
const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

const fn flat(letter: Letter) -> NoteName {
    NoteName::new(letter, Accidental::Flat)
}

const fn sharp(letter: Letter) -> NoteName {
    NoteName::new(letter, Accidental::Sharp)
}

const fn nat(letter: Letter) -> NoteName {
    NoteName::natural(letter)
}

/// Conventional tonic spelling per pitch class for major keys.
const MAJOR_TONICS: [NoteName; 12] = [
    nat(Letter::C),
    flat(Letter::D),
    nat(Letter::D),
    flat(Letter::E),
    nat(Letter::E),
    nat(Letter::F),
    flat(Letter::G),
    nat(Letter::G),
    flat(Letter::A),
    nat(Letter::A),
    flat(Letter::B),
    nat(Letter::B),
];

/// Conventional tonic spelling per pitch class for minor keys.
const MINOR_TONICS: [NoteName; 12] = [
    nat(Letter::C),
    sharp(Letter::C),
    nat(Letter::D),
    flat(Letter::E),
    nat(Letter::E),
    nat(Letter::F),
    sharp(Letter::F),
    nat(Letter::G),
    sharp(Letter::G),
    nat(Letter::A),
    flat(Letter::B),
    nat(Letter::B),
];

/// Key estimate with the correlation that won.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyDetection {
    pub key: KeyContext,
    /// Pearson correlation with best-matching key profile
    pub confidence: f64,
}

/// Estimates the key of a melody. Swappable so a different estimator can
/// stand in for the profile heuristic.
pub trait KeyEstimator: Send + Sync {
    fn estimate(&self, notes: &[NoteEvent]) -> KeyDetection;
}

/// Krumhansl-Schmuckler key finding over a duration-weighted histogram.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileKeyEstimator;

impl KeyEstimator for ProfileKeyEstimator {
    fn estimate(&self, notes: &[NoteEvent]) -> KeyDetection {
        detect_key(notes)
    }
}

/// Detect the key of a melody using the Krumhansl-Schmuckler algorithm.
///
/// Builds a duration-weighted pitch-class histogram and correlates it
/// against all 24 major/minor key profiles. The best Pearson correlation
/// determines the detected key. An empty melody reads as C major with zero
/// confidence.
pub fn detect_key(notes: &[NoteEvent]) -> KeyDetection {
    let fallback = KeyDetection {
        key: KeyContext::new(nat(Letter::C), KeyMode::Major),
        confidence: 0.0,
    };

    // Duration-weighted pitch-class histogram
    let mut histogram = [0.0_f64; 12];
    for note in notes.iter().filter(|n| n.is_sounding()) {
        // Floor of 10 ms so grace notes still count
        histogram[note.pitch_class().index()] += note.duration().max(0.01);
    }

    let total: f64 = histogram.iter().sum();
    if total == 0.0 {
        return fallback;
    }
    for h in &mut histogram {
        *h /= total;
    }

    let mut best_root = 0usize;
    let mut best_mode = KeyMode::Major;
    let mut best_corr = -1.0_f64;

    for root in 0..12 {
        // Rotate histogram so root = index 0
        let mut rotated = [0.0; 12];
        for (i, r) in rotated.iter_mut().enumerate() {
            *r = histogram[(i + root) % 12];
        }

        let major_corr = pearson(&rotated, &MAJOR_PROFILE);
        if major_corr > best_corr {
            best_corr = major_corr;
            best_root = root;
            best_mode = KeyMode::Major;
        }

        let minor_corr = pearson(&rotated, &MINOR_PROFILE);
        if minor_corr > best_corr {
            best_corr = minor_corr;
            best_root = root;
            best_mode = KeyMode::Minor;
        }
    }

    let tonic = match best_mode {
        KeyMode::Major => MAJOR_TONICS[best_root],
        KeyMode::Minor => MINOR_TONICS[best_root],
    };
    debug_assert_eq!(tonic.pitch_class(), PitchClass::ALL[best_root]);

    KeyDetection {
        key: KeyContext::new(tonic, best_mode),
        confidence: (best_corr * 10000.0).round() / 10000.0,
    }
}

/// Pearson correlation coefficient between two 12-element arrays.
fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for (xi, yi) in x.iter().zip(y) {
        let xd = xi - x_mean;
        let yd = yi - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    num / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale_notes(pitches: &[u8], beat: f64) -> Vec<NoteEvent> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, &p)| NoteEvent::new(i as f64 * beat, (i as f64 + 1.0) * beat, p, 80))
            .collect()
    }

    #[test]
    fn empty_notes_returns_c_major() {
        let result = detect_key(&[]);
        assert_eq!(result.key.tonic.to_string(), "C");
        assert_eq!(result.key.mode, KeyMode::Major);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn c_major_scale_detected() {
        // C major scale: C D E F G A B
        let notes = scale_notes(&[60, 62, 64, 65, 67, 69, 71], 0.5);
        let result = detect_key(&notes);
        assert_eq!(result.key.tonic.to_string(), "C");
        assert_eq!(result.key.mode, KeyMode::Major);
        assert!(result.confidence > 0.7, "confidence {} should be > 0.7", result.confidence);
    }

    #[test]
    fn a_minor_scale_detected() {
        // A natural minor: A B C D E F G
        let notes = scale_notes(&[57, 59, 60, 62, 64, 65, 67], 0.5);
        let result = detect_key(&notes);
        // A minor and C major are relative — algorithm may pick either.
        assert!(result.confidence > 0.5, "confidence {} should be > 0.5", result.confidence);
    }

    #[test]
    fn flat_key_spelling() {
        // Db major scale: Db Eb F Gb Ab Bb C
        let notes = scale_notes(&[61, 63, 65, 66, 68, 70, 72], 1.0);
        let result = detect_key(&notes);
        if result.key.mode == KeyMode::Major && result.key.tonic.pitch_class() == PitchClass::CSharp {
            assert_eq!(result.key.tonic.to_string(), "Db");
        }
    }

    #[test]
    fn silent_notes_ignored() {
        let notes = vec![NoteEvent::new(0.0, 1.0, 61, 0)];
        assert_eq!(detect_key(&notes).confidence, 0.0);
    }

    #[test]
    fn tonic_tables_match_pitch_classes() {
        for (i, pc) in PitchClass::ALL.iter().enumerate() {
            assert_eq!(MAJOR_TONICS[i].pitch_class(), *pc);
            assert_eq!(MINOR_TONICS[i].pitch_class(), *pc);
        }
    }

    #[test]
    fn pearson_identical_arrays() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let r = pearson(&a, &a);
        assert!((r - 1.0).abs() < 1e-10, "self-correlation should be 1.0, got {}", r);
    }
}
