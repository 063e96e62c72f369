//! Dynamic-programming beat tracking (Ellis 2007).
//!
//! Each frame's cumulative score is its onset strength plus the best
//! predecessor score, penalized by how far the inter-beat interval strays
//! from the tempo period on a log scale. Backtracking from the strongest
//! frame near the end recovers the beat sequence.

use crate::onset::OnsetEnvelope;

/// Beat frames trimmed of weak leading/trailing beats (below this fraction of
/// the RMS onset strength at beats).
const TRIM_RATIO: f32 = 0.5;

/// Track beats through the envelope given a beat period in frames.
///
/// `tightness` scales the log-interval penalty; higher values hold the
/// tracker closer to the tempo. Returns beat frame indices in ascending order.
pub fn track_beat_frames(envelope: &OnsetEnvelope, period_frames: f64, tightness: f64) -> Vec<usize> {
    let n = envelope.len();
    if n == 0 || period_frames < 1.0 {
        return Vec::new();
    }

    let local = normalized(&envelope.values);

    let mut cumulative = vec![0.0f64; n];
    let mut backlink: Vec<Option<usize>> = vec![None; n];

    let max_back = (2.0 * period_frames).round() as usize;
    let min_back = ((period_frames / 2.0).round() as usize).max(1);

    for i in 0..n {
        let mut best: Option<(usize, f64)> = None;

        if i >= min_back {
            let earliest = i.saturating_sub(max_back);
            for j in earliest..=(i - min_back) {
                let interval = (i - j) as f64 / period_frames;
                let penalty = tightness * interval.ln().powi(2);
                let score = cumulative[j] - penalty;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((j, score));
                }
            }
        }

        match best {
            Some((j, score)) => {
                cumulative[i] = local[i] + score.max(0.0);
                // A predecessor that only drags the score down starts a new chain
                backlink[i] = (score > 0.0).then_some(j);
            }
            None => cumulative[i] = local[i],
        }
    }

    // Start from the best-scoring frame in the final period
    let tail_start = n.saturating_sub(period_frames.ceil() as usize);
    let mut last = tail_start;
    for i in tail_start..n {
        if cumulative[i] > cumulative[last] {
            last = i;
        }
    }

    let mut beats = vec![last];
    let mut cursor = last;
    while let Some(prev) = backlink[cursor] {
        beats.push(prev);
        cursor = prev;
    }
    beats.reverse();

    trim_weak_edges(&beats, &local)
}

/// Convert beat frames to seconds.
pub fn beat_times(envelope: &OnsetEnvelope, frames: &[usize]) -> Vec<f64> {
    frames.iter().map(|&f| envelope.frame_to_seconds(f)).collect()
}

/// Scale to unit standard deviation so `tightness` means the same thing
/// regardless of recording level.
fn normalized(values: &[f32]) -> Vec<f64> {
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = var.sqrt();
    if std < 1e-12 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|&v| v as f64 / std).collect()
}

/// Drop leading and trailing beats whose onset strength is weak; the tracker
/// happily extrapolates its pulse into silence before and after the take.
fn trim_weak_edges(beats: &[usize], local: &[f64]) -> Vec<usize> {
    if beats.is_empty() {
        return Vec::new();
    }

    let rms = (beats.iter().map(|&b| local[b].powi(2)).sum::<f64>() / beats.len() as f64).sqrt();
    if rms < 1e-12 {
        return Vec::new();
    }
    let threshold = rms * TRIM_RATIO as f64;

    let first = beats.iter().position(|&b| local[b] >= threshold);
    let last = beats.iter().rposition(|&b| local[b] >= threshold);

    match (first, last) {
        (Some(first), Some(last)) => beats[first..=last].to_vec(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(values: Vec<f32>) -> OnsetEnvelope {
        OnsetEnvelope {
            values,
            hop_size: 441,
            sample_rate: 44100,
        }
    }

    fn pulses(period: usize, offset: usize, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| if i >= offset && (i - offset) % period == 0 { 1.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn beats_land_on_pulses() {
        let env = envelope(pulses(50, 20, 800));
        let beats = track_beat_frames(&env, 50.0, 100.0);

        assert!(beats.len() >= 14, "got {} beats", beats.len());
        for b in &beats {
            assert_eq!((b - 20) % 50, 0, "beat at frame {b} is off the pulse grid");
        }
    }

    #[test]
    fn leading_silence_is_trimmed() {
        let env = envelope(pulses(50, 300, 900));
        let beats = track_beat_frames(&env, 50.0, 100.0);
        assert_eq!(beats.first(), Some(&300));
    }

    #[test]
    fn silence_has_no_beats() {
        let env = envelope(vec![0.0; 500]);
        assert!(track_beat_frames(&env, 50.0, 100.0).is_empty());
    }

    #[test]
    fn frames_convert_to_seconds() {
        let env = envelope(vec![0.0; 10]);
        assert_eq!(beat_times(&env, &[0, 100]), vec![0.0, 1.0]);
    }
}
