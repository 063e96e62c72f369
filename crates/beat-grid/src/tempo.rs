use crate::onset::OnsetEnvelope;

/// Minimum normalized autocorrelation for a lag to count as a pulse.
const MIN_CORRELATION: f32 = 0.05;

/// Center of the log-normal tempo prior, in BPM.
const PRIOR_CENTER_BPM: f64 = 120.0;
/// Width of the tempo prior, in octaves.
const PRIOR_OCTAVES: f64 = 1.0;

/// Global tempo estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    pub bpm: f64,
    /// Beat period measured in envelope frames (fractional).
    pub period_frames: f64,
    /// Normalized autocorrelation at the chosen lag.
    pub strength: f32,
}

/// Estimate tempo by autocorrelating the onset envelope over the lags that
/// correspond to `[min_bpm, max_bpm]`.
///
/// Each lag's correlation is weighted by a log-normal prior around 120 BPM
/// so that a pulse at twice the beat period doesn't win by a hair. The best
/// lag is refined with a parabolic fit through its neighbours. Returns
/// `None` when the envelope is too short, silent, or aperiodic.
pub fn estimate_tempo(envelope: &OnsetEnvelope, min_bpm: f64, max_bpm: f64) -> Option<TempoEstimate> {
    let values = &envelope.values;
    let n = values.len();
    if n < 8 || min_bpm <= 0.0 || max_bpm <= min_bpm {
        return None;
    }

    let frame_seconds = envelope.frame_seconds();
    let min_lag = ((60.0 / (max_bpm * frame_seconds)).floor() as usize).max(1);
    let max_lag = ((60.0 / (min_bpm * frame_seconds)).ceil() as usize).min(n / 2);
    if min_lag >= max_lag {
        return None;
    }

    let mean = values.iter().sum::<f32>() / n as f32;
    let centered: Vec<f32> = values.iter().map(|&x| x - mean).collect();
    let energy: f32 = centered.iter().map(|&x| x * x).sum();
    if energy < 1e-10 {
        return None;
    }

    let corr_at = |lag: usize| -> f32 {
        centered[..n - lag]
            .iter()
            .zip(&centered[lag..])
            .map(|(&a, &b)| a * b)
            .sum::<f32>()
            / energy
    };

    let prior = |lag: usize| -> f64 {
        let bpm = 60.0 / (lag as f64 * frame_seconds);
        let octaves = (bpm / PRIOR_CENTER_BPM).log2() / PRIOR_OCTAVES;
        (-0.5 * octaves * octaves).exp()
    };

    let mut best_lag = min_lag;
    let mut best_corr = f32::NEG_INFINITY;
    let mut best_weighted = f64::NEG_INFINITY;
    for lag in min_lag..=max_lag {
        let corr = corr_at(lag);
        let weighted = corr as f64 * prior(lag);
        if weighted > best_weighted {
            best_weighted = weighted;
            best_corr = corr;
            best_lag = lag;
        }
    }

    if best_corr < MIN_CORRELATION {
        return None;
    }

    let period_frames = if best_lag > min_lag && best_lag < max_lag {
        let prev = corr_at(best_lag - 1);
        let next = corr_at(best_lag + 1);
        let denom = prev - 2.0 * best_corr + next;
        if denom.abs() > 1e-10 {
            let shift = 0.5 * (prev - next) as f64 / denom as f64;
            best_lag as f64 + shift.clamp(-0.5, 0.5)
        } else {
            best_lag as f64
        }
    } else {
        best_lag as f64
    };

    let bpm = 60.0 / (period_frames * frame_seconds);
    tracing::debug!(bpm, period_frames, strength = best_corr, "tempo estimate");

    Some(TempoEstimate {
        bpm,
        period_frames,
        strength: best_corr,
    })
}
