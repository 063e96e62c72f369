use std::io::Cursor;
use std::path::Path;

use crate::{Result, TimingError};

/// Mono audio ready for analysis.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Average interleaved channels down to mono.
    pub fn from_interleaved(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(TimingError::InvalidInput("zero channels".into()));
        }
        if sample_rate == 0 {
            return Err(TimingError::InvalidInput("zero sample rate".into()));
        }

        let channels = channels as usize;
        let mono = samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Ok(Self::new(mono, sample_rate))
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

/// Decode WAV bytes into a mono waveform.
pub fn decode_wav(data: &[u8]) -> Result<Waveform> {
    let reader = hound::WavReader::new(Cursor::new(data))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Waveform::from_interleaved(&samples, spec.channels, spec.sample_rate)
}

/// Read and decode a WAV file.
pub fn load_wav(path: &Path) -> Result<Waveform> {
    let data = std::fs::read(path).map_err(|source| TimingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let waveform = decode_wav(&data)?;

    tracing::debug!(
        path = %path.display(),
        sample_rate = waveform.sample_rate,
        seconds = waveform.duration_seconds(),
        "decoded audio"
    );
    Ok(waveform)
}
