//! CLI command implementations

use std::path::Path;

use accompanist_conf::{AccompanistConfig, ConfigSources};
use anyhow::{Context, Result};
use beat_grid::TimingAnalyzer;
use chord_hmm::{load_corpus_dir, InferencePipeline, InferenceReport};
use melody_notes::{MidiTranscription, PitchClass};
use tracing::info;

use crate::model;

/// Build or refresh the cached model, optionally dumping its transitions.
pub fn build_model(config: &AccompanistConfig, force: bool, diagnostics: Option<&Path>) -> Result<()> {
    let model = model::resolve(config, force)?;

    println!(
        "model {} (v{}): {} songs, {} chords",
        model.fingerprint,
        model.version,
        model.songs,
        model.vocabulary.len()
    );

    if let Some(dir) = diagnostics {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating diagnostics directory {}", dir.display()))?;
        let (normalized, raw) = model.transition_csvs()?;
        for (name, csv) in [("transitions.csv", normalized), ("transitions_raw.csv", raw)] {
            let path = dir.join(name);
            std::fs::write(&path, csv).with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {}", path.display());
        }
    }

    Ok(())
}

/// Count corpus melody notes per chord and write the table as CSV.
pub fn pitch_table(config: &AccompanistConfig, output: Option<&Path>) -> Result<()> {
    let corpus_dir = &config.paths.corpus_dir;
    let songs = load_corpus_dir(corpus_dir)
        .with_context(|| format!("loading corpus from {}", corpus_dir.display()))?;
    let table = model::melody_table(corpus_dir, &songs);

    let path = output.unwrap_or(config.paths.pitch_table.as_path());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, table.to_csv()).with_context(|| format!("writing {}", path.display()))?;

    println!("wrote {} chords to {}", table.len(), path.display());
    Ok(())
}

/// Run the full pipeline on one recording.
pub fn infer(config: &AccompanistConfig, audio: &Path, midi: Option<&Path>, json: bool) -> Result<()> {
    let model = chord_hmm::global::init(model::resolve(config, false)?)?;

    let transcriber = match midi {
        Some(path) => MidiTranscription::at_path(path),
        None => MidiTranscription::new(),
    };
    let pipeline = InferencePipeline::new(
        model,
        TimingAnalyzer::new(model::timing_params(config)),
        model::model_params(config),
    );

    let report = pipeline
        .run(audio, &transcriber)
        .with_context(|| format!("inferring chords for {}", audio.display()))?;
    info!(measures = report.measures.len(), "inference complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

/// Human-readable report: a header, then one line per measure.
fn render_report(report: &InferenceReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "tempo {:.1} BPM, first downbeat {:.3}s, key {} (r={:.2})\n",
        report.tempo_bpm, report.first_downbeat, report.key.key, report.key.confidence
    ));
    out.push_str(&format!(
        "{} chords in key, log P = {:.3}\n\n",
        report.vocabulary.len(),
        report.log_probability
    ));

    out.push_str(&format!("{:>4}  {:>8}  {:>8}  {:<10}  notes\n", "#", "start", "end", "chord"));
    for (i, (measure, chord)) in report.measures.iter().zip(&report.chords).enumerate() {
        let notes: Vec<&str> = measure.pitch_classes.iter().map(|pc| PitchClass::name(*pc)).collect();
        out.push_str(&format!(
            "{:>4}  {:>8.3}  {:>8.3}  {:<10}  {}\n",
            i + 1,
            measure.window.start,
            measure.window.end,
            chord.to_string(),
            if notes.is_empty() { "-".to_string() } else { notes.join(" ") }
        ));
    }
    out
}

/// Print where config came from, then the merged values.
pub fn show_config(config: &AccompanistConfig, sources: &ConfigSources) {
    if sources.files.is_empty() {
        println!("# no config files found, using defaults");
    }
    for file in &sources.files {
        println!("# loaded {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# overridden by ${var}");
    }
    println!();
    print!("{}", config.to_toml());
}

#[cfg(test)]
mod tests {
    use super::*;
    use beat_grid::MeasureWindow;
    use chord_hmm::{KeyContext, KeyDetection, KeyMode, Measure};

    #[test]
    fn report_table_lists_every_measure() {
        let c = "C:maj".parse().unwrap();
        let g = "G:maj".parse().unwrap();
        let report = InferenceReport {
            tempo_bpm: 120.0,
            first_downbeat: 0.25,
            key: KeyDetection {
                key: KeyContext::new("C".parse().unwrap(), KeyMode::Major),
                confidence: 0.8,
            },
            measures: vec![
                Measure {
                    window: MeasureWindow { start: 0.25, end: 2.25 },
                    pitch_classes: vec![PitchClass::C, PitchClass::E],
                },
                Measure {
                    window: MeasureWindow { start: 2.25, end: 4.25 },
                    pitch_classes: vec![],
                },
            ],
            vocabulary: vec![c, g],
            chords: vec![c, g],
            log_probability: -3.5,
        };

        let text = render_report(&report);
        assert!(text.starts_with("tempo 120.0 BPM"));
        assert!(text.contains("key C major"));
        let rows: Vec<&str> = text.lines().skip(4).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("C:maj") && rows[0].ends_with("C E"));
        assert!(rows[1].contains("G:maj") && rows[1].ends_with('-'));
    }
}
