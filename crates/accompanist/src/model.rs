//! Getting a corpus model: from the cache when the corpus is unchanged,
//! otherwise by building it.

use accompanist_conf::AccompanistConfig;
use anyhow::{bail, Context, Result};
use beat_grid::TimingParams;
use chord_hmm::{
    load_corpus_dir, load_song_melody, CorpusBuilder, CorpusModel, ModelCache, ModelParams,
    PitchTable, Song, MODEL_VERSION,
};
use melody_notes::NoteEvent;
use std::path::Path;
use tracing::{info, warn};

pub fn model_params(config: &AccompanistConfig) -> ModelParams {
    ModelParams {
        smoothing: config.model.smoothing,
        epsilon: config.model.epsilon,
    }
}

pub fn timing_params(config: &AccompanistConfig) -> TimingParams {
    TimingParams {
        frame_size: config.timing.frame_size,
        hop_size: config.timing.hop_size,
        min_bpm: config.timing.min_bpm,
        max_bpm: config.timing.max_bpm,
        tightness: config.timing.tightness,
    }
}

/// Count pitch classes under each chord across every song that has a
/// melody file. Songs without one are skipped.
pub fn melody_table(corpus_dir: &Path, songs: &[Song]) -> PitchTable {
    let melodies: Vec<(&Song, Vec<NoteEvent>)> = songs
        .iter()
        .filter_map(|song| match load_song_melody(corpus_dir, song) {
            Ok(notes) => Some((song, notes)),
            Err(e) => {
                warn!(song = song.id, error = %e, "skipping song melody");
                None
            }
        })
        .collect();

    info!(songs = melodies.len(), "counting melody pitch classes");
    PitchTable::from_melodies(melodies.iter().map(|(song, notes)| (*song, notes.as_slice())))
}

/// The configured pitch table, or one counted from corpus melodies when
/// the file does not exist yet.
pub fn load_pitch_table(config: &AccompanistConfig, songs: &[Song]) -> Result<PitchTable> {
    let path = &config.paths.pitch_table;
    if path.exists() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading pitch table {}", path.display()))?;
        return Ok(PitchTable::from_csv(&text, &path.display().to_string())?);
    }

    warn!(path = %path.display(), "no pitch table file, counting from corpus melodies");
    Ok(melody_table(&config.paths.corpus_dir, songs))
}

/// A model for the configured corpus.
///
/// Cache hits skip building. Without a corpus directory, the newest cached
/// model is used. `force` always rebuilds.
pub fn resolve(config: &AccompanistConfig, force: bool) -> Result<CorpusModel> {
    let cache = ModelCache::open(&config.paths.model_cache)?;
    let corpus_dir = &config.paths.corpus_dir;

    if !corpus_dir.exists() {
        if !force {
            if let Some(model) = cache.latest(MODEL_VERSION)? {
                info!(fingerprint = %model.fingerprint, "corpus missing, using latest cached model");
                return Ok(model);
            }
        }
        bail!(
            "corpus directory {} not found and no cached model available",
            corpus_dir.display()
        );
    }

    let songs = load_corpus_dir(corpus_dir)
        .with_context(|| format!("loading corpus from {}", corpus_dir.display()))?;
    let table = load_pitch_table(config, &songs)?;
    let builder = CorpusBuilder::new(model_params(config));

    let fingerprint = builder.fingerprint(&songs, &table);
    if !force {
        if let Some(model) = cache.get(&fingerprint, MODEL_VERSION)? {
            info!(fingerprint = %fingerprint, "model cache hit");
            return Ok(model);
        }
        info!(fingerprint = %fingerprint, "model cache miss");
    }

    let model = builder.build(&songs, &table).context("building corpus model")?;
    cache.put(&model).context("storing model in cache")?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_hmm::corpus::CHORD_FILE;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> AccompanistConfig {
        let mut config = AccompanistConfig::default();
        config.paths.corpus_dir = dir.join("corpus");
        config.paths.pitch_table = dir.join("pitch_table.csv");
        config.paths.model_cache = dir.join("cache").join("models.db");
        config
    }

    fn write_corpus(config: &AccompanistConfig, rows: &str) {
        let song = config.paths.corpus_dir.join("1");
        std::fs::create_dir_all(&song).unwrap();
        std::fs::write(song.join(CHORD_FILE), rows).unwrap();
    }

    #[test]
    fn builds_then_hits_cache() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        write_corpus(&config, "0.0\t1.0\tC:maj\n1.0\t2.0\tG:maj\n");

        let built = resolve(&config, false).unwrap();
        assert!(config.paths.model_cache.exists());

        let cache = ModelCache::open(&config.paths.model_cache).unwrap();
        assert!(cache.get(&built.fingerprint, MODEL_VERSION).unwrap().is_some());

        let again = resolve(&config, false).unwrap();
        assert_eq!(again.fingerprint, built.fingerprint);
        assert_eq!(again.vocabulary, built.vocabulary);
    }

    #[test]
    fn missing_corpus_falls_back_to_cache() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        write_corpus(&config, "0.0\t1.0\tA:min\n1.0\t2.0\tE:min\n");
        let built = resolve(&config, false).unwrap();

        std::fs::remove_dir_all(&config.paths.corpus_dir).unwrap();
        let cached = resolve(&config, false).unwrap();
        assert_eq!(cached.fingerprint, built.fingerprint);

        assert!(resolve(&config, true).is_err());
    }

    #[test]
    fn nothing_to_use_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve(&config_in(dir.path()), false).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn pitch_table_file_wins_over_melodies() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        write_corpus(&config, "0.0\t1.0\tC:maj\n");
        std::fs::write(
            &config.paths.pitch_table,
            "chord,C,C#,D,D#,E,F,F#,G,G#,A,A#,B\nC:maj,5,0,0,0,3,0,0,4,0,0,0,0\n",
        )
        .unwrap();

        let songs = load_corpus_dir(&config.paths.corpus_dir).unwrap();
        let table = load_pitch_table(&config, &songs).unwrap();
        let c = "C:maj".parse().unwrap();
        assert_eq!(table.counts(&c).unwrap()[0], 5.0);
    }
}
