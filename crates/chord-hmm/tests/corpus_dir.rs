//! Loading a corpus laid out on disk and building a model from it.

use std::fs;
use std::path::Path;

use chord_hmm::corpus::CHORD_FILE;
use chord_hmm::{
    load_corpus_dir, load_song_melody, Chord, CorpusBuilder, Error, ModelCache, PitchTable,
    MODEL_VERSION,
};
use melody_notes::{melody_to_midi, NoteEvent, PitchClass};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write_song(root: &Path, name: &str, rows: &str, melody: &[NoteEvent]) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(CHORD_FILE), rows).unwrap();
    fs::write(dir.join(format!("{name}.mid")), melody_to_midi(melody, 120.0)).unwrap();
}

fn corpus() -> TempDir {
    let root = TempDir::new().unwrap();
    write_song(
        root.path(),
        "10",
        "0.0\t2.0\tA:min\n2.0\t4.0\tE:min\n",
        &[NoteEvent::new(0.5, 1.0, 69, 90), NoteEvent::new(2.5, 3.0, 71, 90)],
    );
    write_song(
        root.path(),
        "2",
        "0.0\t2.0\tC:maj\n2.0\t4.0\tG:maj\n4.0\t6.0\tN\n",
        &[
            NoteEvent::new(0.25, 0.75, 60, 100),
            NoteEvent::new(1.0, 1.5, 64, 100),
            NoteEvent::new(2.25, 2.75, 67, 100),
            NoteEvent::new(3.0, 3.5, 71, 0),
            NoteEvent::new(4.5, 5.0, 62, 100),
        ],
    );
    fs::create_dir_all(root.path().join("notes")).unwrap();
    fs::write(root.path().join("README"), "not a song").unwrap();
    root
}

#[test]
fn songs_load_in_numeric_order() {
    let root = corpus();
    let songs = load_corpus_dir(root.path()).unwrap();

    let ids: Vec<u32> = songs.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![2, 10]);
    assert_eq!(songs[0].annotations.len(), 3);
    assert_eq!(
        songs[0].chords(),
        vec!["C:maj".parse::<Chord>().unwrap(), "G:maj".parse().unwrap()]
    );
}

#[test]
fn pitch_table_from_corpus_melodies() {
    let root = corpus();
    let songs = load_corpus_dir(root.path()).unwrap();
    let melodies: Vec<Vec<NoteEvent>> = songs
        .iter()
        .map(|s| load_song_melody(root.path(), s).unwrap())
        .collect();

    let table = PitchTable::from_melodies(
        songs.iter().zip(melodies.iter().map(Vec::as_slice)),
    );

    let c: Chord = "C:maj".parse().unwrap();
    let g: Chord = "G:maj".parse().unwrap();
    let c_counts = table.counts(&c).unwrap();
    assert_eq!(c_counts[PitchClass::C.index()], 1.0);
    assert_eq!(c_counts[PitchClass::E.index()], 1.0);
    // the zero-velocity B is not counted
    let g_counts = table.counts(&g).unwrap();
    assert_eq!(g_counts[PitchClass::G.index()], 1.0);
    assert_eq!(g_counts[PitchClass::B.index()], 0.0);
    // the D falls under "N" and is dropped
    assert_eq!(table.len(), 4);

    let reparsed = PitchTable::from_csv(&table.to_csv(), "table.csv").unwrap();
    assert_eq!(reparsed, table);
}

#[test]
fn model_from_disk_is_cached() {
    let root = corpus();
    let songs = load_corpus_dir(root.path()).unwrap();
    let model = CorpusBuilder::default().build(&songs, &PitchTable::new()).unwrap();
    assert_eq!(model.songs, 2);
    assert_eq!(model.vocabulary.labels(), vec!["A:min", "C:maj", "E:min", "G:maj"]);

    let cache_dir = TempDir::new().unwrap();
    let cache = ModelCache::open(&cache_dir.path().join("models.db")).unwrap();
    assert!(cache.get(&model.fingerprint, MODEL_VERSION).unwrap().is_none());
    cache.put(&model).unwrap();
    let cached = cache.get(&model.fingerprint, MODEL_VERSION).unwrap().unwrap();
    assert_eq!(cached.vocabulary, model.vocabulary);
    assert_eq!(cached.songs, model.songs);
}

#[test]
fn changed_corpus_changes_fingerprint() {
    let root = corpus();
    let songs = load_corpus_dir(root.path()).unwrap();
    let before = CorpusBuilder::default().build(&songs, &PitchTable::new()).unwrap();

    fs::write(
        root.path().join("10").join(CHORD_FILE),
        "0.0\t2.0\tA:min\n2.0\t4.0\tD:min\n",
    )
    .unwrap();
    let songs = load_corpus_dir(root.path()).unwrap();
    let after = CorpusBuilder::default().build(&songs, &PitchTable::new()).unwrap();

    assert_ne!(before.fingerprint, after.fingerprint);
}

#[test]
fn transition_diagnostics_are_percent_tables() {
    let root = corpus();
    let songs = load_corpus_dir(root.path()).unwrap();
    let model = CorpusBuilder::default().build(&songs, &PitchTable::new()).unwrap();

    let (normalized, raw) = model.transition_csvs().unwrap();
    for csv in [&normalized, &raw] {
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), ",A:min,C:maj,E:min,G:maj");
        assert_eq!(lines.count(), 4);
        assert!(csv.contains('%'));
    }
    // A:min only ever moves to E:min
    assert!(normalized.contains("A:min,0.00%,0.00%,100.00%,0.00%"));
}

#[test]
fn directory_without_songs_is_empty_corpus() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("drafts")).unwrap();
    assert!(matches!(load_corpus_dir(root.path()), Err(Error::EmptyCorpus)));
}

#[test]
fn malformed_chord_file_names_the_line() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("1");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(CHORD_FILE), "0.0\t1.0\tC:maj\n1.0 2.0 G:maj\n").unwrap();

    match load_corpus_dir(root.path()) {
        Err(Error::MalformedRow { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected MalformedRow, got {other:?}"),
    }
}

#[test]
fn missing_melody_is_io_error() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("1");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(CHORD_FILE), "0.0\t1.0\tC:maj\n").unwrap();

    let songs = load_corpus_dir(root.path()).unwrap();
    assert!(matches!(
        load_song_melody(root.path(), &songs[0]),
        Err(Error::Io { .. })
    ));
}
