//! Corpus → model → key filter → evidence → decode, without audio.

use beat_grid::MeasureWindow;
use chord_hmm::corpus::Annotation;
use chord_hmm::{
    harmonize, Chord, CorpusBuilder, CorpusModel, KeyContext, KeyMode, KeyedModel, Measure,
    ModelParams, PitchTable, ScaleSet, Song,
};
use melody_notes::PitchClass::{self, *};
use pretty_assertions::assert_eq;

fn chord(label: &str) -> Chord {
    label.parse().unwrap()
}

fn song(id: u32, labels: &[&str]) -> Song {
    let annotations = labels
        .iter()
        .enumerate()
        .map(|(i, l)| Annotation::new(i as f64 * 2.0, (i + 1) as f64 * 2.0, *l))
        .collect();
    Song::new(id, annotations)
}

fn measure(i: usize, pcs: &[PitchClass]) -> Measure {
    Measure {
        window: MeasureWindow {
            start: i as f64 * 2.0,
            end: (i + 1) as f64 * 2.0,
        },
        pitch_classes: pcs.to_vec(),
    }
}

/// C:maj sounds C/E/G, G:maj sounds G/B/D.
fn c_and_g_table() -> PitchTable {
    let mut table = PitchTable::new();
    for (pc, n) in [(C, 30.0), (E, 20.0), (G, 20.0)] {
        table.add(chord("C:maj"), pc, n);
    }
    for (pc, n) in [(G, 30.0), (B, 20.0), (D, 20.0)] {
        table.add(chord("G:maj"), pc, n);
    }
    table
}

/// Transitions favor C → G.
fn c_and_g_model() -> CorpusModel {
    let songs = vec![
        song(1, &["C:maj", "G:maj", "C:maj", "G:maj"]),
        song(2, &["C:maj", "C:maj", "G:maj", "G:maj"]),
    ];
    CorpusBuilder::default().build(&songs, &c_and_g_table()).unwrap()
}

fn c_major() -> KeyContext {
    KeyContext::new("C".parse().unwrap(), KeyMode::Major)
}

#[test]
fn c_then_g() {
    let model = c_and_g_model();
    let c = model.vocabulary.id_of(&chord("C:maj")).unwrap();
    let g = model.vocabulary.id_of(&chord("G:maj")).unwrap();
    assert!(model.transition(c, g) > model.transition(c, c));

    let measures = vec![measure(0, &[C, E, G, C, E]), measure(1, &[G, B, D, B, D])];
    let result = harmonize(&model, c_major(), &measures, &ModelParams::default()).unwrap();

    assert_eq!(result.vocabulary, vec![chord("C:maj"), chord("G:maj")]);
    assert_eq!(result.chords, vec![chord("C:maj"), chord("G:maj")]);
    assert!(result.log_probability.is_finite());
}

#[test]
fn decoded_chords_come_from_filtered_vocabulary() {
    let songs = vec![
        song(1, &["C:maj", "F:maj", "G:maj", "C:maj", "E:maj", "A:min"]),
        song(2, &["A:min", "D:maj", "G:maj", "C:maj", "Bb:maj", "F:maj"]),
    ];
    let model = CorpusBuilder::default().build(&songs, &c_and_g_table()).unwrap();

    let measures: Vec<Measure> = (0..6)
        .map(|i| measure(i, if i % 2 == 0 { &[C, E, G] } else { &[F, A, C] }))
        .collect();
    let result = harmonize(&model, c_major(), &measures, &ModelParams::default()).unwrap();

    assert_eq!(result.chords.len(), measures.len());
    let allowed = ScaleSet::new(c_major());
    for chord in &result.chords {
        assert!(result.vocabulary.contains(chord));
        assert!(allowed.accepts(chord), "{chord} is outside C major");
    }
    // E:maj, D:maj and Bb:maj are not diatonic to C major
    assert_eq!(result.vocabulary.len(), 4);
}

#[test]
fn empty_measure_does_not_fail() {
    let model = c_and_g_model();
    let measures = vec![measure(0, &[C, E, G]), measure(1, &[]), measure(2, &[G, B, D])];
    let result = harmonize(&model, c_major(), &measures, &ModelParams::default()).unwrap();
    assert_eq!(result.chords.len(), 3);
}

#[test]
fn key_leaving_one_chord_is_fatal() {
    // only F#:maj fits F# major
    let songs = vec![song(1, &["C:maj", "G:maj", "F#:maj"])];
    let model = CorpusBuilder::default().build(&songs, &PitchTable::new()).unwrap();
    let key = KeyContext::new("F#".parse().unwrap(), KeyMode::Major);

    let result = harmonize(&model, key, &[measure(0, &[FSharp])], &ModelParams::default());
    assert!(matches!(
        result,
        Err(chord_hmm::Error::VocabularyTooSmall { size: 1 })
    ));
}

#[test]
fn key_leaving_nothing_is_fatal() {
    let model = c_and_g_model();
    let key = KeyContext::new("F#".parse().unwrap(), KeyMode::Major);
    let result = harmonize(&model, key, &[measure(0, &[FSharp])], &ModelParams::default());
    assert!(matches!(
        result,
        Err(chord_hmm::Error::VocabularyTooSmall { size: 0 })
    ));
}

#[test]
fn every_matrix_row_is_a_distribution() {
    let songs = vec![
        song(1, &["C:maj", "A:min", "F:maj", "G:7", "N"]),
        song(2, &["N", "D:min7", "G:7", "C:maj7", "C:maj7"]),
        song(3, &["E:min", "A:min", "D:min", "G:maj"]),
    ];
    let model = CorpusBuilder::default().build(&songs, &c_and_g_table()).unwrap();
    let keyed = KeyedModel::restrict(&model, &ScaleSet::new(c_major())).unwrap();

    let all_sums = model
        .transitions
        .row_sums()
        .into_iter()
        .chain(model.raw_transitions.row_sums())
        .chain(model.emission.row_sums())
        .chain(keyed.transitions.row_sums())
        .chain(keyed.emission.row_sums());
    for sum in all_sums {
        assert!((sum - 1.0).abs() < 1e-9, "row sums to {sum}");
    }
}

#[test]
fn no_chord_labels_never_reach_the_vocabulary() {
    let songs = vec![song(1, &["N", "C:maj", "N", "G:maj", "N"])];
    let model = CorpusBuilder::default().build(&songs, &PitchTable::new()).unwrap();
    assert_eq!(model.vocabulary.labels(), vec!["C:maj", "G:maj"]);
}

#[test]
fn single_song_corpus_builds() {
    let songs = vec![song(1, &["C:maj", "G:maj"])];
    let model = CorpusBuilder::default().build(&songs, &PitchTable::new()).unwrap();
    model.validate().unwrap();
    for sum in model.transitions.row_sums().into_iter().chain(model.emission.row_sums()) {
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(sum.is_finite());
    }
}

#[test]
fn builder_is_deterministic() {
    let songs = vec![
        song(1, &["C:maj", "A:min", "F:maj", "G:maj"]),
        song(2, &["A:min", "F:maj", "C:maj", "G:maj"]),
    ];
    let a = CorpusBuilder::default().build(&songs, &c_and_g_table()).unwrap();
    let b = CorpusBuilder::default().build(&songs, &c_and_g_table()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn harmonizing_is_deterministic() {
    let model = c_and_g_model();
    let measures = vec![measure(0, &[C, G]), measure(1, &[G]), measure(2, &[])];
    let first = harmonize(&model, c_major(), &measures, &ModelParams::default()).unwrap();
    for _ in 0..3 {
        let again = harmonize(&model, c_major(), &measures, &ModelParams::default()).unwrap();
        assert_eq!(again, first);
    }
}

#[test]
fn enharmonic_spellings_survive_key_filter() {
    let songs = vec![song(1, &["Db:maj", "Ab:maj", "Eb:min", "C#:maj", "G#:maj"])];
    let model = CorpusBuilder::default().build(&songs, &PitchTable::new()).unwrap();

    let sharp_key = KeyContext::new("C#".parse().unwrap(), KeyMode::Major);
    let keyed = KeyedModel::restrict(&model, &ScaleSet::new(sharp_key)).unwrap();
    assert_eq!(keyed.vocabulary.len(), model.vocabulary.len());

    let flat_key = KeyContext::new("Db".parse().unwrap(), KeyMode::Major);
    let keyed = KeyedModel::restrict(&model, &ScaleSet::new(flat_key)).unwrap();
    assert_eq!(keyed.vocabulary.len(), model.vocabulary.len());
}
