use beat_grid::MeasureWindow;
use melody_notes::{NoteEvent, PitchClass};
use serde::{Deserialize, Serialize};

/// One measure's window and the pitch classes sung in it, in onset order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub window: MeasureWindow,
    pub pitch_classes: Vec<PitchClass>,
}

impl Measure {
    pub fn is_empty(&self) -> bool {
        self.pitch_classes.is_empty()
    }
}

/// Assign each sounding note to the measure whose `[start, end)` holds its
/// onset. A note on a boundary lands in the later measure; notes before the
/// first window or after the last are dropped. Every window yields a
/// measure, empty or not.
pub fn segment_melody(notes: &[NoteEvent], windows: &[MeasureWindow]) -> Vec<Measure> {
    let mut sounding: Vec<&NoteEvent> = notes.iter().filter(|n| n.is_sounding()).collect();
    sounding.sort_by(|a, b| a.onset.total_cmp(&b.onset));

    windows
        .iter()
        .map(|window| Measure {
            window: *window,
            pitch_classes: sounding
                .iter()
                .filter(|n| window.contains(n.onset))
                .map(|n| n.pitch_class())
                .collect(),
        })
        .collect()
}
