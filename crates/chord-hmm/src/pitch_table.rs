//! Per-chord pitch-class occurrence counts.
//!
//! Counts how often each of the 12 pitch classes appears in corpus melodies
//! while a chord is sounding. The corpus builder smooths and normalizes these
//! into the base emission matrix.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use melody_notes::{NoteEvent, PitchClass};
use tracing::{debug, warn};

use crate::chord::Chord;
use crate::corpus::{Song, END_SENTINEL, START_SENTINEL};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PitchTable {
    counts: BTreeMap<Chord, [f64; 12]>,
}

impl PitchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self, chord: &Chord) -> Option<&[f64; 12]> {
        self.counts.get(chord)
    }

    pub fn add(&mut self, chord: Chord, pitch_class: PitchClass, count: f64) {
        self.counts.entry(chord).or_insert([0.0; 12])[pitch_class.index()] += count;
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Chord, &[f64; 12])> {
        self.counts.iter()
    }

    /// Count melody notes under the chord annotation whose `[start, end)`
    /// contains each note's onset. Zero-velocity notes and notes outside any
    /// chord are skipped.
    pub fn from_melodies<'a>(songs: impl IntoIterator<Item = (&'a Song, &'a [NoteEvent])>) -> Self {
        let mut table = Self::new();
        let mut unmatched = 0usize;

        for (song, melody) in songs {
            let spans = song.chord_spans();
            for note in melody.iter().filter(|n| n.is_sounding()) {
                let idx = spans.partition_point(|(start, _, _)| *start <= note.onset);
                let hit = idx
                    .checked_sub(1)
                    .map(|i| spans[i])
                    .filter(|(_, end, _)| note.onset < *end);
                match hit {
                    Some((_, _, chord)) => table.add(chord, note.pitch_class(), 1.0),
                    None => unmatched += 1,
                }
            }
        }

        debug!(chords = table.len(), unmatched, "pitch table counted");
        table
    }

    /// Parse a table written by [`PitchTable::to_csv`].
    ///
    /// The first column holds chord labels; the remaining 12 are pitch-class
    /// names in any order. Sentinel and no-chord rows are skipped, and rows
    /// whose labels normalize to the same chord are summed.
    pub fn from_csv(text: &str, source: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let Some((header_idx, header)) = lines.next() else {
            return Err(Error::MalformedRow {
                source_name: source.to_string(),
                line: 1,
                reason: "missing header row".into(),
            });
        };

        let columns: Vec<PitchClass> = header
            .split(',')
            .skip(1)
            .map(|name| {
                PitchClass::from_name(name.trim()).ok_or_else(|| Error::MalformedRow {
                    source_name: source.to_string(),
                    line: header_idx + 1,
                    reason: format!("unknown pitch class column {name:?}"),
                })
            })
            .collect::<Result<_>>()?;
        if columns.len() != 12 {
            return Err(Error::MalformedRow {
                source_name: source.to_string(),
                line: header_idx + 1,
                reason: format!("expected 12 pitch-class columns, found {}", columns.len()),
            });
        }

        let mut table = Self::new();
        for (idx, line) in lines {
            let malformed = |reason: String| Error::MalformedRow {
                source_name: source.to_string(),
                line: idx + 1,
                reason,
            };

            let cells: Vec<&str> = line.split(',').map(str::trim).collect();
            if cells.len() != 13 {
                return Err(malformed(format!("expected 13 cells, found {}", cells.len())));
            }

            let label = cells[0];
            if label == START_SENTINEL || label == END_SENTINEL {
                continue;
            }
            let chord = match Chord::from_label(label) {
                Ok(Some(chord)) => chord,
                Ok(None) => continue,
                Err(_) => {
                    warn!(label, line = idx + 1, "skipping unrecognized chord in pitch table");
                    continue;
                }
            };

            for (cell, pc) in cells[1..].iter().zip(&columns) {
                let count: f64 = cell
                    .parse()
                    .map_err(|_| malformed(format!("not a number: {cell:?}")))?;
                if !count.is_finite() || count < 0.0 {
                    return Err(malformed(format!("count must be non-negative: {cell:?}")));
                }
                table.add(chord, *pc, count);
            }
        }

        Ok(table)
    }

    /// `chord,C,C#,...,B` header, one row per chord in vocabulary order.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("chord");
        for pc in PitchClass::ALL {
            out.push(',');
            out.push_str(pc.name());
        }
        out.push('\n');

        for (chord, counts) in &self.counts {
            let _ = write!(out, "{chord}");
            for c in counts {
                let _ = write!(out, ",{c}");
            }
            out.push('\n');
        }
        out
    }
}
