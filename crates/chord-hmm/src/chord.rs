use std::fmt;
use std::str::FromStr;

use melody_notes::PitchClass;
use serde::{Deserialize, Serialize};
use winnow::combinator::{delimited, opt, preceded};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use crate::theory::{parse_note_name, NoteName};
use crate::{Error, Result};

type PResult<T> = winnow::ModalResult<T>;

/// Label the corpus uses for "no chord".
pub const NO_CHORD: &str = "N";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended2,
    Suspended4,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    Diminished7,
    HalfDiminished7,
}

impl ChordQuality {
    /// Suffix for chord symbol display
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Suspended2 => "sus2",
            ChordQuality::Suspended4 => "sus4",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::MinorMajor7 => "m(maj7)",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::HalfDiminished7 => "m7b5",
        }
    }

    /// Quality token in `root:quality` labels.
    pub fn label(&self) -> &'static str {
        match self {
            ChordQuality::Major => "maj",
            ChordQuality::Minor => "min",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Suspended2 => "sus2",
            ChordQuality::Suspended4 => "sus4",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "min7",
            ChordQuality::MinorMajor7 => "minmaj7",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::HalfDiminished7 => "hdim7",
        }
    }

    /// Map a label's quality token onto the retained qualities.
    ///
    /// Sixths drop to their triad, upper extensions fold into the seventh
    /// chord they extend, and an omitted token means major.
    pub fn from_label(token: &str) -> Option<Self> {
        let quality = match token {
            "" | "maj" | "maj6" | "6" => ChordQuality::Major,
            "min" | "min6" | "m" => ChordQuality::Minor,
            "dim" => ChordQuality::Diminished,
            "aug" => ChordQuality::Augmented,
            "sus2" => ChordQuality::Suspended2,
            "sus4" | "sus" => ChordQuality::Suspended4,
            "7" | "9" | "11" | "13" => ChordQuality::Dominant7,
            "maj7" | "maj9" | "maj11" | "maj13" => ChordQuality::Major7,
            "min7" | "min9" | "min11" | "min13" => ChordQuality::Minor7,
            "minmaj7" => ChordQuality::MinorMajor7,
            "dim7" => ChordQuality::Diminished7,
            "hdim7" | "hdim" => ChordQuality::HalfDiminished7,
            _ => return None,
        };
        Some(quality)
    }

    /// Letter steps and semitones of the third and fifth above the root.
    fn triad_intervals(&self) -> [(usize, i32); 2] {
        match self {
            ChordQuality::Major | ChordQuality::Dominant7 | ChordQuality::Major7 => {
                [(2, 4), (4, 7)]
            }
            ChordQuality::Minor | ChordQuality::Minor7 | ChordQuality::MinorMajor7 => {
                [(2, 3), (4, 7)]
            }
            ChordQuality::Diminished
            | ChordQuality::Diminished7
            | ChordQuality::HalfDiminished7 => [(2, 3), (4, 6)],
            ChordQuality::Augmented => [(2, 4), (4, 8)],
            ChordQuality::Suspended2 => [(1, 2), (4, 7)],
            ChordQuality::Suspended4 => [(3, 5), (4, 7)],
        }
    }
}

/// A chord reduced to root + quality. Inversions and added tones are
/// discarded when a label is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Chord {
    pub root: NoteName,
    pub quality: ChordQuality,
}

impl Chord {
    pub const fn new(root: NoteName, quality: ChordQuality) -> Self {
        Self { root, quality }
    }

    /// Root, third and fifth, spelled from the root's letter. A tone that
    /// can't be spelled within a double accidental falls back to its sharp
    /// spelling.
    pub fn components(&self) -> [NoteName; 3] {
        let [third, fifth] = self.quality.triad_intervals().map(|(steps, semitones)| {
            self.root.above(steps, semitones).unwrap_or_else(|| {
                NoteName::sharp_spelling(PitchClass::from_semitone(
                    self.root.pitch_class().index() as i32 + semitones,
                ))
            })
        });
        [self.root, third, fifth]
    }

    pub fn pitch_classes(&self) -> [PitchClass; 3] {
        self.components().map(NoteName::pitch_class)
    }

    /// Lead-sheet symbol: `C`, `Dbm`, `G7`.
    pub fn symbol(&self) -> String {
        format!("{}{}", self.root, self.quality.suffix())
    }

    /// Parse a corpus label into a chord.
    ///
    /// Returns `Ok(None)` for the no-chord marker `N`.
    pub fn from_label(label: &str) -> Result<Option<Chord>> {
        let label = label.trim();
        if label == NO_CHORD {
            return Ok(None);
        }

        let (root, token) = parse_label
            .parse(label)
            .map_err(|_| Error::UnknownChord(label.to_string()))?;
        let quality =
            ChordQuality::from_label(token).ok_or_else(|| Error::UnknownChord(label.to_string()))?;

        Ok(Some(Chord::new(root, quality)))
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.root, self.quality.label())
    }
}

impl FromStr for Chord {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Chord::from_label(s)?.ok_or_else(|| Error::UnknownChord(s.to_string()))
    }
}

impl From<Chord> for String {
    fn from(chord: Chord) -> String {
        chord.to_string()
    }
}

impl TryFrom<String> for Chord {
    type Error = Error;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// `root[:quality][(extensions)][/bass]`, e.g. `Eb:min7(11)/b3`.
///
/// Extensions and bass are consumed and discarded.
fn parse_label<'s>(input: &mut &'s str) -> PResult<(NoteName, &'s str)> {
    let root = parse_note_name(input)?;
    let token = opt(preceded(':', take_while(0.., |c: char| c.is_ascii_alphanumeric())))
        .parse_next(input)?
        .unwrap_or("");
    let _ = opt(delimited('(', take_till(0.., ')'), ')')).parse_next(input)?;
    let _ = opt(preceded('/', take_while(1.., |c: char| c != ' '))).parse_next(input)?;
    Ok((root, token))
}
