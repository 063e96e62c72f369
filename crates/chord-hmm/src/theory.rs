//! Spelled note names.
//!
//! Chord and scale construction work on letters plus accidentals so that a
//! third above C# is E# and not F. Pitch classes fall out of the spelling.

use std::fmt;
use std::str::FromStr;

use melody_notes::PitchClass;
use serde::{Deserialize, Serialize};
use winnow::combinator::{alt, empty};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::Error;

type PResult<T> = winnow::ModalResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    /// Semitones above C of the natural note.
    pub fn natural_semitone(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    /// The letter `steps` staff positions above this one.
    pub fn step(self, steps: usize) -> Letter {
        Self::ALL[(self as usize + steps) % 7]
    }

    fn as_char(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Accidental {
    DoubleFlat,
    Flat,
    Natural,
    Sharp,
    DoubleSharp,
}

impl Accidental {
    pub fn offset(self) -> i32 {
        match self {
            Accidental::DoubleFlat => -2,
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::DoubleSharp => 2,
        }
    }

    pub fn from_offset(offset: i32) -> Option<Self> {
        match offset {
            -2 => Some(Accidental::DoubleFlat),
            -1 => Some(Accidental::Flat),
            0 => Some(Accidental::Natural),
            1 => Some(Accidental::Sharp),
            2 => Some(Accidental::DoubleSharp),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Accidental::DoubleFlat => "bb",
            Accidental::Flat => "b",
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::DoubleSharp => "##",
        }
    }
}

/// A note spelled as letter + accidental, e.g. `C#` or `Db`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteName {
    pub letter: Letter,
    pub accidental: Accidental,
}

impl NoteName {
    pub const fn new(letter: Letter, accidental: Accidental) -> Self {
        Self { letter, accidental }
    }

    pub const fn natural(letter: Letter) -> Self {
        Self::new(letter, Accidental::Natural)
    }

    pub fn pitch_class(self) -> PitchClass {
        PitchClass::from_semitone(self.letter.natural_semitone() + self.accidental.offset())
    }

    /// Spell the note `letter_steps` letters and `semitones` semitones above
    /// this one. `None` when the result would need more than a double
    /// accidental.
    pub fn above(self, letter_steps: usize, semitones: i32) -> Option<NoteName> {
        let letter = self.letter.step(letter_steps);
        let target = self.letter.natural_semitone() + self.accidental.offset() + semitones;
        // Distance from the natural target letter, folded into -6..=5
        let offset = (target - letter.natural_semitone() + 6).rem_euclid(12) - 6;
        Accidental::from_offset(offset).map(|accidental| NoteName::new(letter, accidental))
    }

    /// Sharp-side spelling of a pitch class (C, C#, D, ...).
    pub fn sharp_spelling(pc: PitchClass) -> NoteName {
        const SPELLINGS: [NoteName; 12] = [
            NoteName::natural(Letter::C),
            NoteName::new(Letter::C, Accidental::Sharp),
            NoteName::natural(Letter::D),
            NoteName::new(Letter::D, Accidental::Sharp),
            NoteName::natural(Letter::E),
            NoteName::natural(Letter::F),
            NoteName::new(Letter::F, Accidental::Sharp),
            NoteName::natural(Letter::G),
            NoteName::new(Letter::G, Accidental::Sharp),
            NoteName::natural(Letter::A),
            NoteName::new(Letter::A, Accidental::Sharp),
            NoteName::natural(Letter::B),
        ];
        SPELLINGS[pc.index()]
    }

    /// Every spelling of this note's pitch class with at most a double
    /// accidental, this one included (`C#` → `B##`, `C#`, `Db`).
    pub fn enharmonics(self) -> Vec<NoteName> {
        let pc = self.pitch_class();
        Letter::ALL
            .iter()
            .filter_map(|&letter| {
                let offset = (pc.index() as i32 - letter.natural_semitone() + 6).rem_euclid(12) - 6;
                Accidental::from_offset(offset).map(|accidental| NoteName::new(letter, accidental))
            })
            .collect()
    }

    pub fn is_enharmonic_to(self, other: NoteName) -> bool {
        self.pitch_class() == other.pitch_class()
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter.as_char(), self.accidental.symbol())
    }
}

impl FromStr for NoteName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_note_name
            .parse(s.trim())
            .map_err(|_| Error::InvalidNote(s.to_string()))
    }
}

impl Serialize for NoteName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NoteName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub(crate) fn parse_letter(input: &mut &str) -> PResult<Letter> {
    let c = one_of(['C', 'D', 'E', 'F', 'G', 'A', 'B']).parse_next(input)?;
    Ok(match c {
        'C' => Letter::C,
        'D' => Letter::D,
        'E' => Letter::E,
        'F' => Letter::F,
        'G' => Letter::G,
        'A' => Letter::A,
        _ => Letter::B,
    })
}

/// `#`/`b` repeated up to twice. Mixed runs like `#b` are rejected.
pub(crate) fn parse_accidental(input: &mut &str) -> PResult<Accidental> {
    alt((
        "##".value(Accidental::DoubleSharp),
        "#".value(Accidental::Sharp),
        "bb".value(Accidental::DoubleFlat),
        "b".value(Accidental::Flat),
        empty.value(Accidental::Natural),
    ))
    .parse_next(input)
}

pub(crate) fn parse_note_name(input: &mut &str) -> PResult<NoteName> {
    let letter = parse_letter(input)?;
    let accidental = parse_accidental(input)?;
    Ok(NoteName::new(letter, accidental))
}
