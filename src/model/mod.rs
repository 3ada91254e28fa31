/// Data model read by the playback engine
///
/// The editing layer creates and mutates these; the sequencer only reads them.
use crate::error::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

mod track;

pub use track::{Channel, ChannelEditor, ChannelKind, Track};

pub const NUM_OCTAVES: u8 = 5;
pub const MAX_PITCH: u8 = 12 * NUM_OCTAVES;
pub const ROWS_PER_BAR: usize = 16;
pub const INITIAL_BARS: usize = 2;
pub const MIN_TEMPO: u32 = 40;
pub const MAX_TEMPO: u32 = 240;
pub const DEFAULT_TEMPO: u32 = 120;

// Display letters, indexed by pitch % 12. Independent of the frequency table.
const NOTE_LETTERS: [&str; 12] = [
    "B-", "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#",
];

/// 1-based index into the 5-octave chromatic range. Always in `1..=MAX_PITCH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Pitch(u8);

impl Pitch {
    pub const LOWEST: Pitch = Pitch(1);
    pub const HIGHEST: Pitch = Pitch(MAX_PITCH);

    pub fn new(value: u8) -> TrackerResult<Self> {
        if (1..=MAX_PITCH).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TrackerError::InvalidPitch(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Shifts by `semitones`, folding back into range an octave at a time.
    pub fn transpose(self, semitones: i32) -> Self {
        let max = i32::from(MAX_PITCH);
        let mut pitch = i32::from(self.0) + semitones;
        while pitch > max {
            pitch -= 12;
        }
        while pitch < 1 {
            pitch += 12;
        }
        Self(pitch as u8)
    }

    /// Every valid pitch, lowest first.
    pub fn all() -> impl Iterator<Item = Pitch> {
        (1..=MAX_PITCH).map(Pitch)
    }
}

impl TryFrom<u8> for Pitch {
    type Error = TrackerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Pitch> for u8 {
    fn from(pitch: Pitch) -> Self {
        pitch.0
    }
}

/// Letter name and octave used by the grid display, e.g. `C#-2`.
pub fn pitch_name(pitch: Pitch) -> String {
    let letters = NOTE_LETTERS[usize::from(pitch.0 % 12)];
    let octave = (pitch.0 - 1) / 12 + 1;
    format!("{}-{}", letters, octave)
}

/// One row of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    #[default]
    Blank,
    Rest,
    Note {
        pitch: Pitch,
        #[serde(rename = "isStaccato", default)]
        staccato: bool,
    },
}

impl Event {
    pub fn note(pitch: Pitch) -> Self {
        Event::Note {
            pitch,
            staccato: false,
        }
    }

    pub fn staccato(pitch: Pitch) -> Self {
        Event::Note {
            pitch,
            staccato: true,
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self, Event::Note { .. })
    }

    pub fn transpose(&mut self, semitones: i32) {
        if let Event::Note { pitch, .. } = self {
            *pitch = pitch.transpose(semitones);
        }
    }
}

/// Renders the fixed 6-character grid cell.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Blank => write!(f, ".... ."),
            Event::Rest => write!(f, "STOP ."),
            Event::Note { pitch, staccato } => {
                let effect = if *staccato { "S" } else { "." };
                write!(f, "{} {}", pitch_name(*pitch), effect)
            }
        }
    }
}
