/// Channels and the four-channel track
use super::{Event, Pitch, DEFAULT_TEMPO, INITIAL_BARS, MAX_TEMPO, MIN_TEMPO, ROWS_PER_BAR};
use crate::error::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four fixed synthesizer channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Pulse1,
    Pulse2,
    Triangle,
    Noise,
}

impl ChannelKind {
    /// Tick visitation order.
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Noise,
        ChannelKind::Triangle,
        ChannelKind::Pulse1,
        ChannelKind::Pulse2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::Pulse1 => "pulse1",
            ChannelKind::Pulse2 => "pulse2",
            ChannelKind::Triangle => "triangle",
            ChannelKind::Noise => "noise",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered rows of events. Length is always a whole number of bars.
///
/// Rows are 1-based throughout. Row accessors panic on rows outside
/// `1..=len()`, like slice indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChannel")]
pub struct Channel {
    events: Vec<Event>,
}

// Unchecked serde shape of a channel.
#[derive(Deserialize)]
struct RawChannel {
    events: Vec<Event>,
}

impl TryFrom<RawChannel> for Channel {
    type Error = TrackerError;

    fn try_from(raw: RawChannel) -> Result<Self, Self::Error> {
        let len = raw.events.len();
        if len == 0 || len % ROWS_PER_BAR != 0 {
            return Err(TrackerError::InvalidChannelLength(len));
        }
        Ok(Self { events: raw.events })
    }
}

impl Channel {
    pub fn new() -> Self {
        Self {
            events: vec![Event::Blank; ROWS_PER_BAR * INITIAL_BARS],
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn bars(&self) -> usize {
        self.events.len() / ROWS_PER_BAR
    }

    pub fn event(&self, row: usize) -> Event {
        self.events[row - 1]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn add_bars(&mut self, bars: usize) {
        self.events
            .resize(self.events.len() + bars * ROWS_PER_BAR, Event::Blank);
    }

    pub fn remove_bars(&mut self, bars: usize) -> TrackerResult<()> {
        if bars >= self.bars() {
            return Err(TrackerError::InvalidBars(bars));
        }
        self.events.truncate(self.events.len() - bars * ROWS_PER_BAR);
        Ok(())
    }

    pub fn set_event(&mut self, row: usize, event: Event) {
        self.events[row - 1] = event;
    }

    pub fn set_note(&mut self, row: usize, pitch: Pitch) {
        self.set_event(row, Event::note(pitch));
    }

    pub fn set_rest(&mut self, row: usize) {
        self.set_event(row, Event::Rest);
    }

    /// Returns false if the row does not hold a note.
    pub fn make_staccato(&mut self, row: usize) -> bool {
        self.set_staccato(row, true)
    }

    /// Returns false if the row does not hold a note.
    pub fn make_legato(&mut self, row: usize) -> bool {
        self.set_staccato(row, false)
    }

    fn set_staccato(&mut self, row: usize, value: bool) -> bool {
        match &mut self.events[row - 1] {
            Event::Note { staccato, .. } => {
                *staccato = value;
                true
            }
            _ => false,
        }
    }

    pub fn clear_row(&mut self, row: usize) {
        self.set_event(row, Event::Blank);
    }

    /// Clears `start..=end`.
    pub fn clear_range(&mut self, start: usize, end: usize) {
        self.events[start - 1..end].fill(Event::Blank);
    }

    pub fn clear(&mut self) {
        self.events.fill(Event::Blank);
    }

    pub fn transpose(&mut self, semitones: i32) {
        for event in &mut self.events {
            event.transpose(semitones);
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

/// A named composition: a tempo and four channels of equal length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTrack")]
pub struct Track {
    name: String,
    tempo: u32,
    pulse1: Channel,
    pulse2: Channel,
    triangle: Channel,
    noise: Channel,
}

#[derive(Deserialize)]
struct RawTrack {
    name: String,
    tempo: u32,
    pulse1: Channel,
    pulse2: Channel,
    triangle: Channel,
    noise: Channel,
}

impl TryFrom<RawTrack> for Track {
    type Error = TrackerError;

    /// Rejects tempos outside the bounds and channels of differing length.
    fn try_from(raw: RawTrack) -> Result<Self, Self::Error> {
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&raw.tempo) {
            return Err(TrackerError::InvalidTempo(raw.tempo));
        }
        let length = raw.pulse1.len();
        for channel in [&raw.pulse2, &raw.triangle, &raw.noise] {
            if channel.len() != length {
                return Err(TrackerError::UnevenChannels(length, channel.len()));
            }
        }
        Ok(Self {
            name: raw.name,
            tempo: raw.tempo,
            pulse1: raw.pulse1,
            pulse2: raw.pulse2,
            triangle: raw.triangle,
            noise: raw.noise,
        })
    }
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tempo: DEFAULT_TEMPO,
            pulse1: Channel::new(),
            pulse2: Channel::new(),
            triangle: Channel::new(),
            noise: Channel::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
    }

    pub fn try_set_tempo(&mut self, tempo: u32) -> TrackerResult<()> {
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
            return Err(TrackerError::InvalidTempo(tempo));
        }
        self.tempo = tempo;
        Ok(())
    }

    /// Rows per channel; identical across all four.
    pub fn channel_length(&self) -> usize {
        self.pulse1.len()
    }

    pub fn bars(&self) -> usize {
        self.pulse1.bars()
    }

    pub fn event_at(&self, kind: ChannelKind, row: usize) -> Event {
        self.channel(kind).event(row)
    }

    pub fn channel(&self, kind: ChannelKind) -> &Channel {
        match kind {
            ChannelKind::Pulse1 => &self.pulse1,
            ChannelKind::Pulse2 => &self.pulse2,
            ChannelKind::Triangle => &self.triangle,
            ChannelKind::Noise => &self.noise,
        }
    }

    /// Mutable access to one channel. Length-changing operations live on
    /// [Track] so the channels never drift apart.
    pub fn channel_mut(&mut self, kind: ChannelKind) -> ChannelEditor<'_> {
        let channel = match kind {
            ChannelKind::Pulse1 => &mut self.pulse1,
            ChannelKind::Pulse2 => &mut self.pulse2,
            ChannelKind::Triangle => &mut self.triangle,
            ChannelKind::Noise => &mut self.noise,
        };
        ChannelEditor(channel)
    }

    fn channels_mut(&mut self) -> [&mut Channel; 4] {
        [
            &mut self.pulse1,
            &mut self.pulse2,
            &mut self.triangle,
            &mut self.noise,
        ]
    }

    pub fn add_bars(&mut self, bars: usize) {
        for channel in self.channels_mut() {
            channel.add_bars(bars);
        }
    }

    pub fn remove_bars(&mut self, bars: usize) -> TrackerResult<()> {
        if bars >= self.bars() {
            return Err(TrackerError::InvalidBars(bars));
        }
        for channel in self.channels_mut() {
            channel.remove_bars(bars)?;
        }
        Ok(())
    }

    pub fn clear_range(&mut self, start: usize, end: usize) {
        for channel in self.channels_mut() {
            channel.clear_range(start, end);
        }
    }

    pub fn clear(&mut self) {
        for channel in self.channels_mut() {
            channel.clear();
        }
    }

    pub fn transpose(&mut self, semitones: i32) {
        for channel in self.channels_mut() {
            channel.transpose(semitones);
        }
    }
}

/// Row-level edits on one channel of a [Track].
pub struct ChannelEditor<'a>(&'a mut Channel);

impl ChannelEditor<'_> {
    pub fn set_event(&mut self, row: usize, event: Event) {
        self.0.set_event(row, event);
    }

    pub fn set_note(&mut self, row: usize, pitch: Pitch) {
        self.0.set_note(row, pitch);
    }

    pub fn set_rest(&mut self, row: usize) {
        self.0.set_rest(row);
    }

    pub fn make_staccato(&mut self, row: usize) -> bool {
        self.0.make_staccato(row)
    }

    pub fn make_legato(&mut self, row: usize) -> bool {
        self.0.make_legato(row)
    }

    pub fn clear_row(&mut self, row: usize) {
        self.0.clear_row(row);
    }

    pub fn clear_range(&mut self, start: usize, end: usize) {
        self.0.clear_range(start, end);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn transpose(&mut self, semitones: i32) {
        self.0.transpose(semitones);
    }
}
