/// Playback engine - walks a track row by row and drives one oscillator per
/// channel
use crate::audio::{CpalLine, Line, NoiseClip, Oscillator, SilentLine, WaveOscillator};
use crate::config::EngineConfig;
use crate::error::TrackerResult;
use crate::model::{ChannelKind, Event, Pitch, Track};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

pub mod playback;

use playback::{tick_period, PeriodicTask, PlaybackEvent};

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// What a channel's oscillator should do on this row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceAction {
    Play(Pitch),
    Stop,
    Hold,
}

/// Per-channel memory carried from one tick to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LastOscillatorState {
    pub prev_was_staccato: bool,
}

impl LastOscillatorState {
    /// Decides the action for `event` and updates the remembered state.
    ///
    /// A staccato note is cut on the next row if that row is blank; a legato
    /// note sustains through blank rows until a rest or another note.
    pub fn resolve(&mut self, event: Event) -> VoiceAction {
        match event {
            Event::Note { pitch, staccato } => {
                self.prev_was_staccato = staccato;
                VoiceAction::Play(pitch)
            }
            Event::Rest => {
                self.prev_was_staccato = false;
                VoiceAction::Stop
            }
            Event::Blank if self.prev_was_staccato => {
                self.prev_was_staccato = false;
                VoiceAction::Stop
            }
            Event::Blank => VoiceAction::Hold,
        }
    }
}

struct Voice {
    kind: ChannelKind,
    oscillator: Box<dyn Oscillator>,
    last: LastOscillatorState,
}

/// Everything a tick touches. Only ticks mutate `current_row` and the voice
/// states while playing; the host changes them only after cancelling the
/// tick task.
struct PlaybackState {
    transport: Transport,
    current_row: usize,
    voices: Vec<Voice>,
}

impl PlaybackState {
    fn new(oscillators: impl IntoIterator<Item = (ChannelKind, Box<dyn Oscillator>)>) -> Self {
        Self {
            transport: Transport::Stopped,
            current_row: 1,
            voices: oscillators
                .into_iter()
                .map(|(kind, oscillator)| Voice {
                    kind,
                    oscillator,
                    last: LastOscillatorState::default(),
                })
                .collect(),
        }
    }

    fn tick(&mut self, track: &Track, events: &Sender<PlaybackEvent>) -> ControlFlow<()> {
        let length = track.channel_length();
        if self.current_row > length {
            self.finish(events);
            return ControlFlow::Break(());
        }

        let row = self.current_row;
        for voice in &mut self.voices {
            match voice.last.resolve(track.event_at(voice.kind, row)) {
                VoiceAction::Play(pitch) => {
                    if let Err(err) = voice.oscillator.play(pitch) {
                        log::warn!("{} dropped note at row {}: {}", voice.kind, row, err);
                        let _ = events.send(PlaybackEvent::VoiceFailed {
                            channel: voice.kind,
                            message: err.to_string(),
                        });
                    }
                }
                VoiceAction::Stop => voice.oscillator.stop(),
                VoiceAction::Hold => {}
            }
        }
        let _ = events.send(PlaybackEvent::CursorMoved(row));

        self.current_row += 1;
        if self.current_row > length {
            self.finish(events);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    fn silence(&mut self) {
        for voice in &mut self.voices {
            voice.oscillator.stop();
        }
    }

    fn reset(&mut self, events: &Sender<PlaybackEvent>) {
        self.silence();
        for voice in &mut self.voices {
            voice.last = LastOscillatorState::default();
        }
        self.current_row = 1;
        self.transport = Transport::Stopped;
        let _ = events.send(PlaybackEvent::CursorMoved(1));
    }

    fn finish(&mut self, events: &Sender<PlaybackEvent>) {
        log::debug!("end of track");
        self.reset(events);
        let _ = events.send(PlaybackEvent::Ended);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Plays a shared [Track] through four oscillators.
///
/// `play`/`pause`/`stop` are called from the host thread. Ticks run on a
/// dedicated timer thread; `pause` and `stop` wait for an in-flight tick to
/// finish before they touch anything.
pub struct Sequencer {
    track: Arc<RwLock<Track>>,
    state: Arc<Mutex<PlaybackState>>,
    task: Option<PeriodicTask>,
    sender: Sender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
}

impl Sequencer {
    /// Opens one cpal line per channel and builds the oscillators from
    /// `config`.
    pub fn new(track: Arc<RwLock<Track>>, config: &EngineConfig) -> TrackerResult<Self> {
        Self::with_lines(track, config, |kind| {
            Ok(Box::new(CpalLine::new(kind.name())?) as Box<dyn Line>)
        })
    }

    /// Same oscillators as [Sequencer::new], but every line discards its
    /// output. Timing, cursor moves and notifications are unchanged.
    pub fn silent(track: Arc<RwLock<Track>>, config: &EngineConfig) -> TrackerResult<Self> {
        Self::with_lines(track, config, |_| Ok(Box::new(SilentLine) as Box<dyn Line>))
    }

    fn with_lines(
        track: Arc<RwLock<Track>>,
        config: &EngineConfig,
        mut make_line: impl FnMut(ChannelKind) -> TrackerResult<Box<dyn Line>>,
    ) -> TrackerResult<Self> {
        let noise = Arc::new(match &config.noise_sample {
            Some(path) => NoiseClip::from_wav(path, config.noise_amplitude)?,
            None => NoiseClip::lfsr(config.noise_amplitude, config.sample_rate),
        });

        let mut oscillators: Vec<(ChannelKind, Box<dyn Oscillator>)> =
            Vec::with_capacity(ChannelKind::ALL.len());
        for kind in ChannelKind::ALL {
            let line = make_line(kind)?;
            let oscillator: Box<dyn Oscillator> =
                Box::new(WaveOscillator::for_channel(kind, config, &noise, line));
            oscillators.push((kind, oscillator));
        }
        Ok(Self::from_voices(track, PlaybackState::new(oscillators)))
    }

    /// Uses the given oscillators instead of real audio output.
    pub fn with_oscillators(
        track: Arc<RwLock<Track>>,
        mut make_oscillator: impl FnMut(ChannelKind) -> Box<dyn Oscillator>,
    ) -> Self {
        let oscillators = ChannelKind::ALL.map(|kind| (kind, make_oscillator(kind)));
        Self::from_voices(track, PlaybackState::new(oscillators))
    }

    fn from_voices(track: Arc<RwLock<Track>>, state: PlaybackState) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            track,
            state: Arc::new(Mutex::new(state)),
            task: None,
            sender,
            receiver,
        }
    }

    pub fn transport(&self) -> Transport {
        lock(&self.state).transport
    }

    /// The row the next tick will play (1-based).
    pub fn current_row(&self) -> usize {
        lock(&self.state).current_row
    }

    /// Starts or resumes playback. From Stopped, ticking starts at row
    /// `selected_row + 1`, where `selected_row` is the host grid's 0-based
    /// selection. From Paused it resumes at the retained row. Does nothing
    /// while already playing.
    pub fn play(&mut self, selected_row: usize) -> TrackerResult<()> {
        if self.transport() == Transport::Playing {
            log::debug!("play ignored, already playing");
            return Ok(());
        }
        self.cancel_task();

        let tempo = self
            .track
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tempo();
        let period = tick_period(tempo);

        let previous = {
            let mut state = lock(&self.state);
            let previous = state.transport;
            if previous == Transport::Stopped {
                state.current_row = selected_row + 1;
            }
            state.transport = Transport::Playing;
            log::debug!(
                "playing from row {} at {} BPM ({:?} per row)",
                state.current_row,
                tempo,
                period
            );
            previous
        };

        let state = Arc::clone(&self.state);
        let track = Arc::clone(&self.track);
        let sender = self.sender.clone();
        let spawned = PeriodicTask::spawn("sequencer-tick", period, move || {
            let track = track.read().unwrap_or_else(PoisonError::into_inner);
            let ticked =
                panic::catch_unwind(AssertUnwindSafe(|| lock(&state).tick(&track, &sender)));
            ticked.unwrap_or_else(|_| {
                // Never leave the transport at Playing with no tick thread.
                log::error!("tick panicked, stopping playback");
                lock(&state).finish(&sender);
                ControlFlow::Break(())
            })
        });

        match spawned {
            Ok(task) => {
                self.task = Some(task);
                Ok(())
            }
            Err(err) => {
                lock(&self.state).transport = previous;
                Err(err)
            }
        }
    }

    /// Halts ticking and silences every channel, keeping the current row.
    pub fn pause(&mut self) {
        self.cancel_task();
        let mut state = lock(&self.state);
        if state.transport == Transport::Playing {
            state.silence();
            state.transport = Transport::Paused;
            log::debug!("paused at row {}", state.current_row);
        }
    }

    /// Halts ticking, silences every channel and rewinds to row 1.
    pub fn stop(&mut self) {
        self.cancel_task();
        lock(&self.state).reset(&self.sender);
        log::debug!("stopped");
    }

    /// Drains pending notifications without blocking.
    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        self.receiver.try_iter().collect()
    }

    /// A handle for hosts that would rather block on notifications.
    pub fn events(&self) -> Receiver<PlaybackEvent> {
        self.receiver.clone()
    }

    fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.cancel_task();
        lock(&self.state).silence();
    }
}
