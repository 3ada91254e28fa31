/// CHIPTRAK - playback engine for a four-channel chiptune tracker
///
/// This library provides the parts of the tracker that make sound:
/// - The track model the editor fills in (events, channels, tracks)
/// - Pitch-to-frequency mapping and pulse/triangle/noise oscillators
/// - Looped PCM output on cpal
/// - The sequencer that walks a track at tempo and drives the oscillators

pub mod audio;
pub mod config;
pub mod error;
pub mod model;
pub mod sequencer;

// Re-export commonly used types
pub use audio::{frequency, CpalLine, Line, NoiseClip, Oscillator, SilentLine, WaveOscillator, Waveform};
pub use config::EngineConfig;
pub use error::{TrackerError, TrackerResult};
pub use model::{pitch_name, Channel, ChannelKind, Event, Pitch, Track};
pub use sequencer::playback::{tick_period, PlaybackEvent};
pub use sequencer::{LastOscillatorState, Sequencer, Transport, VoiceAction};
