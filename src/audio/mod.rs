/// Sound generation: pitch mapping, oscillators and the output lines they
/// loop their buffers on.
use crate::error::TrackerResult;
use crate::model::Pitch;
use once_cell::sync::Lazy;
use std::sync::Arc;

mod cpal_line;
pub mod noise;
pub mod oscillator;

pub use cpal_line::CpalLine;
pub use noise::NoiseClip;
pub use oscillator::{LoopBuffer, Oscillator, WaveOscillator, Waveform};

/// Frequency of pitch 1 minus three semitones (A, two octaves below A220).
const REFERENCE_FREQUENCY: f64 = 55.0;

// C..B of the lowest octave.
static BASE_FREQUENCIES: Lazy<[f64; 12]> = Lazy::new(|| {
    std::array::from_fn(|i| REFERENCE_FREQUENCY * 2.0_f64.powf((i as f64 + 3.0) / 12.0))
});

/// Equal-tempered frequency of `pitch`, in Hz.
pub fn frequency(pitch: Pitch) -> f64 {
    let index = pitch.value() - 1;
    let octave = index / 12;
    BASE_FREQUENCIES[usize::from(index % 12)] * f64::from(1u32 << octave)
}

/// One channel's output resource. An open line loops its buffer until it is
/// closed or reopened.
pub trait Line: Send {
    fn open(&mut self, buffer: Arc<[i8]>, sample_rate: u32) -> TrackerResult<()>;

    /// Idempotent.
    fn close(&mut self);
}

/// A line that discards everything, for running without an audio device.
#[derive(Debug, Default)]
pub struct SilentLine;

impl Line for SilentLine {
    fn open(&mut self, _buffer: Arc<[i8]>, _sample_rate: u32) -> TrackerResult<()> {
        Ok(())
    }

    fn close(&mut self) {}
}
