/// Synthesis settings shared by the four oscillators
use crate::error::TrackerResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate the PCM buffers are generated at, in Hz.
    pub sample_rate: u32,
    /// Whole waveform cycles per looped buffer.
    pub cycles_per_buffer: u32,
    /// Duty cycle of the first pulse channel, in percent.
    pub pulse1_duty: u8,
    /// Duty cycle of the second pulse channel, in percent.
    pub pulse2_duty: u8,
    pub pulse_amplitude: i8,
    pub triangle_amplitude: i8,
    pub noise_amplitude: i8,
    /// Exponent applied to the frequency ratio when resampling noise.
    pub noise_exponent: f64,
    /// WAV clip to use for the noise channel instead of the built-in one.
    pub noise_sample: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            cycles_per_buffer: 12,
            pulse1_duty: 25,
            pulse2_duty: 50,
            pulse_amplitude: 20,
            triangle_amplitude: 55,
            noise_amplitude: 20,
            noise_exponent: 1.8,
            noise_sample: None,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }
}
