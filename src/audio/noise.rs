/// The recorded clip behind the noise channel
use crate::error::{TrackerError, TrackerResult};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use std::sync::Arc;

/// Output samples each shift-register bit is held for in the built-in clip.
const BITS_HELD: usize = 2;
/// Steps before a 15-bit maximal-length register repeats.
const LFSR_PERIOD: usize = 32_767;

/// A fixed noise recording. Pitch changes its playback rate; it is never
/// re-rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseClip {
    samples: Arc<[i8]>,
    sample_rate: u32,
}

impl NoiseClip {
    /// One full period of the hardware-style 15-bit shift register. The clip
    /// loops seamlessly because the register is back in its seed state at the
    /// end.
    pub fn lfsr(amplitude: i8, sample_rate: u32) -> Self {
        let mut samples = Vec::with_capacity(LFSR_PERIOD * BITS_HELD);
        let mut state: u16 = 1;
        for _ in 0..LFSR_PERIOD {
            let value = if state & 1 == 0 {
                amplitude
            } else {
                amplitude.saturating_neg()
            };
            samples.extend(std::iter::repeat(value).take(BITS_HELD));
            state = next_lfsr(state);
        }
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Loads a WAV file, downmixing to mono and scaling to `amplitude`.
    pub fn from_wav(path: impl AsRef<Path>, amplitude: i8) -> TrackerResult<Self> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();

        let normalized: Vec<f32> = match spec.sample_format {
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
            SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        };

        let channels = usize::from(spec.channels.max(1));
        let samples: Vec<i8> = normalized
            .chunks(channels)
            .map(|frame| {
                let mono = frame.iter().sum::<f32>() / frame.len() as f32;
                (mono.clamp(-1.0, 1.0) * f32::from(amplitude)).round() as i8
            })
            .collect();

        if samples.is_empty() {
            return Err(TrackerError::Wav(hound::Error::FormatError(
                "noise clip has no samples",
            )));
        }

        Ok(Self {
            samples: samples.into(),
            sample_rate: spec.sample_rate,
        })
    }

    pub fn samples(&self) -> &[i8] {
        &self.samples
    }

    /// The clip's PCM, shared with every line that plays it.
    pub fn shared_samples(&self) -> Arc<[i8]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Rate that plays the clip `multiplier` times faster than recorded.
    pub fn playback_rate(&self, multiplier: f64) -> u32 {
        (multiplier * f64::from(self.sample_rate))
            .round()
            .clamp(1.0, f64::from(u32::MAX)) as u32
    }
}

fn next_lfsr(state: u16) -> u16 {
    let feedback = (state ^ (state >> 1)) & 1;
    (state >> 1) | (feedback << 14)
}
