/// Oscillators: a waveform rendered into a seamlessly looping buffer, played
/// on a [Line].
use super::{frequency, Line, NoiseClip};
use crate::config::EngineConfig;
use crate::error::TrackerResult;
use crate::model::{ChannelKind, Pitch, MAX_PITCH};
use std::sync::Arc;

/// Noise pitches are measured against this one, near the top of the range.
const NOISE_REFERENCE_PITCH: u8 = MAX_PITCH - 13;

/// What the sequencer drives for each channel.
pub trait Oscillator: Send {
    /// Replaces whatever is sounding with a looped note at `pitch`. On error
    /// the oscillator is left stopped.
    fn play(&mut self, pitch: Pitch) -> TrackerResult<()>;

    /// Silences output. Idempotent.
    fn stop(&mut self);
}

/// PCM for one note, the length of one waveform cycle in samples, and the
/// rate the line should play it at.
#[derive(Debug, Clone)]
pub struct LoopBuffer {
    pub samples: Arc<[i8]>,
    pub period: f64,
    pub sample_rate: u32,
}

#[derive(Debug, Clone)]
pub enum Waveform {
    Pulse { duty: u8, amplitude: i8 },
    Triangle { amplitude: i8 },
    Noise { clip: Arc<NoiseClip>, exponent: f64 },
}

impl Waveform {
    pub fn render(&self, pitch: Pitch, sample_rate: u32, cycles: u32) -> LoopBuffer {
        match self {
            Waveform::Pulse { duty, amplitude } => {
                render_cycles(pitch, sample_rate, cycles, |pos, wavelength| {
                    pulse_sample(pos, wavelength, *duty, *amplitude)
                })
            }
            Waveform::Triangle { amplitude } => {
                render_cycles(pitch, sample_rate, cycles, |pos, wavelength| {
                    triangle_sample(pos, wavelength, *amplitude)
                })
            }
            Waveform::Noise { clip, exponent } => LoopBuffer {
                period: clip.samples().len() as f64,
                samples: clip.shared_samples(),
                sample_rate: clip.playback_rate(noise_multiplier(pitch, *exponent)),
            },
        }
    }
}

/// Sizes the buffer to a whole number of cycles, then fills it using the
/// per-cycle length that makes those cycles fit exactly.
fn render_cycles(
    pitch: Pitch,
    sample_rate: u32,
    cycles: u32,
    sample: impl Fn(usize, f64) -> i8,
) -> LoopBuffer {
    let cycles = cycles.max(1);
    let wavelength = f64::from(sample_rate) / frequency(pitch);
    let len = ((wavelength * f64::from(cycles)).round() as usize).max(cycles as usize);
    let period = len as f64 / f64::from(cycles);
    let samples: Vec<i8> = (0..len).map(|pos| sample(pos, period)).collect();
    LoopBuffer {
        samples: samples.into(),
        period,
        sample_rate,
    }
}

pub fn pulse_sample(pos: usize, wavelength: f64, duty: u8, amplitude: i8) -> i8 {
    if (pos as f64) % wavelength < wavelength * f64::from(duty) / 100.0 {
        amplitude
    } else {
        amplitude.saturating_neg()
    }
}

/// Rises 0 → A over the first quarter, falls to -A by the third, and climbs
/// back to 0 at the end of the cycle.
pub fn triangle_sample(pos: usize, wavelength: f64, amplitude: i8) -> i8 {
    let amplitude = i32::from(amplitude);
    let slope = 4.0 * f64::from(amplitude) / wavelength;
    let ramp = (slope * ((pos as f64) % wavelength)).round() as i32;
    let sample = if ramp > 3 * amplitude {
        ramp - 4 * amplitude
    } else if ramp > amplitude {
        2 * amplitude - ramp
    } else {
        ramp
    };
    sample.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
}

/// Playback-rate multiplier that gives the noise clip a coarse sense of pitch.
pub fn noise_multiplier(pitch: Pitch, exponent: f64) -> f64 {
    let reference = Pitch::new(NOISE_REFERENCE_PITCH).map_or(1.0, frequency);
    (frequency(pitch) / reference).powf(exponent)
}

/// An [Oscillator] that renders a [Waveform] and loops it on its own [Line].
pub struct WaveOscillator {
    waveform: Waveform,
    line: Box<dyn Line>,
    sample_rate: u32,
    cycles: u32,
    playing: bool,
}

impl WaveOscillator {
    pub fn new(waveform: Waveform, line: Box<dyn Line>, config: &EngineConfig) -> Self {
        Self {
            waveform,
            line,
            sample_rate: config.sample_rate,
            cycles: config.cycles_per_buffer,
            playing: false,
        }
    }

    /// The oscillator the given channel plays through.
    pub fn for_channel(
        kind: ChannelKind,
        config: &EngineConfig,
        noise: &Arc<NoiseClip>,
        line: Box<dyn Line>,
    ) -> Self {
        let waveform = match kind {
            ChannelKind::Pulse1 => Waveform::Pulse {
                duty: config.pulse1_duty,
                amplitude: config.pulse_amplitude,
            },
            ChannelKind::Pulse2 => Waveform::Pulse {
                duty: config.pulse2_duty,
                amplitude: config.pulse_amplitude,
            },
            ChannelKind::Triangle => Waveform::Triangle {
                amplitude: config.triangle_amplitude,
            },
            ChannelKind::Noise => Waveform::Noise {
                clip: Arc::clone(noise),
                exponent: config.noise_exponent,
            },
        };
        Self::new(waveform, line, config)
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

impl Oscillator for WaveOscillator {
    fn play(&mut self, pitch: Pitch) -> TrackerResult<()> {
        self.stop();
        let buffer = self.waveform.render(pitch, self.sample_rate, self.cycles);
        self.line.open(buffer.samples, buffer.sample_rate)?;
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.playing {
            self.line.close();
            self.playing = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use float_cmp::approx_eq;
    use std::sync::Mutex;

    fn pitch(value: u8) -> Pitch {
        Pitch::new(value).unwrap()
    }

    #[derive(Debug, Clone, PartialEq)]
    enum LineCall {
        Open(usize),
        Close,
    }

    #[derive(Clone, Default)]
    struct RecordingLine {
        calls: Arc<Mutex<Vec<LineCall>>>,
        fail: bool,
    }

    impl Line for RecordingLine {
        fn open(&mut self, buffer: Arc<[i8]>, _sample_rate: u32) -> TrackerResult<()> {
            if self.fail {
                return Err(TrackerError::ResourceUnavailable("busy".to_string()));
            }
            self.calls.lock().unwrap().push(LineCall::Open(buffer.len()));
            Ok(())
        }

        fn close(&mut self) {
            self.calls.lock().unwrap().push(LineCall::Close);
        }
    }

    #[test]
    fn test_pulse_is_two_level() {
        for duty in [0, 12, 25, 50, 75, 100] {
            let waveform = Waveform::Pulse { duty, amplitude: 20 };
            for p in [1, 13, 30, MAX_PITCH] {
                let buffer = waveform.render(pitch(p), 48_000, 12);
                assert!(buffer.samples.iter().all(|s| *s == 20 || *s == -20));
            }
        }
    }

    #[test]
    fn test_pulse_duty_cycle() {
        let buffer = Waveform::Pulse {
            duty: 25,
            amplitude: 20,
        }
        .render(pitch(10), 48_000, 12);
        let high = buffer.samples.iter().filter(|s| **s > 0).count();
        let ratio = high as f64 / buffer.samples.len() as f64;
        assert!(approx_eq!(f64, ratio, 0.25, epsilon = 0.01));
    }

    #[test]
    fn test_buffers_hold_whole_cycles() {
        let clip = Arc::new(NoiseClip::lfsr(20, 48_000));
        let waveforms = [
            Waveform::Pulse {
                duty: 50,
                amplitude: 20,
            },
            Waveform::Triangle { amplitude: 55 },
            Waveform::Noise {
                clip,
                exponent: 1.8,
            },
        ];
        for waveform in &waveforms {
            for p in [1, 7, 24, 47, MAX_PITCH] {
                let buffer = waveform.render(pitch(p), 48_000, 12);
                let cycles = buffer.samples.len() as f64 / buffer.period;
                assert!(approx_eq!(f64, cycles, cycles.round(), epsilon = 1e-9));
                more_asserts::assert_ge!(cycles.round(), 1.0);
            }
        }
    }

    #[test]
    fn test_period_tracks_pitch() {
        for p in Pitch::all() {
            let buffer = Waveform::Triangle { amplitude: 55 }.render(p, 48_000, 12);
            let exact = 48_000.0 / frequency(p);
            more_asserts::assert_le!((buffer.period - exact).abs(), 0.5 / 12.0 + 1e-9);
            assert!(approx_eq!(
                f64,
                buffer.samples.len() as f64,
                buffer.period * 12.0,
                epsilon = 1e-6
            ));
        }
    }

    #[test]
    fn test_triangle_shape() {
        let wavelength = 100.0;
        assert_eq!(triangle_sample(0, wavelength, 55), 0);
        assert_eq!(triangle_sample(25, wavelength, 55), 55);
        assert_eq!(triangle_sample(50, wavelength, 55), 0);
        assert_eq!(triangle_sample(75, wavelength, 55), -55);
        assert_eq!(triangle_sample(100, wavelength, 55), 0);
    }

    #[test]
    fn test_triangle_wraps_continuously() {
        for p in Pitch::all() {
            let buffer = Waveform::Triangle { amplitude: 55 }.render(p, 48_000, 12);
            let samples = &buffer.samples;
            let step = (4.0 * 55.0 / buffer.period).ceil() as i32;
            let first = i32::from(samples[0]);
            let last = i32::from(samples[samples.len() - 1]);
            more_asserts::assert_le!((last - first).abs(), step);
            assert!(samples.iter().all(|s| (-55..=55).contains(s)));
        }
    }

    #[test]
    fn test_noise_multiplier() {
        let reference = pitch(NOISE_REFERENCE_PITCH);
        assert!(approx_eq!(f64, noise_multiplier(reference, 1.8), 1.0, ulps = 2));
        let octave_up = pitch(NOISE_REFERENCE_PITCH + 12);
        assert!(approx_eq!(
            f64,
            noise_multiplier(octave_up, 1.8),
            2.0_f64.powf(1.8),
            epsilon = 1e-9
        ));
        more_asserts::assert_lt!(noise_multiplier(pitch(1), 1.8), 0.05);
    }

    #[test]
    fn test_noise_buffer_is_the_clip_at_any_pitch() {
        let clip = Arc::new(NoiseClip::lfsr(20, 48_000));
        let waveform = Waveform::Noise {
            clip: Arc::clone(&clip),
            exponent: 1.8,
        };
        let mut last_rate = 0;
        for p in Pitch::all() {
            let buffer = waveform.render(p, 48_000, 12);
            assert_eq!(buffer.samples.len(), clip.samples().len());
            assert!(Arc::ptr_eq(&buffer.samples, &clip.shared_samples()));
            more_asserts::assert_ge!(buffer.sample_rate, last_rate);
            last_rate = buffer.sample_rate;
        }
        let reference = waveform.render(pitch(NOISE_REFERENCE_PITCH), 48_000, 12);
        assert_eq!(reference.sample_rate, 48_000);
        more_asserts::assert_lt!(waveform.render(pitch(1), 48_000, 12).sample_rate, 48_000);
    }

    #[test]
    fn test_lowest_amplitude_does_not_overflow() {
        let waveform = Waveform::Pulse {
            duty: 50,
            amplitude: i8::MIN,
        };
        let buffer = waveform.render(pitch(20), 48_000, 12);
        assert!(buffer
            .samples
            .iter()
            .all(|s| *s == i8::MIN || *s == i8::MAX));
    }

    #[test]
    fn test_play_reopens_and_stop_is_idempotent() {
        let line = RecordingLine::default();
        let calls = Arc::clone(&line.calls);
        let mut oscillator = WaveOscillator::new(
            Waveform::Triangle { amplitude: 55 },
            Box::new(line),
            &EngineConfig::default(),
        );

        oscillator.play(pitch(10)).unwrap();
        oscillator.play(pitch(22)).unwrap();
        oscillator.stop();
        oscillator.stop();
        assert!(!oscillator.is_playing());

        let calls = calls.lock().unwrap();
        // 48000 / 110 Hz * 12 cycles, then an octave up.
        assert_eq!(
            *calls,
            vec![
                LineCall::Open(5236),
                LineCall::Close,
                LineCall::Open(2618),
                LineCall::Close,
            ]
        );
    }

    #[test]
    fn test_failed_play_leaves_oscillator_stopped() {
        let line = RecordingLine {
            fail: true,
            ..Default::default()
        };
        let calls = Arc::clone(&line.calls);
        let mut oscillator = WaveOscillator::new(
            Waveform::Pulse {
                duty: 50,
                amplitude: 20,
            },
            Box::new(line),
            &EngineConfig::default(),
        );

        assert!(matches!(
            oscillator.play(pitch(5)),
            Err(TrackerError::ResourceUnavailable(_))
        ));
        assert!(!oscillator.is_playing());
        oscillator.stop();
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_channel_waveforms_follow_config() {
        let config = EngineConfig::default();
        let noise = Arc::new(NoiseClip::lfsr(config.noise_amplitude, config.sample_rate));
        let pulse1 = WaveOscillator::for_channel(
            ChannelKind::Pulse1,
            &config,
            &noise,
            Box::new(RecordingLine::default()),
        );
        assert!(matches!(
            pulse1.waveform(),
            Waveform::Pulse {
                duty: 25,
                amplitude: 20
            }
        ));
        let noise_osc = WaveOscillator::for_channel(
            ChannelKind::Noise,
            &config,
            &noise,
            Box::new(RecordingLine::default()),
        );
        assert!(matches!(noise_osc.waveform(), Waveform::Noise { .. }));
    }
}
