/// Output line on the default cpal device
use super::Line;
use crate::error::{TrackerError, TrackerResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

enum LineRequest {
    Open {
        buffer: Arc<[i8]>,
        sample_rate: u32,
        reply: Sender<TrackerResult<()>>,
    },
    Close {
        reply: Sender<()>,
    },
}

/// A [Line] backed by one cpal output stream.
///
/// `cpal::Stream` isn't `Send`, so the stream lives on a worker thread owned
/// by the line. Requests are answered before `open`/`close` return, which
/// means a closed line is silent by the time `close` comes back.
pub struct CpalLine {
    name: String,
    requests: Option<Sender<LineRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl CpalLine {
    pub fn new(name: &str) -> TrackerResult<Self> {
        let (requests, receiver) = unbounded();
        let worker = thread::Builder::new()
            .name(format!("line-{}", name))
            .spawn(move || run_line(receiver))?;

        Ok(Self {
            name: name.to_string(),
            requests: Some(requests),
            worker: Some(worker),
        })
    }

    fn send(&self, request: LineRequest) -> TrackerResult<()> {
        self.requests
            .as_ref()
            .and_then(|requests| requests.send(request).ok())
            .ok_or_else(|| {
                TrackerError::ResourceUnavailable(format!("line {} has shut down", self.name))
            })
    }
}

impl Line for CpalLine {
    fn open(&mut self, buffer: Arc<[i8]>, sample_rate: u32) -> TrackerResult<()> {
        let (reply, response) = bounded(1);
        self.send(LineRequest::Open {
            buffer,
            sample_rate,
            reply,
        })?;
        response.recv().unwrap_or_else(|_| {
            Err(TrackerError::ResourceUnavailable(format!(
                "line {} stopped responding",
                self.name
            )))
        })
    }

    fn close(&mut self) {
        let (reply, response) = bounded(1);
        if self.send(LineRequest::Close { reply }).is_ok() {
            let _ = response.recv();
        }
    }
}

impl Drop for CpalLine {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_line(requests: Receiver<LineRequest>) {
    let mut stream: Option<Stream> = None;
    while let Ok(request) = requests.recv() {
        match request {
            LineRequest::Open {
                buffer,
                sample_rate,
                reply,
            } => {
                stream = None;
                let result = open_stream(buffer, sample_rate).map(|opened| {
                    stream = Some(opened);
                });
                let _ = reply.send(result);
            }
            LineRequest::Close { reply } => {
                stream = None;
                let _ = reply.send(());
            }
        }
    }
}

fn unavailable(err: impl std::fmt::Display) -> TrackerError {
    TrackerError::ResourceUnavailable(err.to_string())
}

fn open_stream(buffer: Arc<[i8]>, sample_rate: u32) -> TrackerResult<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| unavailable("no output device"))?;
    let supported = device.default_output_config().map_err(unavailable)?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let stream = match sample_format {
        SampleFormat::F32 => build_loop::<f32>(&device, &config, buffer, sample_rate)?,
        SampleFormat::I16 => build_loop::<i16>(&device, &config, buffer, sample_rate)?,
        SampleFormat::U16 => build_loop::<u16>(&device, &config, buffer, sample_rate)?,
        other => return Err(unavailable(format!("unsupported sample format {:?}", other))),
    };
    stream.play().map_err(unavailable)?;
    Ok(stream)
}

fn build_loop<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    buffer: Arc<[i8]>,
    sample_rate: u32,
) -> TrackerResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels);
    let mut cursor = LoopCursor::new(buffer, sample_rate, config.sample_rate.0);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let value = T::from_sample(cursor.next_sample());
                    for sample in frame.iter_mut() {
                        *sample = value;
                    }
                }
            },
            |err| log::error!("audio stream error: {}", err),
            None,
        )
        .map_err(unavailable)
}

/// Walks a looped 8-bit buffer at the output device's rate.
struct LoopCursor {
    buffer: Arc<[i8]>,
    position: f64,
    step: f64,
}

impl LoopCursor {
    fn new(buffer: Arc<[i8]>, buffer_rate: u32, device_rate: u32) -> Self {
        Self {
            buffer,
            position: 0.0,
            step: f64::from(buffer_rate) / f64::from(device_rate),
        }
    }

    fn next_sample(&mut self) -> f32 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        let len = self.buffer.len() as f64;
        let sample = self.buffer[self.position as usize];
        self.position += self.step;
        while self.position >= len {
            self.position -= len;
        }
        f32::from(sample) / 128.0
    }
}
