/// Playback timing - the periodic tick thread and what it reports to the host
use crate::error::TrackerResult;
use crate::model::ChannelKind;
use crossbeam_channel::{bounded, select, Sender};
use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Notifications for the host. Drained on the host's own thread with
/// [super::Sequencer::poll_events].
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Highlight this row (1-based).
    CursorMoved(usize),
    /// Playback ran off the end of the track; reset play/pause controls.
    Ended,
    /// A channel couldn't start its note. Playback carries on without it.
    VoiceFailed { channel: ChannelKind, message: String },
}

/// One tick per sixteenth note.
pub fn tick_period(tempo: u32) -> Duration {
    Duration::from_secs_f64(60.0 / (4.0 * f64::from(tempo.max(1))))
}

/// Runs a callback at a fixed rate on its own thread until the callback
/// breaks or the task is cancelled. The first call happens immediately.
pub struct PeriodicTask {
    cancel: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F>(name: &str, period: Duration, mut tick: F) -> TrackerResult<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (cancel, cancelled) = bounded::<()>(1);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                if tick().is_break() {
                    return;
                }
                let ticker = crossbeam_channel::tick(period);
                loop {
                    let proceed = select! {
                        recv(cancelled) -> _ => false,
                        recv(ticker) -> _ => tick().is_continue(),
                    };
                    if !proceed {
                        break;
                    }
                }
            })?;

        Ok(Self {
            cancel: Some(cancel),
            worker: Some(worker),
        })
    }

    /// Blocks until any in-flight tick has finished. No tick runs afterwards.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |worker| worker.is_finished())
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the worker's select.
        self.cancel.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("tick thread panicked");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}
