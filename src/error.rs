/// Errors raised by the model and the playback engine
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("audio output unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("pitch {0} is out of range")]
    InvalidPitch(u8),

    #[error("tempo {0} BPM is out of range")]
    InvalidTempo(u32),

    #[error("cannot remove {0} bars: a channel needs at least one bar")]
    InvalidBars(usize),

    #[error("channel length {0} is not a positive whole number of bars")]
    InvalidChannelLength(usize),

    #[error("channels differ in length: {0} rows vs {1} rows")]
    UnevenChannels(usize, usize),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
