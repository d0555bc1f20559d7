use thiserror::Error;

/// Failures the caller needs to tell apart from generic I/O errors.
#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error("No recent stories in the {feeds} configured feeds")]
    NoRecentStories { feeds: usize },

    #[error("Speech response contained no audio payload")]
    MissingAudio,

    #[error("Speech response audio could not be decoded: {0}")]
    InvalidAudio(String),

    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Status post failed: {0}")]
    Status(String),
}
