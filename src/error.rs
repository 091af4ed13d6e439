use std::io;
use thiserror::Error;

/// Returned by [`Channel::send`](crate::Core::Channel::Channel::send).
#[derive(Debug, Error)]
pub enum ChannelError<T> {
    /// The channel no longer accepts values; the unsent value is handed back.
    #[error("channel is closed")]
    Closed(T),
}

/// A failed backend operation. Any `Err` returned from a [`Backend`](crate::Threading::Backend)
/// method is fatal for that frontend/backend pair.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("{0}")]
    Failed(String),
}

pub type BackendResult = Result<(), BackendError>;

/// Misuse of a [`Frontend`](crate::Threading::Frontend).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrontendError {
    #[error("frontend {0} initialized twice")]
    AlreadyInitialized(String),

    #[error("frontend {0} is disabled")]
    Disabled(String),
}
