use thiserror::Error;

/// Errors raised by clock timer management
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Timer '{0}' already exists")]
    TimerExists(String),

    #[error("Timer '{0}' interval must be positive")]
    InvalidInterval(String),

    #[error("Alert '{name}' time {alert_time} is in the past (now {now})")]
    AlertInPast {
        name: String,
        alert_time: String,
        now: String,
    },
}

/// Errors returned by data and execution clients
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Client {0} is not connected")]
    NotConnected(String),

    #[error("Operation not supported by client: {0}")]
    Unsupported(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Channel full")]
    ChannelFull,
}

/// Errors returned by cache backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}
