//! Error types for the remoting client.

use rocketmq_send_sampler::ClientError;
use thiserror::Error;

/// Errors that can occur while talking to a name server or broker.
#[derive(Error, Debug)]
pub enum RemotingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Connection to {0} closed")]
    ConnectionClosed(String),

    #[error("Frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Remote returned code {code}: {remark}")]
    Broker { code: i32, remark: String },

    #[error("Route error: {0}")]
    Route(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Producer not started")]
    NotStarted,
}

impl From<RemotingError> for ClientError {
    fn from(err: RemotingError) -> Self {
        match err {
            RemotingError::Timeout { millis } => ClientError::Timeout { millis },
            RemotingError::Broker { code, remark } => ClientError::Broker { code, remark },
            RemotingError::InvalidMessage(message) => ClientError::InvalidMessage { message },
            other => ClientError::Transport {
                message: other.to_string(),
            },
        }
    }
}
