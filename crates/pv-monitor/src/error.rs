use pv_protocol::ProtocolError;
use thiserror::Error;

/// Monitor-layer failures. Mirrors the protocol taxonomy and wraps
/// protocol errors surfaced by embedded pong codecs.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<quick_xml::Error> for MonitorError {
    fn from(e: quick_xml::Error) -> Self {
        MonitorError::Parse(e.to_string())
    }
}
