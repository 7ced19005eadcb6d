use thiserror::Error;

/// Errors surfaced by the protocol codecs.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A required field is missing or holds the null sentinel.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Structural parse failure. No partial message is returned.
    #[error("parse failure: {0}")]
    Parse(String),

    /// A requested optional sub-field is absent.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<quick_xml::Error> for ProtocolError {
    fn from(e: quick_xml::Error) -> Self {
        ProtocolError::Parse(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ProtocolError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        ProtocolError::Parse(e.to_string())
    }
}
