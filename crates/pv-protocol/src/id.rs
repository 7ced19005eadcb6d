//! Peer identifiers.
//!
//! Wire form: `urn:jxta:uuid-<32 hex>` for real peers and the well-known
//! null sentinel `urn:jxta:jxta-Null`. Codecs that encounter a malformed id
//! string degrade to the null id and log, rather than failing the whole
//! parse; callers detect this through `validate()` on the message.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::ProtocolError;

const URN_UUID_PREFIX: &str = "urn:jxta:uuid-";
const URN_NULL: &str = "urn:jxta:jxta-Null";

/// A peer identity in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PeerId {
    /// The null sentinel. Never valid as the subject of a protocol message.
    #[default]
    Null,
    Uuid(Uuid),
}

impl PeerId {
    /// Generate a fresh random peer id.
    pub fn new_unique() -> Self {
        PeerId::Uuid(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        PeerId::Uuid(uuid)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PeerId::Null)
    }

    /// Parse an id string, falling back to the null id on failure.
    ///
    /// This is the recovery policy for ids embedded in messages: the field
    /// falls back to the documented default and a diagnostic is logged.
    pub fn parse_or_null(s: &str) -> Self {
        match s.trim().parse() {
            Ok(id) => id,
            Err(_) => {
                tracing::error!(id = %s, "id parse failure, falling back to null id");
                PeerId::Null
            }
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerId::Null => f.write_str(URN_NULL),
            PeerId::Uuid(uuid) => write!(f, "{}{}", URN_UUID_PREFIX, uuid.simple().to_string().to_uppercase()),
        }
    }
}

impl FromStr for PeerId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == URN_NULL {
            return Ok(PeerId::Null);
        }
        let hex = s
            .strip_prefix(URN_UUID_PREFIX)
            .ok_or_else(|| ProtocolError::Parse(format!("not a peer id urn: {s}")))?;
        let uuid = Uuid::try_parse(hex)
            .map_err(|e| ProtocolError::Parse(format!("bad uuid in peer id {s}: {e}")))?;
        Ok(PeerId::Uuid(uuid))
    }
}

/// Format an advertisement-generation UUID as a synthetic jxta urn.
///
/// Used as a cache/version key for peer advertisements.
pub fn generation_urn(generation: &Uuid) -> String {
    format!("{}{}", URN_UUID_PREFIX, generation.simple().to_string().to_uppercase())
}
