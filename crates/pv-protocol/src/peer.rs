//! Neighbor references carried inside pong messages.
//!
//! Partner and associate lists hold lightweight `PeerInfo` tuples; the
//! candidate list holds full `Peer` records with enough data to act on a
//! promotion immediately. The asymmetry is deliberate and preserved.

use uuid::Uuid;

use crate::id::generation_urn;
use crate::{Advertisement, PeerId, ProtocolError};

/// One neighbor reference: id, advertisement generation, ring position.
///
/// Owned exclusively by the list that holds it; read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    peer_id: PeerId,
    adv_generation: Option<Uuid>,
    target_hash: Option<String>,
    target_hash_radius: Option<String>,
}

impl PeerInfo {
    pub fn new(
        peer_id: PeerId,
        adv_generation: Option<Uuid>,
        target_hash: Option<&str>,
        target_hash_radius: Option<&str>,
    ) -> Self {
        Self {
            peer_id,
            adv_generation,
            target_hash: target_hash.map(|h| h.trim().to_string()),
            target_hash_radius: target_hash_radius.map(|r| r.trim().to_string()),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn adv_generation(&self) -> Option<Uuid> {
        self.adv_generation
    }

    pub fn target_hash(&self) -> Option<&str> {
        self.target_hash.as_deref()
    }

    pub fn target_hash_radius(&self) -> Option<&str> {
        self.target_hash_radius.as_deref()
    }

    /// Synthetic id derived from the advertisement generation, usable as a
    /// cache/version key.
    pub fn adv_generation_id(&self) -> Result<String, ProtocolError> {
        match &self.adv_generation {
            Some(generation) => Ok(generation_urn(generation)),
            None => Err(ProtocolError::NotFound(
                "no advertisement generation set".into(),
            )),
        }
    }

    pub(crate) fn set_target_hash(&mut self, hash: &str) {
        self.target_hash = Some(hash.trim().to_string());
    }

    pub(crate) fn set_target_hash_radius(&mut self, radius: &str) {
        self.target_hash_radius = Some(radius.trim().to_string());
    }
}

/// A full peer record: id plus optional advertisement and capability
/// options. Carried by the candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    peer_id: PeerId,
    advertisement: Option<Advertisement>,
    options: Vec<Advertisement>,
}

impl Peer {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            advertisement: None,
            options: Vec::new(),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn advertisement(&self) -> Option<&Advertisement> {
        self.advertisement.as_ref()
    }

    pub fn set_advertisement(&mut self, adv: Advertisement) {
        self.advertisement = Some(adv);
    }

    pub fn options(&self) -> &[Advertisement] {
        &self.options
    }

    pub fn add_option(&mut self, option: Advertisement) {
        self.options.push(option);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adv_generation_id() {
        let generation = Uuid::new_v4();
        let info = PeerInfo::new(PeerId::new_unique(), Some(generation), None, None);
        let urn = info.adv_generation_id().unwrap();
        assert!(urn.starts_with("urn:jxta:uuid-"));

        let bare = PeerInfo::new(PeerId::new_unique(), None, None, None);
        assert!(matches!(
            bare.adv_generation_id(),
            Err(ProtocolError::NotFound(_))
        ));
    }

    #[test]
    fn test_hashes_trimmed() {
        let info = PeerInfo::new(PeerId::new_unique(), None, Some(" abc "), Some(" d "));
        assert_eq!(info.target_hash(), Some("abc"));
        assert_eq!(info.target_hash_radius(), Some("d"));
    }
}
