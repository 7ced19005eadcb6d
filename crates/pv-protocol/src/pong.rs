//! The peerview pong message.
//!
//! A pong describes one peerview node: its role, its position and coverage
//! on the consistent-hash ring, and its view of neighboring peers. It is a
//! wire-ephemeral record: built up by the peerview reporting cycle,
//! serialized, and discarded; parsed fresh on receipt.
//!
//! Wire form is the `jxta:PeerviewPong` XML element. Emission order is
//! fixed (scalar attributes, then InstanceMask, TargetHash, Adv, Options,
//! ClusterMembers, Partners, Candidates, Credential) so serialization is
//! byte-stable.

use quick_xml::events::Event;
use quick_xml::Reader;
use uuid::Uuid;

use crate::peer::{Peer, PeerInfo};
use crate::xml;
use crate::{Advertisement, PeerId, ProtocolError};

pub const PONG_ELEMENT_NAME: &str = "jxta:PeerviewPong";

/// The intent of a pong exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PongAction {
    Invite = 0,
    Promote = 1,
    Demote = 2,
    #[default]
    Status = 3,
}

impl PongAction {
    pub fn text(&self) -> &'static str {
        match self {
            PongAction::Invite => "PONG_INVITE",
            PongAction::Promote => "PONG_PROMOTE",
            PongAction::Demote => "PONG_DEMOTE",
            PongAction::Status => "PONG_STATUS",
        }
    }

    pub fn as_wire(&self) -> u8 {
        *self as u8
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(PongAction::Invite),
            1 => Some(PongAction::Promote),
            2 => Some(PongAction::Demote),
            3 => Some(PongAction::Status),
            _ => None,
        }
    }
}

/// Current role of the reporting peer in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendezvousState {
    Rendezvous = 0,
    #[default]
    Edge = 1,
    Demoting = 2,
}

impl RendezvousState {
    pub fn text(&self) -> &'static str {
        match self {
            RendezvousState::Rendezvous => "RDV_STATE_RENDEZVOUS",
            RendezvousState::Edge => "RDV_STATE_EDGE",
            RendezvousState::Demoting => "RDV_STATE_DEMOTING",
        }
    }

    pub fn as_wire(&self) -> u8 {
        *self as u8
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(RendezvousState::Rendezvous),
            1 => Some(RendezvousState::Edge),
            2 => Some(RendezvousState::Demoting),
            _ => None,
        }
    }
}

/// Scope tracking for the parse loop: which list the nested elements
/// currently belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Partner,
    Associate,
    Candidate,
    /// A list element whose peer id could not be parsed; nested content is
    /// dropped rather than attributed to a stale entry.
    Skipped,
}

/// One peerview node's view of itself and its neighbors.
#[derive(Debug, Clone, Default)]
pub struct PongMessage {
    peer_id: PeerId,
    action: PongAction,
    state: RendezvousState,
    credential: Option<Advertisement>,
    instance_mask: Option<String>,
    target_hash: Option<String>,
    target_hash_radius: Option<String>,
    peer_advertisement: Option<Advertisement>,
    adv_generation: Option<Uuid>,
    adv_expiration: Option<i64>,
    options: Vec<Advertisement>,
    partners: Vec<PeerInfo>,
    associates: Vec<PeerInfo>,
    candidates: Vec<Peer>,
}

impl PongMessage {
    /// An empty message: null peer id, Status action, Edge state, all
    /// optional fields absent and lists empty.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn set_peer_id(&mut self, peer_id: PeerId) {
        self.peer_id = peer_id;
    }

    pub fn action(&self) -> PongAction {
        self.action
    }

    pub fn set_action(&mut self, action: PongAction) {
        self.action = action;
    }

    pub fn action_text(&self) -> &'static str {
        self.action.text()
    }

    /// The role state, a single variant derived from (and normalizing) the
    /// boolean-flavored accessors below.
    pub fn state(&self) -> RendezvousState {
        self.state
    }

    pub fn set_state(&mut self, state: RendezvousState) {
        self.state = state;
    }

    pub fn state_text(&self) -> &'static str {
        self.state.text()
    }

    pub fn is_rendezvous(&self) -> bool {
        self.state != RendezvousState::Edge
    }

    /// Mark the peer as rendezvous (or edge). Entering rendezvous from the
    /// demoting state keeps the demotion; leaving rendezvous always clears
    /// it, so an edge-and-demoting combination cannot arise.
    pub fn set_rendezvous(&mut self, rendezvous: bool) {
        self.state = match (rendezvous, self.state) {
            (true, RendezvousState::Edge) => RendezvousState::Rendezvous,
            (true, current) => current,
            (false, _) => RendezvousState::Edge,
        };
    }

    pub fn is_demoting(&self) -> bool {
        self.state == RendezvousState::Demoting
    }

    /// Mark the peer as stepping down. Demoting implies rendezvous;
    /// clearing it falls back to the plain rendezvous state.
    pub fn set_demoting(&mut self, demoting: bool) {
        self.state = match (demoting, self.state) {
            (true, _) => RendezvousState::Demoting,
            (false, RendezvousState::Demoting) => RendezvousState::Rendezvous,
            (false, current) => current,
        };
    }

    pub fn credential(&self) -> Option<&Advertisement> {
        self.credential.as_ref()
    }

    pub fn set_credential(&mut self, credential: Option<Advertisement>) {
        self.credential = credential;
    }

    pub fn instance_mask(&self) -> Option<&str> {
        self.instance_mask.as_deref()
    }

    pub fn set_instance_mask(&mut self, instance_mask: &str) {
        self.instance_mask = Some(instance_mask.trim().to_string());
    }

    pub fn target_hash(&self) -> Option<&str> {
        self.target_hash.as_deref()
    }

    pub fn set_target_hash(&mut self, target_hash: &str) {
        self.target_hash = Some(target_hash.trim().to_string());
    }

    pub fn target_hash_radius(&self) -> Option<&str> {
        self.target_hash_radius.as_deref()
    }

    pub fn set_target_hash_radius(&mut self, radius: &str) {
        self.target_hash_radius = Some(radius.trim().to_string());
    }

    pub fn peer_advertisement(&self) -> Option<&Advertisement> {
        self.peer_advertisement.as_ref()
    }

    pub fn set_peer_advertisement(&mut self, adv: Option<Advertisement>) {
        self.peer_advertisement = adv;
    }

    pub fn adv_generation(&self) -> Option<Uuid> {
        self.adv_generation
    }

    pub fn set_adv_generation(&mut self, generation: Option<Uuid>) {
        self.adv_generation = generation;
    }

    /// Relative time-to-live of the attached advertisement, milliseconds.
    /// Absent when no advertisement travels with the message.
    pub fn adv_expiration(&self) -> Option<i64> {
        self.adv_expiration
    }

    pub fn set_adv_expiration(&mut self, expiration: Option<i64>) {
        self.adv_expiration = expiration;
    }

    pub fn options(&self) -> &[Advertisement] {
        &self.options
    }

    pub fn add_option(&mut self, option: Advertisement) {
        self.options.push(option);
    }

    pub fn clear_options(&mut self) {
        self.options.clear();
    }

    pub fn partners(&self) -> &[PeerInfo] {
        &self.partners
    }

    /// Append a partner reference. No de-duplication: repeated identical
    /// entries are legal and suppression is a caller responsibility.
    pub fn add_partner_info(
        &mut self,
        peer_id: PeerId,
        adv_generation: Option<Uuid>,
        target_hash: Option<&str>,
        target_hash_radius: Option<&str>,
    ) {
        self.partners.push(PeerInfo::new(
            peer_id,
            adv_generation,
            target_hash,
            target_hash_radius,
        ));
    }

    pub fn clear_partner_infos(&mut self) {
        self.partners.clear();
    }

    pub fn associates(&self) -> &[PeerInfo] {
        &self.associates
    }

    pub fn add_associate_info(
        &mut self,
        peer_id: PeerId,
        adv_generation: Option<Uuid>,
        target_hash: Option<&str>,
        target_hash_radius: Option<&str>,
    ) {
        self.associates.push(PeerInfo::new(
            peer_id,
            adv_generation,
            target_hash,
            target_hash_radius,
        ));
    }

    pub fn clear_associate_infos(&mut self) {
        self.associates.clear();
    }

    pub fn candidates(&self) -> &[Peer] {
        &self.candidates
    }

    pub fn add_candidate_info(&mut self, peer: Peer) {
        self.candidates.push(peer);
    }

    /// Check the message is complete enough to base protocol decisions on.
    ///
    /// Never invoked implicitly by `parse`; a syntactically well-formed but
    /// incomplete message can be constructed and inspected before the
    /// caller decides whether to trust it.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.peer_id.is_null() {
            return Err(ProtocolError::InvalidArgument(
                "peer id must not be the null id".into(),
            ));
        }
        if self.instance_mask.is_none() {
            return Err(ProtocolError::InvalidArgument(
                "instance mask must not be absent".into(),
            ));
        }
        if self.target_hash.is_none() {
            return Err(ProtocolError::InvalidArgument(
                "target hash must not be absent".into(),
            ));
        }
        if self.target_hash_radius.is_none() {
            return Err(ProtocolError::InvalidArgument(
                "target hash radius must not be absent".into(),
            ));
        }
        Ok(())
    }

    /// Serialize to the canonical `jxta:PeerviewPong` document.
    ///
    /// Fails with `InvalidArgument` when the message does not validate.
    /// Absent optional fields are omitted entirely, never emitted empty.
    pub fn get_xml(&self) -> Result<String, ProtocolError> {
        self.validate()?;

        let mut out = String::new();
        out.push('<');
        out.push_str(PONG_ELEMENT_NAME);
        xml::push_attr(&mut out, "peer_id", &self.peer_id.to_string());
        xml::push_attr(&mut out, "rdv_state", &self.state.as_wire().to_string());
        xml::push_attr(&mut out, "pong_action", &self.action.as_wire().to_string());
        out.push_str(">\n");

        // validate() guarantees these three are present.
        if let Some(mask) = &self.instance_mask {
            xml::push_text_element(&mut out, "InstanceMask", mask);
        }
        if let Some(hash) = &self.target_hash {
            out.push_str("<TargetHash");
            if let Some(radius) = &self.target_hash_radius {
                xml::push_attr(&mut out, "radius", radius);
            }
            out.push('>');
            out.push_str(&xml::escape_text(hash));
            out.push_str("</TargetHash>\n");
        }

        if let Some(adv) = &self.peer_advertisement {
            out.push_str("<Adv");
            xml::push_attr(&mut out, "type", adv.doc_type());
            if let Some(generation) = &self.adv_generation {
                xml::push_attr(&mut out, "adv_gen", &generation.to_string());
            }
            if let Some(expiration) = self.adv_expiration {
                xml::push_attr(&mut out, "expiration", &expiration.to_string());
            }
            out.push('>');
            out.push_str(&xml::escape_text(adv.get_xml()));
            out.push_str("</Adv>\n");
        }

        for option in &self.options {
            write_option(&mut out, option);
            out.push('\n');
        }

        // Associates (ClusterMember on the wire) precede partners.
        for info in &self.associates {
            write_peer_info(&mut out, "ClusterMember", info);
        }
        for info in &self.partners {
            write_peer_info(&mut out, "Partner", info);
        }

        for peer in &self.candidates {
            out.push_str("<Candidate");
            xml::push_attr(&mut out, "peer_id", &peer.peer_id().to_string());
            out.push('>');
            if let Some(adv) = peer.advertisement() {
                out.push_str("<Adv");
                xml::push_attr(&mut out, "type", adv.doc_type());
                out.push('>');
                out.push_str(&xml::escape_text(adv.get_xml()));
                out.push_str("</Adv>");
            }
            for option in peer.options() {
                write_option(&mut out, option);
            }
            out.push_str("</Candidate>\n");
        }

        if let Some(credential) = &self.credential {
            xml::push_text_element(&mut out, "Credential", credential.get_xml());
        }

        out.push_str("</");
        out.push_str(PONG_ELEMENT_NAME);
        out.push_str(">\n");

        Ok(out)
    }

    /// Parse a `jxta:PeerviewPong` document.
    ///
    /// Unknown attributes and elements are logged and ignored. Malformed
    /// peer-id strings degrade to the null id; call `validate()` before
    /// trusting the result. Structural failures abort the whole parse.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut reader = Reader::from_str(text);
        let mut msg = PongMessage::new();
        let mut scope = Scope::Global;
        let mut current_candidate: Option<Peer> = None;
        let mut seen_root = false;

        loop {
            match reader.read_event().map_err(ProtocolError::from)? {
                Event::Start(e) => {
                    let name = e.name().as_ref().to_vec();
                    if !seen_root {
                        if name != PONG_ELEMENT_NAME.as_bytes() {
                            return Err(ProtocolError::Parse(format!(
                                "expected {} root element, found {}",
                                PONG_ELEMENT_NAME,
                                String::from_utf8_lossy(&name)
                            )));
                        }
                        msg.read_root_attributes(&xml::attributes(&e)?);
                        seen_root = true;
                        continue;
                    }
                    match name.as_slice() {
                        b"InstanceMask" => {
                            let mask = xml::read_element_text(&mut reader, b"InstanceMask")?;
                            msg.set_instance_mask(&mask);
                        }
                        b"TargetHash" => {
                            let attrs = xml::attributes(&e)?;
                            let radius = attr_value(&attrs, "radius");
                            let hash = xml::read_element_text(&mut reader, b"TargetHash")?;
                            match scope {
                                Scope::Global => {
                                    if let Some(radius) = radius {
                                        msg.set_target_hash_radius(&radius);
                                    }
                                    msg.set_target_hash(&hash);
                                }
                                Scope::Partner => {
                                    fill_peer_info(msg.partners.last_mut(), &hash, radius);
                                }
                                Scope::Associate => {
                                    fill_peer_info(msg.associates.last_mut(), &hash, radius);
                                }
                                Scope::Candidate | Scope::Skipped => {}
                            }
                        }
                        b"Adv" => {
                            let attrs = xml::attributes(&e)?;
                            let doc_type =
                                attr_value(&attrs, "type").unwrap_or_else(|| "jxta:PA".into());
                            let body = xml::read_element_text(&mut reader, b"Adv")?;
                            let adv = Advertisement::new(doc_type, body);
                            match scope {
                                Scope::Global => {
                                    msg.adv_generation = parse_uuid_attr(&attrs, "adv_gen");
                                    msg.adv_expiration = parse_i64_attr(&attrs, "expiration");
                                    msg.peer_advertisement = Some(adv);
                                }
                                Scope::Candidate => {
                                    if let Some(peer) = current_candidate.as_mut() {
                                        peer.set_advertisement(adv);
                                    }
                                }
                                Scope::Partner | Scope::Associate | Scope::Skipped => {
                                    tracing::warn!("ignoring <Adv> outside global/candidate scope");
                                }
                            }
                        }
                        b"Option" => {
                            let attrs = xml::attributes(&e)?;
                            let body = xml::read_element_text(&mut reader, b"Option")?;
                            match attr_value(&attrs, "type") {
                                Some(doc_type) => {
                                    let option = Advertisement::new(doc_type, body);
                                    match scope {
                                        Scope::Global => msg.add_option(option),
                                        Scope::Candidate => {
                                            if let Some(peer) = current_candidate.as_mut() {
                                                peer.add_option(option);
                                            }
                                        }
                                        _ => {
                                            tracing::warn!(
                                                "ignoring <Option> outside global/candidate scope"
                                            );
                                        }
                                    }
                                }
                                None => tracing::warn!("ignoring <Option> without a type"),
                            }
                        }
                        b"Partner" | b"ClusterMember" => {
                            let attrs = xml::attributes(&e)?;
                            let is_partner = name == b"Partner";
                            match list_entry_from_attrs(&attrs) {
                                Some(info) => {
                                    if is_partner {
                                        msg.partners.push(info);
                                        scope = Scope::Partner;
                                    } else {
                                        msg.associates.push(info);
                                        scope = Scope::Associate;
                                    }
                                }
                                None => scope = Scope::Skipped,
                            }
                        }
                        b"Candidate" => {
                            let attrs = xml::attributes(&e)?;
                            match required_peer_id(&attrs) {
                                Some(peer_id) => {
                                    current_candidate = Some(Peer::new(peer_id));
                                    scope = Scope::Candidate;
                                }
                                None => scope = Scope::Skipped,
                            }
                        }
                        b"Credential" => {
                            let body = xml::read_element_text(&mut reader, b"Credential")?;
                            msg.credential = Some(Advertisement::new("jxta:Cred", body));
                        }
                        other => {
                            tracing::warn!(
                                element = %String::from_utf8_lossy(other),
                                "ignoring unrecognized element"
                            );
                            xml::skip_element(&mut reader, other)?;
                        }
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"Partner" | b"ClusterMember" => scope = Scope::Global,
                    b"Candidate" => {
                        if let Some(peer) = current_candidate.take() {
                            msg.candidates.push(peer);
                        }
                        scope = Scope::Global;
                    }
                    name if name == PONG_ELEMENT_NAME.as_bytes() => break,
                    _ => {}
                },
                Event::Empty(e) => {
                    if !seen_root && e.name().as_ref() == PONG_ELEMENT_NAME.as_bytes() {
                        msg.read_root_attributes(&xml::attributes(&e)?);
                        break;
                    }
                    tracing::warn!(
                        element = %String::from_utf8_lossy(e.name().as_ref()),
                        "ignoring unrecognized empty element"
                    );
                }
                Event::Eof => {
                    if !seen_root {
                        return Err(ProtocolError::Parse("empty pong document".into()));
                    }
                    return Err(ProtocolError::Parse(
                        "unexpected end of pong document".into(),
                    ));
                }
                _ => {}
            }
        }

        Ok(msg)
    }

    fn read_root_attributes(&mut self, attrs: &[(String, String)]) {
        for (key, value) in attrs {
            match key.as_str() {
                "type" | "xmlns:jxta" => {}
                "peer_id" => self.peer_id = PeerId::parse_or_null(value),
                "rdv_state" => {
                    let raw: u8 = value.trim().parse().unwrap_or(0);
                    self.state = RendezvousState::from_wire(raw).unwrap_or_else(|| {
                        tracing::warn!(rdv_state = %value, "unrecognized rdv_state value");
                        RendezvousState::Rendezvous
                    });
                }
                "pong_action" => {
                    let raw: u8 = value.trim().parse().unwrap_or(u8::MAX);
                    self.action = PongAction::from_wire(raw).unwrap_or_else(|| {
                        tracing::warn!(pong_action = %value, "unrecognized pong_action value");
                        PongAction::Status
                    });
                }
                other => {
                    tracing::warn!(attribute = %other, value = %value, "ignoring unrecognized attribute");
                }
            }
        }
    }
}

fn write_option(out: &mut String, option: &Advertisement) {
    out.push_str("<Option");
    xml::push_attr(out, "type", option.doc_type());
    out.push('>');
    out.push_str(&xml::escape_text(option.get_xml()));
    out.push_str("</Option>");
}

fn write_peer_info(out: &mut String, tag: &str, info: &PeerInfo) {
    out.push('<');
    out.push_str(tag);
    xml::push_attr(out, "peer_id", &info.peer_id().to_string());
    if let Some(generation) = info.adv_generation() {
        xml::push_attr(out, "adv_gen", &generation.to_string());
    }
    out.push('>');
    if info.target_hash().is_some() || info.target_hash_radius().is_some() {
        out.push_str("<TargetHash");
        if let Some(radius) = info.target_hash_radius() {
            xml::push_attr(out, "radius", radius);
        }
        out.push('>');
        if let Some(hash) = info.target_hash() {
            out.push_str(&xml::escape_text(hash));
        }
        out.push_str("</TargetHash>");
    }
    out.push_str("</");
    out.push_str(tag);
    out.push_str(">\n");
}

fn attr_value(attrs: &[(String, String)], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

fn parse_uuid_attr(attrs: &[(String, String)], name: &str) -> Option<Uuid> {
    let value = attr_value(attrs, name)?;
    match Uuid::try_parse(value.trim()) {
        Ok(uuid) => Some(uuid),
        Err(_) => {
            tracing::error!(attribute = %name, value = %value, "uuid parse failure");
            None
        }
    }
}

fn parse_i64_attr(attrs: &[(String, String)], name: &str) -> Option<i64> {
    let value = attr_value(attrs, name)?;
    match value.trim().parse() {
        Ok(number) => Some(number),
        Err(_) => {
            tracing::warn!(attribute = %name, value = %value, "numeric parse failure");
            None
        }
    }
}

/// Peer id from a list-element attribute set, or None (logged) when the id
/// is missing or malformed. The caller skips the entry in that case.
fn required_peer_id(attrs: &[(String, String)]) -> Option<PeerId> {
    match attr_value(attrs, "peer_id") {
        Some(value) => {
            let peer_id = PeerId::parse_or_null(&value);
            if peer_id.is_null() {
                None
            } else {
                Some(peer_id)
            }
        }
        None => {
            tracing::error!("list element without peer_id attribute");
            None
        }
    }
}

fn list_entry_from_attrs(attrs: &[(String, String)]) -> Option<PeerInfo> {
    let peer_id = required_peer_id(attrs)?;
    let adv_generation = parse_uuid_attr(attrs, "adv_gen");
    for (key, value) in attrs {
        match key.as_str() {
            "peer_id" | "adv_gen" | "type" | "xmlns:jxta" => {}
            other => {
                tracing::warn!(attribute = %other, value = %value, "ignoring unrecognized attribute");
            }
        }
    }
    Some(PeerInfo::new(peer_id, adv_generation, None, None))
}

fn fill_peer_info(info: Option<&mut PeerInfo>, hash: &str, radius: Option<String>) {
    if let Some(info) = info {
        info.set_target_hash(hash);
        if let Some(radius) = radius {
            info.set_target_hash_radius(&radius);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_projection_normalizes() {
        let mut msg = PongMessage::new();
        assert_eq!(msg.state(), RendezvousState::Edge);
        assert!(!msg.is_rendezvous());

        msg.set_demoting(true);
        assert_eq!(msg.state(), RendezvousState::Demoting);
        assert!(msg.is_rendezvous(), "demoting implies rendezvous");

        msg.set_demoting(false);
        assert_eq!(msg.state(), RendezvousState::Rendezvous);

        msg.set_rendezvous(false);
        assert_eq!(msg.state(), RendezvousState::Edge);
        assert!(!msg.is_demoting());
    }

    #[test]
    fn test_action_wire_roundtrip() {
        for action in [
            PongAction::Invite,
            PongAction::Promote,
            PongAction::Demote,
            PongAction::Status,
        ] {
            assert_eq!(PongAction::from_wire(action.as_wire()), Some(action));
        }
        assert_eq!(PongAction::from_wire(9), None);
    }

    #[test]
    fn test_get_xml_requires_validation() {
        let mut msg = PongMessage::new();
        assert!(matches!(
            msg.get_xml(),
            Err(ProtocolError::InvalidArgument(_))
        ));
        msg.set_peer_id(PeerId::new_unique());
        msg.set_instance_mask("mask");
        msg.set_target_hash("AB");
        msg.set_target_hash_radius("7F");
        assert!(msg.get_xml().is_ok());
    }

    #[test]
    fn test_text_labels() {
        let mut msg = PongMessage::new();
        msg.set_action(PongAction::Invite);
        msg.set_state(RendezvousState::Demoting);
        assert_eq!(msg.action_text(), "PONG_INVITE");
        assert_eq!(msg.state_text(), "RDV_STATE_DEMOTING");
    }
}
