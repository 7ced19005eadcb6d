//! The peerview telemetry envelope.
//!
//! Binds a serialized pong message to the reporting peer's counters:
//! cluster placement, uptime, role-switch counts, promotion statistics.
//! The pong payload is cached as text at set-time (write-through) and
//! re-parsed fresh on every read, so the envelope never aliases a live
//! pong object.
//!
//! Wire form is the `jxta:PV3MonEntry` element: all counters as
//! attributes, the pong as an XML-escaped `<PongMsg>` child.

use quick_xml::events::Event;
use quick_xml::Reader;

use pv_protocol::{xml, Advertisement, PeerId, PongMessage};

use crate::{MonitorEntry, MonitorError};

pub const PV3_MON_ENTRY_ELEMENT_NAME: &str = "jxta:PV3MonEntry";

/// Configured rendezvous mode of the reporting peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RdvConfig {
    #[default]
    AdHoc = 0,
    Edge = 1,
    Rendezvous = 2,
}

impl RdvConfig {
    pub fn as_wire(&self) -> u8 {
        *self as u8
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(RdvConfig::AdHoc),
            1 => Some(RdvConfig::Edge),
            2 => Some(RdvConfig::Rendezvous),
            _ => None,
        }
    }
}

/// Telemetry wrapper around one serialized pong message.
#[derive(Debug, Clone, Default)]
pub struct PeerviewMonitorEntry {
    src_peer_id: PeerId,
    cluster_number: i32,
    cluster_size: i32,
    /// Durations in milliseconds.
    uptime: i64,
    rdv_time: i64,
    pv_time: i64,
    pv_instance_switches: i32,
    rdv_switches: i32,
    promoted_invitations: i32,
    promoted_edges: i32,
    rdv_config: RdvConfig,
    credential: Option<Advertisement>,
    context: Option<String>,
    sub_context: Option<String>,
    pong_xml: Option<String>,
}

impl PeerviewMonitorEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// An entry pre-tagged with the (group, service) pair it will be
    /// batched under.
    pub fn new_with_context(
        context: impl Into<String>,
        sub_context: impl Into<String>,
    ) -> Self {
        Self {
            context: Some(context.into()),
            sub_context: Some(sub_context.into()),
            ..Self::default()
        }
    }

    pub fn src_peer_id(&self) -> PeerId {
        self.src_peer_id
    }

    pub fn set_src_peer_id(&mut self, peer_id: PeerId) {
        self.src_peer_id = peer_id;
    }

    pub fn cluster_number(&self) -> i32 {
        self.cluster_number
    }

    pub fn set_cluster_number(&mut self, cluster_number: i32) {
        self.cluster_number = cluster_number;
    }

    pub fn cluster_size(&self) -> i32 {
        self.cluster_size
    }

    pub fn set_cluster_size(&mut self, cluster_size: i32) {
        self.cluster_size = cluster_size;
    }

    pub fn uptime(&self) -> i64 {
        self.uptime
    }

    pub fn set_uptime(&mut self, uptime: i64) {
        self.uptime = uptime;
    }

    pub fn rdv_time(&self) -> i64 {
        self.rdv_time
    }

    pub fn set_rdv_time(&mut self, rdv_time: i64) {
        self.rdv_time = rdv_time;
    }

    pub fn pv_time(&self) -> i64 {
        self.pv_time
    }

    pub fn set_pv_time(&mut self, pv_time: i64) {
        self.pv_time = pv_time;
    }

    pub fn pv_instance_switches(&self) -> i32 {
        self.pv_instance_switches
    }

    pub fn set_pv_instance_switches(&mut self, count: i32) {
        self.pv_instance_switches = count;
    }

    pub fn rdv_switches(&self) -> i32 {
        self.rdv_switches
    }

    pub fn set_rdv_switches(&mut self, count: i32) {
        self.rdv_switches = count;
    }

    pub fn promoted_invitations(&self) -> i32 {
        self.promoted_invitations
    }

    pub fn set_promoted_invitations(&mut self, count: i32) {
        self.promoted_invitations = count;
    }

    pub fn promoted_edges(&self) -> i32 {
        self.promoted_edges
    }

    pub fn set_promoted_edges(&mut self, count: i32) {
        self.promoted_edges = count;
    }

    pub fn rdv_config(&self) -> RdvConfig {
        self.rdv_config
    }

    pub fn set_rdv_config(&mut self, rdv_config: RdvConfig) {
        self.rdv_config = rdv_config;
    }

    /// Credential is carried on the API surface only; it never travels in
    /// the `jxta:PV3MonEntry` wire form.
    pub fn credential(&self) -> Option<&Advertisement> {
        self.credential.as_ref()
    }

    pub fn set_credential(&mut self, credential: Option<Advertisement>) {
        self.credential = credential;
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn sub_context(&self) -> Option<&str> {
        self.sub_context.as_deref()
    }

    /// Serialize the pong into the internal text cache, write-through.
    /// Later mutation of `pong` does not affect this entry. The pong must
    /// validate, since an unserializable pong has no wire form to cache.
    pub fn set_pong_msg(&mut self, pong: &PongMessage) -> Result<(), MonitorError> {
        // Stored trimmed: embedded text is whitespace-trimmed on parse, so
        // caching it trimmed keeps re-serialization byte-stable.
        self.pong_xml = Some(pong.get_xml()?.trim().to_string());
        Ok(())
    }

    /// The cached serialized pong text, if any.
    pub fn pong_xml(&self) -> Option<&str> {
        self.pong_xml.as_deref()
    }

    /// Re-parse the cached pong text, returning a fresh message every
    /// call. `NotFound` when no pong has been set.
    pub fn get_pong_msg(&self) -> Result<PongMessage, MonitorError> {
        match &self.pong_xml {
            Some(text) => Ok(PongMessage::parse(text)?),
            None => Err(MonitorError::NotFound("no pong payload set".into())),
        }
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.src_peer_id.is_null() {
            return Err(MonitorError::InvalidArgument(
                "source peer id must not be the null id".into(),
            ));
        }
        if self.pong_xml.is_none() {
            return Err(MonitorError::InvalidArgument(
                "pong payload must not be absent".into(),
            ));
        }
        /* Credential-presence checking is intentionally disabled until
         * credential semantics for monitor entries are settled:
         * if self.credential.is_none() { return Err(...); }
         */
        Ok(())
    }

    /// Serialize to the `jxta:PV3MonEntry` document. All counters are
    /// always emitted; the `<PongMsg>` child only when a pong is cached.
    pub fn get_xml(&self) -> String {
        let mut out = String::new();
        out.push('<');
        out.push_str(PV3_MON_ENTRY_ELEMENT_NAME);
        xml::push_attr(&mut out, "src_id", &self.src_peer_id.to_string());
        xml::push_attr(&mut out, "cluster_number", &self.cluster_number.to_string());
        xml::push_attr(&mut out, "cluster_size", &self.cluster_size.to_string());
        xml::push_attr(&mut out, "uptime", &self.uptime.to_string());
        xml::push_attr(&mut out, "rdv_time", &self.rdv_time.to_string());
        xml::push_attr(&mut out, "pv_time", &self.pv_time.to_string());
        xml::push_attr(
            &mut out,
            "pv_instance_switches",
            &self.pv_instance_switches.to_string(),
        );
        xml::push_attr(&mut out, "rdv_switches", &self.rdv_switches.to_string());
        xml::push_attr(
            &mut out,
            "promoted_invitations",
            &self.promoted_invitations.to_string(),
        );
        xml::push_attr(&mut out, "promoted_edges", &self.promoted_edges.to_string());
        xml::push_attr(&mut out, "rdv_config", &self.rdv_config.as_wire().to_string());
        out.push_str(">\n");
        if let Some(pong) = &self.pong_xml {
            xml::push_text_element(&mut out, "PongMsg", pong);
        }
        out.push_str("</");
        out.push_str(PV3_MON_ENTRY_ELEMENT_NAME);
        out.push_str(">\n");
        out
    }

    /// Wrap the serialized form in a `MonitorEntry` under this entry's
    /// (context, sub_context) tags.
    pub fn to_monitor_entry(&self) -> Result<MonitorEntry, MonitorError> {
        let context = self.context.as_deref().ok_or_else(|| {
            MonitorError::InvalidArgument("no context set for monitor entry".into())
        })?;
        let sub_context = self.sub_context.as_deref().ok_or_else(|| {
            MonitorError::InvalidArgument("no sub-context set for monitor entry".into())
        })?;
        Ok(MonitorEntry::new(
            context,
            sub_context,
            Advertisement::new(PV3_MON_ENTRY_ELEMENT_NAME, self.get_xml().trim()),
        ))
    }

    /// Parse a `jxta:PV3MonEntry` document. Unknown attributes and
    /// elements are logged and ignored; unparsable counters degrade to
    /// zero with a diagnostic.
    pub fn parse(text: &str) -> Result<Self, MonitorError> {
        let mut reader = Reader::from_str(text);
        let mut entry = PeerviewMonitorEntry::new();
        let mut seen_root = false;

        loop {
            match reader.read_event().map_err(MonitorError::from)? {
                Event::Start(e) => {
                    let name = e.name().as_ref().to_vec();
                    if !seen_root {
                        if name != PV3_MON_ENTRY_ELEMENT_NAME.as_bytes() {
                            return Err(MonitorError::Parse(format!(
                                "expected {} root element, found {}",
                                PV3_MON_ENTRY_ELEMENT_NAME,
                                String::from_utf8_lossy(&name)
                            )));
                        }
                        entry.read_root_attributes(&xml::attributes(&e)?);
                        seen_root = true;
                        continue;
                    }
                    match name.as_slice() {
                        b"PongMsg" => {
                            let text = xml::read_element_text(&mut reader, b"PongMsg")?;
                            entry.pong_xml = Some(text);
                        }
                        b"Credential" => {
                            // Read and discard; credentials do not travel
                            // in this envelope.
                            let _ = xml::read_element_text(&mut reader, b"Credential")?;
                            tracing::debug!("ignoring <Credential> in monitor entry");
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
                Event::Empty(e) if !seen_root => {
                    if e.name().as_ref() != PV3_MON_ENTRY_ELEMENT_NAME.as_bytes() {
                        return Err(MonitorError::Parse(format!(
                            "expected {} root element, found {}",
                            PV3_MON_ENTRY_ELEMENT_NAME,
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                    entry.read_root_attributes(&xml::attributes(&e)?);
                    break;
                }
                Event::End(e) if e.name().as_ref() == PV3_MON_ENTRY_ELEMENT_NAME.as_bytes() => {
                    break;
                }
                Event::Eof => {
                    if !seen_root {
                        return Err(MonitorError::Parse("empty monitor entry document".into()));
                    }
                    return Err(MonitorError::Parse(
                        "unexpected end of monitor entry document".into(),
                    ));
                }
                _ => {}
            }
        }

        Ok(entry)
    }

    fn read_root_attributes(&mut self, attrs: &[(String, String)]) {
        for (key, value) in attrs {
            match key.as_str() {
                "type" | "xmlns:jxta" => {}
                "src_id" => self.src_peer_id = PeerId::parse_or_null(value),
                "cluster_number" => self.cluster_number = parse_counter(key, value),
                "cluster_size" => self.cluster_size = parse_counter(key, value),
                "uptime" => self.uptime = parse_counter(key, value),
                "rdv_time" => self.rdv_time = parse_counter(key, value),
                "pv_time" => self.pv_time = parse_counter(key, value),
                "pv_instance_switches" => self.pv_instance_switches = parse_counter(key, value),
                "rdv_switches" => self.rdv_switches = parse_counter(key, value),
                "promoted_invitations" => self.promoted_invitations = parse_counter(key, value),
                "promoted_edges" => self.promoted_edges = parse_counter(key, value),
                "rdv_config" => {
                    let raw: u8 = value.trim().parse().unwrap_or(0);
                    self.rdv_config = RdvConfig::from_wire(raw).unwrap_or_else(|| {
                        tracing::warn!(rdv_config = %value, "unrecognized rdv_config value");
                        RdvConfig::AdHoc
                    });
                }
                other => {
                    tracing::warn!(attribute = %other, value = %value, "ignoring unrecognized attribute");
                }
            }
        }
    }
}

/// Numeric attribute with local recovery: a bad value degrades to zero
/// and logs, it does not fail the parse.
fn parse_counter<T: std::str::FromStr + Default>(name: &str, value: &str) -> T {
    match value.trim().parse() {
        Ok(number) => number,
        Err(_) => {
            tracing::warn!(attribute = %name, value = %value, "numeric parse failure");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_through_pong_cache() {
        let mut pong = PongMessage::new();
        pong.set_peer_id(PeerId::new_unique());
        pong.set_instance_mask("mask");
        pong.set_target_hash("AB");
        pong.set_target_hash_radius("7F");

        let mut entry = PeerviewMonitorEntry::new();
        entry.set_pong_msg(&pong).unwrap();

        // Mutating the original afterwards must not change the cache.
        let cached = entry.pong_xml().unwrap().to_string();
        pong.set_instance_mask("other-mask");
        assert_eq!(entry.pong_xml().unwrap(), cached);

        let reparsed = entry.get_pong_msg().unwrap();
        assert_eq!(reparsed.instance_mask(), Some("mask"));
    }

    #[test]
    fn test_get_pong_msg_absent() {
        let entry = PeerviewMonitorEntry::new();
        assert!(matches!(
            entry.get_pong_msg(),
            Err(MonitorError::NotFound(_))
        ));
    }

    #[test]
    fn test_rdv_config_wire_roundtrip() {
        for config in [RdvConfig::AdHoc, RdvConfig::Edge, RdvConfig::Rendezvous] {
            assert_eq!(RdvConfig::from_wire(config.as_wire()), Some(config));
        }
        assert_eq!(RdvConfig::from_wire(7), None);
    }

    #[test]
    fn test_counter_recovery() {
        let doc = "<jxta:PV3MonEntry src_id=\"urn:jxta:jxta-Null\" uptime=\"banana\">\n</jxta:PV3MonEntry>\n";
        let entry = PeerviewMonitorEntry::parse(doc).unwrap();
        assert_eq!(entry.uptime(), 0);
    }
}
