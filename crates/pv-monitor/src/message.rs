//! The monitor batch message.
//!
//! Groups heterogeneous monitor entries by (context, sub_context) for one
//! broadcast. Buckets are kept in first-insertion order, nested vectors
//! rather than maps, so flattened iteration and serialization are
//! deterministic.
//!
//! Wire form is the `jxta:Monitor` element: `Context`/`SubContext`/`Entry`
//! nesting, `Requested` markers for request-type messages, an optional
//! `Credential` child.

use quick_xml::events::Event;
use quick_xml::Reader;

use pv_protocol::{xml, Advertisement, PeerId};

use crate::{MonitorEntry, MonitorError};

pub const MONITOR_MSG_ELEMENT_NAME: &str = "jxta:Monitor";

/// What kind of payload a monitor message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorMessageType {
    Monitor = 0,
    Request = 1,
    Command = 2,
    #[default]
    Status = 3,
}

impl MonitorMessageType {
    pub fn text(&self) -> &'static str {
        match self {
            MonitorMessageType::Monitor => "MON_MONITOR",
            MonitorMessageType::Request => "MON_REQUEST",
            MonitorMessageType::Command => "MON_COMMAND",
            MonitorMessageType::Status => "MON_STATUS",
        }
    }

    pub fn as_wire(&self) -> u8 {
        *self as u8
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(MonitorMessageType::Monitor),
            1 => Some(MonitorMessageType::Request),
            2 => Some(MonitorMessageType::Command),
            3 => Some(MonitorMessageType::Status),
            _ => None,
        }
    }
}

/// Command carried by command-type messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorCommand {
    StartMonitor = 0,
    StopMonitor = 1,
    GetType = 2,
    #[default]
    Status = 3,
}

impl MonitorCommand {
    pub fn text(&self) -> &'static str {
        match self {
            MonitorCommand::StartMonitor => "CMD_START_MONITOR",
            MonitorCommand::StopMonitor => "CMD_STOP_MONITOR",
            MonitorCommand::GetType => "CMD_GET_TYPE",
            MonitorCommand::Status => "CMD_STATUS",
        }
    }

    pub fn as_wire(&self) -> u8 {
        *self as u8
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(MonitorCommand::StartMonitor),
            1 => Some(MonitorCommand::StopMonitor),
            2 => Some(MonitorCommand::GetType),
            3 => Some(MonitorCommand::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SubContextBucket {
    id: String,
    entries: Vec<MonitorEntry>,
}

#[derive(Debug, Clone, Default)]
struct ContextBucket {
    id: String,
    subs: Vec<SubContextBucket>,
}

/// A batch of monitor entries plus the sender's identity.
#[derive(Debug, Clone, Default)]
pub struct MonitorMessage {
    peer_id: PeerId,
    msg_type: MonitorMessageType,
    command: MonitorCommand,
    peer_advertisement: Option<Advertisement>,
    credential: Option<Advertisement>,
    requested_types: Vec<String>,
    contexts: Vec<ContextBucket>,
}

impl MonitorMessage {
    pub fn new(msg_type: MonitorMessageType) -> Self {
        Self {
            msg_type,
            ..Self::default()
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn set_peer_id(&mut self, peer_id: PeerId) {
        self.peer_id = peer_id;
    }

    pub fn msg_type(&self) -> MonitorMessageType {
        self.msg_type
    }

    pub fn set_msg_type(&mut self, msg_type: MonitorMessageType) {
        self.msg_type = msg_type;
    }

    pub fn command(&self) -> MonitorCommand {
        self.command
    }

    pub fn set_command(&mut self, command: MonitorCommand) {
        self.command = command;
    }

    /// Sender advertisement, carried on the API surface only; it does not
    /// travel in the `jxta:Monitor` wire form.
    pub fn peer_advertisement(&self) -> Option<&Advertisement> {
        self.peer_advertisement.as_ref()
    }

    pub fn set_peer_advertisement(&mut self, adv: Option<Advertisement>) {
        self.peer_advertisement = adv;
    }

    pub fn credential(&self) -> Option<&Advertisement> {
        self.credential.as_ref()
    }

    pub fn set_credential(&mut self, credential: Option<Advertisement>) {
        self.credential = credential;
    }

    /// Append an entry under its (context, sub_context) bucket, creating
    /// the bucket on first use. Duplicates are allowed; within a bucket
    /// insertion order is preserved.
    pub fn add_entry(&mut self, entry: MonitorEntry) {
        let context = match self.contexts.iter_mut().find(|c| c.id == entry.context()) {
            Some(context) => context,
            None => {
                self.contexts.push(ContextBucket {
                    id: entry.context().to_string(),
                    subs: Vec::new(),
                });
                self.contexts.last_mut().unwrap()
            }
        };
        let sub = match context.subs.iter_mut().find(|s| s.id == entry.sub_context()) {
            Some(sub) => sub,
            None => {
                context.subs.push(SubContextBucket {
                    id: entry.sub_context().to_string(),
                    entries: Vec::new(),
                });
                context.subs.last_mut().unwrap()
            }
        };
        sub.entries.push(entry);
    }

    /// All entries whose type tag matches `type_filter` (all entries when
    /// None), flattened. Buckets are visited in first-insertion order, a
    /// deterministic order the batch commits to.
    pub fn get_entries(&self, type_filter: Option<&str>) -> Vec<&MonitorEntry> {
        self.contexts
            .iter()
            .flat_map(|c| c.subs.iter())
            .flat_map(|s| s.entries.iter())
            .filter(|e| type_filter.map_or(true, |t| e.entry_type() == t))
            .collect()
    }

    /// Remove all entries matching `entry_type`. Buckets emptied by this
    /// become absent, not empty placeholders.
    pub fn clear(&mut self, entry_type: &str) {
        for context in &mut self.contexts {
            for sub in &mut context.subs {
                sub.entries.retain(|e| e.entry_type() != entry_type);
            }
            context.subs.retain(|s| !s.entries.is_empty());
        }
        self.contexts.retain(|c| !c.subs.is_empty());
    }

    /// Wholesale replace of the bucket structure from a flat entry list.
    pub fn set_entries(&mut self, entries: Vec<MonitorEntry>) {
        self.contexts.clear();
        for entry in entries {
            self.add_entry(entry);
        }
    }

    /// Mark an entry type as requested; meaningful on request-type
    /// messages, where each marker becomes a `<Requested>` child.
    pub fn request_add(&mut self, entry_type: impl Into<String>) {
        self.requested_types.push(entry_type.into());
    }

    pub fn requested_types(&self) -> &[String] {
        &self.requested_types
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.peer_id.is_null() {
            return Err(MonitorError::InvalidArgument(
                "peer id must not be the null id".into(),
            ));
        }
        Ok(())
    }

    /// Serialize to the `jxta:Monitor` document.
    pub fn get_xml(&self) -> String {
        let mut out = String::new();
        out.push('<');
        out.push_str(MONITOR_MSG_ELEMENT_NAME);
        xml::push_attr(&mut out, "peer_id", &self.peer_id.to_string());
        xml::push_attr(&mut out, "type", &self.msg_type.as_wire().to_string());
        xml::push_attr(&mut out, "command", &self.command.as_wire().to_string());
        out.push_str(">\n");

        for requested in &self.requested_types {
            out.push_str("<Requested");
            xml::push_attr(&mut out, "type", requested);
            out.push_str("/>\n");
        }

        for context in &self.contexts {
            out.push_str("<Context");
            xml::push_attr(&mut out, "id", &context.id);
            out.push_str(">\n");
            for sub in &context.subs {
                out.push_str("<SubContext");
                xml::push_attr(&mut out, "id", &sub.id);
                out.push_str(">\n");
                for entry in &sub.entries {
                    entry.write_xml(&mut out);
                }
                out.push_str("</SubContext>\n");
            }
            out.push_str("</Context>\n");
        }

        if let Some(credential) = &self.credential {
            xml::push_text_element(&mut out, "Credential", credential.get_xml());
        }

        out.push_str("</");
        out.push_str(MONITOR_MSG_ELEMENT_NAME);
        out.push_str(">\n");
        out
    }

    /// Parse a `jxta:Monitor` document. Entry elements outside a
    /// Context/SubContext pair are logged and dropped; unknown elements
    /// and attributes are logged and ignored.
    pub fn parse(text: &str) -> Result<Self, MonitorError> {
        let mut reader = Reader::from_str(text);
        let mut msg = MonitorMessage::default();
        let mut seen_root = false;
        let mut current_context: Option<String> = None;
        let mut current_sub: Option<String> = None;

        loop {
            match reader.read_event().map_err(MonitorError::from)? {
                Event::Start(e) => {
                    let name = e.name().as_ref().to_vec();
                    if !seen_root {
                        if name != MONITOR_MSG_ELEMENT_NAME.as_bytes() {
                            return Err(MonitorError::Parse(format!(
                                "expected {} root element, found {}",
                                MONITOR_MSG_ELEMENT_NAME,
                                String::from_utf8_lossy(&name)
                            )));
                        }
                        msg.read_root_attributes(&xml::attributes(&e)?);
                        seen_root = true;
                        continue;
                    }
                    match name.as_slice() {
                        b"Context" => {
                            current_context = id_attr(&xml::attributes(&e)?, "Context");
                        }
                        b"SubContext" => {
                            current_sub = id_attr(&xml::attributes(&e)?, "SubContext");
                        }
                        b"Entry" => {
                            let attrs = xml::attributes(&e)?;
                            let entry_type = match attr_value(&attrs, "type") {
                                Some(t) => t,
                                None => {
                                    tracing::warn!("ignoring <Entry> without a type");
                                    xml::skip_element(&mut reader, b"Entry")?;
                                    continue;
                                }
                            };
                            let body = xml::read_element_text(&mut reader, b"Entry")?;
                            match (&current_context, &current_sub) {
                                (Some(context), Some(sub)) => {
                                    msg.add_entry(MonitorEntry::new(
                                        context.clone(),
                                        sub.clone(),
                                        Advertisement::new(entry_type, body),
                                    ));
                                }
                                _ => {
                                    tracing::error!(
                                        "received <Entry> without an enclosing context"
                                    );
                                }
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
                Event::Empty(e) if !seen_root => {
                    if e.name().as_ref() == MONITOR_MSG_ELEMENT_NAME.as_bytes() {
                        msg.read_root_attributes(&xml::attributes(&e)?);
                        break;
                    }
                    tracing::warn!(
                        element = %String::from_utf8_lossy(e.name().as_ref()),
                        "ignoring unrecognized empty element"
                    );
                }
                Event::Empty(e) => match e.name().as_ref() {
                    b"Requested" => {
                        let attrs = xml::attributes(&e)?;
                        match attr_value(&attrs, "type") {
                            Some(requested) => msg.requested_types.push(requested),
                            None => tracing::warn!("ignoring <Requested> without a type"),
                        }
                    }
                    other => {
                        tracing::warn!(
                            element = %String::from_utf8_lossy(other),
                            "ignoring unrecognized empty element"
                        );
                    }
                },
                Event::End(e) => match e.name().as_ref() {
                    b"Context" => {
                        current_context = None;
                        current_sub = None;
                    }
                    b"SubContext" => current_sub = None,
                    name if name == MONITOR_MSG_ELEMENT_NAME.as_bytes() => break,
                    _ => {}
                },
                Event::Eof => {
                    if !seen_root {
                        return Err(MonitorError::Parse("empty monitor document".into()));
                    }
                    return Err(MonitorError::Parse(
                        "unexpected end of monitor document".into(),
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
                "xmlns:jxta" => {}
                "peer_id" => self.peer_id = PeerId::parse_or_null(value),
                "type" => {
                    let raw: u8 = value.trim().parse().unwrap_or(u8::MAX);
                    self.msg_type = MonitorMessageType::from_wire(raw).unwrap_or_else(|| {
                        tracing::warn!(msg_type = %value, "unrecognized message type value");
                        MonitorMessageType::Status
                    });
                }
                "command" => {
                    let raw: u8 = value.trim().parse().unwrap_or(u8::MAX);
                    self.command = MonitorCommand::from_wire(raw).unwrap_or_else(|| {
                        tracing::warn!(command = %value, "unrecognized command value");
                        MonitorCommand::Status
                    });
                }
                other => {
                    tracing::warn!(attribute = %other, value = %value, "ignoring unrecognized attribute");
                }
            }
        }
    }
}

fn attr_value(attrs: &[(String, String)], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

fn id_attr(attrs: &[(String, String)], element: &str) -> Option<String> {
    let id = attr_value(attrs, "id");
    if id.is_none() {
        tracing::warn!(element = %element, "element without an id attribute");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(context: &str, sub: &str, entry_type: &str) -> MonitorEntry {
        MonitorEntry::new(context, sub, Advertisement::new(entry_type, "<x/>"))
    }

    #[test]
    fn test_bucket_first_insertion_order() {
        let mut msg = MonitorMessage::new(MonitorMessageType::Monitor);
        msg.add_entry(entry("G2", "S1", "a"));
        msg.add_entry(entry("G1", "S1", "b"));
        msg.add_entry(entry("G2", "S2", "c"));
        msg.add_entry(entry("G2", "S1", "d"));

        let all: Vec<&str> = msg
            .get_entries(None)
            .iter()
            .map(|e| e.entry_type())
            .collect();
        // G2 bucket first (created first), within it S1 before S2.
        assert_eq!(all, ["a", "d", "c", "b"]);
    }

    #[test]
    fn test_clear_drops_empty_buckets() {
        let mut msg = MonitorMessage::new(MonitorMessageType::Monitor);
        msg.add_entry(entry("G1", "S1", "gone"));
        msg.add_entry(entry("G1", "S2", "kept"));
        msg.clear("gone");
        assert_eq!(msg.get_entries(None).len(), 1);
        assert!(!msg.get_xml().contains("<SubContext id=\"S1\">"));
    }

    #[test]
    fn test_set_entries_replaces() {
        let mut msg = MonitorMessage::new(MonitorMessageType::Monitor);
        msg.add_entry(entry("G1", "S1", "old"));
        msg.set_entries(vec![entry("G2", "S1", "new")]);
        let all = msg.get_entries(None);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].entry_type(), "new");
    }

    #[test]
    fn test_requested_types_roundtrip() {
        let mut msg = MonitorMessage::new(MonitorMessageType::Request);
        msg.set_peer_id(PeerId::new_unique());
        msg.request_add("jxta:PV3MonEntry");
        msg.request_add("other");

        let parsed = MonitorMessage::parse(&msg.get_xml()).unwrap();
        assert_eq!(parsed.msg_type(), MonitorMessageType::Request);
        assert_eq!(parsed.requested_types(), ["jxta:PV3MonEntry", "other"]);
    }

    #[test]
    fn test_validate_requires_peer_id() {
        let mut msg = MonitorMessage::new(MonitorMessageType::Monitor);
        assert!(matches!(
            msg.validate(),
            Err(MonitorError::InvalidArgument(_))
        ));
        msg.set_peer_id(PeerId::new_unique());
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(MonitorMessageType::Monitor.text(), "MON_MONITOR");
        assert_eq!(MonitorCommand::GetType.text(), "CMD_GET_TYPE");
    }
}
