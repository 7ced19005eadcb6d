//! The generic monitor envelope.
//!
//! A `MonitorEntry` carries one embedded advertisement document tagged
//! with the peer-group context and service sub-context it was collected
//! under. It is a pure carrier; batching and bucket structure live in
//! [`crate::MonitorMessage`].

use pv_protocol::{xml, Advertisement};

/// One telemetry record: (context, sub_context, typed payload document).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEntry {
    context: String,
    sub_context: String,
    entry_type: String,
    payload: Advertisement,
}

impl MonitorEntry {
    /// The entry type tag defaults to the payload's document type.
    pub fn new(
        context: impl Into<String>,
        sub_context: impl Into<String>,
        payload: Advertisement,
    ) -> Self {
        Self {
            context: context.into(),
            sub_context: sub_context.into(),
            entry_type: payload.doc_type().to_string(),
            payload,
        }
    }

    /// Peer-group id this entry was collected under.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Service id within the group.
    pub fn sub_context(&self) -> &str {
        &self.sub_context
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    pub fn set_entry_type(&mut self, entry_type: impl Into<String>) {
        self.entry_type = entry_type.into();
    }

    pub fn payload(&self) -> &Advertisement {
        &self.payload
    }

    /// Append the `<Entry type="…">` wire form. Payload text is escaped;
    /// the batch codec re-extracts it on parse.
    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<Entry");
        xml::push_attr(out, "type", &self.entry_type);
        out.push('>');
        out.push_str(&xml::escape_text(self.payload.get_xml()));
        out.push_str("</Entry>\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_defaults_to_payload_type() {
        let entry = MonitorEntry::new(
            "G1",
            "S1",
            Advertisement::new("jxta:PV3MonEntry", "<x/>"),
        );
        assert_eq!(entry.entry_type(), "jxta:PV3MonEntry");
        assert_eq!(entry.context(), "G1");
        assert_eq!(entry.sub_context(), "S1");
    }

    #[test]
    fn test_write_xml_escapes_payload() {
        let entry = MonitorEntry::new("G1", "S1", Advertisement::new("other", "<a b=\"c\"/>"));
        let mut out = String::new();
        entry.write_xml(&mut out);
        assert!(out.starts_with("<Entry type=\"other\">"));
        assert!(out.contains("&lt;a b=&quot;c&quot;/&gt;"));
        assert!(out.ends_with("</Entry>\n"));
    }
}
