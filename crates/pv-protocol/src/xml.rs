//! Deterministic XML emission and parsing helpers.
//!
//! Emission is hand-ordered string building: attributes in fixed order,
//! nested elements in list order, so serialization is byte-stable and
//! round-trip testable. Parsing is a quick-xml event loop; each message
//! codec drives its own loop with an explicit parse-scope state machine
//! instead of a push-parser callback table.

use quick_xml::escape;
use quick_xml::events::BytesStart;
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::ProtocolError;

/// Escape text for use as attribute value or element content.
pub fn escape_text(raw: &str) -> String {
    escape::escape(raw).into_owned()
}

/// Unescape element content or an attribute value.
pub fn unescape_text(raw: &str) -> Result<String, ProtocolError> {
    escape::unescape(raw)
        .map(|cow| cow.into_owned())
        .map_err(|e| ProtocolError::Parse(e.to_string()))
}

/// Append ` name="escaped-value"` to an output buffer.
pub fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_text(value));
    out.push('"');
}

/// Append `<tag>escaped-content</tag>` followed by a newline.
pub fn push_text_element(out: &mut String, tag: &str, content: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&escape_text(content));
    out.push_str("</");
    out.push_str(tag);
    out.push_str(">\n");
}

/// Collect the attributes of a start tag as owned (name, value) pairs.
pub fn attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, ProtocolError> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ProtocolError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ProtocolError::Parse(e.to_string()))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// Read the content of the element whose start tag was just consumed,
/// unescape it, and trim surrounding whitespace.
pub fn read_element_text(
    reader: &mut Reader<&[u8]>,
    tag: &[u8],
) -> Result<String, ProtocolError> {
    let raw = reader
        .read_text(QName(tag))
        .map_err(|e| ProtocolError::Parse(e.to_string()))?;
    Ok(unescape_text(raw.trim())?)
}

/// Skip the remainder of an unrecognized element, subtree included.
pub fn skip_element(reader: &mut Reader<&[u8]>, tag: &[u8]) -> Result<(), ProtocolError> {
    reader
        .read_to_end(QName(tag))
        .map_err(|e| ProtocolError::Parse(e.to_string()))?;
    Ok(())
}
