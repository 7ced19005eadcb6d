//! Opaque advertisement documents.
//!
//! The generic advertisement framework (typed XML documents with their own
//! registered codecs) is an external collaborator. At this boundary an
//! advertisement is a `(doc_type, body)` pair: the type tag used for
//! dispatch and the serialized document text. Messages take ownership of
//! cloned copies at set-time, so an embedded document can never be mutated
//! behind a message's back.

/// A typed, already-serialized document carried inside protocol messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    doc_type: String,
    body: String,
}

impl Advertisement {
    pub fn new(doc_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            body: body.into(),
        }
    }

    /// The advertisement type tag, e.g. `jxta:PA`.
    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// The serialized document text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Serialized form of the document. Advertisements are stored
    /// pre-serialized, so this is the body itself.
    pub fn get_xml(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_semantics() {
        let adv = Advertisement::new("jxta:PA", "<jxta:PA>peer</jxta:PA>");
        let copy = adv.clone();
        assert_eq!(adv, copy);
        assert_eq!(adv.doc_type(), "jxta:PA");
        assert_eq!(adv.get_xml(), "<jxta:PA>peer</jxta:PA>");
    }
}
