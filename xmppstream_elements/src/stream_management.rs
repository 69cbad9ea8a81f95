//! Stream management (XEP-0198) negotiation elements.

use xmppstream::{impl_element, Result, XmlElement, XmlPayload};

pub const NS_SM: &str = "urn:xmpp:sm:2";

fn is_true(value: Option<&str>) -> bool {
    matches!(value, Some("true") | Some("1"))
}

/// `<enable/>`: the client asks for stream management.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamManagementEnable {
    pub resume: bool,
}

impl XmlPayload for StreamManagementEnable {
    const NAME: &'static str = "enable";
    const NAMESPACE: &'static str = NS_SM;

    fn from_xml(element: &XmlElement) -> Result<Self> {
        Ok(StreamManagementEnable {
            resume: is_true(element.attribute("resume")),
        })
    }

    fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::NAME, Self::NAMESPACE);
        if self.resume {
            element.set_attribute("resume", "true");
        }
        element
    }
}

impl_element!(StreamManagementEnable);

/// `<enabled/>`: the server has enabled stream management.
///
/// An empty `resume_id` is not written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamManagementEnabled {
    pub resume_id: String,
    pub resume_supported: bool,
}

impl XmlPayload for StreamManagementEnabled {
    const NAME: &'static str = "enabled";
    const NAMESPACE: &'static str = NS_SM;

    fn from_xml(element: &XmlElement) -> Result<Self> {
        Ok(StreamManagementEnabled {
            resume_id: element.attribute("id").unwrap_or_default().to_string(),
            resume_supported: is_true(element.attribute("resume")),
        })
    }

    fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::NAME, Self::NAMESPACE);
        if !self.resume_id.is_empty() {
            element.set_attribute("id", self.resume_id.as_str());
        }
        if self.resume_supported {
            element.set_attribute("resume", "true");
        }
        element
    }
}

impl_element!(StreamManagementEnabled);
