//! STARTTLS negotiation elements.

use xmppstream::{impl_element, Result, XmlElement, XmlPayload};

pub const NS_TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

/// `<starttls/>`, sent by the client and advertised in stream features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartTls {
    pub required: bool,
}

impl XmlPayload for StartTls {
    const NAME: &'static str = "starttls";
    const NAMESPACE: &'static str = NS_TLS;

    fn from_xml(element: &XmlElement) -> Result<Self> {
        Ok(StartTls {
            required: element.find_child("required", NS_TLS).is_some(),
        })
    }

    fn to_xml(&self) -> XmlElement {
        let element = XmlElement::new(Self::NAME, Self::NAMESPACE);
        if self.required {
            element.with_child(XmlElement::new("required", NS_TLS))
        } else {
            element
        }
    }
}

impl_element!(StartTls);

/// `<proceed/>`: the server is ready for the TLS handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsProceed;

impl XmlPayload for TlsProceed {
    const NAME: &'static str = "proceed";
    const NAMESPACE: &'static str = NS_TLS;

    fn from_xml(_: &XmlElement) -> Result<Self> {
        Ok(TlsProceed)
    }

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::NAME, Self::NAMESPACE)
    }
}

impl_element!(TlsProceed);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsFailure;

impl XmlPayload for TlsFailure {
    const NAME: &'static str = "failure";
    const NAMESPACE: &'static str = NS_TLS;

    fn from_xml(_: &XmlElement) -> Result<Self> {
        Ok(TlsFailure)
    }

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::NAME, Self::NAMESPACE)
    }
}

impl_element!(TlsFailure);
