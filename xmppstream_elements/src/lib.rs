//! Stream-level elements most XMPP sessions need, ready to register with an
//! `xmppstream::ElementRegistry`.

pub mod stream_management;
pub mod tls;

pub use crate::stream_management::{StreamManagementEnable, StreamManagementEnabled, NS_SM};
pub use crate::tls::{StartTls, TlsFailure, TlsProceed, NS_TLS};

use xmppstream::ElementRegistry;

/// A registry knowing every element of this crate. Everything else is kept
/// as raw markup.
pub fn standard_registry() -> ElementRegistry {
    ElementRegistry::default()
        .with_payload::<StartTls>()
        .with_payload::<TlsProceed>()
        .with_payload::<TlsFailure>()
        .with_payload::<StreamManagementEnable>()
        .with_payload::<StreamManagementEnabled>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use std::sync::Arc;
    use xmppstream::{Element, ParserEvent, RawXml, XmlPayload, XmppParser, XmppSerializer, XmppLayerConfig};

    assert_impl_all!(StreamManagementEnabled: Send, Sync, Clone);

    const HEADER: &[u8] = b"<stream:stream xmlns='jabber:client' \
        xmlns:stream='http://etherx.jabber.org/streams'>";

    fn parse(markup: &str) -> Box<dyn Element> {
        let mut parser = XmppParser::new(Arc::new(standard_registry()));
        let mut elements = Vec::new();
        let mut sink = |event: ParserEvent| {
            if let ParserEvent::Element(e) = event {
                elements.push(e);
            }
        };
        parser.parse(HEADER, &mut sink).unwrap();
        parser.parse(markup.as_bytes(), &mut sink).unwrap();
        assert_eq!(elements.len(), 1);
        elements.remove(0)
    }

    fn serialize(element: &dyn Element) -> String {
        XmppSerializer::new(Arc::new(standard_registry()), XmppLayerConfig::default())
            .serialize_element(element)
            .unwrap()
    }

    #[test]
    fn test_registry_contents() {
        let registry = standard_registry();
        assert_eq!(registry.len(), 5);
        assert!(registry.contains(TlsProceed::NAME, NS_TLS));
        assert!(registry.contains("enabled", "urn:xmpp:sm:2"));
    }

    #[test]
    fn test_proceed() {
        let element = parse("<proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>");
        assert!(element.is::<TlsProceed>());
        assert_eq!(
            serialize(&TlsProceed),
            "<proceed xmlns=\"urn:ietf:params:xml:ns:xmpp-tls\"/>"
        );
    }

    #[test]
    fn test_starttls_required() {
        let element = parse(
            "<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>",
        );
        assert_eq!(
            element.downcast_ref::<StartTls>(),
            Some(&StartTls { required: true })
        );
        assert_eq!(
            serialize(&StartTls { required: true }),
            "<starttls xmlns=\"urn:ietf:params:xml:ns:xmpp-tls\"><required/></starttls>"
        );
    }

    #[test]
    fn test_enabled() {
        let enabled = StreamManagementEnabled {
            resume_id: "some-id".into(),
            resume_supported: true,
        };
        let markup = serialize(&enabled);
        assert_eq!(
            markup,
            "<enabled xmlns=\"urn:xmpp:sm:2\" id=\"some-id\" resume=\"true\"/>"
        );
        assert_eq!(
            parse(&markup).downcast_ref::<StreamManagementEnabled>(),
            Some(&enabled)
        );

        assert_eq!(
            serialize(&StreamManagementEnabled::default()),
            "<enabled xmlns=\"urn:xmpp:sm:2\"/>"
        );
    }

    #[test]
    fn test_enable_and_unknown() {
        let element = parse("<enable xmlns='urn:xmpp:sm:2' resume='1'/>");
        assert_eq!(
            element.downcast_ref::<StreamManagementEnable>(),
            Some(&StreamManagementEnable { resume: true })
        );

        let element = parse("<r xmlns='urn:xmpp:sm:2'/>");
        assert_eq!(
            element.downcast_ref::<RawXml>().map(RawXml::markup),
            Some("<r xmlns='urn:xmpp:sm:2'/>")
        );
    }
}
