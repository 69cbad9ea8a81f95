use std::sync::Arc;

use quick_xml::escape::escape;

use crate::config::XmppLayerConfig;
use crate::element::{Element, ProtocolHeader, NS_STREAMS};
use crate::error::*;
use crate::registry::ElementRegistry;

pub const STREAM_FOOTER: &str = "</stream:stream>";

/// Turns stream headers and elements into their XML text.
#[derive(Debug, Clone)]
pub struct XmppSerializer {
    registry: Arc<ElementRegistry>,
    config: XmppLayerConfig,
}

impl XmppSerializer {
    pub fn new(registry: Arc<ElementRegistry>, config: XmppLayerConfig) -> Self {
        XmppSerializer { registry, config }
    }

    pub fn default_namespace(&self) -> &'static str {
        self.config.stream_type.default_namespace()
    }

    pub fn serialize_header(&self, header: &ProtocolHeader) -> String {
        let mut out = format!(
            "<?xml version=\"1.0\"?><stream:stream xmlns=\"{}\" xmlns:stream=\"{}\"",
            self.default_namespace(),
            NS_STREAMS
        );
        let attributes = [
            ("from", &header.from),
            ("to", &header.to),
            ("id", &header.id),
            ("version", &header.version),
            ("xml:lang", &header.lang),
        ];
        for (name, value) in attributes {
            if !value.is_empty() {
                out.push_str(&format!(" {}=\"{}\"", name, escape(value.as_str())));
            }
        }
        out.push('>');
        out
    }

    pub fn serialize_footer(&self) -> &'static str {
        STREAM_FOOTER
    }

    pub fn serialize_element(&self, element: &dyn Element) -> Result<String> {
        let parent_namespace = if self.config.explicit_top_level_namespace {
            ""
        } else {
            self.default_namespace()
        };
        self.registry.serialize(element, parent_namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{RawXml, StreamType, NS_CLIENT};
    use crate::registry::XmlPayload;
    use crate::xml::XmlElement;

    #[derive(Debug)]
    struct Message {
        body: String,
    }

    impl XmlPayload for Message {
        const NAME: &'static str = "message";
        const NAMESPACE: &'static str = NS_CLIENT;

        fn from_xml(element: &XmlElement) -> Result<Self> {
            Ok(Message {
                body: element.text(),
            })
        }

        fn to_xml(&self) -> XmlElement {
            XmlElement::new(Self::NAME, Self::NAMESPACE)
                .with_child(XmlElement::new("body", Self::NAMESPACE).with_text(&self.body))
        }
    }

    crate::impl_element!(Message);

    fn serializer(config: XmppLayerConfig) -> XmppSerializer {
        let registry = ElementRegistry::default().with_payload::<Message>();
        XmppSerializer::new(Arc::new(registry), config)
    }

    #[test]
    fn test_header() {
        let s = serializer(XmppLayerConfig::default());
        let mut header = ProtocolHeader::to("example.com");
        header.lang = "en".into();
        assert_eq!(
            s.serialize_header(&header),
            "<?xml version=\"1.0\"?><stream:stream xmlns=\"jabber:client\" \
             xmlns:stream=\"http://etherx.jabber.org/streams\" to=\"example.com\" \
             version=\"1.0\" xml:lang=\"en\">"
        );
        assert_eq!(s.serialize_footer(), "</stream:stream>");
    }

    #[test]
    fn test_component_header() {
        let s = serializer(XmppLayerConfig {
            stream_type: StreamType::Component,
            ..Default::default()
        });
        assert_eq!(
            s.serialize_header(&ProtocolHeader::default()),
            "<?xml version=\"1.0\"?><stream:stream xmlns=\"jabber:component:accept\" \
             xmlns:stream=\"http://etherx.jabber.org/streams\">"
        );
    }

    #[test]
    fn test_top_level_namespace() {
        let message = Message { body: "hi".into() };

        let implicit = serializer(XmppLayerConfig::default());
        assert_eq!(
            implicit.serialize_element(&message).unwrap(),
            "<message><body>hi</body></message>"
        );

        let explicit = serializer(XmppLayerConfig {
            explicit_top_level_namespace: true,
            ..Default::default()
        });
        assert_eq!(
            explicit.serialize_element(&message).unwrap(),
            "<message xmlns=\"jabber:client\"><body>hi</body></message>"
        );

        let server = serializer(XmppLayerConfig {
            stream_type: StreamType::Server,
            ..Default::default()
        });
        assert_eq!(
            server.serialize_element(&message).unwrap(),
            "<message xmlns=\"jabber:client\"><body>hi</body></message>"
        );
    }

    #[test]
    fn test_raw_passthrough() {
        let s = serializer(XmppLayerConfig::default());
        let raw = RawXml::new("r", "urn:xmpp:sm:3", "<r xmlns='urn:xmpp:sm:3'/>");
        assert_eq!(s.serialize_element(&raw).unwrap(), "<r xmlns='urn:xmpp:sm:3'/>");
    }
}
