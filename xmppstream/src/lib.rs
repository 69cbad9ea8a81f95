//!Transport and framing core for [XMPP](https://xmpp.org) streams.
//!
//!The crate turns a TCP byte stream into parsed protocol elements and back:
//!
//!- [`Connection`] runs one socket on a dedicated worker thread and reports
//!  `Connected`, `DataRead` and `Disconnected` events through an [`EventLoop`].
//!- [`StreamStack`] chains byte transforms (compression, encryption) between
//!  the connection and the [`XmppLayer`], and can splice new ones in while the
//!  stream is running.
//!- [`XmppLayer`] serializes stream headers and elements, and parses the
//!  inbound stream for an [`XmppLayerClient`].
//!- [`ElementRegistry`] maps (name, namespace) to the factories that parse and
//!  serialize elements. Unregistered elements are kept as [`RawXml`].
//!
//!A typed element implements [`XmlPayload`]:
//!
//!```rust
//!use std::sync::Arc;
//!use xmppstream::*;
//!
//!#[derive(Debug, PartialEq)]
//!struct Ping;
//!
//!impl XmlPayload for Ping {
//!    const NAME: &'static str = "ping";
//!    const NAMESPACE: &'static str = "urn:xmpp:ping";
//!
//!    fn from_xml(_: &XmlElement) -> Result<Self> {
//!        Ok(Ping)
//!    }
//!
//!    fn to_xml(&self) -> XmlElement {
//!        XmlElement::new(Self::NAME, Self::NAMESPACE)
//!    }
//!}
//!
//!impl_element!(Ping);
//!
//!let registry = Arc::new(ElementRegistry::default().with_payload::<Ping>());
//!let serializer = XmppSerializer::new(registry.clone(), XmppLayerConfig::default());
//!assert_eq!(serializer.serialize_element(&Ping).unwrap(), r#"<ping xmlns="urn:xmpp:ping"/>"#);
//!
//!let mut parser = XmppParser::new(registry);
//!let mut elements = Vec::new();
//!parser.parse(
//!    b"<stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams'>\
//!      <ping xmlns='urn:xmpp:ping'/>",
//!    &mut |event| {
//!        if let ParserEvent::Element(e) = event {
//!            elements.push(e);
//!        }
//!    },
//!)?;
//!assert_eq!(elements[0].downcast_ref::<Ping>(), Some(&Ping));
//!# Ok::<(), xmppstream::Error>(())
//!```

mod address;
mod config;
mod connection;
mod element;
mod error;
mod eventloop;
pub mod protocol;
mod registry;
mod streamstack;
mod xml;

pub use crate::address::HostAddressPort;
pub use crate::config::{ConnectionConfig, XmppLayerConfig};
pub use crate::connection::{
    Connection, ConnectionEvent, ConnectionEventKind, ConnectionId, ConnectionState,
    DisconnectError,
};
pub use crate::element::{
    Element, ProtocolHeader, RawXml, StreamType, NS_CLIENT, NS_COMPONENT, NS_SERVER, NS_STREAMS,
    NS_XML,
};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::eventloop::{EventLoop, EventSender};
pub use crate::protocol::{
    LayerContext, ParserEvent, XmppLayer, XmppLayerClient, XmppParser, XmppSerializer,
};
pub use crate::registry::{
    ElementFactory, ElementRegistry, GenericElementFactory, RawXmlFactory, XmlPayload,
};
pub use crate::streamstack::{
    ByteTransform, ConnectionLayer, HighLayer, LowLayer, StreamStack, TransformLayer,
};
pub use crate::xml::{XmlElement, XmlNode};
