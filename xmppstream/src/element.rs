//! Protocol elements exchanged over a stream.

use std::any::Any;
use std::fmt;

use serde_derive::{Deserialize, Serialize};

pub const NS_STREAMS: &str = "http://etherx.jabber.org/streams";
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";
pub const NS_CLIENT: &str = "jabber:client";
pub const NS_SERVER: &str = "jabber:server";
pub const NS_COMPONENT: &str = "jabber:component:accept";

/// One parsed unit of the stream below the stream header.
///
/// Elements are produced by the factories of an [`ElementRegistry`] and handed
/// to the application; they are never modified afterwards. Use
/// [`downcast_ref`](#method.downcast_ref) to get at the concrete type.
///
/// [`ElementRegistry`]: struct.ElementRegistry.html
pub trait Element: Any + fmt::Debug + Send {
    /// Local name of the top-level XML element
    fn name(&self) -> &str;
    /// Namespace of the top-level XML element
    fn namespace(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

impl dyn Element {
    pub fn downcast_ref<T: Element>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Element>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// The kind of stream, which decides the default namespace of stanzas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StreamType {
    #[default]
    Client,
    Server,
    Component,
}

impl StreamType {
    pub const fn default_namespace(&self) -> &'static str {
        match self {
            StreamType::Client => NS_CLIENT,
            StreamType::Server => NS_SERVER,
            StreamType::Component => NS_COMPONENT,
        }
    }
}

/// Attributes of the opening `<stream:stream>` tag.
///
/// Empty strings stand for absent attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProtocolHeader {
    pub from: String,
    pub to: String,
    pub id: String,
    pub version: String,
    pub lang: String,
}

impl ProtocolHeader {
    pub fn to<S: Into<String>>(to: S) -> Self {
        ProtocolHeader {
            to: to.into(),
            version: "1.0".into(),
            ..Default::default()
        }
    }
}

/// Markup of an element no factory was registered for, kept byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawXml {
    name: String,
    namespace: String,
    markup: String,
}

impl RawXml {
    pub fn new<N, S, M>(name: N, namespace: S, markup: M) -> Self
    where
        N: Into<String>,
        S: Into<String>,
        M: Into<String>,
    {
        RawXml {
            name: name.into(),
            namespace: namespace.into(),
            markup: markup.into(),
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn into_markup(self) -> String {
        self.markup
    }
}

impl Element for RawXml {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast() {
        let element: Box<dyn Element> = Box::new(RawXml::new("presence", NS_CLIENT, "<presence/>"));
        assert!(element.is::<RawXml>());
        assert_eq!(
            element.downcast_ref::<RawXml>().map(RawXml::markup),
            Some("<presence/>")
        );
        assert_eq!(element.name(), "presence");
        assert_eq!(element.namespace(), NS_CLIENT);
    }

    #[test]
    fn test_default_namespaces() {
        assert_eq!(StreamType::default(), StreamType::Client);
        assert_eq!(StreamType::Server.default_namespace(), "jabber:server");
        assert_eq!(
            StreamType::Component.default_namespace(),
            "jabber:component:accept"
        );
    }
}
