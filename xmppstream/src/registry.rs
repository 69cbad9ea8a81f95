//! Lookup of element parsers and serializers by (name, namespace).

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use crate::element::{Element, RawXml};
use crate::error::*;
use crate::xml::XmlElement;

/// Parses and serializes one shape of top-level element.
pub trait ElementFactory: Send + Sync {
    /// Builds an element from its parsed tree. `raw` is the exact markup the
    /// tree was parsed from.
    fn parse(&self, element: &XmlElement, raw: &str) -> Result<Box<dyn Element>>;

    /// Serializes `element` as a child of `parent_namespace`, or returns
    /// `None` if it is not of a type this factory writes.
    fn serialize(&self, element: &dyn Element, parent_namespace: &str) -> Result<Option<String>>;
}

/// Keeps unknown elements as their original markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawXmlFactory;

impl ElementFactory for RawXmlFactory {
    fn parse(&self, element: &XmlElement, raw: &str) -> Result<Box<dyn Element>> {
        Ok(Box::new(RawXml::new(
            element.name(),
            element.namespace(),
            raw,
        )))
    }

    fn serialize(&self, element: &dyn Element, _: &str) -> Result<Option<String>> {
        Ok(element
            .downcast_ref::<RawXml>()
            .map(|raw| raw.markup().to_string()))
    }
}

/// A typed element that converts to and from an [`XmlElement`].
///
/// Implement [`Element`] for the type with [`impl_element!`] and register it
/// with [`ElementRegistry::with_payload`].
///
/// [`XmlElement`]: struct.XmlElement.html
/// [`Element`]: trait.Element.html
/// [`impl_element!`]: macro.impl_element.html
/// [`ElementRegistry::with_payload`]: struct.ElementRegistry.html#method.with_payload
pub trait XmlPayload: Element + Sized {
    const NAME: &'static str;
    const NAMESPACE: &'static str;

    fn from_xml(element: &XmlElement) -> Result<Self>;
    fn to_xml(&self) -> XmlElement;
}

/// Implements [`Element`](trait.Element.html) for an [`XmlPayload`](trait.XmlPayload.html) type.
#[macro_export]
macro_rules! impl_element {
    ($t:ty) => {
        impl $crate::Element for $t {
            fn name(&self) -> &str {
                <$t as $crate::XmlPayload>::NAME
            }

            fn namespace(&self) -> &str {
                <$t as $crate::XmlPayload>::NAMESPACE
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };
}

/// [`ElementFactory`] for an [`XmlPayload`] type.
///
/// [`ElementFactory`]: trait.ElementFactory.html
/// [`XmlPayload`]: trait.XmlPayload.html
pub struct GenericElementFactory<T>(PhantomData<fn() -> T>);

impl<T> Default for GenericElementFactory<T> {
    fn default() -> Self {
        GenericElementFactory(PhantomData)
    }
}

impl<T> fmt::Debug for GenericElementFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GenericElementFactory<{}>", std::any::type_name::<T>())
    }
}

impl<T: XmlPayload> ElementFactory for GenericElementFactory<T> {
    fn parse(&self, element: &XmlElement, _: &str) -> Result<Box<dyn Element>> {
        Ok(Box::new(T::from_xml(element)?))
    }

    fn serialize(&self, element: &dyn Element, parent_namespace: &str) -> Result<Option<String>> {
        Ok(element
            .downcast_ref::<T>()
            .map(|payload| payload.to_xml().serialize_in(parent_namespace)))
    }
}

/// Maps (name, namespace) to element factories, falling back to a default
/// factory for everything unregistered.
///
/// The registry is built once and then shared read-only, usually as an
/// `Arc<ElementRegistry>`.
pub struct ElementRegistry {
    default: Arc<dyn ElementFactory>,
    factories: HashMap<(String, String), Arc<dyn ElementFactory>>,
}

impl Default for ElementRegistry {
    fn default() -> Self {
        ElementRegistry::new(Arc::new(RawXmlFactory))
    }
}

impl ElementRegistry {
    pub fn new(default: Arc<dyn ElementFactory>) -> Self {
        ElementRegistry {
            default,
            factories: HashMap::new(),
        }
    }

    /// Registers `factory` for `name` in `namespace`, replacing any earlier one.
    pub fn with_factory<N, S>(mut self, name: N, namespace: S, factory: Arc<dyn ElementFactory>) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        let key = (name.into(), namespace.into());
        if self.factories.contains_key(&key) {
            warn!(name = %key.0, namespace = %key.1, "replacing element factory");
        }
        self.factories.insert(key, factory);
        self
    }

    pub fn with_payload<T: XmlPayload + 'static>(self) -> Self {
        self.with_factory(
            T::NAME,
            T::NAMESPACE,
            Arc::new(GenericElementFactory::<T>::default()),
        )
    }

    pub fn contains(&self, name: &str, namespace: &str) -> bool {
        self.lookup(name, namespace).is_some()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn lookup(&self, name: &str, namespace: &str) -> Option<&Arc<dyn ElementFactory>> {
        self.factories
            .get(&(name.to_string(), namespace.to_string()))
    }

    pub fn parse(&self, element: &XmlElement, raw: &str) -> Result<Box<dyn Element>> {
        self.lookup(element.name(), element.namespace())
            .unwrap_or(&self.default)
            .parse(element, raw)
    }

    pub fn serialize(&self, element: &dyn Element, parent_namespace: &str) -> Result<String> {
        if let Some(factory) = self.lookup(element.name(), element.namespace()) {
            if let Some(markup) = factory.serialize(element, parent_namespace)? {
                return Ok(markup);
            }
        }
        match self.default.serialize(element, parent_namespace)? {
            Some(markup) => Ok(markup),
            None => Err(ErrorKind::NoSerializer {
                name: element.name().to_string(),
                namespace: element.namespace().to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Debug for ElementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("ElementRegistry")
            .field("factories", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::NS_CLIENT;

    #[derive(Debug, PartialEq)]
    struct Ping {
        id: String,
    }

    impl XmlPayload for Ping {
        const NAME: &'static str = "ping";
        const NAMESPACE: &'static str = "urn:xmpp:ping";

        fn from_xml(element: &XmlElement) -> Result<Self> {
            Ok(Ping {
                id: element
                    .attribute("id")
                    .ok_or_else(|| Error::new(ErrorKind::Parse("ping without id".into())))?
                    .to_string(),
            })
        }

        fn to_xml(&self) -> XmlElement {
            XmlElement::new(Self::NAME, Self::NAMESPACE).with_attribute("id", self.id.as_str())
        }
    }

    crate::impl_element!(Ping);

    #[derive(Debug)]
    struct Unwritable;

    impl Element for Unwritable {
        fn name(&self) -> &str {
            "iq"
        }
        fn namespace(&self) -> &str {
            NS_CLIENT
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn test_registered_and_fallback() {
        let registry = ElementRegistry::default().with_payload::<Ping>();
        assert!(registry.contains("ping", "urn:xmpp:ping"));
        assert!(!registry.contains("ping", NS_CLIENT));

        let tree = XmlElement::new("ping", "urn:xmpp:ping").with_attribute("id", "p1");
        let element = registry.parse(&tree, "<ping xmlns='urn:xmpp:ping' id='p1'/>").unwrap();
        assert_eq!(element.downcast_ref::<Ping>(), Some(&Ping { id: "p1".into() }));
        assert_eq!(
            registry.serialize(element.as_ref(), NS_CLIENT).unwrap(),
            "<ping xmlns=\"urn:xmpp:ping\" id=\"p1\"/>"
        );

        let tree = XmlElement::new("presence", NS_CLIENT);
        let raw = "<presence  type='unavailable' />";
        let element = registry.parse(&tree, raw).unwrap();
        assert!(element.is::<RawXml>());
        assert_eq!(registry.serialize(element.as_ref(), NS_CLIENT).unwrap(), raw);
    }

    #[test]
    fn test_factory_error_propagates() {
        let registry = ElementRegistry::default().with_payload::<Ping>();
        let tree = XmlElement::new("ping", "urn:xmpp:ping");
        let e = registry.parse(&tree, "<ping xmlns='urn:xmpp:ping'/>").unwrap_err();
        assert_eq!(*e.kind(), ErrorKind::Parse("ping without id".into()));
    }

    #[test]
    fn test_no_serializer() {
        let registry = ElementRegistry::default();
        let e = registry.serialize(&Unwritable, NS_CLIENT).unwrap_err();
        assert_eq!(
            *e.kind(),
            ErrorKind::NoSerializer {
                name: "iq".into(),
                namespace: NS_CLIENT.into()
            }
        );
    }

    #[test]
    fn test_replace_factory() {
        let registry = ElementRegistry::default()
            .with_payload::<Ping>()
            .with_factory("ping", "urn:xmpp:ping", Arc::new(RawXmlFactory));
        assert_eq!(registry.len(), 1);
        let tree = XmlElement::new("ping", "urn:xmpp:ping");
        let element = registry.parse(&tree, "<ping/>").unwrap();
        assert!(element.is::<RawXml>());
    }
}
