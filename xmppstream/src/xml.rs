//! A small namespace-resolved XML tree, the form in which element factories
//! see parsed stanzas and describe the ones they serialize.

use quick_xml::escape::escape;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with a resolved namespace.
///
/// `name` is the local name; prefixes are resolved while parsing and never
/// written back. Attribute names are kept as they appeared (`xml:lang` stays
/// `xml:lang`); namespace declarations are not attributes.
///
/// ```
/// use xmppstream::XmlElement;
///
/// let mut enabled = XmlElement::new("enabled", "urn:xmpp:sm:2");
/// enabled.set_attribute("resume", "true");
/// assert_eq!(
///     enabled.serialize(),
///     r#"<enabled xmlns="urn:xmpp:sm:2" resume="true"/>"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    name: String,
    namespace: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new<N: Into<String>, S: Into<String>>(name: N, namespace: S) -> Self {
        XmlElement {
            name: name.into(),
            namespace: namespace.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is(&self, name: &str, namespace: &str) -> bool {
        self.name == name && self.namespace == namespace
    }

    /// Sets an attribute, replacing an existing one of the same name.
    pub fn set_attribute<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn with_attribute<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn add_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.add_child(child);
        self
    }

    /// Appends character data, merging it with a directly preceding text node.
    pub fn add_text<S: AsRef<str>>(&mut self, text: S) {
        let text = text.as_ref();
        if text.is_empty() {
            return;
        }
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    pub fn with_text<S: AsRef<str>>(mut self, text: S) -> Self {
        self.add_text(text);
        self
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn find_child(&self, name: &str, namespace: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(name, namespace))
    }

    /// Concatenated direct character data.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Serializes the element with an explicit `xmlns` (unless its namespace is empty).
    pub fn serialize(&self) -> String {
        self.serialize_in("")
    }

    /// Serializes the element as a child of an element in `parent_namespace`;
    /// `xmlns` is only written where the namespace changes.
    pub fn serialize_in(&self, parent_namespace: &str) -> String {
        let mut out = String::new();
        self.write_into(&mut out, parent_namespace);
        out
    }

    fn write_into(&self, out: &mut String, parent_namespace: &str) {
        out.push('<');
        out.push_str(&self.name);
        // An empty namespace under a namespaced parent needs `xmlns=""`.
        if self.namespace != parent_namespace {
            push_attribute(out, "xmlns", &self.namespace);
        }
        for (name, value) in &self.attributes {
            push_attribute(out, name, value);
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_into(out, &self.namespace),
                XmlNode::Text(t) => out.push_str(&escape(t.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_nested() {
        let message = XmlElement::new("message", "jabber:client")
            .with_attribute("to", "juliet@example.com")
            .with_child(XmlElement::new("body", "jabber:client").with_text("a < b & c"))
            .with_child(XmlElement::new("active", "http://jabber.org/protocol/chatstates"));

        assert_eq!(
            message.serialize_in("jabber:client"),
            "<message to=\"juliet@example.com\"><body>a &lt; b &amp; c</body>\
             <active xmlns=\"http://jabber.org/protocol/chatstates\"/></message>"
        );
    }

    #[test]
    fn test_serialize_undeclares_default_namespace() {
        let iq = XmlElement::new("iq", "jabber:client")
            .with_child(XmlElement::new("query", "").with_child(XmlElement::new("item", "")));
        assert_eq!(
            iq.serialize_in("jabber:client"),
            "<iq><query xmlns=\"\"><item/></query></iq>"
        );
        assert_eq!(XmlElement::new("x", "").serialize(), "<x/>");
    }

    #[test]
    fn test_attribute_escaping_and_replace() {
        let mut e = XmlElement::new("x", "");
        e.set_attribute("a", "1");
        e.set_attribute("b", "say \"hi\"");
        e.set_attribute("a", "2");
        assert_eq!(e.attribute("a"), Some("2"));
        assert_eq!(e.attributes().count(), 2);
        assert_eq!(e.serialize(), "<x a=\"2\" b=\"say &quot;hi&quot;\"/>");
    }

    #[test]
    fn test_text_merging_and_lookup() {
        let e = XmlElement::new("body", "jabber:client")
            .with_text("Hello")
            .with_text(", world")
            .with_child(XmlElement::new("b", "jabber:client"))
            .with_text("!");
        assert_eq!(e.children().len(), 3);
        assert_eq!(e.text(), "Hello, world!");
        assert!(e.find_child("b", "jabber:client").is_some());
        assert!(e.find_child("b", "urn:other").is_none());
    }
}
