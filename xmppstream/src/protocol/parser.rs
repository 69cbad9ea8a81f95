//! Incremental parser for one XMPP stream document.
//!
//! Input is buffered until a whole unit is available: the stream header, one
//! complete top-level element, or the closing `</stream:stream>`. Each unit is
//! read with a fresh `quick_xml::Reader` over the buffered bytes, so a unit
//! split across any number of reads parses the same as one delivered whole.

use std::str;
use std::sync::Arc;

use quick_xml::errors::SyntaxError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::element::{Element, ProtocolHeader, NS_STREAMS, NS_XML};
use crate::error::*;
use crate::registry::ElementRegistry;
use crate::xml::XmlElement;

/// What the parser found in the stream.
#[derive(Debug)]
pub enum ParserEvent {
    StreamStart(ProtocolHeader),
    Element(Box<dyn Element>),
    StreamEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Stream,
    Ended,
    Failed,
}

enum Unit {
    Incomplete,
    Skip(usize),
    StreamStart {
        len: usize,
        header: ProtocolHeader,
        scope: Vec<(String, String)>,
    },
    Element {
        len: usize,
        element: Box<dyn Element>,
    },
    StreamEnd(usize),
}

#[derive(Debug)]
pub struct XmppParser {
    registry: Arc<ElementRegistry>,
    buffer: Vec<u8>,
    phase: Phase,
    /// Namespace declarations of the stream header, innermost last
    root_scope: Vec<(String, String)>,
}

impl XmppParser {
    pub fn new(registry: Arc<ElementRegistry>) -> Self {
        XmppParser {
            registry,
            buffer: Vec::new(),
            phase: Phase::Header,
            root_scope: Vec::new(),
        }
    }

    /// Bytes received but not yet part of a complete unit.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feeds `data` and reports every unit it completes to `sink`.
    ///
    /// On error the units completed before the failure have been reported and
    /// the parser refuses all further input.
    pub fn parse(&mut self, data: &[u8], sink: &mut dyn FnMut(ParserEvent)) -> Result<()> {
        if self.phase == Phase::Failed {
            return Err(ErrorKind::Parse("parser stopped at an earlier error".into()).into());
        }
        self.buffer.extend_from_slice(data);

        let mut offset = 0;
        let result = loop {
            let unit = match self.next_unit(&self.buffer[offset..]) {
                Ok(unit) => unit,
                Err(e) => break Err(e),
            };
            match unit {
                Unit::Incomplete => break Ok(()),
                Unit::Skip(len) => offset += len,
                Unit::StreamStart { len, header, scope } => {
                    offset += len;
                    self.root_scope = scope;
                    self.phase = Phase::Stream;
                    sink(ParserEvent::StreamStart(header));
                }
                Unit::Element { len, element } => {
                    offset += len;
                    sink(ParserEvent::Element(element));
                }
                Unit::StreamEnd(len) => {
                    offset += len;
                    self.phase = Phase::Ended;
                    sink(ParserEvent::StreamEnd);
                }
            }
        };

        match result {
            Ok(()) => {
                self.buffer.drain(..offset);
            }
            Err(_) => {
                self.phase = Phase::Failed;
                self.buffer.clear();
            }
        }
        result
    }

    fn next_unit(&self, buf: &[u8]) -> Result<Unit> {
        let start = match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(start) => start,
            None if buf.is_empty() => return Ok(Unit::Incomplete),
            None => return Ok(Unit::Skip(buf.len())),
        };
        if start > 0 {
            return Ok(Unit::Skip(start));
        }
        if self.phase == Phase::Ended {
            return Err(ErrorKind::UnexpectedData("data after the end of the stream".into()).into());
        }
        if buf.starts_with(b"</") {
            return self.stream_end(buf);
        }
        self.read_unit(buf)
    }

    fn stream_end(&self, buf: &[u8]) -> Result<Unit> {
        if self.phase != Phase::Stream {
            return Err(ErrorKind::UnexpectedData("closing tag before the stream header".into()).into());
        }
        let close = match buf.iter().position(|&b| b == b'>') {
            Some(close) => close,
            None => return Ok(Unit::Incomplete),
        };
        let qname = str::from_utf8(&buf[2..close])?.trim();
        let (prefix, local) = split_qname(qname);
        if local != "stream" || resolve(&self.root_scope, prefix) != Some(NS_STREAMS) {
            return Err(ErrorKind::UnexpectedData(format!("unexpected closing tag '{}'", qname)).into());
        }
        Ok(Unit::StreamEnd(close + 1))
    }

    fn read_unit(&self, buf: &[u8]) -> Result<Unit> {
        let mut reader = Reader::from_reader(buf);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = true;

        let mut scopes = self.root_scope.clone();
        let mut open: Vec<(XmlElement, usize)> = Vec::new();

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(quick_xml::Error::Syntax(e)) if is_unterminated(&e, buf) => {
                    return Ok(Unit::Incomplete)
                }
                Err(e) => return Err(e.into()),
            };
            let end = reader.buffer_position() as usize;

            match event {
                Event::Start(e) if self.phase == Phase::Header => {
                    let (header, scope) = read_header(&e)?;
                    return Ok(Unit::StreamStart {
                        len: end,
                        header,
                        scope,
                    });
                }
                Event::Start(e) => {
                    let mark = scopes.len();
                    let element = open_element(&e, &mut scopes)?;
                    open.push((element, mark));
                }
                Event::Empty(e) => {
                    if self.phase == Phase::Header {
                        return Err(ErrorKind::UnexpectedData("empty stream header".into()).into());
                    }
                    let mark = scopes.len();
                    let element = open_element(&e, &mut scopes)?;
                    scopes.truncate(mark);
                    if let Some(unit) = self.close_element(&mut open, element, buf, end)? {
                        return Ok(unit);
                    }
                }
                Event::End(_) => {
                    let (element, mark) = match open.pop() {
                        Some(top) => top,
                        None => {
                            return Err(ErrorKind::UnexpectedData("unmatched closing tag".into()).into())
                        }
                    };
                    scopes.truncate(mark);
                    if let Some(unit) = self.close_element(&mut open, element, buf, end)? {
                        return Ok(unit);
                    }
                }
                // Trailing text may stop inside an entity or a UTF-8 sequence.
                Event::Text(_) if end == buf.len() && !open.is_empty() => {
                    return Ok(Unit::Incomplete)
                }
                Event::Text(t) => match open.last_mut() {
                    Some((parent, _)) => parent.add_text(t.unescape()?),
                    None => return Err(text_outside_element()),
                },
                Event::CData(c) => match open.last_mut() {
                    Some((parent, _)) => parent.add_text(str::from_utf8(&c)?),
                    None => return Err(text_outside_element()),
                },
                Event::Eof => return Ok(Unit::Incomplete),
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {
                    if open.is_empty() {
                        return Ok(Unit::Skip(end));
                    }
                }
            }
        }
    }

    /// Attaches a finished element to its parent, or turns it into a unit if
    /// it is a top-level element.
    fn close_element(
        &self,
        open: &mut [(XmlElement, usize)],
        element: XmlElement,
        buf: &[u8],
        end: usize,
    ) -> Result<Option<Unit>> {
        match open.last_mut() {
            Some((parent, _)) => {
                parent.add_child(element);
                Ok(None)
            }
            None => {
                let raw = str::from_utf8(&buf[..end])?;
                let element = self.registry.parse(&element, raw)?;
                Ok(Some(Unit::Element { len: end, element }))
            }
        }
    }
}

fn text_outside_element() -> Error {
    ErrorKind::UnexpectedData("character data outside of an element".into()).into()
}

/// Whether a syntax error only means the buffer stops inside a construct.
fn is_unterminated(error: &SyntaxError, buf: &[u8]) -> bool {
    match error {
        // `<!` needs one more byte to tell its kind.
        SyntaxError::InvalidBangMarkup => buf.ends_with(b"<!"),
        _ => matches!(
            error,
            SyntaxError::UnclosedTag
                | SyntaxError::UnclosedComment
                | SyntaxError::UnclosedCData
                | SyntaxError::UnclosedDoctype
                | SyntaxError::UnclosedPIOrXmlDecl
        ),
    }
}

fn split_qname(qname: &str) -> (&str, &str) {
    qname.split_once(':').unwrap_or(("", qname))
}

fn resolve<'a>(scopes: &'a [(String, String)], prefix: &str) -> Option<&'a str> {
    if prefix == "xml" {
        return Some(NS_XML);
    }
    match scopes.iter().rev().find(|(p, _)| p == prefix) {
        Some((_, namespace)) => Some(namespace),
        None if prefix.is_empty() => Some(""),
        None => None,
    }
}

/// Builds the element for a start tag, pushing its namespace declarations
/// onto `scopes`.
fn open_element(start: &BytesStart, scopes: &mut Vec<(String, String)>) -> Result<XmlElement> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = str::from_utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            scopes.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scopes.push((prefix.to_string(), value));
        } else {
            attributes.push((key.to_string(), value));
        }
    }

    let name = start.name();
    let (prefix, local) = split_qname(str::from_utf8(name.as_ref())?);
    let namespace = resolve(scopes, prefix).ok_or_else(|| {
        Error::new(ErrorKind::Parse(format!("undeclared namespace prefix '{}'", prefix)))
    })?;

    let mut element = XmlElement::new(local, namespace);
    for (key, value) in attributes {
        element.set_attribute(key, value);
    }
    Ok(element)
}

fn read_header(start: &BytesStart) -> Result<(ProtocolHeader, Vec<(String, String)>)> {
    let mut scope = Vec::new();
    let element = open_element(start, &mut scope)?;
    if !element.is("stream", NS_STREAMS) {
        return Err(ErrorKind::UnexpectedData(format!(
            "expected a stream header, got <{}> in '{}'",
            element.name(),
            element.namespace()
        ))
        .into());
    }

    let attribute = |name: &str| element.attribute(name).unwrap_or_default().to_string();
    let header = ProtocolHeader {
        from: attribute("from"),
        to: attribute("to"),
        id: attribute("id"),
        version: attribute("version"),
        lang: attribute("xml:lang"),
    };
    Ok((header, scope))
}
