//! # SAX-style event layer
//!
//! [`SaxParser`] drives a [`SaxHandler`] from a quick-xml namespace-aware
//! reader, turning pull events into push callbacks the way a SAX engine
//! would: start/end element with resolved namespace URIs, prefix mapping
//! scopes, character data, processing instructions and DOCTYPE.
//!
//! Every callback is preceded by [`SaxHandler::set_position`] with the
//! line/column just after the construct, which is what a SAX locator
//! reports.
//!
//! A handler stops the parse early by returning [`ControlFlow::Break`] from
//! any callback that returns a `ControlFlow`. No error is raised for that;
//! [`SaxParser::parse`] returns [`ParseEnd::Stopped`].

mod locator;

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, BufReader, Read};
use std::ops::ControlFlow;

use quick_xml::encoding::Decoder;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::code::Position;

use self::locator::LocatingReader;

/// Errors that make the input unreadable. Malformed XML is not one of
/// these; it is delivered to [`SaxHandler::fatal_error`].
#[derive(Debug, thiserror::Error)]
pub enum SaxError {
    /// Reading the input failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A name or character data could not be decoded
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// How a parse finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseEnd {
    /// The whole document was read
    Completed,
    /// The handler asked to stop
    Stopped,
    /// The document is not well-formed; parsing could not continue
    Fatal,
}

/// Name of an element as seen by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementName {
    /// Resolved namespace URI, if the element is in a namespace
    pub namespace: Option<String>,
    /// Local part of the name
    pub local: String,
    /// Name as written, with any prefix
    pub qname: String,
}

/// Parsed `<!DOCTYPE ...>` declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Doctype {
    /// Root element name
    pub root: String,
    /// Public identifier
    pub public_id: Option<String>,
    /// System identifier
    pub system_id: Option<String>,
}

impl Doctype {
    /// Parses the text between `<!DOCTYPE` and the closing `>`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let head = text.split('[').next().unwrap_or(text);
        let mut words = head.split_whitespace();
        let root = words.next().unwrap_or_default().to_string();
        let keyword = words.next().unwrap_or_default();

        let mut literals = Vec::new();
        let mut rest = head;
        while let Some(start) = rest.find(|c: char| c == '"' || c == '\'') {
            let quote = &rest[start..=start];
            let after = &rest[start + 1..];
            let Some(end) = after.find(quote) else {
                break;
            };
            literals.push(after[..end].to_string());
            rest = &after[end + 1..];
        }

        let mut literals = literals.into_iter();
        let (public_id, system_id) = match keyword {
            "PUBLIC" => (literals.next(), literals.next()),
            "SYSTEM" => (None, literals.next()),
            _ => (None, None),
        };
        Self {
            root,
            public_id,
            system_id,
        }
    }
}

/// Receiver of parse events.
///
/// Only the element callbacks are required.
pub trait SaxHandler {
    /// Location of the event about to be delivered.
    fn set_position(&mut self, _position: Position) {}

    /// Called once before anything else.
    fn start_document(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called once after the root element has closed.
    fn end_document(&mut self) {}

    /// A DOCTYPE declaration.
    fn doctype(&mut self, _doctype: &Doctype) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// A namespace prefix comes into scope for the next element.
    fn start_prefix_mapping(&mut self, _prefix: &str, _uri: &str) {}

    /// A namespace prefix goes out of scope.
    fn end_prefix_mapping(&mut self, _prefix: &str) {}

    /// An element opens. `attributes` excludes namespace declarations.
    fn start_element(
        &mut self,
        name: &ElementName,
        attributes: HashMap<String, String>,
    ) -> ControlFlow<()>;

    /// An element closes.
    fn end_element(&mut self, name: &ElementName) -> ControlFlow<()>;

    /// Character data inside an element, entities expanded. Content may
    /// arrive in several pieces.
    fn characters(&mut self, _text: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// A processing instruction.
    fn processing_instruction(&mut self, _target: &str, _data: &str) {}

    /// An entity reference that could not be expanded.
    fn skipped_entity(&mut self, _name: &str) {}

    /// A recoverable well-formedness or namespace problem.
    fn error(&mut self, _message: &str) {}

    /// An unrecoverable well-formedness problem. No events follow.
    fn fatal_error(&mut self, _message: &str) {}
}

/// Push parser over quick-xml.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaxParser {
    _private: (),
}

macro_rules! forward {
    ($flow:expr) => {
        if $flow.is_break() {
            return Ok(ParseEnd::Stopped);
        }
    };
}

impl SaxParser {
    /// Creates a parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `input`, delivering events to `handler`.
    pub fn parse<R, H>(&self, input: R, handler: &mut H) -> Result<ParseEnd, SaxError>
    where
        R: Read,
        H: SaxHandler + ?Sized,
    {
        let (locating, index) = LocatingReader::new(input);
        let mut reader = NsReader::from_reader(BufReader::with_capacity(64 * 1024, locating));
        reader.config_mut().expand_empty_elements = true;

        let mut buf = Vec::new();
        let mut open: Vec<(ElementName, Vec<String>)> = Vec::new();

        handler.set_position(Position::new(1, 1));
        forward!(handler.start_document());

        loop {
            let step = reader
                .read_resolved_event_into(&mut buf)
                .map(|(resolved, event)| (resolved_namespace(&resolved), event));
            let offset = reader.buffer_position() as u64;
            handler.set_position(index.borrow_mut().locate(offset));
            let decoder = reader.decoder();

            let (namespace, event) = match step {
                Ok(step) => step,
                Err(quick_xml::Error::Io(err)) => {
                    return Err(SaxError::Io(io::Error::new(err.kind(), err.to_string())));
                }
                Err(err) => {
                    handler.fatal_error(&err.to_string());
                    return Ok(ParseEnd::Fatal);
                }
            };

            match event {
                Event::Start(e) => {
                    let qname = decode(decoder, e.name().as_ref())?;
                    let local = decode(decoder, e.local_name().as_ref())?;
                    let namespace = match namespace {
                        Namespace::Bound(uri) => Some(uri),
                        Namespace::Unbound => None,
                        Namespace::Unknown(prefix) => {
                            handler.error(&format!(
                                "Undeclared namespace prefix \"{}\" on <{}>",
                                prefix, qname
                            ));
                            None
                        }
                    };

                    let mut attributes = HashMap::new();
                    let mut prefixes = Vec::new();
                    for attr in e.attributes() {
                        let attr = match attr {
                            Ok(attr) => attr,
                            Err(err) => {
                                handler.error(&format!("Bad attribute on <{}>: {}", qname, err));
                                continue;
                            }
                        };
                        let key = decode(decoder, attr.key.as_ref())?;
                        let value = match attr.decode_and_unescape_value(decoder) {
                            Ok(value) => value.into_owned(),
                            Err(err) => {
                                handler.skipped_entity(&err.to_string());
                                decode(decoder, &attr.value)?
                            }
                        };
                        if key == "xmlns" {
                            handler.start_prefix_mapping("", &value);
                            prefixes.push(String::new());
                        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                            handler.start_prefix_mapping(prefix, &value);
                            prefixes.push(prefix.to_string());
                        } else {
                            attributes.insert(key, value);
                        }
                    }

                    let name = ElementName {
                        namespace,
                        local,
                        qname,
                    };
                    let flow = handler.start_element(&name, attributes);
                    open.push((name, prefixes));
                    forward!(flow);
                }
                Event::End(_) => {
                    if let Some((name, prefixes)) = open.pop() {
                        let flow = handler.end_element(&name);
                        for prefix in prefixes.iter().rev() {
                            handler.end_prefix_mapping(prefix);
                        }
                        forward!(flow);
                    }
                }
                Event::Text(t) => {
                    if open.is_empty() {
                        buf.clear();
                        continue;
                    }
                    let text = match t.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(err) => {
                            handler.skipped_entity(&err.to_string());
                            decode(decoder, &t)?
                        }
                    };
                    forward!(handler.characters(&text));
                }
                Event::CData(c) => {
                    let text = decode(decoder, &c)?;
                    forward!(handler.characters(&text));
                }
                Event::DocType(d) => {
                    let text = decode(decoder, &d)?;
                    forward!(handler.doctype(&Doctype::parse(&text)));
                }
                Event::PI(pi) => {
                    let text = decode(decoder, &pi)?;
                    let text = text.trim();
                    let (target, data) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
                    handler.processing_instruction(target, data.trim());
                }
                Event::Eof => {
                    if let Some((name, _)) = open.last() {
                        handler.fatal_error(&format!(
                            "Unexpected end of document inside <{}>",
                            name.qname
                        ));
                        return Ok(ParseEnd::Fatal);
                    }
                    handler.end_document();
                    return Ok(ParseEnd::Completed);
                }
                _ => {}
            }
            buf.clear();
        }
    }
}

enum Namespace {
    Bound(String),
    Unbound,
    Unknown(String),
}

fn resolved_namespace(resolved: &ResolveResult<'_>) -> Namespace {
    match resolved {
        ResolveResult::Bound(ns) => Namespace::Bound(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound => Namespace::Unbound,
        ResolveResult::Unknown(prefix) => {
            Namespace::Unknown(String::from_utf8_lossy(prefix).into_owned())
        }
    }
}

fn decode(decoder: Decoder, bytes: &[u8]) -> Result<String, SaxError> {
    decoder
        .decode(bytes)
        .map(Cow::into_owned)
        .map_err(|e| SaxError::Encoding(e.to_string()))
}
