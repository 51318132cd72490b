//! # Pre-scan heuristics
//!
//! Two optional passes look at the start of a document before the
//! validating parse:
//!
//! - [`detect_version`] reads the `version` attribute, namespace or
//!   schemaLocation of the first element
//! - [`DoctypeInterpolator`] inserts a DOCTYPE declaration when the document
//!   has none
//!
//! Both work on a growing prefix of the input, trying 2 KB, then 16 KB, then
//! 256 KB before giving up, and both hand back a reader that replays the
//! prefix ahead of the rest of the input, so nothing is consumed.

mod doctype;

use std::collections::HashMap;
use std::io::{self, Chain, Cursor, Read};
use std::ops::ControlFlow;

use crate::sax::{ElementName, ParseEnd, SaxHandler, SaxParser};
use crate::version::VotableVersion;

pub use self::doctype::{DoctypeInterpolator, DoctypeOutcome, Interpolated};

/// Prefix sizes tried in turn, in bytes.
pub const PREFIX_LIMITS: [usize; 3] = [2 * 1024, 16 * 1024, 256 * 1024];

/// A reader that replays a buffered prefix and then continues with the
/// original input.
pub type Prefixed<R> = Chain<Cursor<Vec<u8>>, R>;

/// Buffers the start of a reader without losing it.
pub(crate) struct PrefixBuffer<R> {
    head: Vec<u8>,
    inner: R,
    eof: bool,
}

impl<R: Read> PrefixBuffer<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            head: Vec::new(),
            inner,
            eof: false,
        }
    }

    /// Reads until `limit` bytes are buffered or the input ends.
    pub(crate) fn fill_to(&mut self, limit: usize) -> io::Result<&[u8]> {
        if !self.eof && self.head.len() < limit {
            let wanted = (limit - self.head.len()) as u64;
            let got = Read::take(&mut self.inner, wanted).read_to_end(&mut self.head)?;
            if (got as u64) < wanted {
                self.eof = true;
            }
        }
        Ok(&self.head)
    }

    /// True once the whole input is buffered.
    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    pub(crate) fn head_mut(&mut self) -> &mut Vec<u8> {
        &mut self.head
    }

    pub(crate) fn into_reader(self) -> Prefixed<R> {
        Cursor::new(self.head).chain(self.inner)
    }
}

/// Result of [`detect_version`].
pub struct Sniffed<R> {
    /// Version found, if the first element names a supported one
    pub version: Option<VotableVersion>,
    /// The raw `version` attribute, if present
    pub declared: Option<String>,
    /// The input, unconsumed
    pub reader: Prefixed<R>,
}

/// What the first element says about the version.
#[derive(Debug, Default)]
struct RootProbe {
    found: bool,
    declared: Option<String>,
    version: Option<VotableVersion>,
}

impl SaxHandler for RootProbe {
    fn start_element(
        &mut self,
        name: &ElementName,
        attributes: HashMap<String, String>,
    ) -> ControlFlow<()> {
        self.found = true;
        self.declared = attributes.get("version").map(|v| v.trim().to_string());
        let schema_location = attributes
            .iter()
            .find(|(key, _)| key.as_str() == "schemaLocation" || key.ends_with(":schemaLocation"))
            .map(|(_, value)| value.as_str());

        self.version = self
            .declared
            .as_deref()
            .and_then(|v| v.parse().ok())
            .or_else(|| {
                name.namespace
                    .as_deref()
                    .and_then(VotableVersion::from_namespace)
                    .filter(|v| *v != VotableVersion::V1_3)
            })
            .or_else(|| schema_location.and_then(VotableVersion::from_schema_location))
            .or_else(|| name.namespace.as_deref().and_then(VotableVersion::from_namespace));
        ControlFlow::Break(())
    }

    fn end_element(&mut self, _name: &ElementName) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Looks for the VOTable version declared by the first element.
///
/// The 1.3 namespace is shared by 1.3 and later versions, so an explicit
/// schema file name is preferred to it.
pub fn detect_version<R: Read>(reader: R) -> io::Result<Sniffed<R>> {
    let mut buffer = PrefixBuffer::new(reader);
    let mut probe = RootProbe::default();
    for limit in PREFIX_LIMITS {
        let head = buffer.fill_to(limit)?;
        probe = RootProbe::default();
        let end = SaxParser::new()
            .parse(head, &mut probe)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        if end == ParseEnd::Stopped || buffer.is_eof() {
            break;
        }
    }

    if probe.found {
        log::info!(
            "detected VOTable version {:?} (declared {:?})",
            probe.version,
            probe.declared
        );
    } else {
        log::info!("no root element within {} bytes, version not detected", PREFIX_LIMITS[2]);
    }
    Ok(Sniffed {
        version: probe.version,
        declared: probe.declared,
        reader: buffer.into_reader(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(doc: &str) -> Option<VotableVersion> {
        let sniffed = detect_version(doc.as_bytes()).unwrap();
        let mut replayed = String::new();
        let mut reader = sniffed.reader;
        reader.read_to_string(&mut replayed).unwrap();
        assert_eq!(replayed, doc);
        sniffed.version
    }

    #[test]
    fn test_version_attribute() {
        assert_eq!(
            sniff(r#"<?xml version="1.0"?><VOTABLE version="1.2"><RESOURCE/></VOTABLE>"#),
            Some(VotableVersion::V1_2)
        );
    }

    #[test]
    fn test_namespace_and_schema_location() {
        let doc = r#"<VOTABLE xmlns="http://www.ivoa.net/xml/VOTable/v1.1"></VOTABLE>"#;
        assert_eq!(sniff(doc), Some(VotableVersion::V1_1));

        let doc = r#"<VOTABLE xmlns="http://www.ivoa.net/xml/VOTable/v1.3"
            xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
            xsi:schemaLocation="http://www.ivoa.net/xml/VOTable/v1.3 http://www.ivoa.net/xml/VOTable/VOTable-1.4.xsd">
            </VOTABLE>"#;
        assert_eq!(sniff(doc), Some(VotableVersion::V1_4));

        let doc = r#"<VOTABLE xmlns="http://www.ivoa.net/xml/VOTable/v1.3"/>"#;
        assert_eq!(sniff(doc), Some(VotableVersion::V1_3));
    }

    #[test]
    fn test_late_root_element() {
        let padding = format!("<!--{}-->", " ".repeat(20_000));
        let doc = format!("{}<VOTABLE version=\"1.1\"/>", padding);
        assert_eq!(sniff(&doc), Some(VotableVersion::V1_1));
    }

    #[test]
    fn test_no_version() {
        assert_eq!(sniff("<VOTABLE/>"), None);
        assert_eq!(sniff(""), None);
    }
}
