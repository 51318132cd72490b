//! DOCTYPE insertion.
//!
//! The prolog is scanned lexically: byte order mark, XML declaration, then
//! any mix of whitespace, comments and processing instructions until either
//! `<!DOCTYPE` or the first element turns up. The DOCTYPE is spliced in just
//! after the XML declaration, or after the byte order mark when there is no
//! declaration, with no line break so that line numbers are unchanged.

use std::io::{self, Read};

use crate::version::VotableVersion;

use super::{PrefixBuffer, Prefixed, PREFIX_LIMITS};

/// What [`DoctypeInterpolator::interpolate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctypeOutcome {
    /// The document already has a DOCTYPE; it is passed on unchanged
    Present,
    /// A DOCTYPE was inserted at this byte offset
    Inserted {
        /// Offset of the insertion in the original input
        offset: usize,
    },
    /// No DOCTYPE or element found within the largest prefix, or the
    /// encoding could not be worked out; the input is passed on unchanged
    Inconclusive,
}

/// Result of [`DoctypeInterpolator::interpolate`].
pub struct Interpolated<R> {
    /// What was done
    pub outcome: DoctypeOutcome,
    /// The document, with any inserted DOCTYPE
    pub reader: Prefixed<R>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    /// Encoding and byte order mark length.
    fn detect(head: &[u8]) -> Option<(Self, usize)> {
        match head {
            [0xef, 0xbb, 0xbf, ..] => Some((TextEncoding::Utf8, 3)),
            [0xff, 0xfe, ..] => Some((TextEncoding::Utf16Le, 2)),
            [0xfe, 0xff, ..] => Some((TextEncoding::Utf16Be, 2)),
            [b'<', 0, b'?', 0, ..] => Some((TextEncoding::Utf16Le, 0)),
            [0, b'<', 0, b'?', ..] => Some((TextEncoding::Utf16Be, 0)),
            [0, ..] | [_, 0, ..] => None,
            _ => Some((TextEncoding::Utf8, 0)),
        }
    }

    /// Decodes as much of `bytes` as possible into characters, each with the
    /// byte offset at which it starts.
    fn decode(self, bytes: &[u8], base: usize) -> Vec<(usize, char)> {
        match self {
            TextEncoding::Utf8 => {
                let valid = match std::str::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(err) => std::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default(),
                };
                valid.char_indices().map(|(i, c)| (base + i, c)).collect()
            }
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                let units = bytes.chunks_exact(2).map(|pair| {
                    if self == TextEncoding::Utf16Le {
                        u16::from_le_bytes([pair[0], pair[1]])
                    } else {
                        u16::from_be_bytes([pair[0], pair[1]])
                    }
                });
                let mut offset = base;
                let mut chars = Vec::new();
                for decoded in char::decode_utf16(units) {
                    match decoded {
                        Ok(c) => {
                            chars.push((offset, c));
                            offset += 2 * c.len_utf16();
                        }
                        Err(_) => break,
                    }
                }
                chars
            }
        }
    }

    fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            TextEncoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prolog {
    Doctype,
    Element { insert_at: usize },
    Incomplete,
}

struct PrologScanner<'a> {
    chars: &'a [(usize, char)],
    end: usize,
    pos: usize,
}

impl<'a> PrologScanner<'a> {
    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.end, |(offset, _)| *offset)
    }

    /// `Some(true)` if the text at the cursor starts with `pattern`,
    /// `None` if there is not enough text to tell.
    fn looking_at(&self, pattern: &str) -> Option<bool> {
        let mut n = 0;
        for expected in pattern.chars() {
            match self.chars.get(self.pos + n) {
                None => return None,
                Some((_, c)) if *c != expected => return Some(false),
                Some(_) => n += 1,
            }
        }
        Some(true)
    }

    /// Moves past the next occurrence of `terminator`.
    fn skip_past(&mut self, terminator: &str) -> bool {
        while self.pos < self.chars.len() {
            if self.looking_at(terminator) == Some(true) {
                self.pos += terminator.chars().count();
                return true;
            }
            self.pos += 1;
        }
        false
    }

    fn skip_whitespace(&mut self) {
        while self
            .chars
            .get(self.pos)
            .is_some_and(|(_, c)| c.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn scan(&mut self) -> Prolog {
        let mut insert_at = self.offset();
        match self.looking_at("<?xml") {
            None => return Prolog::Incomplete,
            Some(true) => {
                let after = self.chars.get(self.pos + 5).map(|(_, c)| *c);
                match after {
                    None => return Prolog::Incomplete,
                    Some(c) if c.is_ascii_whitespace() || c == '?' => {
                        if !self.skip_past("?>") {
                            return Prolog::Incomplete;
                        }
                        insert_at = self.offset();
                    }
                    Some(_) => {}
                }
            }
            Some(false) => {}
        }

        loop {
            self.skip_whitespace();
            if self.pos >= self.chars.len() {
                return Prolog::Incomplete;
            }
            if self.looking_at("<!--") == Some(true) {
                if !self.skip_past("-->") {
                    return Prolog::Incomplete;
                }
            } else if self.looking_at("<?") == Some(true) {
                if !self.skip_past("?>") {
                    return Prolog::Incomplete;
                }
            } else {
                return match self.looking_at("<!DOCTYPE") {
                    Some(true) => Prolog::Doctype,
                    None if self.looking_at("<!") != Some(false) => Prolog::Incomplete,
                    _ => Prolog::Element { insert_at },
                };
            }
        }
    }
}

/// Inserts a canned DOCTYPE into documents that lack one.
#[derive(Debug, Clone)]
pub struct DoctypeInterpolator {
    doctype: String,
}

impl DoctypeInterpolator {
    /// Interpolator inserting the DOCTYPE of `version`.
    pub fn for_version(version: VotableVersion) -> Self {
        Self {
            doctype: format!("<!DOCTYPE VOTABLE SYSTEM \"{}\">", version.dtd_system_id()),
        }
    }

    /// The declaration that gets inserted.
    pub fn doctype(&self) -> &str {
        &self.doctype
    }

    /// Reads enough of `reader` to decide whether a DOCTYPE is needed and
    /// returns the possibly amended document.
    pub fn interpolate<R: Read>(&self, reader: R) -> io::Result<Interpolated<R>> {
        let mut buffer = PrefixBuffer::new(reader);
        let mut outcome = DoctypeOutcome::Inconclusive;
        for limit in PREFIX_LIMITS {
            let head = buffer.fill_to(limit)?;
            let Some((encoding, bom)) = TextEncoding::detect(head) else {
                break;
            };
            let chars = encoding.decode(&head[bom..], bom);
            let mut scanner = PrologScanner {
                chars: &chars,
                end: head.len(),
                pos: 0,
            };
            match scanner.scan() {
                Prolog::Doctype => {
                    outcome = DoctypeOutcome::Present;
                    break;
                }
                Prolog::Element { insert_at } => {
                    let bytes = encoding.encode(&self.doctype);
                    buffer.head_mut().splice(insert_at..insert_at, bytes);
                    outcome = DoctypeOutcome::Inserted { offset: insert_at };
                    break;
                }
                Prolog::Incomplete if buffer.is_eof() => break,
                Prolog::Incomplete => {}
            }
        }
        log::info!("DOCTYPE interpolation: {:?}", outcome);
        Ok(Interpolated {
            outcome,
            reader: buffer.into_reader(),
        })
    }
}
