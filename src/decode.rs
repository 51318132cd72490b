//! # STREAM decoding
//!
//! STREAM content reaches the BINARY/BINARY2/FITS consumers through a chain
//! of readers:
//!
//! ```text
//! source ──> codec (none | base64 | gzip | dynamic) ──> consumer
//! ```
//!
//! The source is either an `href` resource or, for inline data, a
//! [`ChannelReader`] fed from the SAX thread through a bounded crossbeam
//! channel.
//!
//! "dynamic" is best effort: the first bytes are sniffed for the gzip magic
//! number, then for base64 text, and the stream is otherwise taken as raw.

use std::fmt;
use std::io::{self, BufRead, BufReader, Chain, Cursor, Read};

use base64::engine::GeneralPurpose;
use base64::prelude::*;
use base64::read::DecoderReader;
use crossbeam_channel::Receiver;
use flate2::read::MultiGzDecoder;

/// Capacity of the inline STREAM channel, in chunks.
pub const PIPE_CAPACITY: usize = 16;

/// Boxed byte source that can move to the consumer thread.
pub type ByteSource = Box<dyn Read + Send>;

/// Value of a STREAM `encoding` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEncoding {
    /// Raw bytes
    None,
    /// Base64 text
    Base64,
    /// Gzip compressed
    Gzip,
    /// Unspecified, detected from content
    Dynamic,
}

/// An `encoding` value the linter does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown STREAM encoding \"{0}\"")]
pub struct UnknownEncoding(pub String);

impl StreamEncoding {
    /// Parses an `encoding` attribute; absent or empty means raw.
    pub fn from_attribute(value: Option<&str>) -> Result<Self, UnknownEncoding> {
        match value.map(str::trim) {
            None | Some("") | Some("none") => Ok(StreamEncoding::None),
            Some("base64") => Ok(StreamEncoding::Base64),
            Some("gzip") => Ok(StreamEncoding::Gzip),
            Some("dynamic") => Ok(StreamEncoding::Dynamic),
            Some(other) => Err(UnknownEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for StreamEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamEncoding::None => "none",
            StreamEncoding::Base64 => "base64",
            StreamEncoding::Gzip => "gzip",
            StreamEncoding::Dynamic => "dynamic",
        })
    }
}

/// Wraps `source` with the decoder for `encoding`.
pub fn decode(source: ByteSource, encoding: StreamEncoding) -> io::Result<ByteSource> {
    Ok(match encoding {
        StreamEncoding::None => source,
        StreamEncoding::Base64 => base64_reader(source),
        StreamEncoding::Gzip => Box::new(MultiGzDecoder::new(BufReader::new(source))),
        StreamEncoding::Dynamic => {
            let (detected, source) = sniff(source)?;
            log::debug!("dynamic STREAM encoding detected as {}", detected);
            decode(source, detected)?
        }
    })
}

static ENGINE: GeneralPurpose = BASE64_STANDARD;

fn base64_reader(source: ByteSource) -> ByteSource {
    Box::new(DecoderReader::new(WhitespaceFilter::new(source), &ENGINE))
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const SNIFF_LEN: usize = 256;

/// Guesses the encoding of a "dynamic" stream from its first bytes, and
/// returns a reader that replays them.
fn sniff(mut source: ByteSource) -> io::Result<(StreamEncoding, ByteSource)> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    Read::take(&mut source, SNIFF_LEN as u64).read_to_end(&mut head)?;

    let detected = if head.starts_with(&GZIP_MAGIC) {
        StreamEncoding::Gzip
    } else if !head.is_empty() && head.iter().all(|b| is_base64_byte(*b)) {
        StreamEncoding::Base64
    } else {
        StreamEncoding::None
    };
    let replay: Chain<Cursor<Vec<u8>>, ByteSource> = Cursor::new(head).chain(source);
    Ok((detected, Box::new(replay)))
}

fn is_base64_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=') || b.is_ascii_whitespace()
}

/// Drops ASCII whitespace from a byte stream, so base64 text with line
/// breaks can be fed to a strict decoder.
pub struct WhitespaceFilter<R> {
    inner: BufReader<R>,
}

impl<R: Read> WhitespaceFilter<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }
}

impl<R: Read> Read for WhitespaceFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let available = self.inner.fill_buf()?;
            if available.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            let mut taken = 0;
            let mut written = 0;
            for b in available {
                if written == buf.len() {
                    break;
                }
                taken += 1;
                if !b.is_ascii_whitespace() {
                    buf[written] = *b;
                    written += 1;
                }
            }
            self.inner.consume(taken);
            if written > 0 {
                return Ok(written);
            }
        }
    }
}

/// Reading end of the inline STREAM pipe.
///
/// Each received chunk is served in order; end of stream is signalled by
/// the sender being dropped.
pub struct ChannelReader {
    receiver: Receiver<Vec<u8>>,
    current: Vec<u8>,
    offset: usize,
}

impl ChannelReader {
    /// Wraps a channel receiver.
    pub fn new(receiver: Receiver<Vec<u8>>) -> Self {
        Self {
            receiver,
            current: Vec::new(),
            offset: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset == self.current.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.current = chunk;
                    self.offset = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.current.len() - self.offset);
        buf[..n].copy_from_slice(&self.current[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

/// Decodes base64 text held in memory, ignoring whitespace.
pub fn decode_base64_text(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64_STANDARD.decode(compact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::thread;

    fn read_all(mut reader: ByteSource) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_encoding_attribute() {
        assert_eq!(StreamEncoding::from_attribute(None), Ok(StreamEncoding::None));
        assert_eq!(
            StreamEncoding::from_attribute(Some(" base64 ")),
            Ok(StreamEncoding::Base64)
        );
        assert!(StreamEncoding::from_attribute(Some("zip")).is_err());
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let text = BASE64_STANDARD.encode(b"hello votable");
        let wrapped = format!("{}\n  {}\r\n", &text[..8], &text[8..]);
        let reader = decode(Box::new(Cursor::new(wrapped.into_bytes())), StreamEncoding::Base64).unwrap();
        assert_eq!(read_all(reader), b"hello votable");
    }

    #[test]
    fn test_gzip() {
        let reader = decode(Box::new(Cursor::new(gzip(b"rows"))), StreamEncoding::Gzip).unwrap();
        assert_eq!(read_all(reader), b"rows");
    }

    #[test]
    fn test_dynamic_sniffing() {
        let gz = decode(Box::new(Cursor::new(gzip(b"abc"))), StreamEncoding::Dynamic).unwrap();
        assert_eq!(read_all(gz), b"abc");

        let b64 = BASE64_STANDARD.encode(b"abc").into_bytes();
        let b64 = decode(Box::new(Cursor::new(b64)), StreamEncoding::Dynamic).unwrap();
        assert_eq!(read_all(b64), b"abc");

        let raw = vec![0u8, 0, 0, 7, 0xff];
        let raw_reader = decode(Box::new(Cursor::new(raw.clone())), StreamEncoding::Dynamic).unwrap();
        assert_eq!(read_all(raw_reader), raw);
    }

    #[test]
    fn test_channel_reader() {
        let (sender, receiver) = bounded::<Vec<u8>>(2);
        let producer = thread::spawn(move || {
            for chunk in [b"ab".to_vec(), Vec::new(), b"cde".to_vec()] {
                sender.send(chunk).unwrap();
            }
        });
        let mut reader = ChannelReader::new(receiver);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        producer.join().unwrap();
        assert_eq!(out, b"abcde");
    }

    #[test]
    fn test_base64_text() {
        assert_eq!(decode_base64_text(" AAAA\nBw== ").unwrap(), vec![0, 0, 0, 7]);
        assert!(decode_base64_text("*").is_err());
    }
}
