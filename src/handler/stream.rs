//! STREAM handling.
//!
//! A STREAM feeds its parent's consumer (BINARY, BINARY2 or FITS) in one of
//! two ways:
//!
//! - `href`: the resource is opened, decoded and consumed synchronously when
//!   the element starts, and closed again before the hook returns.
//! - inline: character data is pushed through a bounded channel to a
//!   `votlint-stream` thread that decodes and consumes it. The SAX thread
//!   only blocks when the channel is full. When the element ends the channel
//!   is closed, the thread joined, and the diagnostics it buffered are
//!   replayed into the context.

use std::io::Read;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};

use crate::code::codes;
use crate::context::{MessageBuffer, Reporter, VotLintContext};
use crate::decode::{decode, ByteSource, ChannelReader, StreamEncoding, PIPE_CAPACITY};
use crate::stack::{Ancestry, Element};

use super::binary::BinaryConsumer;
use super::fits::FitsConsumer;
use super::Handler;

/// What a STREAM's decoded bytes are fed to.
#[derive(Debug, Clone)]
pub enum Consumer {
    /// BINARY or BINARY2 rows
    Binary(BinaryConsumer),
    /// A FITS file
    Fits(FitsConsumer),
}

impl Consumer {
    /// The consumer for a STREAM inside `parent`, if it accepts one.
    pub fn for_parent(parent: &Handler) -> Option<Self> {
        match parent {
            Handler::Binary(h) => Some(Consumer::Binary(h.consumer())),
            Handler::Fits(h) => Some(Consumer::Fits(h.consumer())),
            _ => None,
        }
    }

    /// Reads the whole stream, returning the number of rows seen, or `None`
    /// if the stream had to be abandoned.
    pub fn consume(&self, input: &mut dyn Read, reporter: &mut dyn Reporter) -> Option<u64> {
        match self {
            Consumer::Binary(c) => c.consume(input, reporter),
            Consumer::Fits(c) => c.consume(input, reporter),
        }
    }
}

type StreamOutcome = (Option<u64>, MessageBuffer);

#[derive(Debug)]
struct Pipe {
    sender: Sender<Vec<u8>>,
    handle: JoinHandle<StreamOutcome>,
}

/// State of an open STREAM.
#[derive(Debug, Default)]
pub struct StreamHandler {
    pipe: Option<Pipe>,
}

impl StreamHandler {
    pub(super) fn start(
        &mut self,
        element: &Element,
        ancestry: &mut Ancestry<'_>,
        ctx: &mut VotLintContext<'_>,
    ) {
        let consumer = ancestry
            .parent()
            .and_then(|frame| Consumer::for_parent(&frame.handler));
        let Some(consumer) = consumer else {
            let parent = ancestry
                .parent()
                .map_or("document", |frame| frame.element.name());
            ctx.error(
                codes::STP,
                format!("STREAM not expected in {}, content not checked", parent),
            );
            return;
        };

        let encoding = match StreamEncoding::from_attribute(element.attribute("encoding")) {
            Ok(encoding) => encoding,
            Err(err) => {
                ctx.error(codes::ENC, format!("{}, STREAM not checked", err));
                return;
            }
        };
        if encoding == StreamEncoding::Dynamic {
            ctx.warning(
                codes::DYN,
                "STREAM encoding \"dynamic\" is guessed from content, checks are weaker"
                    .to_string(),
            );
        }

        match element.attribute("href") {
            Some(href) => {
                let rows = read_href(href, encoding, &consumer, ctx);
                deliver_rows(ancestry, rows);
            }
            None => {
                if encoding != StreamEncoding::Base64 {
                    ctx.warning(
                        codes::SEI,
                        format!(
                            "Inline STREAM data with encoding \"{}\", base64 expected",
                            encoding
                        ),
                    );
                }
                match spawn_pipe(consumer, encoding) {
                    Ok(pipe) => self.pipe = Some(pipe),
                    Err(err) => ctx.error(
                        codes::STH,
                        format!("Can't start STREAM reader thread: {}", err),
                    ),
                }
            }
        }
    }

    /// Forwards inline content to the reader thread. Once that thread has
    /// stopped reading, further content is dropped.
    pub(super) fn feed(&mut self, text: &str) {
        if let Some(pipe) = &self.pipe {
            if pipe.sender.send(text.as_bytes().to_vec()).is_err() {
                log::debug!("STREAM reader finished early, discarding inline data");
            }
        }
    }

    pub(super) fn end(&mut self, ancestry: &mut Ancestry<'_>, ctx: &mut VotLintContext<'_>) {
        let Some(Pipe { sender, handle }) = self.pipe.take() else {
            return;
        };
        drop(sender);
        match handle.join() {
            Ok((rows, messages)) => {
                messages.replay_into(ctx);
                deliver_rows(ancestry, rows);
            }
            Err(_) => ctx.error(codes::STH, "STREAM reader thread panicked".to_string()),
        }
    }
}

fn read_href(
    href: &str,
    encoding: StreamEncoding,
    consumer: &Consumer,
    ctx: &mut VotLintContext<'_>,
) -> Option<u64> {
    let source = match ctx.services().open_resource(href, ctx.base_dir()) {
        Ok(source) => source,
        Err(err) => {
            ctx.error(
                codes::HRF,
                format!("Can't open STREAM href \"{}\": {}", href, err),
            );
            return None;
        }
    };
    log::debug!("reading STREAM from {} ({})", href, encoding);
    match decode(source, encoding) {
        Ok(mut input) => consumer.consume(&mut input, ctx),
        Err(err) => {
            ctx.error(
                codes::SDE,
                format!("Can't decode STREAM href \"{}\": {}", href, err),
            );
            None
        }
    }
}

fn spawn_pipe(consumer: Consumer, encoding: StreamEncoding) -> std::io::Result<Pipe> {
    let (sender, receiver) = bounded::<Vec<u8>>(PIPE_CAPACITY);
    let handle = thread::Builder::new()
        .name("votlint-stream".to_string())
        .spawn(move || {
            let mut messages = MessageBuffer::new();
            let source: ByteSource = Box::new(ChannelReader::new(receiver));
            let rows = match decode(source, encoding) {
                Ok(mut input) => consumer.consume(&mut input, &mut messages),
                Err(err) => {
                    messages.error(codes::SDE, format!("Can't decode STREAM: {}", err));
                    None
                }
            };
            (rows, messages)
        })?;
    Ok(Pipe { sender, handle })
}

fn deliver_rows(ancestry: &mut Ancestry<'_>, rows: Option<u64>) {
    match ancestry.parent_mut().map(|frame| &mut frame.handler) {
        Some(Handler::Binary(h)) => h.set_rows(rows),
        Some(Handler::Fits(h)) => h.set_rows(rows),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Position;
    use crate::message::CollectingSink;
    use crate::services::LintServices;
    use crate::stack::HandlerStack;
    use crate::version::VotableVersion;
    use base64::prelude::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;

    fn element(name: &str, attrs: &[(&str, &str)]) -> Element {
        let attributes: HashMap<String, String> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Element::new(name, attributes, Some(Position::new(1, 1)))
    }

    fn open(stack: &mut HandlerStack, ctx: &mut VotLintContext<'_>, element: Element) {
        let handler = Handler::for_element(element.name());
        stack.push(element, handler);
        if let Some((frame, mut ancestry)) = stack.split_top() {
            frame.handler.start_element(&frame.element, &mut ancestry, ctx);
        }
    }

    fn close(stack: &mut HandlerStack, ctx: &mut VotLintContext<'_>) {
        if let Some((frame, mut ancestry)) = stack.split_top() {
            frame.handler.end_element(&frame.element, &mut ancestry, ctx);
        }
        stack.pop();
    }

    /// Runs TABLE/FIELD(int)/DATA/<container>/STREAM with `text` inside the
    /// STREAM and returns the messages and the TABLE row count.
    fn run_stream(
        container: &str,
        stream_attrs: &[(&str, &str)],
        text: &[&str],
        base_dir: Option<&std::path::Path>,
    ) -> (CollectingSink, Option<u64>) {
        let mut sink = CollectingSink::new();
        let mut rows = None;
        {
            let mut ctx = VotLintContext::new(
                Some(VotableVersion::V1_4),
                &mut sink,
                Arc::new(LintServices::default()),
            );
            ctx.set_base_dir(base_dir.map(|p| p.to_path_buf()));
            let mut stack = HandlerStack::new();
            open(&mut stack, &mut ctx, element("TABLE", &[]));
            open(&mut stack, &mut ctx, element("FIELD", &[("datatype", "int")]));
            close(&mut stack, &mut ctx);
            open(&mut stack, &mut ctx, element("DATA", &[]));
            open(&mut stack, &mut ctx, element(container, &[]));
            open(&mut stack, &mut ctx, element("STREAM", stream_attrs));
            for chunk in text {
                if let Some((frame, _)) = stack.split_top() {
                    frame.handler.characters(chunk);
                }
            }
            close(&mut stack, &mut ctx);
            close(&mut stack, &mut ctx);
            close(&mut stack, &mut ctx);
            if let Some(Handler::Table(table)) = stack.top().map(|frame| &frame.handler) {
                rows = table.rows();
            }
        }
        (sink, rows)
    }

    #[test]
    fn test_inline_base64() {
        let data = BASE64_STANDARD.encode([0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3]);
        let (first, rest) = data.split_at(5);
        let (sink, rows) = run_stream("BINARY", &[("encoding", "base64")], &[first, "\n", rest], None);
        assert!(sink.messages().is_empty(), "{:?}", sink.messages());
        assert_eq!(rows, Some(3));
    }

    #[test]
    fn test_inline_truncated() {
        let data = BASE64_STANDARD.encode([0, 0, 0, 1, 0, 0]);
        let (sink, rows) = run_stream("BINARY2", &[("encoding", "base64")], &[&data], None);
        assert_eq!(sink.with_code(codes::EOF).len(), 1);
        assert_eq!(rows, None);
    }

    #[test]
    fn test_inline_without_base64_warns() {
        let (sink, _) = run_stream("BINARY", &[], &[""], None);
        assert_eq!(sink.with_code(codes::SEI).len(), 1);
    }

    #[test]
    fn test_bad_encoding_and_parent() {
        let (sink, _) = run_stream("BINARY", &[("encoding", "zip")], &[], None);
        assert_eq!(sink.with_code(codes::ENC).len(), 1);

        let (sink, _) = run_stream("TABLEDATA", &[("encoding", "base64")], &[], None);
        assert_eq!(sink.with_code(codes::STP).len(), 1);
    }

    #[test]
    fn test_href_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[0, 0, 0, 9, 0, 0, 0, 8]).unwrap();
        std::fs::write(dir.path().join("rows.bin.gz"), encoder.finish().unwrap()).unwrap();

        let (sink, rows) = run_stream(
            "BINARY",
            &[("href", "rows.bin.gz"), ("encoding", "gzip")],
            &[],
            Some(dir.path()),
        );
        assert!(sink.messages().is_empty(), "{:?}", sink.messages());
        assert_eq!(rows, Some(2));

        let (sink, rows) = run_stream("BINARY", &[("href", "missing.bin")], &[], Some(dir.path()));
        assert_eq!(sink.with_code(codes::HRF).len(), 1);
        assert_eq!(rows, None);
    }

    #[test]
    fn test_dynamic_warns() {
        let data = BASE64_STANDARD.encode([0, 0, 0, 1]);
        let (sink, rows) = run_stream("BINARY", &[("encoding", "dynamic")], &[&data], None);
        assert_eq!(sink.with_code(codes::DYN).len(), 1);
        assert_eq!(rows, Some(1));
    }
}
