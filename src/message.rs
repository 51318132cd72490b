//! # Message sinks
//!
//! Diagnostics leave the linter through the [`MessageSink`] trait. Three
//! implementations are provided:
//!
//! - [`PrintSaxMessager`]: human-readable text, with duplicate suppression,
//!   a per-code repeat cap and optional debug backtraces
//! - [`JsonLinesSink`]: one JSON object per message, for tooling
//! - [`CollectingSink`]: keeps everything in memory, mostly for tests

use std::backtrace::Backtrace;
use std::collections::{HashMap, HashSet};
use std::io::Write;

#[cfg(feature = "colorized_output")]
use console::style;

use crate::code::{Level, Message, VotLintCode};

/// Destination for lint diagnostics.
pub trait MessageSink {
    /// Delivers one diagnostic.
    fn report_message(&mut self, message: &Message);
}

impl<S: MessageSink + ?Sized> MessageSink for &mut S {
    fn report_message(&mut self, message: &Message) {
        (**self).report_message(message)
    }
}

/// Default number of messages printed per code before suppression starts.
pub const DEFAULT_MAX_REPEAT: usize = 4;

/// Text sink writing one line per message.
///
/// Identical messages (same level, code, text and position) are printed
/// once. After `max_repeat` messages with the same code, further messages
/// with that code are counted but not printed; a single notice is written
/// the first time that happens.
pub struct PrintSaxMessager<W: Write> {
    out: W,
    max_repeat: usize,
    debug: bool,
    colored: bool,
    seen: HashSet<Message>,
    per_code: HashMap<VotLintCode, usize>,
    suppressed: usize,
    write_failed: bool,
}

impl<W: Write> PrintSaxMessager<W> {
    /// Creates a text sink with the default repeat cap.
    pub fn new(out: W) -> Self {
        Self {
            out,
            max_repeat: DEFAULT_MAX_REPEAT,
            debug: false,
            colored: false,
            seen: HashSet::new(),
            per_code: HashMap::new(),
            suppressed: 0,
            write_failed: false,
        }
    }

    /// Sets how many messages per code are printed.
    pub fn with_max_repeat(mut self, max_repeat: usize) -> Self {
        self.max_repeat = max_repeat;
        self
    }

    /// Appends a backtrace of the reporting site to each printed message.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Colours the severity label (requires the `colorized_output` feature).
    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    /// Number of messages dropped by the repeat cap.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn format_level(&self, level: Level) -> String {
        #[cfg(feature = "colorized_output")]
        {
            if self.colored {
                return match level {
                    Level::Info => style(level.as_str()).cyan().to_string(),
                    Level::Warning => style(level.as_str()).yellow().bold().to_string(),
                    Level::Error => style(level.as_str()).red().bold().to_string(),
                };
            }
        }
        level.as_str().to_string()
    }

    fn write_line(&mut self, line: &str) {
        if self.write_failed {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}", line) {
            log::warn!("Failed to write lint message: {}", e);
            self.write_failed = true;
        }
    }
}

impl<W: Write> MessageSink for PrintSaxMessager<W> {
    fn report_message(&mut self, message: &Message) {
        // capped codes are only counted, never remembered
        let count = self.per_code.get(&message.code).copied().unwrap_or(0);
        if count >= self.max_repeat {
            self.per_code.insert(message.code, count + 1);
            self.suppressed += 1;
            if count == self.max_repeat {
                let line = format!(
                    "{} [{}]: more messages of this type suppressed",
                    self.format_level(Level::Info),
                    message.code
                );
                self.write_line(&line);
            }
            return;
        }
        if !self.seen.insert(message.clone()) {
            return;
        }
        self.per_code.insert(message.code, count + 1);

        let mut line = self.format_level(message.level);
        if let Some(position) = &message.position {
            line.push_str(&format!(" ({})", position));
        }
        line.push_str(&format!(": {} [{}]", message.text, message.code));
        self.write_line(&line);

        if self.debug {
            let trace = Backtrace::force_capture();
            self.write_line(&trace.to_string());
        }
    }
}

/// Sink writing each message as one line of JSON.
pub struct JsonLinesSink<W: Write> {
    out: W,
    write_failed: bool,
}

impl<W: Write> JsonLinesSink<W> {
    /// Creates a JSON lines sink.
    pub fn new(out: W) -> Self {
        Self {
            out,
            write_failed: false,
        }
    }
}

impl<W: Write> MessageSink for JsonLinesSink<W> {
    fn report_message(&mut self, message: &Message) {
        if self.write_failed {
            return;
        }
        let result = serde_json::to_writer(&mut self.out, message)
            .map_err(std::io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"));
        if let Err(e) = result {
            log::warn!("Failed to write lint message: {}", e);
            self.write_failed = true;
        }
    }
}

/// Sink that keeps every message in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    messages: Vec<Message>,
}

impl CollectingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages received so far, in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consumes the sink, returning its messages.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Messages with the given code.
    pub fn with_code(&self, code: VotLintCode) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.code == code).collect()
    }

    /// Number of messages at the given level.
    pub fn count(&self, level: Level) -> usize {
        self.messages.iter().filter(|m| m.level == level).count()
    }
}

impl MessageSink for CollectingSink {
    fn report_message(&mut self, message: &Message) {
        self.messages.push(message.clone());
    }
}
