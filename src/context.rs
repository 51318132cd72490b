//! # Validation context
//!
//! [`VotLintContext`] is the per-parse state shared by every handler and
//! checker:
//!
//! - the VOTable version in effect and the strictness setting
//! - the message sink, current document position and message counts
//! - the ID registry and the IDREF arcs still waiting for their target
//! - the FIELD name registry used for uniqueness checks
//! - the error threshold after which the parse is abandoned
//!
//! A context serves exactly one document. Reference resolution is order
//! independent: an IDREF seen before its ID is parked and checked when the
//! ID turns up; anything still parked at the end of the document is
//! reported by [`VotLintContext::report_unchecked_refs`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::attribute::RefChecker;
use crate::code::{codes, Level, Message, Position, VotLintCode};
use crate::message::MessageSink;
use crate::services::LintServices;
use crate::stack::ElementRef;
use crate::version::VotableVersion;

/// Anything diagnostics can be reported to.
pub trait Reporter {
    /// Reports one diagnostic.
    fn report(&mut self, level: Level, code: VotLintCode, text: String);

    /// Reports an INFO message.
    fn info(&mut self, code: VotLintCode, text: String) {
        self.report(Level::Info, code, text)
    }

    /// Reports a WARNING message.
    fn warning(&mut self, code: VotLintCode, text: String) {
        self.report(Level::Warning, code, text)
    }

    /// Reports an ERROR message.
    fn error(&mut self, code: VotLintCode, text: String) {
        self.report(Level::Error, code, text)
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&mut self, _level: Level, _code: VotLintCode, _text: String) {}
}

/// Reporter that stores diagnostics for later delivery.
///
/// Used on threads that cannot reach the context, such as the inline
/// STREAM consumer.
#[derive(Debug, Default, Clone)]
pub struct MessageBuffer {
    entries: Vec<(Level, VotLintCode, String)>,
}

impl MessageBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers the buffered diagnostics, in order, to another reporter.
    pub fn replay_into(self, reporter: &mut dyn Reporter) {
        for (level, code, text) in self.entries {
            reporter.report(level, code, text);
        }
    }

    /// Number of buffered diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Reporter for MessageBuffer {
    fn report(&mut self, level: Level, code: VotLintCode, text: String) {
        self.entries.push((level, code, text));
    }
}

/// Test reporter recording only codes, in order.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CodeCollector(pub Vec<&'static str>);

#[cfg(test)]
impl Reporter for CodeCollector {
    fn report(&mut self, _level: Level, code: VotLintCode, _text: String) {
        self.0.push(code.as_str());
    }
}

#[derive(Debug)]
struct IdDefinition {
    element: ElementRef,
    referenced: bool,
}

#[derive(Debug)]
struct PendingRef {
    from: ElementRef,
    attribute: String,
    checker: RefChecker,
}

/// Per-parse validation state.
pub struct VotLintContext<'s> {
    version: Option<VotableVersion>,
    validate: bool,
    sink: &'s mut dyn MessageSink,
    services: Arc<LintServices>,
    base_dir: Option<PathBuf>,
    position: Option<Position>,
    ids: HashMap<String, IdDefinition>,
    pending: HashMap<String, Vec<PendingRef>>,
    names: HashMap<ElementRef, HashMap<String, ElementRef>>,
    counts: [usize; 3],
    error_limit: Option<usize>,
    aborted: bool,
}

impl<'s> VotLintContext<'s> {
    /// Creates a context for one parse. A `version` of `None` means the
    /// target version is unknown and version-dependent rules are relaxed.
    pub fn new(
        version: Option<VotableVersion>,
        sink: &'s mut dyn MessageSink,
        services: Arc<LintServices>,
    ) -> Self {
        Self {
            version,
            validate: true,
            sink,
            services,
            base_dir: None,
            position: None,
            ids: HashMap::new(),
            pending: HashMap::new(),
            names: HashMap::new(),
            counts: [0; 3],
            error_limit: None,
            aborted: false,
        }
    }

    /// Sets strict mode.
    pub fn set_validate(&mut self, validate: bool) {
        self.validate = validate;
    }

    /// Abandons the parse after `limit` errors.
    pub fn set_error_limit(&mut self, limit: Option<usize>) {
        self.error_limit = limit;
    }

    /// Sets the directory relative `href`s are resolved against.
    pub fn set_base_dir(&mut self, dir: Option<PathBuf>) {
        self.base_dir = dir;
    }

    /// Target version, if known.
    pub fn version(&self) -> Option<VotableVersion> {
        self.version
    }

    /// True in strict mode.
    pub fn is_validating(&self) -> bool {
        self.validate
    }

    /// Shared services.
    pub fn services(&self) -> &Arc<LintServices> {
        &self.services
    }

    /// Base directory for relative `href`s.
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Updates the current document position.
    pub fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
    }

    /// Current document position.
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Whether empty TD cells are legal for integer columns.
    pub fn allow_empty_integer(&self) -> bool {
        self.version.map_or(true, |v| v.allow_empty_td())
    }

    /// Number of messages reported at `level`.
    pub fn count(&self, level: Level) -> usize {
        self.counts[level as usize]
    }

    /// True once the error limit has been reached.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Reports a diagnostic at an explicit position.
    pub fn report_at(
        &mut self,
        level: Level,
        code: VotLintCode,
        text: String,
        position: Option<Position>,
    ) {
        if self.aborted {
            return;
        }
        self.counts[level as usize] += 1;
        self.sink
            .report_message(&Message::new(level, code, text, position));

        if level == Level::Error {
            if let Some(limit) = self.error_limit {
                if self.counts[Level::Error as usize] >= limit {
                    let text = format!("Error limit ({}) reached, validation abandoned", limit);
                    self.counts[Level::Info as usize] += 1;
                    self.sink.report_message(&Message::new(
                        Level::Info,
                        codes::ABT,
                        text,
                        self.position,
                    ));
                    self.aborted = true;
                }
            }
        }
    }

    /// Records an ID definition.
    ///
    /// A second definition of the same ID is an error naming both elements;
    /// the first definition stays in force. Any references parked on the ID
    /// are checked now.
    pub fn register_id(&mut self, id: &str, element: &ElementRef) {
        if let Some(existing) = self.ids.get(id) {
            let text = format!(
                "Duplicate ID \"{}\" in {}, already defined by {}",
                id, element, existing.element
            );
            self.error(codes::DID, text);
            return;
        }

        let pending = self.pending.remove(id).unwrap_or_default();
        self.ids.insert(
            id.to_string(),
            IdDefinition {
                element: element.clone(),
                referenced: !pending.is_empty(),
            },
        );
        for arc in pending {
            arc.checker
                .check_link(&arc.attribute, &arc.from, id, element, self);
        }
    }

    /// Records an IDREF from `from`'s `attribute`, checking it at once if
    /// the target is already known.
    pub fn register_ref(
        &mut self,
        id: &str,
        from: &ElementRef,
        attribute: &str,
        checker: RefChecker,
    ) {
        if let Some(definition) = self.ids.get_mut(id) {
            definition.referenced = true;
            let target = definition.element.clone();
            checker.check_link(attribute, from, id, &target, self);
        } else {
            self.pending
                .entry(id.to_string())
                .or_default()
                .push(PendingRef {
                    from: from.clone(),
                    attribute: attribute.to_string(),
                    checker,
                });
        }
    }

    /// Reports every reference whose target was never defined, one error
    /// per missing ID, in ID order.
    pub fn report_unchecked_refs(&mut self) {
        let mut pending: Vec<(String, Vec<PendingRef>)> = self.pending.drain().collect();
        pending.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, arcs) in pending {
            let Some(first) = arcs.first() else {
                continue;
            };
            let mut text = format!(
                "{} attribute of {} references ID \"{}\" which is never defined",
                first.attribute, first.from, id
            );
            if arcs.len() > 1 {
                text.push_str(&format!(" ({} references in total)", arcs.len()));
            }
            let position = first.from.position();
            self.report_at(Level::Error, codes::RFU, text, position);
        }
    }

    /// Reports IDs that nothing referenced, in ID order.
    pub fn report_unused_ids(&mut self) {
        let mut unused: Vec<(String, ElementRef)> = self
            .ids
            .iter()
            .filter(|(_, def)| !def.referenced)
            .map(|(id, def)| (id.clone(), def.element.clone()))
            .collect();
        unused.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, element) in unused {
            let text = format!("ID \"{}\" on {} is never referenced", id, element);
            self.report_at(Level::Info, codes::IDU, text, element.position());
        }
    }

    /// Records `name` for `element` within `scope`, warning on a repeat.
    pub fn check_unique_name(&mut self, scope: &ElementRef, name: &str, element: &ElementRef) {
        let names = self.names.entry(scope.clone()).or_default();
        if let Some(previous) = names.get(name) {
            let text = format!(
                "Name \"{}\" of {} already used by {} in {}",
                name, element, previous, scope
            );
            self.warning(codes::DNM, text);
        } else {
            names.insert(name.to_string(), element.clone());
        }
    }
}

impl Reporter for VotLintContext<'_> {
    fn report(&mut self, level: Level, code: VotLintCode, text: String) {
        let position = self.position;
        self.report_at(level, code, text, position);
    }
}
