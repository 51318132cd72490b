//! # Content handler
//!
//! [`VotLintContentHandler`] turns SAX events into handler stack operations.
//! For each element it:
//!
//! 1. checks root-element and namespace rules
//! 2. asks the [`VersionDetail`] for a handler, reporting unknown and
//!    deprecated elements
//! 3. runs the attribute checkers in attribute-name order
//! 4. pushes the element and calls its start hook
//!
//! Subtrees in foreign namespaces are skipped wholesale. Unresolved
//! references are reported when the document ends.

use std::collections::HashMap;
use std::ops::ControlFlow;

use crate::attribute::CheckerArgs;
use crate::code::{codes, Level, Position};
use crate::context::{Reporter, VotLintContext};
use crate::detail::VersionDetail;
use crate::handler::Handler;
use crate::sax::{Doctype, ElementName, SaxHandler};
use crate::stack::{Element, HandlerStack};
use crate::version::VotableVersion;

/// SAX handler validating one VOTable document.
pub struct VotLintContentHandler<'s> {
    ctx: VotLintContext<'s>,
    detail: &'static VersionDetail,
    stack: HandlerStack,
    skip_depth: usize,
    root_seen: bool,
    report_unused_ids: bool,
}

impl<'s> VotLintContentHandler<'s> {
    /// Wraps a context; the dispatch tables follow the context's version.
    pub fn new(ctx: VotLintContext<'s>) -> Self {
        let detail = VersionDetail::for_target(ctx.version());
        Self {
            ctx,
            detail,
            stack: HandlerStack::new(),
            skip_depth: 0,
            root_seen: false,
            report_unused_ids: false,
        }
    }

    /// Reports unreferenced IDs at the end of the document.
    pub fn with_unused_ids(mut self, enabled: bool) -> Self {
        self.report_unused_ids = enabled;
        self
    }

    /// The validation context.
    pub fn context(&self) -> &VotLintContext<'s> {
        &self.ctx
    }

    /// The validation context, mutably.
    pub fn context_mut(&mut self) -> &mut VotLintContext<'s> {
        &mut self.ctx
    }

    /// Gives the context back.
    pub fn into_context(self) -> VotLintContext<'s> {
        self.ctx
    }

    /// Number of messages reported at `level` so far.
    pub fn count(&self, level: Level) -> usize {
        self.ctx.count(level)
    }

    fn flow(&self) -> ControlFlow<()> {
        if self.ctx.is_aborted() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn check_root(&mut self, name: &ElementName) {
        if name.local != "VOTABLE" {
            self.ctx.error(
                codes::ELU,
                format!("Root element is <{}>, not VOTABLE", name.qname),
            );
        }
        let Some(version) = self.ctx.version() else {
            return;
        };
        let expected = version.xml_namespace();
        match (name.namespace.as_deref(), expected) {
            (None, Some(expected)) => self.ctx.warning(
                codes::NS0,
                format!(
                    "VOTABLE has no namespace, VOTable {} expects {}",
                    version, expected
                ),
            ),
            (Some(found), expected) if Some(found) != expected => {
                let text = match VotableVersion::from_namespace(found) {
                    Some(other) => format!(
                        "Namespace {} belongs to VOTable {}, not {}",
                        found, other, version
                    ),
                    None => format!("Namespace {} is not the VOTable {} namespace", found, version),
                };
                self.ctx.warning(codes::NSV, text);
            }
            _ => {}
        }
    }

    fn create_handler(&mut self, tag: &str) -> Handler {
        let handler = match self.detail.create_element_handler(tag) {
            Some(handler) => handler,
            None => {
                if self.ctx.is_validating() {
                    let version = self
                        .detail
                        .version()
                        .map_or_else(|| "unknown".to_string(), |v| v.to_string());
                    self.ctx.error(
                        codes::ELU,
                        format!("Element {} not known at VOTable {}", tag, version),
                    );
                }
                Handler::Generic
            }
        };
        if self.detail.is_deprecated(tag) {
            self.ctx
                .warning(codes::DPE, format!("Element {} is deprecated", tag));
        }
        handler
    }

    fn check_attributes(&mut self, element: &Element) {
        let checkers = self.detail.attribute_checkers(element.name());
        if checkers.is_empty() {
            return;
        }
        let parent = self.stack.top().map(|frame| frame.element.reference().clone());
        let mut names: Vec<&String> = element.attributes().keys().collect();
        names.sort();
        for name in names {
            let Some(checker) = checkers.get(name.as_str()) else {
                continue;
            };
            let args = CheckerArgs {
                attribute: name,
                element: element.reference(),
                parent: parent.as_ref(),
            };
            if let Some(value) = element.attribute(name) {
                checker.check(value, &args, &mut self.ctx);
            }
        }
    }
}

impl SaxHandler for VotLintContentHandler<'_> {
    fn set_position(&mut self, position: Position) {
        self.ctx.set_position(Some(position));
    }

    fn doctype(&mut self, doctype: &Doctype) -> ControlFlow<()> {
        let declared = doctype
            .system_id
            .as_deref()
            .and_then(VotableVersion::from_dtd_system_id);
        if let (Some(declared), Some(version)) = (declared, self.ctx.version()) {
            if declared != version {
                self.ctx.warning(
                    codes::DTV,
                    format!(
                        "DOCTYPE names the VOTable {} DTD, checking against {}",
                        declared, version
                    ),
                );
            }
        }
        self.flow()
    }

    fn start_element(
        &mut self,
        name: &ElementName,
        attributes: HashMap<String, String>,
    ) -> ControlFlow<()> {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return self.flow();
        }
        let foreign = name
            .namespace
            .as_deref()
            .is_some_and(|ns| !VotableVersion::is_votable_namespace(ns));
        if self.root_seen && foreign {
            log::debug!("skipping foreign element <{}>", name.qname);
            self.skip_depth = 1;
            return self.flow();
        }
        if !self.root_seen {
            self.root_seen = true;
            self.check_root(name);
        }

        let element = Element::new(&name.local, attributes, self.ctx.position());
        let handler = self.create_handler(&name.local);
        self.check_attributes(&element);

        self.stack.push(element, handler);
        if let Some((frame, mut ancestry)) = self.stack.split_top() {
            frame
                .handler
                .start_element(&frame.element, &mut ancestry, &mut self.ctx);
        }
        self.flow()
    }

    fn end_element(&mut self, _name: &ElementName) -> ControlFlow<()> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return self.flow();
        }
        if let Some((frame, mut ancestry)) = self.stack.split_top() {
            frame
                .handler
                .end_element(&frame.element, &mut ancestry, &mut self.ctx);
        }
        self.stack.pop();
        self.flow()
    }

    fn characters(&mut self, text: &str) -> ControlFlow<()> {
        if self.skip_depth == 0 {
            if let Some((frame, _)) = self.stack.split_top() {
                frame.handler.characters(text);
            }
        }
        self.flow()
    }

    fn processing_instruction(&mut self, target: &str, _data: &str) {
        self.ctx.info(
            codes::PIG,
            format!("Ignoring processing instruction <?{}?>", target),
        );
    }

    fn skipped_entity(&mut self, name: &str) {
        self.ctx
            .warning(codes::ENT, format!("Unexpanded entity: {}", name));
    }

    fn error(&mut self, message: &str) {
        self.ctx.error(codes::XML, message.to_string());
    }

    fn fatal_error(&mut self, message: &str) {
        self.ctx.error(codes::XML, message.to_string());
    }

    fn end_document(&mut self) {
        self.ctx.report_unchecked_refs();
        if self.report_unused_ids {
            self.ctx.report_unused_ids();
        }
    }
}
