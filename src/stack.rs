//! # Handler stack and ancestry
//!
//! The stack holds one [`Frame`] per open element, root first. Each frame
//! owns the element's attribute snapshot and its [`Handler`].
//!
//! Handler hooks run on the top frame and see the rest of the stack through
//! an [`Ancestry`] view. `Ancestry` is obtained from
//! [`HandlerStack::split_top`], which splits the frame vector into the top
//! frame and the frames below it. The view mutably borrows the stack, so it
//! cannot outlive the hook call it was made for, and it cannot be used after
//! its element has been popped: the borrow checker rejects both.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::code::Position;
use crate::handler::{Handler, HandlerState};

/// Immutable identity of an element, used in diagnostics and as a map key.
///
/// Two references are equal when they name the same element type at the same
/// document position. The label (the element's `name` or `ID`, if any) only
/// decorates messages.
#[derive(Debug, Clone)]
pub struct ElementRef {
    name: Arc<str>,
    label: Option<Arc<str>>,
    position: Option<Position>,
}

impl ElementRef {
    /// Creates a reference.
    pub fn new(name: &str, label: Option<&str>, position: Option<Position>) -> Self {
        Self {
            name: Arc::from(name),
            label: label.map(Arc::from),
            position,
        }
    }

    /// Element local name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element position, if known.
    pub fn position(&self) -> Option<Position> {
        self.position
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.position == other.position
    }
}

impl Eq for ElementRef {}

impl Hash for ElementRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.position.hash(state);
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(label) = &self.label {
            write!(f, " \"{}\"", label)?;
        }
        if let Some(position) = &self.position {
            write!(f, " ({})", position)?;
        }
        Ok(())
    }
}

/// An open element: name, attributes and identity.
#[derive(Debug, Clone)]
pub struct Element {
    name: Arc<str>,
    attributes: HashMap<String, String>,
    reference: ElementRef,
}

impl Element {
    /// Creates an element snapshot.
    pub fn new(name: &str, attributes: HashMap<String, String>, position: Option<Position>) -> Self {
        let label = attributes
            .get("name")
            .or_else(|| attributes.get("ID"))
            .map(String::as_str);
        let reference = ElementRef::new(name, label, position);
        Self {
            name: Arc::clone(&reference.name),
            attributes,
            reference,
        }
    }

    /// Local name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All attributes.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Identity token.
    pub fn reference(&self) -> &ElementRef {
        &self.reference
    }
}

/// One open element and its handler.
#[derive(Debug)]
pub struct Frame {
    /// The element
    pub element: Element,
    /// Its handler
    pub handler: Handler,
    /// Children opened so far
    pub child_count: usize,
    /// Position among the parent's children, from 0
    pub sibling_index: usize,
}

/// Stack of open elements.
#[derive(Debug, Default)]
pub struct HandlerStack {
    frames: Vec<Frame>,
}

impl HandlerStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new element, counting it as a child of the current top.
    pub fn push(&mut self, element: Element, handler: Handler) {
        let sibling_index = match self.frames.last_mut() {
            Some(parent) => {
                let index = parent.child_count;
                parent.child_count += 1;
                index
            }
            None => 0,
        };
        self.frames.push(Frame {
            element,
            handler,
            child_count: 0,
            sibling_index,
        });
    }

    /// Removes and returns the top frame.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The top frame.
    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// The frame below the top.
    pub fn parent(&self) -> Option<&Frame> {
        self.frames.len().checked_sub(2).map(|i| &self.frames[i])
    }

    /// Splits the stack into the top frame and an ancestry view of the rest.
    pub fn split_top(&mut self) -> Option<(&mut Frame, Ancestry<'_>)> {
        let (top, rest) = self.frames.split_last_mut()?;
        let ancestry = Ancestry {
            frames: rest,
            sibling_index: top.sibling_index,
            child_count: top.child_count,
        };
        Some((top, ancestry))
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True if no element is open.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// View of an element's position in the stack.
pub struct Ancestry<'a> {
    frames: &'a mut [Frame],
    sibling_index: usize,
    child_count: usize,
}

impl<'a> Ancestry<'a> {
    /// The parent frame.
    pub fn parent(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// The parent frame, mutably.
    pub fn parent_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Nearest ancestor whose handler is a `T`, searching from the parent
    /// towards the root.
    pub fn ancestor<T: HandlerState>(&self) -> Option<&T> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| T::from_handler(&frame.handler))
    }

    /// Nearest ancestor whose handler is a `T`, mutably.
    pub fn ancestor_mut<T: HandlerState>(&mut self) -> Option<&mut T> {
        self.frames
            .iter_mut()
            .rev()
            .find_map(|frame| T::from_handler_mut(&mut frame.handler))
    }

    /// Position of this element among its parent's children, from 0.
    pub fn sibling_index(&self) -> usize {
        self.sibling_index
    }

    /// Number of children of this element seen so far.
    pub fn child_count(&self) -> usize {
        self.child_count
    }

    /// Depth of this element, the root being 0.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::table::TableHandler;

    fn element(name: &str, line: u64) -> Element {
        Element::new(name, HashMap::new(), Some(Position::new(line, 1)))
    }

    #[test]
    fn test_sibling_indices_and_child_counts() {
        let mut stack = HandlerStack::new();
        stack.push(element("TR", 1), Handler::Generic);
        stack.push(element("TD", 2), Handler::Generic);
        stack.pop();
        stack.push(element("TD", 3), Handler::Generic);

        let (top, ancestry) = stack.split_top().unwrap();
        assert_eq!(top.element.name(), "TD");
        assert_eq!(ancestry.sibling_index(), 1);
        assert_eq!(ancestry.child_count(), 0);
        assert_eq!(ancestry.parent().unwrap().child_count, 2);
        assert_eq!(ancestry.depth(), 1);
    }

    #[test]
    fn test_ancestor_lookup() {
        let mut stack = HandlerStack::new();
        stack.push(element("TABLE", 1), Handler::Table(TableHandler::default()));
        stack.push(element("DATA", 2), Handler::Generic);
        stack.push(element("TABLEDATA", 3), Handler::Generic);

        let (_, mut ancestry) = stack.split_top().unwrap();
        assert!(ancestry.ancestor::<TableHandler>().is_some());
        assert!(ancestry.ancestor_mut::<TableHandler>().is_some());
        assert_eq!(ancestry.parent().unwrap().element.name(), "DATA");
    }

    #[test]
    fn test_element_ref_identity() {
        let a = ElementRef::new("FIELD", Some("ra"), Some(Position::new(3, 5)));
        let b = ElementRef::new("FIELD", Some("dec"), Some(Position::new(3, 5)));
        let c = ElementRef::new("FIELD", None, Some(Position::new(4, 5)));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "FIELD \"ra\" (l.3, c.5)");
        assert_eq!(c.to_string(), "FIELD (l.4, c.5)");
    }

    #[test]
    fn test_empty_stack() {
        let mut stack = HandlerStack::new();
        assert!(stack.split_top().is_none());
        assert!(stack.pop().is_none());
        assert!(stack.parent().is_none());
        assert!(stack.is_empty());
    }
}
