//! # Element handlers
//!
//! Every open element gets a [`Handler`], created by the version tables in
//! [`crate::detail`] and kept on the [`HandlerStack`](crate::stack::HandlerStack)
//! until the element closes. Most elements need no behaviour of their own and
//! get [`Handler::Generic`]; the others collect column metadata or check data:
//!
//! | Element | Handler | Work |
//! |---------|---------|------|
//! | TABLE | [`TableHandler`] | `nrows` against rows seen |
//! | FIELD, PARAM | [`FieldHandler`] | builds the column's [`ValueParser`](crate::values::ValueParser) |
//! | VALUES | `Values` | `null` against the column parser |
//! | DATA | [`DataHandler`] | column snapshot and row count |
//! | TR, TD | `Tr`, [`TdHandler`] | cell count and cell values |
//! | BINARY, BINARY2 | [`BinaryHandler`] | row layout of the STREAM |
//! | FITS | [`FitsHandler`] | FITS table against the FIELDs |
//! | STREAM | [`StreamHandler`] | decodes and feeds its parent |
//!
//! Hooks receive the element, an [`Ancestry`] view of the frames below and
//! the context. Handlers talk to each other only through the ancestry, by
//! looking up an ancestor of a given handler type with
//! [`Ancestry::ancestor_mut`].

pub mod binary;
pub mod data;
pub mod fits;
pub mod stream;
pub mod table;

use crate::context::VotLintContext;
use crate::stack::{Ancestry, Element};

pub use self::binary::BinaryHandler;
pub use self::data::{DataHandler, TdHandler};
pub use self::fits::FitsHandler;
pub use self::stream::StreamHandler;
pub use self::table::{FieldHandler, FieldInfo, TableHandler};

/// Behaviour attached to one open element.
#[derive(Debug)]
pub enum Handler {
    /// No checks beyond attributes
    Generic,
    /// TABLE
    Table(TableHandler),
    /// FIELD or PARAM
    Field(FieldHandler),
    /// VALUES
    Values,
    /// DATA
    Data(DataHandler),
    /// TABLEDATA
    TableData,
    /// TR
    Tr,
    /// TD
    Td(TdHandler),
    /// BINARY or BINARY2
    Binary(BinaryHandler),
    /// FITS
    Fits(FitsHandler),
    /// STREAM
    Stream(StreamHandler),
}

impl Handler {
    /// Handler for an element known to the version in effect.
    pub fn for_element(name: &str) -> Self {
        match name {
            "TABLE" => Handler::Table(TableHandler::default()),
            "FIELD" => Handler::Field(FieldHandler::new(false)),
            "PARAM" => Handler::Field(FieldHandler::new(true)),
            "VALUES" => Handler::Values,
            "DATA" => Handler::Data(DataHandler::new()),
            "TABLEDATA" => Handler::TableData,
            "TR" => Handler::Tr,
            "TD" => Handler::Td(TdHandler::default()),
            "BINARY" => Handler::Binary(BinaryHandler::new(false)),
            "BINARY2" => Handler::Binary(BinaryHandler::new(true)),
            "FITS" => Handler::Fits(FitsHandler::new()),
            "STREAM" => Handler::Stream(StreamHandler::default()),
            _ => Handler::Generic,
        }
    }

    /// Called once the element has been pushed and its attributes checked.
    pub fn start_element(
        &mut self,
        element: &Element,
        ancestry: &mut Ancestry<'_>,
        ctx: &mut VotLintContext<'_>,
    ) {
        match self {
            Handler::Table(h) => h.start(element, ctx),
            Handler::Field(h) => h.start(element, ancestry, ctx),
            Handler::Values => table::check_null(element, ancestry, ctx),
            Handler::Data(h) => h.start(ancestry),
            Handler::TableData => {
                if let Some(data) = ancestry.ancestor_mut::<DataHandler>() {
                    data.add_rows(0);
                }
            }
            Handler::Td(h) => h.start(element, ctx),
            Handler::Binary(h) => h.start(ancestry),
            Handler::Fits(h) => h.start(element, ancestry, ctx),
            Handler::Stream(h) => h.start(element, ancestry, ctx),
            Handler::Generic | Handler::Tr => {}
        }
    }

    /// Character data directly inside the element.
    pub fn characters(&mut self, text: &str) {
        match self {
            Handler::Td(h) => h.push_text(text),
            Handler::Stream(h) => h.feed(text),
            _ => {}
        }
    }

    /// Called before the element is popped.
    pub fn end_element(
        &mut self,
        element: &Element,
        ancestry: &mut Ancestry<'_>,
        ctx: &mut VotLintContext<'_>,
    ) {
        match self {
            Handler::Table(h) => h.end(element, ctx),
            Handler::Data(h) => h.end(ancestry),
            Handler::Tr => data::end_row(ancestry, ctx),
            Handler::Td(h) => h.end(ancestry, ctx),
            Handler::Binary(h) => h.end(ancestry),
            Handler::Fits(h) => h.end(ancestry),
            Handler::Stream(h) => h.end(ancestry, ctx),
            Handler::Generic | Handler::Field(_) | Handler::Values | Handler::TableData => {}
        }
    }
}

/// Handler states that can be looked up through an [`Ancestry`].
pub trait HandlerState {
    /// The state, if `handler` holds one of this type.
    fn from_handler(handler: &Handler) -> Option<&Self>;

    /// The state, mutably.
    fn from_handler_mut(handler: &mut Handler) -> Option<&mut Self>;
}

macro_rules! handler_state {
    ($($variant:ident => $state:ty),* $(,)?) => {
        $(
            impl HandlerState for $state {
                fn from_handler(handler: &Handler) -> Option<&Self> {
                    match handler {
                        Handler::$variant(state) => Some(state),
                        _ => None,
                    }
                }

                fn from_handler_mut(handler: &mut Handler) -> Option<&mut Self> {
                    match handler {
                        Handler::$variant(state) => Some(state),
                        _ => None,
                    }
                }
            }
        )*
    };
}

handler_state! {
    Table => TableHandler,
    Field => FieldHandler,
    Data => DataHandler,
    Binary => BinaryHandler,
    Fits => FitsHandler,
}
