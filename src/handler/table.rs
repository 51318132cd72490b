//! TABLE, FIELD/PARAM and VALUES handling.

use std::sync::Arc;

use crate::code::codes;
use crate::context::{Reporter, VotLintContext};
use crate::stack::{Ancestry, Element, ElementRef};
use crate::values::{Declaration, ParseOptions, ValueParser};

use super::HandlerState;

/// A column declaration: the FIELD and its value parser.
#[derive(Debug)]
pub struct FieldInfo {
    element: ElementRef,
    parser: Option<ValueParser>,
}

impl FieldInfo {
    /// Creates a column declaration.
    pub fn new(element: ElementRef, parser: Option<ValueParser>) -> Self {
        Self { element, parser }
    }

    /// The declaring element.
    pub fn element(&self) -> &ElementRef {
        &self.element
    }

    /// Value parser, `None` if the declaration was unusable.
    pub fn parser(&self) -> Option<&ValueParser> {
        self.parser.as_ref()
    }
}

/// State of an open TABLE.
#[derive(Debug, Default)]
pub struct TableHandler {
    fields: Vec<Arc<FieldInfo>>,
    nrows: Option<u64>,
    rows: Option<u64>,
}

impl TableHandler {
    /// FIELDs declared so far, in document order.
    pub fn fields(&self) -> &[Arc<FieldInfo>] {
        &self.fields
    }

    /// Declared `nrows`, if present and legal.
    pub fn declared_rows(&self) -> Option<u64> {
        self.nrows
    }

    /// Rows counted in the DATA element, if it could be counted.
    pub fn rows(&self) -> Option<u64> {
        self.rows
    }

    pub(crate) fn add_field(&mut self, field: Arc<FieldInfo>) {
        self.fields.push(field);
    }

    pub(crate) fn set_rows(&mut self, rows: u64) {
        self.rows = Some(rows);
    }

    pub(super) fn start(&mut self, element: &Element, ctx: &mut VotLintContext<'_>) {
        if let Some(text) = element.attribute("nrows") {
            match text.trim().parse::<u64>() {
                Ok(n) => self.nrows = Some(n),
                Err(_) => ctx.error(
                    codes::NRF,
                    format!("Bad nrows value \"{}\" on {}", text, element.reference()),
                ),
            }
        }
    }

    pub(super) fn end(&self, element: &Element, ctx: &mut VotLintContext<'_>) {
        if let (Some(declared), Some(seen)) = (self.nrows, self.rows) {
            if declared != seen {
                ctx.error(
                    codes::NRM,
                    format!(
                        "Row count ({}) not equal to nrows attribute ({}) for {}",
                        seen,
                        declared,
                        element.reference()
                    ),
                );
            }
        }
    }
}

/// State of an open FIELD or PARAM.
#[derive(Debug)]
pub struct FieldHandler {
    param: bool,
    info: Option<Arc<FieldInfo>>,
}

impl FieldHandler {
    pub(super) fn new(param: bool) -> Self {
        Self { param, info: None }
    }

    /// True for PARAM.
    pub fn is_param(&self) -> bool {
        self.param
    }

    /// The column declaration, once the element has started.
    pub fn info(&self) -> Option<&Arc<FieldInfo>> {
        self.info.as_ref()
    }

    pub(super) fn start(
        &mut self,
        element: &Element,
        ancestry: &mut Ancestry<'_>,
        ctx: &mut VotLintContext<'_>,
    ) {
        let decl = Declaration {
            datatype: element.attribute("datatype"),
            arraysize: element.attribute("arraysize"),
            xtype: element.attribute("xtype"),
        };
        let options = ParseOptions {
            allow_empty_integer: ctx.allow_empty_integer(),
        };
        let owner = element.reference().to_string();
        let parser = ValueParser::build(&decl, &owner, options, ctx);

        if self.param {
            if let (Some(parser), Some(value)) = (&parser, element.attribute("value")) {
                if !value.is_empty() {
                    parser.check_string(value, ctx);
                }
            }
        }

        let info = Arc::new(FieldInfo::new(element.reference().clone(), parser));
        if !self.param {
            let table = ancestry
                .parent_mut()
                .and_then(|frame| TableHandler::from_handler_mut(&mut frame.handler));
            if let Some(table) = table {
                table.add_field(Arc::clone(&info));
            }
        }
        self.info = Some(info);
    }
}

/// Checks a VALUES `null` against the enclosing column, for scalar columns.
pub(super) fn check_null(element: &Element, ancestry: &Ancestry<'_>, ctx: &mut VotLintContext<'_>) {
    let Some(null) = element.attribute("null") else {
        return;
    };
    let parser = ancestry
        .parent()
        .and_then(|frame| FieldHandler::from_handler(&frame.handler))
        .and_then(FieldHandler::info)
        .and_then(|info| info.parser());
    if let Some(parser) = parser {
        if parser.is_scalar() {
            parser.check_string(null, ctx);
        }
    }
}
