//! DATA, TABLEDATA rows and cells.

use std::io::Cursor;
use std::sync::Arc;

use crate::code::codes;
use crate::context::{Reporter, VotLintContext};
use crate::decode::decode_base64_text;
use crate::stack::{Ancestry, Element};

use super::table::{FieldInfo, TableHandler};

/// State of an open DATA element.
///
/// The columns are snapshotted from the enclosing TABLE when DATA opens;
/// every FIELD precedes DATA in a valid document.
#[derive(Debug)]
pub struct DataHandler {
    fields: Arc<[Arc<FieldInfo>]>,
    rows: Option<u64>,
}

impl DataHandler {
    pub(super) fn new() -> Self {
        Self {
            fields: Arc::from(Vec::new()),
            rows: None,
        }
    }

    /// Column declarations, in order.
    pub fn fields(&self) -> &Arc<[Arc<FieldInfo>]> {
        &self.fields
    }

    /// Rows counted so far; `None` until some row-bearing child has been
    /// counted, or if its rows could not be counted.
    pub fn rows(&self) -> Option<u64> {
        self.rows
    }

    pub(crate) fn add_rows(&mut self, rows: u64) {
        self.rows = Some(self.rows.unwrap_or(0) + rows);
    }

    pub(super) fn start(&mut self, ancestry: &Ancestry<'_>) {
        if let Some(table) = ancestry.ancestor::<TableHandler>() {
            self.fields = Arc::from(table.fields().to_vec());
        }
    }

    pub(super) fn end(&self, ancestry: &mut Ancestry<'_>) {
        if let Some(rows) = self.rows {
            if let Some(table) = ancestry.ancestor_mut::<TableHandler>() {
                table.set_rows(rows);
            }
        }
    }
}

/// Counts a finished TR and checks its cell count.
pub(super) fn end_row(ancestry: &mut Ancestry<'_>, ctx: &mut VotLintContext<'_>) {
    let ncell = ancestry.child_count();
    let Some(data) = ancestry.ancestor_mut::<DataHandler>() else {
        return;
    };
    data.add_rows(1);
    let nfield = data.fields.len();
    if ncell != nfield {
        ctx.error(
            codes::TRC,
            format!(
                "Wrong number of TDs in row {} (expecting {}, found {})",
                data.rows.unwrap_or(0),
                nfield,
                ncell
            ),
        );
    }
}

/// State of an open TD: its text so far and its `encoding`.
#[derive(Debug, Default)]
pub struct TdHandler {
    text: String,
    encoding: Option<String>,
}

impl TdHandler {
    pub(super) fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub(super) fn start(&mut self, element: &Element, ctx: &mut VotLintContext<'_>) {
        let Some(encoding) = element.attribute("encoding") else {
            return;
        };
        if let Some(version) = ctx.version() {
            if !version.allows_td_encoding() {
                ctx.error(
                    codes::TDE,
                    format!("TD encoding attribute not permitted at VOTable {}", version),
                );
            }
        }
        self.encoding = Some(encoding.trim().to_string());
    }

    pub(super) fn end(&self, ancestry: &Ancestry<'_>, ctx: &mut VotLintContext<'_>) {
        let column = ancestry.sibling_index();
        let Some(field) = ancestry
            .ancestor::<DataHandler>()
            .and_then(|data| data.fields.get(column))
        else {
            return;
        };
        let Some(parser) = field.parser() else {
            return;
        };

        match self.encoding.as_deref() {
            None | Some("") | Some("none") => parser.check_string(&self.text, ctx),
            Some("base64") => {
                if self.text.trim().is_empty() {
                    return;
                }
                let bytes = match decode_base64_text(&self.text) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        ctx.error(
                            codes::TDE,
                            format!("Bad base64 content in TD for {}: {}", field.element(), err),
                        );
                        return;
                    }
                };
                let mut cursor = Cursor::new(bytes.as_slice());
                match parser.check_stream(&mut cursor, ctx) {
                    Ok(()) if (cursor.position() as usize) < bytes.len() => ctx.warning(
                        codes::TDE,
                        format!(
                            "{} unused bytes in base64 TD for {}",
                            bytes.len() - cursor.position() as usize,
                            field.element()
                        ),
                    ),
                    Ok(()) => {}
                    Err(err) => ctx.error(
                        err.code(),
                        format!("Bad base64 TD for {}: {}", field.element(), err),
                    ),
                }
            }
            Some(other) => ctx.warning(
                codes::TDE,
                format!("Unknown TD encoding \"{}\", cell not checked", other),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Position;
    use crate::handler::Handler;
    use crate::message::CollectingSink;
    use crate::services::LintServices;
    use crate::stack::HandlerStack;
    use crate::version::VotableVersion;
    use base64::prelude::*;
    use std::collections::HashMap;

    struct Doc<'s> {
        stack: HandlerStack,
        ctx: VotLintContext<'s>,
        line: u64,
    }

    impl<'s> Doc<'s> {
        fn new(version: VotableVersion, sink: &'s mut CollectingSink) -> Self {
            Self {
                stack: HandlerStack::new(),
                ctx: VotLintContext::new(Some(version), sink, Arc::new(LintServices::default())),
                line: 0,
            }
        }

        fn open(&mut self, name: &str, attrs: &[(&str, &str)]) {
            self.line += 1;
            let attributes: HashMap<String, String> = attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let element = Element::new(name, attributes, Some(Position::new(self.line, 1)));
            self.stack.push(element, Handler::for_element(name));
            if let Some((frame, mut ancestry)) = self.stack.split_top() {
                frame
                    .handler
                    .start_element(&frame.element, &mut ancestry, &mut self.ctx);
            }
        }

        fn text(&mut self, text: &str) {
            if let Some((frame, _)) = self.stack.split_top() {
                frame.handler.characters(text);
            }
        }

        fn close(&mut self) {
            if let Some((frame, mut ancestry)) = self.stack.split_top() {
                frame
                    .handler
                    .end_element(&frame.element, &mut ancestry, &mut self.ctx);
            }
            self.stack.pop();
        }

        fn cell(&mut self, attrs: &[(&str, &str)], text: &str) {
            self.open("TD", attrs);
            self.text(text);
            self.close();
        }
    }

    #[test]
    fn test_tabledata_rows_and_cells() {
        let mut sink = CollectingSink::new();
        {
            let mut doc = Doc::new(VotableVersion::V1_3, &mut sink);
            doc.open("TABLE", &[("nrows", "3")]);
            doc.open("FIELD", &[("datatype", "int")]);
            doc.close();
            doc.open("FIELD", &[("datatype", "double")]);
            doc.close();
            doc.open("DATA", &[]);
            doc.open("TABLEDATA", &[]);
            for (a, b) in [("1", "2.5"), ("x", "NaN")] {
                doc.open("TR", &[]);
                doc.cell(&[], a);
                doc.cell(&[], b);
                doc.close();
            }
            doc.open("TR", &[]);
            doc.cell(&[], "3");
            doc.close();
            doc.close();
            doc.close();
            doc.close();
        }
        assert_eq!(sink.with_code(codes::IT0).len(), 1);
        assert_eq!(sink.with_code(codes::TRC).len(), 1);
        assert!(sink.with_code(codes::NRM).is_empty());
    }

    #[test]
    fn test_empty_tabledata_counts_zero_rows() {
        let mut sink = CollectingSink::new();
        {
            let mut doc = Doc::new(VotableVersion::V1_3, &mut sink);
            doc.open("TABLE", &[("nrows", "2")]);
            doc.open("DATA", &[]);
            doc.open("TABLEDATA", &[]);
            doc.close();
            doc.close();
            doc.close();
        }
        assert_eq!(sink.with_code(codes::NRM).len(), 1);
    }

    #[test]
    fn test_base64_cells() {
        let mut sink = CollectingSink::new();
        {
            let mut doc = Doc::new(VotableVersion::V1_2, &mut sink);
            doc.open("TABLE", &[]);
            doc.open("FIELD", &[("datatype", "boolean")]);
            doc.close();
            doc.open("DATA", &[]);
            doc.open("TABLEDATA", &[]);
            doc.open("TR", &[]);
            doc.cell(&[("encoding", "base64")], &BASE64_STANDARD.encode(b"T"));
            doc.close();
            doc.open("TR", &[]);
            doc.cell(&[("encoding", "base64")], &BASE64_STANDARD.encode(b"Z"));
            doc.close();
            doc.open("TR", &[]);
            doc.cell(&[("encoding", "base64")], "***");
            doc.close();
        }
        assert_eq!(sink.with_code(codes::TFX).len(), 1);
        assert_eq!(sink.with_code(codes::TDE).len(), 1);
    }

    #[test]
    fn test_td_encoding_rejected_from_1_3() {
        let mut sink = CollectingSink::new();
        {
            let mut doc = Doc::new(VotableVersion::V1_3, &mut sink);
            doc.open("TD", &[("encoding", "base64")]);
            doc.close();
        }
        assert_eq!(sink.with_code(codes::TDE).len(), 1);
    }
}
