//! FITS element handling.
//!
//! The FITS BINTABLE referenced by a STREAM is read for its structure only.
//! Its columns are then compared with the FIELDs; FITS and VOTable metadata
//! are allowed to disagree, so every discrepancy is a warning.

use std::io::Read;
use std::sync::Arc;

use crate::code::codes;
use crate::context::{Reporter, VotLintContext};
use crate::fits::{read_fits_table, FitsColumn, FitsTableSink};
use crate::stack::{Ancestry, Element};
use crate::values::ContentClass;

use super::data::DataHandler;
use super::table::FieldInfo;

/// Extension read when `extnum` is absent.
pub const DEFAULT_EXTNUM: u32 = 1;

/// State of an open FITS element.
#[derive(Debug)]
pub struct FitsHandler {
    extnum: u32,
    fields: Arc<[Arc<FieldInfo>]>,
    rows: Option<u64>,
}

impl FitsHandler {
    pub(super) fn new() -> Self {
        Self {
            extnum: DEFAULT_EXTNUM,
            fields: Arc::from(Vec::new()),
            rows: None,
        }
    }

    /// HDU holding the table.
    pub fn extnum(&self) -> u32 {
        self.extnum
    }

    pub(super) fn consumer(&self) -> FitsConsumer {
        FitsConsumer {
            fields: Arc::clone(&self.fields),
            extnum: self.extnum,
        }
    }

    pub(super) fn set_rows(&mut self, rows: Option<u64>) {
        self.rows = rows;
    }

    pub(super) fn start(
        &mut self,
        element: &Element,
        ancestry: &Ancestry<'_>,
        ctx: &mut VotLintContext<'_>,
    ) {
        if let Some(text) = element.attribute("extnum") {
            match text.trim().parse::<u32>() {
                Ok(extnum) => self.extnum = extnum,
                Err(_) => ctx.error(
                    codes::EXN,
                    format!(
                        "Bad extnum value \"{}\", using {}",
                        text, DEFAULT_EXTNUM
                    ),
                ),
            }
        }
        if let Some(data) = ancestry.ancestor::<DataHandler>() {
            self.fields = Arc::clone(data.fields());
        }
    }

    pub(super) fn end(&self, ancestry: &mut Ancestry<'_>) {
        if let Some(rows) = self.rows {
            if let Some(data) = ancestry.ancestor_mut::<DataHandler>() {
                data.add_rows(rows);
            }
        }
    }
}

/// Reads a FITS table from a decoded STREAM and reconciles it with the
/// FIELDs.
#[derive(Debug, Clone)]
pub struct FitsConsumer {
    fields: Arc<[Arc<FieldInfo>]>,
    extnum: u32,
}

impl FitsConsumer {
    /// Creates a consumer for the given columns and extension.
    pub fn new(fields: Arc<[Arc<FieldInfo>]>, extnum: u32) -> Self {
        Self { fields, extnum }
    }

    /// Reads the table, returning its row count, or `None` if it could not
    /// be read.
    pub fn consume(&self, input: &mut dyn Read, reporter: &mut dyn Reporter) -> Option<u64> {
        let mut reconciler = Reconciler {
            fields: &self.fields,
            reporter,
            rows: 0,
        };
        match read_fits_table(input, self.extnum, &mut reconciler) {
            Ok(()) => Some(reconciler.rows),
            Err(err) => {
                reconciler.reporter.error(
                    codes::FTE,
                    format!("Error reading FITS data (HDU {}): {}", self.extnum, err),
                );
                None
            }
        }
    }
}

struct Reconciler<'a> {
    fields: &'a [Arc<FieldInfo>],
    reporter: &'a mut dyn Reporter,
    rows: u64,
}

fn is_text(class: ContentClass) -> bool {
    matches!(class, ContentClass::Char | ContentClass::String)
}

impl FitsTableSink for Reconciler<'_> {
    fn accept_metadata(&mut self, columns: &[FitsColumn], _nrows: u64) {
        if columns.len() != self.fields.len() {
            self.reporter.warning(
                codes::FTC,
                format!(
                    "FITS table has {} columns but {} FIELDs are declared; column types not compared",
                    columns.len(),
                    self.fields.len()
                ),
            );
            return;
        }

        for (icol, (column, field)) in columns.iter().zip(self.fields.iter()).enumerate() {
            let Some(parser) = field.parser() else {
                continue;
            };
            let class = parser.content_class();
            let label = column.name.as_deref().unwrap_or("");
            if class != column.class && !(is_text(class) && is_text(column.class)) {
                self.reporter.warning(
                    codes::FTM,
                    format!(
                        "FITS column {} {} ({}) is {:?}, {} declares {:?}",
                        icol + 1,
                        label,
                        column.tform,
                        column.class,
                        field.element(),
                        class
                    ),
                );
                continue;
            }
            if let (Some(declared), Some(found)) = (parser.element_count(), column.count) {
                if declared != found {
                    self.reporter.warning(
                        codes::FTM,
                        format!(
                            "FITS column {} {} ({}) has {} elements, {} declares {}",
                            icol + 1,
                            label,
                            column.tform,
                            found,
                            field.element(),
                            declared
                        ),
                    );
                }
            }
        }
    }

    fn accept_row(&mut self, _index: u64, _row: &[u8]) {
        self.rows += 1;
    }

    fn end_rows(&mut self) {}
}
