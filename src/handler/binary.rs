//! BINARY and BINARY2 row checking.
//!
//! A BINARY row is the concatenation of every column's binary value. A
//! BINARY2 row is preceded by `(ncol+7)/8` bytes of null flags, the most
//! significant bit of the first byte belonging to the first column; a
//! flagged cell is still present in the stream and is consumed unchecked.

use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;

use crate::code::codes;
use crate::context::{NullReporter, Reporter};
use crate::stack::Ancestry;
use crate::values::{StreamError, ValueParser};

use super::data::DataHandler;
use super::table::FieldInfo;

/// State of an open BINARY or BINARY2 element.
#[derive(Debug)]
pub struct BinaryHandler {
    binary2: bool,
    fields: Arc<[Arc<FieldInfo>]>,
    rows: Option<u64>,
}

impl BinaryHandler {
    pub(super) fn new(binary2: bool) -> Self {
        Self {
            binary2,
            fields: Arc::from(Vec::new()),
            rows: None,
        }
    }

    /// True for BINARY2.
    pub fn is_binary2(&self) -> bool {
        self.binary2
    }

    pub(super) fn consumer(&self) -> BinaryConsumer {
        BinaryConsumer {
            fields: Arc::clone(&self.fields),
            binary2: self.binary2,
        }
    }

    pub(super) fn set_rows(&mut self, rows: Option<u64>) {
        self.rows = rows;
    }

    pub(super) fn start(&mut self, ancestry: &Ancestry<'_>) {
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

/// Reads BINARY/BINARY2 rows from a decoded STREAM.
#[derive(Debug, Clone)]
pub struct BinaryConsumer {
    fields: Arc<[Arc<FieldInfo>]>,
    binary2: bool,
}

impl BinaryConsumer {
    /// Creates a consumer for the given columns.
    pub fn new(fields: Arc<[Arc<FieldInfo>]>, binary2: bool) -> Self {
        Self { fields, binary2 }
    }

    fn element_name(&self) -> &'static str {
        if self.binary2 {
            "BINARY2"
        } else {
            "BINARY"
        }
    }

    /// Checks rows until the stream ends, returning the row count, or `None`
    /// if the stream had to be abandoned.
    pub fn consume(&self, input: &mut dyn Read, reporter: &mut dyn Reporter) -> Option<u64> {
        let mut columns: Vec<(&FieldInfo, &ValueParser)> = Vec::with_capacity(self.fields.len());
        for field in self.fields.iter() {
            match field.parser() {
                Some(parser) => columns.push((field.as_ref(), parser)),
                None => {
                    reporter.error(
                        codes::BNP,
                        format!(
                            "Can't read {} data: no usable datatype for {}",
                            self.element_name(),
                            field.element()
                        ),
                    );
                    return None;
                }
            }
        }
        if columns.is_empty() {
            reporter.error(
                codes::BNP,
                format!("Can't read {} data: no FIELDs declared", self.element_name()),
            );
            return None;
        }

        let mut input = BufReader::new(input);
        let mut flags = vec![0u8; if self.binary2 { (columns.len() + 7) / 8 } else { 0 }];
        let mut rows = 0u64;
        loop {
            match input.fill_buf() {
                Ok(buf) if buf.is_empty() => {
                    log::debug!("{} stream ended after {} rows", self.element_name(), rows);
                    return Some(rows);
                }
                Ok(_) => {}
                Err(err) => {
                    self.abandon(&StreamError::Io(err), rows, None, reporter);
                    return None;
                }
            }
            if let Err(err) = input.read_exact(&mut flags) {
                self.abandon(&StreamError::Eof(format!("null flags ({})", err)), rows, None, reporter);
                return None;
            }

            for (icol, (field, parser)) in columns.iter().enumerate() {
                let null = self.binary2 && flags[icol / 8] & (0x80 >> (icol % 8)) != 0;
                let result = if null {
                    parser.check_stream(&mut input, &mut NullReporter)
                } else {
                    parser.check_stream(&mut input, reporter)
                };
                if let Err(err) = result {
                    self.abandon(&err, rows, Some(*field), reporter);
                    return None;
                }
            }
            rows += 1;
        }
    }

    fn abandon(
        &self,
        err: &StreamError,
        rows: u64,
        field: Option<&FieldInfo>,
        reporter: &mut dyn Reporter,
    ) {
        let place = match field {
            Some(field) => format!("row {}, {}", rows + 1, field.element()),
            None => format!("row {}", rows + 1),
        };
        reporter.error(
            err.code(),
            format!(
                "{} stream abandoned at {}: {}",
                self.element_name(),
                place,
                err
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Position;
    use crate::context::CodeCollector;
    use crate::stack::ElementRef;
    use crate::values::{Declaration, ParseOptions};
    use std::io::Cursor;

    fn fields(datatypes: &[(&str, Option<&str>)]) -> Arc<[Arc<FieldInfo>]> {
        let infos: Vec<Arc<FieldInfo>> = datatypes
            .iter()
            .enumerate()
            .map(|(i, (datatype, arraysize))| {
                let element = ElementRef::new("FIELD", None, Some(Position::new(i as u64 + 1, 1)));
                let decl = Declaration {
                    datatype: Some(*datatype),
                    arraysize: *arraysize,
                    xtype: None,
                };
                let parser = ValueParser::build(
                    &decl,
                    &element.to_string(),
                    ParseOptions::default(),
                    &mut NullReporter,
                );
                Arc::new(FieldInfo::new(element, parser))
            })
            .collect();
        Arc::from(infos)
    }

    fn consume(consumer: &BinaryConsumer, bytes: &[u8]) -> (Option<u64>, Vec<&'static str>) {
        let mut codes = CodeCollector::default();
        let rows = consumer.consume(&mut Cursor::new(bytes), &mut codes);
        (rows, codes.0)
    }

    #[test]
    fn test_exact_rows() {
        let consumer = BinaryConsumer::new(fields(&[("int", None), ("short", None)]), false);
        let row = [0, 0, 0, 1, 0, 2];
        let data: Vec<u8> = row.iter().cycle().take(row.len() * 5).copied().collect();

        let (rows, codes) = consume(&consumer, &data);
        assert_eq!(rows, Some(5));
        assert!(codes.is_empty());

        let (rows, codes) = consume(&consumer, &data[..data.len() - 1]);
        assert_eq!(rows, None);
        assert_eq!(codes, vec!["EOF"]);

        let (rows, _) = consume(&consumer, &[]);
        assert_eq!(rows, Some(0));
    }

    #[test]
    fn test_variable_length_columns() {
        let consumer = BinaryConsumer::new(fields(&[("char", Some("*")), ("boolean", None)]), false);
        let data = [0, 0, 0, 3, b'a', b'b', b'c', b'T', 0, 0, 0, 0, b'?'];
        assert_eq!(consume(&consumer, &data), (Some(2), vec![]));

        let negative = [0xff, 0xff, 0xff, 0xff, b'T'];
        assert_eq!(consume(&consumer, &negative), (None, vec!["MEL"]));
    }

    #[test]
    fn test_binary2_null_flags() {
        let consumer = BinaryConsumer::new(fields(&[("boolean", None), ("boolean", None)]), true);
        // second cell flagged null: its bad value is not reported
        let data = [0b0100_0000, b'T', b'x', 0b0000_0000, b'F', b'x'];
        let (rows, codes) = consume(&consumer, &data);
        assert_eq!(rows, Some(2));
        assert_eq!(codes, vec!["TFX"]);
    }

    #[test]
    fn test_unusable_column() {
        let consumer = BinaryConsumer::new(fields(&[("int", None), ("quaternion", None)]), false);
        assert_eq!(consume(&consumer, &[0; 8]), (None, vec!["BNP"]));
    }
}
