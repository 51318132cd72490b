//! # Value parsers
//!
//! A [`ValueParser`] is built once per FIELD or PARAM from its `datatype`,
//! `arraysize` and `xtype`, and checks cell values in two forms:
//!
//! - text, as found in TABLEDATA cells, PARAM `value` and VALUES `null`
//!   ([`ValueParser::check_string`])
//! - binary, as found in BINARY and BINARY2 streams and base64 TD cells
//!   ([`ValueParser::check_stream`])
//!
//! Both forms agree on the element count and [`ContentClass`] of a parser.
//!
//! ## Binary layout
//!
//! Fixed-size values occupy `count * width` bytes. Variable-size values are
//! preceded by a 4-byte big-endian element count. Bits are packed, `(n+7)/8`
//! bytes. A premature end of stream is unrecoverable: the caller cannot find
//! the next row boundary and must abandon the stream.

pub mod arraysize;
pub mod scalar;
pub mod xtype;

#[cfg(test)]
mod tests;

use std::io::{self, Read};
use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt};

use crate::code::{codes, VotLintCode};
use crate::context::Reporter;

use self::arraysize::{ArraySize, ArraySizeError};
use self::scalar::{is_boolean_byte, Scalar, INT, LONG, SHORT, UNSIGNED_BYTE};
use self::xtype::{Xtype, XtypeParser};

/// In-memory class of a column's values, as FITS would describe them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// `boolean`
    Boolean,
    /// `bit`
    Bit,
    /// `unsignedByte` and `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float` and `floatComplex`
    Float,
    /// `double` and `doubleComplex`
    Double,
    /// A single character
    Char,
    /// A string, or an array of strings
    String,
}

impl ContentClass {
    fn of(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Boolean => ContentClass::Boolean,
            Scalar::Integer(spec) if spec.nbyte <= 2 => ContentClass::Short,
            Scalar::Integer(spec) if spec.nbyte == 4 => ContentClass::Int,
            Scalar::Integer(_) => ContentClass::Long,
            Scalar::Float => ContentClass::Float,
            Scalar::Double => ContentClass::Double,
        }
    }
}

/// FIELD/PARAM attributes a parser is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct Declaration<'a> {
    /// `datatype`
    pub datatype: Option<&'a str>,
    /// `arraysize`
    pub arraysize: Option<&'a str>,
    /// `xtype`
    pub xtype: Option<&'a str>,
}

/// Version-dependent parsing rules.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Empty TD cells are null for integer columns
    pub allow_empty_integer: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_empty_integer: true,
        }
    }
}

/// Failure reading binary values.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Stream ended inside a value
    #[error("end of stream while reading {0}")]
    Eof(String),

    /// The underlying reader failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Data cannot be interpreted and the stream cannot be resynchronised
    #[error("corrupt stream: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserKind {
    Scalar(Scalar),
    FixedArray { scalar: Scalar, count: usize },
    VariableArray { scalar: Scalar, block: usize },
    FixedBit(usize),
    VariableBit,
    SingleChar { unicode: bool },
    FixedChar { unicode: bool, len: usize },
    VariableChar { unicode: bool },
    FixedCharArray { unicode: bool, total: usize },
    VariableCharArray { unicode: bool },
}

/// Checker for the values of one FIELD or PARAM.
#[derive(Debug, Clone)]
pub struct ValueParser {
    kind: ParserKind,
    class: ContentClass,
    count: Option<usize>,
    xtype: Option<XtypeParser>,
    owner: Arc<str>,
    allow_empty_integer: bool,
}

impl ValueParser {
    /// Builds a parser, reporting declaration problems.
    ///
    /// Returns `None` when no parser can be built (missing or unknown
    /// datatype, bad arraysize); checks on that column then become no-ops.
    pub fn build(
        decl: &Declaration<'_>,
        owner: &str,
        options: ParseOptions,
        reporter: &mut dyn Reporter,
    ) -> Option<Self> {
        let Some(datatype) = decl.datatype.map(str::trim) else {
            reporter.error(codes::DT0, format!("No datatype for {}", owner));
            return None;
        };

        // a blank arraysize is the same as none
        let arraysize_text = decl.arraysize.filter(|a| !a.trim().is_empty());
        let arraysize = match arraysize_text.map(ArraySize::parse).transpose() {
            Ok(arraysize) => arraysize,
            Err(err) => {
                report_arraysize(&err, arraysize_text.unwrap_or_default(), owner, reporter);
                return None;
            }
        };
        if let Some(err) = arraysize.as_ref().and_then(ArraySize::hint_error) {
            report_arraysize(err, arraysize_text.unwrap_or_default(), owner, reporter);
        }

        let (kind, class, count) = if let Some((scalar, factor)) = numeric_scalar(datatype) {
            match numeric(scalar, factor, arraysize.as_ref()) {
                Some(parts) => parts,
                None => {
                    let text = arraysize_text.unwrap_or_default();
                    let err = ArraySizeError::Overflow(text.trim().to_string());
                    report_arraysize(&err, text, owner, reporter);
                    return None;
                }
            }
        } else {
            match datatype {
                "bit" => bits(arraysize.as_ref()),
                "char" | "unicodeChar" => {
                    if arraysize.is_none() {
                        reporter.info(
                            codes::AR1,
                            format!(
                            "No arraysize for character {}, implies single character",
                            owner
                        ),
                        );
                    }
                    characters(datatype == "unicodeChar", arraysize.as_ref())
                }
                other => {
                    reporter.error(
                        codes::DTX,
                        format!("Unknown datatype \"{}\" for {}", other, owner),
                    );
                    return None;
                }
            }
        };

        let xtype = decl
            .xtype
            .and_then(|x| XtypeParser::resolve(x, datatype, arraysize.as_ref(), reporter));

        Some(Self {
            kind,
            class,
            count,
            xtype,
            owner: Arc::from(owner),
            allow_empty_integer: options.allow_empty_integer,
        })
    }

    /// Content class.
    pub fn content_class(&self) -> ContentClass {
        self.class
    }

    /// Number of elements per value, `None` for variable-length values.
    pub fn element_count(&self) -> Option<usize> {
        self.count
    }

    /// Checked DALI xtype, if any.
    pub fn xtype(&self) -> Option<Xtype> {
        self.xtype.map(|x| x.xtype())
    }

    /// True for single-element parsers; VALUES `null` is only checked for
    /// these.
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, ParserKind::Scalar(_) | ParserKind::SingleChar { .. })
    }

    /// Checks a textual value. Leading and trailing whitespace is ignored
    /// except in character data. Empty text is a null scalar.
    pub fn check_string(&self, text: &str, reporter: &mut dyn Reporter) {
        if let Some(xtype) = &self.xtype {
            xtype.check_text(text, &self.owner, reporter);
            return;
        }

        let trimmed = text.trim();
        match self.kind {
            ParserKind::Scalar(scalar) => {
                if trimmed.is_empty() {
                    if matches!(scalar, Scalar::Integer(_)) && !self.allow_empty_integer {
                        reporter.error(
                            codes::ETD,
                            format!(
                                "Empty cell illegal for integer {} at this version",
                                self.owner
                            ),
                        );
                    }
                    return;
                }
                self.check_token(scalar, trimmed, reporter);
            }
            ParserKind::FixedArray { scalar, count } => {
                let tokens: Vec<&str> = trimmed.split_whitespace().collect();
                if tokens.len() != count {
                    reporter.error(
                        codes::E09,
                        format!(
                            "Wrong number of elements in {} ({} found, {} expected)",
                            self.owner,
                            tokens.len(),
                            count
                        ),
                    );
                }
                self.check_tokens(scalar, &tokens, reporter);
            }
            ParserKind::VariableArray { scalar, block } => {
                let tokens: Vec<&str> = trimmed.split_whitespace().collect();
                if block > 1 && tokens.len() % block != 0 {
                    reporter.error(
                        codes::E08,
                        format!(
                            "Wrong number of elements in {} ({} found, not a multiple of {})",
                            self.owner,
                            tokens.len(),
                            block
                        ),
                    );
                }
                self.check_tokens(scalar, &tokens, reporter);
            }
            ParserKind::FixedBit(count) => {
                if let Some(nbit) = self.count_bits(trimmed, codes::BT0, reporter) {
                    if nbit != 0 && nbit != count {
                        reporter.error(
                            codes::CT9,
                            format!(
                                "Wrong number of elements in bit vector {} ({} found, {} expected)",
                                self.owner, nbit, count
                            ),
                        );
                    }
                }
            }
            ParserKind::VariableBit => {
                self.count_bits(trimmed, codes::BV0, reporter);
            }
            ParserKind::SingleChar { unicode } => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (None, _) => reporter.warning(
                        codes::CH0,
                        format!("Empty character value for {} is questionable", self.owner),
                    ),
                    (Some(_), None) => {}
                    (Some(_), Some(_)) => reporter.warning(
                        codes::CH1,
                        format!(
                            "Characters after first in char scalar {} ignored (missing arraysize?)",
                            self.owner
                        ),
                    ),
                }
                if !unicode && text.chars().next().is_some_and(|c| !c.is_ascii()) {
                    reporter.error(
                        codes::CRU,
                        format!("Non-ascii character in 'char' data for {}", self.owner),
                    );
                }
            }
            ParserKind::FixedCharArray { total, .. } => {
                let nchar = text.chars().count();
                if nchar != 0 && nchar != total {
                    reporter.warning(
                        codes::C09,
                        format!(
                            "Wrong number of characters in {} ({} found, {} expected)",
                            self.owner, nchar, total
                        ),
                    );
                }
            }
            ParserKind::FixedChar { .. }
            | ParserKind::VariableChar { .. }
            | ParserKind::VariableCharArray { .. } => {}
        }
    }

    /// Reads and checks one binary value.
    ///
    /// Problems with the value itself are reported and reading continues;
    /// an `Err` means the stream can no longer be followed.
    pub fn check_stream(
        &self,
        input: &mut dyn Read,
        reporter: &mut dyn Reporter,
    ) -> Result<(), StreamError> {
        if let Some(xtype) = &self.xtype {
            return xtype.check_stream(input, &self.owner, reporter);
        }
        match self.kind {
            ParserKind::Scalar(scalar) => self.read_scalars(scalar, 1, input, reporter),
            ParserKind::FixedArray { scalar, count } => {
                self.read_scalars(scalar, count, input, reporter)
            }
            ParserKind::VariableArray { scalar, block } => {
                let count = read_count(input, &self.owner)?;
                if block > 1 && count % block != 0 {
                    reporter.error(
                        codes::E08,
                        format!(
                            "Wrong number of elements in {} (found {}, not a multiple of {})",
                            self.owner, count, block
                        ),
                    );
                }
                self.read_scalars(scalar, count, input, reporter)
            }
            ParserKind::FixedBit(nbit) => skip(input, bit_bytes(nbit), "bit vector"),
            ParserKind::VariableBit => {
                let nbit = read_count(input, &self.owner)?;
                skip(input, bit_bytes(nbit), "bit vector")
            }
            ParserKind::SingleChar { unicode } => skip(input, char_width(unicode), "character"),
            ParserKind::FixedChar { unicode, len } => {
                skip(input, self.byte_len(len, char_width(unicode))?, "characters")
            }
            ParserKind::FixedCharArray { unicode, total } => {
                skip(input, self.byte_len(total, char_width(unicode))?, "characters")
            }
            ParserKind::VariableChar { unicode } | ParserKind::VariableCharArray { unicode } => {
                let nchar = read_count(input, &self.owner)?;
                skip(input, self.byte_len(nchar, char_width(unicode))?, "characters")
            }
        }
    }

    fn check_token(&self, scalar: Scalar, token: &str, reporter: &mut dyn Reporter) {
        if let Err((code, text)) = scalar.check_token(token) {
            reporter.error(code, format!("{} in {}", text, self.owner));
        }
    }

    fn check_tokens(&self, scalar: Scalar, tokens: &[&str], reporter: &mut dyn Reporter) {
        for token in tokens {
            self.check_token(scalar, token, reporter);
        }
    }

    /// Counts the bits in bit vector text, or reports `code` and returns
    /// `None` on a character other than `0`, `1` or whitespace.
    fn count_bits(
        &self,
        text: &str,
        code: VotLintCode,
        reporter: &mut dyn Reporter,
    ) -> Option<usize> {
        let mut nbit = 0;
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            if c != '0' && c != '1' {
                reporter.error(
                    code,
                    format!("Bad value for bit vector {} \"{}\"", self.owner, text),
                );
                return None;
            }
            nbit += 1;
        }
        Some(nbit)
    }

    fn byte_len(&self, count: usize, width: usize) -> Result<usize, StreamError> {
        count.checked_mul(width).ok_or_else(|| {
            StreamError::Corrupt(format!(
                "{} elements of {} bytes is too long for {}",
                count, width, self.owner
            ))
        })
    }

    fn read_scalars(
        &self,
        scalar: Scalar,
        count: usize,
        input: &mut dyn Read,
        reporter: &mut dyn Reporter,
    ) -> Result<(), StreamError> {
        if scalar != Scalar::Boolean {
            return skip(input, self.byte_len(count, scalar.nbyte())?, scalar.name());
        }
        for _ in 0..count {
            let b = input.read_u8().map_err(|e| eof_or_io(e, "boolean"))?;
            if !is_boolean_byte(b) {
                reporter.error(
                    codes::TFX,
                    format!("Bad boolean value '{}' in {}", char::from(b), self.owner),
                );
            }
        }
        Ok(())
    }
}

fn report_arraysize(err: &ArraySizeError, text: &str, owner: &str, reporter: &mut dyn Reporter) {
    let code = match err {
        ArraySizeError::Negative(_) => codes::DMN,
        ArraySizeError::BadToken(_) | ArraySizeError::Overflow(_) => codes::ARB,
    };
    reporter.error(
        code,
        format!("Bad arraysize \"{}\" for {}: {}", text, owner, err),
    );
}

/// Scalar type and elements per value of the numeric datatypes.
fn numeric_scalar(datatype: &str) -> Option<(Scalar, usize)> {
    Some(match datatype {
        "boolean" => (Scalar::Boolean, 1),
        "unsignedByte" => (Scalar::Integer(UNSIGNED_BYTE), 1),
        "short" => (Scalar::Integer(SHORT), 1),
        "int" => (Scalar::Integer(INT), 1),
        "long" => (Scalar::Integer(LONG), 1),
        "float" => (Scalar::Float, 1),
        "double" => (Scalar::Double, 1),
        "floatComplex" => (Scalar::Float, 2),
        "doubleComplex" => (Scalar::Double, 2),
        _ => return None,
    })
}

/// `None` if complex interleaving overflows the element count.
fn numeric(
    scalar: Scalar,
    factor: usize,
    arraysize: Option<&ArraySize>,
) -> Option<(ParserKind, ContentClass, Option<usize>)> {
    let class = ContentClass::of(scalar);
    let elements = arraysize
        .map_or(1, ArraySize::fixed_product)
        .checked_mul(factor)?;
    Some(match arraysize {
        Some(a) if a.is_variable() => (
            ParserKind::VariableArray {
                scalar,
                block: elements,
            },
            class,
            None,
        ),
        _ => {
            let kind = if elements == 1 {
                ParserKind::Scalar(scalar)
            } else {
                ParserKind::FixedArray {
                    scalar,
                    count: elements,
                }
            };
            (kind, class, Some(elements))
        }
    })
}

fn bits(arraysize: Option<&ArraySize>) -> (ParserKind, ContentClass, Option<usize>) {
    match arraysize {
        Some(a) if a.is_variable() => (ParserKind::VariableBit, ContentClass::Bit, None),
        _ => {
            let count = arraysize.map_or(1, ArraySize::fixed_product);
            (ParserKind::FixedBit(count), ContentClass::Bit, Some(count))
        }
    }
}

/// An array of characters is a string; the first dimension is the string
/// length and the rest count strings.
fn characters(
    unicode: bool,
    arraysize: Option<&ArraySize>,
) -> (ParserKind, ContentClass, Option<usize>) {
    let single = (ParserKind::SingleChar { unicode }, ContentClass::Char, Some(1));
    let Some(a) = arraysize else {
        return single;
    };
    if a.count() == Some(1) {
        return single;
    }
    if a.ndim() <= 1 {
        return match a.count() {
            Some(len) => (
                ParserKind::FixedChar { unicode, len },
                ContentClass::String,
                Some(1),
            ),
            None => (
                ParserKind::VariableChar { unicode },
                ContentClass::String,
                Some(1),
            ),
        };
    }
    match a.count() {
        Some(total) => {
            let len = a.dims()[0].max(1);
            (
                ParserKind::FixedCharArray { unicode, total },
                ContentClass::String,
                Some(total / len),
            )
        }
        None => (
            ParserKind::VariableCharArray { unicode },
            ContentClass::String,
            None,
        ),
    }
}

fn bit_bytes(nbit: usize) -> usize {
    nbit / 8 + usize::from(nbit % 8 != 0)
}

fn char_width(unicode: bool) -> usize {
    if unicode {
        2
    } else {
        1
    }
}

/// Reads the element count preceding a variable-length value.
fn read_count(input: &mut dyn Read, owner: &str) -> Result<usize, StreamError> {
    let count = input
        .read_i32::<BigEndian>()
        .map_err(|e| eof_or_io(e, "element count"))?;
    usize::try_from(count).map_err(|_| {
        StreamError::Corrupt(format!("negative element count {} for {}", count, owner))
    })
}

fn eof_or_io(err: io::Error, what: &str) -> StreamError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        StreamError::Eof(what.to_string())
    } else {
        StreamError::Io(err)
    }
}

fn skip(input: &mut dyn Read, nbyte: usize, what: &str) -> Result<(), StreamError> {
    let wanted = nbyte as u64;
    let copied = io::copy(&mut Read::take(&mut *input, wanted), &mut io::sink())?;
    if copied < wanted {
        return Err(StreamError::Eof(what.to_string()));
    }
    Ok(())
}

impl StreamError {
    /// Diagnostic code for this failure.
    pub fn code(&self) -> VotLintCode {
        match self {
            StreamError::Eof(_) => codes::EOF,
            StreamError::Io(_) => codes::SDE,
            StreamError::Corrupt(_) => codes::MEL,
        }
    }
}
