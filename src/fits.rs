//! # Minimal FITS binary table reader
//!
//! Just enough FITS to follow a STREAM inside a VOTable FITS element: walk
//! the header-data units to the requested extension, read its BINTABLE
//! header, and hand the column descriptions and raw rows to a
//! [`FitsTableSink`].
//!
//! FITS files are sequences of 2880-byte blocks. Headers are 80-character
//! `KEYWORD = value / comment` cards ending with `END`; data are padded to
//! a whole number of blocks. Rows are delivered as raw bytes; the heap of
//! variable-length columns is not read.

use std::collections::HashMap;
use std::io::{self, Read};

use crate::values::ContentClass;

/// FITS block size in bytes.
pub const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Largest BINTABLE row (NAXIS1) that will be buffered.
pub const MAX_ROW_SIZE: usize = 1 << 28;

/// Errors reading a FITS stream.
#[derive(Debug, thiserror::Error)]
pub enum FitsError {
    /// The underlying reader failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended early
    #[error("FITS stream ended in {0}")]
    Eof(String),

    /// A header is missing a keyword or has a bad value
    #[error("Bad FITS header: {0}")]
    Header(String),

    /// The requested HDU is not a binary table
    #[error("HDU {extnum} is not a BINTABLE ({found})")]
    NotBinaryTable {
        /// HDU index
        extnum: u32,
        /// What was found instead
        found: String,
    },

    /// The stream holds fewer HDUs than requested
    #[error("No HDU {0} in FITS stream")]
    NoExtension(u32),
}

/// One BINTABLE column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitsColumn {
    /// `TTYPEn`
    pub name: Option<String>,
    /// `TFORMn`
    pub tform: String,
    /// Value class
    pub class: ContentClass,
    /// Elements per cell, `None` for variable-length descriptors
    pub count: Option<usize>,
    /// Bytes per cell in the row
    pub nbyte: usize,
}

/// Receiver of a table's content.
pub trait FitsTableSink {
    /// Column descriptions and the declared row count, before any row.
    fn accept_metadata(&mut self, columns: &[FitsColumn], nrows: u64);

    /// One raw row.
    fn accept_row(&mut self, index: u64, row: &[u8]);

    /// All rows delivered.
    fn end_rows(&mut self);
}

/// Reads the BINTABLE at HDU `extnum` (the primary HDU being 0).
pub fn read_fits_table(
    reader: &mut dyn Read,
    extnum: u32,
    sink: &mut dyn FitsTableSink,
) -> Result<(), FitsError> {
    let mut hdu = 0;
    loop {
        let header = match read_header(reader, hdu)? {
            Some(header) => header,
            None => return Err(FitsError::NoExtension(extnum)),
        };
        if hdu == extnum {
            return read_table(reader, extnum, &header, sink);
        }
        skip_data(reader, &header, hdu)?;
        hdu += 1;
    }
}

type Header = HashMap<String, String>;

/// Reads header cards up to `END`. `None` means clean end of stream
/// before the header started.
fn read_header(reader: &mut dyn Read, hdu: u32) -> Result<Option<Header>, FitsError> {
    let mut header = Header::new();
    let mut block = vec![0u8; BLOCK_SIZE];
    let mut first = true;
    loop {
        let n = read_full(reader, &mut block)?;
        if n == 0 && first {
            return Ok(None);
        }
        if n < BLOCK_SIZE {
            return Err(FitsError::Eof(format!("header of HDU {}", hdu)));
        }
        first = false;
        for card in block.chunks(CARD_SIZE) {
            let card = String::from_utf8_lossy(card);
            let keyword = card.get(..8).unwrap_or_default().trim_end();
            if keyword == "END" {
                return Ok(Some(header));
            }
            if card.get(8..10) == Some("= ") {
                let value = card_value(card.get(10..).unwrap_or_default());
                header.insert(keyword.to_string(), value);
            }
        }
    }
}

/// Value part of a card, without comment or string quotes.
fn card_value(text: &str) -> String {
    let text = text.trim_start();
    if let Some(rest) = text.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    value.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        return value.trim_end().to_string();
    }
    text.split('/').next().unwrap_or_default().trim().to_string()
}

fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn int_keyword(header: &Header, key: &str) -> Result<i64, FitsError> {
    let value = header
        .get(key)
        .ok_or_else(|| FitsError::Header(format!("no {}", key)))?;
    value
        .parse()
        .map_err(|_| FitsError::Header(format!("{} = {}", key, value)))
}

fn optional_int(header: &Header, key: &str, default: i64) -> Result<i64, FitsError> {
    if header.contains_key(key) {
        int_keyword(header, key)
    } else {
        Ok(default)
    }
}

fn data_size(header: &Header) -> Result<u64, FitsError> {
    let bitpix = int_keyword(header, "BITPIX")?;
    let naxis = int_keyword(header, "NAXIS")?;
    if naxis == 0 {
        return Ok(0);
    }
    let mut product: i64 = 1;
    for i in 1..=naxis {
        product = product.saturating_mul(int_keyword(header, &format!("NAXIS{}", i))?);
    }
    let pcount = optional_int(header, "PCOUNT", 0)?;
    let gcount = optional_int(header, "GCOUNT", 1)?;
    let bits = bitpix
        .abs()
        .saturating_mul(gcount)
        .saturating_mul(pcount.saturating_add(product));
    u64::try_from(bits / 8).map_err(|_| FitsError::Header(format!("data size {}", bits)))
}

fn padded(size: u64) -> Option<u64> {
    let block = BLOCK_SIZE as u64;
    Some(size.checked_add(block - 1)? / block * block)
}

fn skip_data(reader: &mut dyn Read, header: &Header, hdu: u32) -> Result<(), FitsError> {
    let size = data_size(header)?;
    let size = padded(size).ok_or_else(|| FitsError::Header(format!("data size {}", size)))?;
    let copied = io::copy(&mut Read::take(&mut *reader, size), &mut io::sink())?;
    if copied < size {
        return Err(FitsError::Eof(format!("data of HDU {}", hdu)));
    }
    Ok(())
}

fn read_table(
    reader: &mut dyn Read,
    extnum: u32,
    header: &Header,
    sink: &mut dyn FitsTableSink,
) -> Result<(), FitsError> {
    let xtension = header.get("XTENSION").map(String::as_str).unwrap_or("primary");
    if xtension != "BINTABLE" {
        return Err(FitsError::NotBinaryTable {
            extnum,
            found: xtension.to_string(),
        });
    }

    let tfields = int_keyword(header, "TFIELDS")?;
    let row_size = usize::try_from(int_keyword(header, "NAXIS1")?)
        .map_err(|_| FitsError::Header("negative NAXIS1".to_string()))?;
    let nrows = u64::try_from(int_keyword(header, "NAXIS2")?)
        .map_err(|_| FitsError::Header("negative NAXIS2".to_string()))?;

    let mut columns = Vec::new();
    for i in 1..=tfields {
        let key = format!("TFORM{}", i);
        let tform = header
            .get(&key)
            .ok_or_else(|| FitsError::Header(format!("no {}", key)))?;
        let column = parse_tform(tform)
            .ok_or_else(|| FitsError::Header(format!("{} = '{}'", key, tform)))?;
        columns.push(FitsColumn {
            name: header.get(&format!("TTYPE{}", i)).cloned(),
            ..column
        });
    }
    let width = columns
        .iter()
        .try_fold(0usize, |sum, c| sum.checked_add(c.nbyte))
        .ok_or_else(|| FitsError::Header("column widths overflow".to_string()))?;
    if width != row_size {
        return Err(FitsError::Header(format!(
            "columns occupy {} bytes but NAXIS1 = {}",
            width, row_size
        )));
    }
    if row_size > MAX_ROW_SIZE {
        return Err(FitsError::Header(format!(
            "NAXIS1 = {} exceeds the {} byte row limit",
            row_size, MAX_ROW_SIZE
        )));
    }

    sink.accept_metadata(&columns, nrows);
    let mut row = vec![0u8; row_size];
    for index in 0..nrows {
        if read_full(reader, &mut row)? < row_size {
            return Err(FitsError::Eof(format!("row {}", index + 1)));
        }
        sink.accept_row(index, &row);
    }
    sink.end_rows();
    Ok(())
}

/// Parses a `TFORMn` value such as `1J`, `16A`, `2E` or `1PE(40)`.
pub fn parse_tform(tform: &str) -> Option<FitsColumn> {
    let tform = tform.trim();
    let digits = tform.bytes().take_while(u8::is_ascii_digit).count();
    let repeat: usize = if digits == 0 {
        1
    } else {
        tform[..digits].parse().ok()?
    };
    let mut letters = tform[digits..].chars();
    let code = letters.next()?;

    let scaled = |width: usize| repeat.checked_mul(width);
    let (class, count, nbyte) = match code {
        'L' => (ContentClass::Boolean, repeat, repeat),
        'X' => (ContentClass::Bit, repeat, repeat / 8 + usize::from(repeat % 8 != 0)),
        'B' => (ContentClass::Short, repeat, repeat),
        'I' => (ContentClass::Short, repeat, scaled(2)?),
        'J' => (ContentClass::Int, repeat, scaled(4)?),
        'K' => (ContentClass::Long, repeat, scaled(8)?),
        'A' if repeat == 1 => (ContentClass::Char, 1, 1),
        'A' => (ContentClass::String, 1, repeat),
        'E' => (ContentClass::Float, repeat, scaled(4)?),
        'D' => (ContentClass::Double, repeat, scaled(8)?),
        'C' => (ContentClass::Float, scaled(2)?, scaled(8)?),
        'M' => (ContentClass::Double, scaled(2)?, scaled(16)?),
        'P' | 'Q' => {
            let element = parse_tform(letters.as_str())?;
            let class = match element.class {
                ContentClass::Char => ContentClass::String,
                other => other,
            };
            let nbyte = if code == 'P' { 8 } else { 16 };
            return Some(FitsColumn {
                name: None,
                tform: tform.to_string(),
                class,
                count: None,
                nbyte,
            });
        }
        _ => return None,
    };
    Some(FitsColumn {
        name: None,
        tform: tform.to_string(),
        class,
        count: Some(count),
        nbyte,
    })
}
