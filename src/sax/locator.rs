//! Line/column tracking for byte offsets reported by the XML reader.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::rc::Rc;

use crate::code::Position;

/// Newline offsets seen so far, consumed as positions are looked up.
///
/// Lookups must be made with non-decreasing offsets, which is how the
/// parser asks for them.
#[derive(Debug)]
pub(crate) struct LineIndex {
    newlines: VecDeque<u64>,
    total: u64,
    line: u64,
    line_start: u64,
}

impl Default for LineIndex {
    fn default() -> Self {
        Self {
            newlines: VecDeque::new(),
            total: 0,
            line: 1,
            line_start: 0,
        }
    }
}

impl LineIndex {
    fn record(&mut self, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            if *b == b'\n' {
                self.newlines.push_back(self.total + i as u64);
            }
        }
        self.total += bytes.len() as u64;
    }

    /// Position of the byte at `offset`.
    pub(crate) fn locate(&mut self, offset: u64) -> Position {
        while let Some(&nl) = self.newlines.front() {
            if nl >= offset {
                break;
            }
            self.newlines.pop_front();
            self.line += 1;
            self.line_start = nl + 1;
        }
        Position::new(self.line, offset.saturating_sub(self.line_start) + 1)
    }
}

/// Reader that records newline offsets into a shared [`LineIndex`] as the
/// XML reader pulls bytes through it.
pub(crate) struct LocatingReader<R> {
    inner: R,
    index: Rc<RefCell<LineIndex>>,
}

impl<R: Read> LocatingReader<R> {
    pub(crate) fn new(inner: R) -> (Self, Rc<RefCell<LineIndex>>) {
        let index = Rc::new(RefCell::new(LineIndex::default()));
        let reader = Self {
            inner,
            index: Rc::clone(&index),
        };
        (reader, index)
    }
}

impl<R: Read> Read for LocatingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.index.borrow_mut().record(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate() {
        let (mut reader, index) = LocatingReader::new(&b"ab\ncd\n\nef"[..]);
        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();

        let mut index = index.borrow_mut();
        assert_eq!(index.locate(0), Position::new(1, 1));
        assert_eq!(index.locate(2), Position::new(1, 3));
        assert_eq!(index.locate(3), Position::new(2, 1));
        assert_eq!(index.locate(7), Position::new(4, 1));
        assert_eq!(index.locate(9), Position::new(4, 3));
    }
}
