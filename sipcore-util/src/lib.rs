//! Dependency-light byte scanning primitives shared by the SIP message
//! parser and the SDP parser.
//!
//! This crate has no knowledge of SIP; it is the same kind of low-level
//! `Scanner` a hand-written RFC 3261 parser and a hand-written RFC 4566
//! parser both want, so it lives one level below either of them.

use std::str;

pub mod macros;
pub mod util;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy)]
pub struct Position {
    line: usize,
    col: usize,
}

impl Position {
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

/// Reads a byte slice while tracking line/column position for diagnostics.
#[derive(Debug)]
pub struct Scanner<'a> {
    src: &'a [u8],
    pos: Position,
    idx: usize,
    len: usize,
}

impl<'a> Scanner<'a> {
    /// Creates a `Scanner` over `src`. Line and column both start at 1.
    pub const fn new(src: &'a [u8]) -> Self {
        Scanner {
            src,
            pos: Position { line: 1, col: 1 },
            idx: 0,
            len: src.len(),
        }
    }

    pub fn position(&self) -> &Position {
        &self.pos
    }

    pub fn idx(&self) -> usize {
        self.idx
    }

    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        self.idx >= self.len
    }

    #[inline]
    pub fn peek(&self) -> Option<&u8> {
        self.src.get(self.idx)
    }

    pub fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.next();
        }
    }

    #[inline]
    pub fn lookahead(&self) -> Result<&u8> {
        self.peek().ok_or_else(|| self.error::<u8>(ErrorKind::Eof).unwrap_err())
    }

    #[inline]
    pub fn starts_with(&self, pat: &[u8]) -> bool {
        self.src.get(self.idx..).is_some_and(|rem| rem.starts_with(pat))
    }

    pub fn peek_n(&self, n: usize) -> Option<&[u8]> {
        let rem = self.as_ref();
        if rem.len() >= n {
            Some(&rem[..n])
        } else {
            None
        }
    }

    /// Reads a `u32`, stopping at the first non-digit byte.
    pub fn read_u32(&mut self) -> Result<u32> {
        let digits = unsafe { str::from_utf8_unchecked(digits!(self)) };
        digits.parse().map_err(|_| self.error::<u32>(ErrorKind::Num).unwrap_err())
    }

    /// Reads a `u16`, stopping at the first non-digit byte.
    pub fn read_u16(&mut self) -> Result<u16> {
        let digits = unsafe { str::from_utf8_unchecked(digits!(self)) };
        digits.parse().map_err(|_| self.error::<u16>(ErrorKind::Num).unwrap_err())
    }

    /// Reads and advances past bytes for which `func` returns `true`,
    /// returning the consumed slice.
    #[inline(always)]
    pub fn read_while<F>(&mut self, func: F) -> &'a [u8]
    where
        F: Fn(u8) -> bool,
    {
        let start = self.idx;
        let src = self.src;

        while self.idx < self.len && func(src[self.idx]) {
            self.bump(src[self.idx]);
        }

        &src[start..self.idx]
    }

    pub fn peek_while<F>(&self, func: F) -> (&'a [u8], Option<u8>)
    where
        F: Fn(u8) -> bool,
    {
        let start = self.idx;
        let src = &self.src[start..];

        let n = src.iter().position(|&b| !func(b)).unwrap_or(src.len());
        let next_byte = src.get(n).copied();

        (&src[..n], next_byte)
    }

    /// Verifies the upcoming bytes match `slice` exactly, without advancing
    /// on failure.
    pub fn matches_slice(&mut self, slice: &[u8]) -> Result<()> {
        let rem = self.as_ref();
        if rem.len() >= slice.len() && &rem[..slice.len()] == slice {
            self.bump_n(slice.len());
            Ok(())
        } else {
            self.error(ErrorKind::Tag)
        }
    }

    /// Reads the next byte if it equals `b`, else errors without advancing.
    pub fn must_read(&mut self, b: u8) -> Result<()> {
        let Some(&n) = self.peek() else {
            return self.error(ErrorKind::Eof);
        };
        if b != n {
            return self.error(ErrorKind::Char { expected: b, found: n });
        }
        self.next();
        Ok(())
    }

    pub fn take_until(&mut self, byte: u8) -> &'a [u8] {
        self.read_while(|b| b != byte)
    }

    /// Same as [`Scanner::read_while`] but interprets the slice as UTF-8.
    ///
    /// # Safety
    /// The caller must guarantee `func` only accepts bytes that form valid
    /// UTF-8 (e.g. ASCII token characters).
    #[inline]
    pub unsafe fn read_as_str<F>(&mut self, func: F) -> &'a str
    where
        F: Fn(u8) -> bool,
    {
        let bytes = self.read_while(&func);
        unsafe { str::from_utf8_unchecked(bytes) }
    }

    /// Reads a number of type `N`, stopping at the first byte that doesn't
    /// extend a valid `N` literal.
    pub fn read_num<N>(&mut self) -> Result<N>
    where
        N: lexical_core::FromLexical,
    {
        match lexical_core::parse_partial::<N>(self.as_ref()) {
            Ok((value, read)) if read > 0 => {
                self.bump_n(read);
                Ok(value)
            }
            _ => self.error(ErrorKind::Num),
        }
    }

    #[inline(always)]
    pub fn consume_if<F>(&mut self, func: F) -> Option<u8>
    where
        F: FnOnce(u8) -> bool,
    {
        match self.peek() {
            Some(&matched) if func(matched) => {
                self.bump(matched);
                Some(matched)
            }
            _ => None,
        }
    }

    #[inline(always)]
    fn bump(&mut self, byte: u8) {
        if byte == b'\n' {
            self.pos.col = 1;
            self.pos.line += 1;
        } else {
            self.pos.col += 1;
        }
        self.idx += 1;
    }

    pub fn cur_is_some_and<F>(&self, func: F) -> bool
    where
        F: FnOnce(u8) -> bool,
    {
        self.peek().is_some_and(|&b| func(b))
    }

    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        self.as_ref()
    }

    fn error<T>(&self, kind: ErrorKind) -> Result<T> {
        Err(Error {
            kind,
            line: self.pos.line,
            col: self.pos.col,
        })
    }
}

impl std::fmt::Display for Scanner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.remaining()))
    }
}

/// Errors produced while scanning.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ErrorKind {
    Eof,
    Char { expected: u8, found: u8 },
    Num,
    Tag,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Error {
    pub kind: ErrorKind,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} at line {} column {}", self.kind, self.line, self.col)
    }
}

impl std::error::Error for Error {}

impl<'a> AsRef<[u8]> for Scanner<'a> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        // SAFETY: idx and len are both kept within `src`'s bounds by `bump`.
        unsafe { self.src.get_unchecked(self.idx..self.len) }
    }
}

impl Iterator for Scanner<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        let byte = self.src.get(self.idx).copied();
        if let Some(b) = byte {
            self.bump(b);
        }
        byte
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_num_stops_at_non_digit() {
        let mut s = Scanner::new(b"12345");
        assert_eq!(s.read_num(), Ok(12345u32));

        let mut s = Scanner::new(b"NaN");
        assert!(s.read_num::<u32>().is_err());
        assert_eq!(s.as_ref(), b"NaN");

        let mut s = Scanner::new(b"9123Test");
        assert_eq!(s.read_num(), Ok(9123u32));
        assert_eq!(s.as_ref(), b"Test");
    }

    #[test]
    fn lookahead_tracks_position() {
        let mut s = Scanner::new(b"Hello");
        assert_eq!(s.lookahead(), Ok(&b'H'));
        s.next();
        assert_eq!(s.lookahead(), Ok(&b'e'));
        s.read_while(|_| true);
        assert!(s.lookahead().is_err());
    }

    #[test]
    fn matches_slice_does_not_advance_on_mismatch() {
        let mut s = Scanner::new(b"SIP/2.0");
        assert!(s.matches_slice(b"SIP/2.0").is_ok());
        assert!(s.is_eof());

        let mut s = Scanner::new(b"HTTP/1.1");
        assert!(s.matches_slice(b"SIP/2.0").is_err());
        assert_eq!(s.as_ref(), b"HTTP/1.1");
    }
}
