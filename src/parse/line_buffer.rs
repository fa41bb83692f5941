// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Line-based reading over an arbitrary byte source, with single-slot
//! push-back. The grammar never needs more than one line of lookahead.

use std::io::{self, BufRead};

use crate::error::{ParseError, ParseErrorKind};

pub struct LineBuffer<R> {
    input: R,
    lineno: u32,
    pushback: Option<Vec<u8>>,
}

impl<R: BufRead> LineBuffer<R> {
    pub fn new(input: R) -> Self {
        LineBuffer { input, lineno: 0, pushback: None }
    }

    pub fn lineno(&self) -> u32 {
        self.lineno
    }

    fn io_err(&self, e: io::Error) -> ParseError {
        ParseError::new(self.lineno, ParseErrorKind::Io(e.to_string()))
    }

    /// The next line including its trailing LF, or empty bytes at EOF.
    pub fn read_line(&mut self) -> Result<Vec<u8>, ParseError> {
        self.lineno += 1;
        if let Some(line) = self.pushback.take() {
            return Ok(line);
        }
        let mut buf = Vec::new();
        self.input.read_until(b'\n', &mut buf).map_err(|e| self.io_err(e))?;
        Ok(buf)
    }

    /// The next line without its trailing LF, or `None` at EOF.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>, ParseError> {
        let mut line = self.read_line()?;
        if line.is_empty() {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Push a line (without its trailing LF) back onto the buffer. Only the
    /// most-recently read line may be pushed back.
    pub fn push_line(&mut self, mut line: Vec<u8>) {
        self.lineno -= 1;
        line.push(b'\n');
        self.pushback = Some(line);
    }

    /// Read a physical line directly from the source, bypassing push-back.
    /// Used for the single optional LF that may follow a counted `data`
    /// payload.
    pub fn read_raw_line(&mut self) -> Result<Vec<u8>, ParseError> {
        self.lineno += 1;
        let mut buf = Vec::new();
        self.input.read_until(b'\n', &mut buf).map_err(|e| self.io_err(e))?;
        Ok(buf)
    }

    /// Read exactly `n` bytes directly from the source, bypassing
    /// push-back. Fails with `MissingBytes` if fewer are available.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ParseError> {
        let mut buf = vec![0u8; n];
        let mut total = 0;
        while total < n {
            let read = self.input.read(&mut buf[total..]).map_err(|e| self.io_err(e))?;
            if read == 0 {
                break;
            }
            total += read;
        }
        buf.truncate(total);
        self.lineno += buf.iter().filter(|&&b| b == b'\n').count() as u32;
        if total != n {
            return Err(ParseError::new(
                self.lineno,
                ParseErrorKind::MissingBytes { expected: n, found: total },
            ));
        }
        Ok(buf)
    }

    /// Read full lines until one equals `terminator`, returning the
    /// concatenation of the preceding lines (including their LFs). The
    /// terminator line's own LF is not included in the result.
    pub fn read_until(&mut self, terminator: &[u8]) -> Result<Vec<u8>, ParseError> {
        let mut term = terminator.to_vec();
        term.push(b'\n');
        let mut out = Vec::new();
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                return Err(ParseError::new(
                    self.lineno,
                    ParseErrorKind::MissingTerminator { terminator: terminator.to_vec() },
                ));
            }
            if line == term {
                break;
            }
            out.extend_from_slice(&line);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn buf(s: &[u8]) -> LineBuffer<Cursor<&[u8]>> {
        LineBuffer::new(Cursor::new(s))
    }

    #[test]
    fn next_line_strips_lf() {
        let mut b = buf(b"hello\nworld\n");
        assert_eq!(b.next_line().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(b.next_line().unwrap(), Some(b"world".to_vec()));
        assert_eq!(b.next_line().unwrap(), None);
    }

    #[test]
    fn push_line_replays() {
        let mut b = buf(b"a\nb\n");
        let line = b.next_line().unwrap().unwrap();
        assert_eq!(line, b"a");
        let lineno_before = b.lineno();
        b.push_line(line);
        assert_eq!(b.lineno(), lineno_before - 1);
        assert_eq!(b.next_line().unwrap(), Some(b"a".to_vec()));
        assert_eq!(b.next_line().unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn read_bytes_exact() {
        let mut b = buf(b"hello worldREST");
        assert_eq!(b.read_bytes(11).unwrap(), b"hello world");
    }

    #[test]
    fn read_bytes_short_fails() {
        let mut b = buf(b"short");
        assert!(b.read_bytes(100).is_err());
    }

    #[test]
    fn read_until_terminator() {
        let mut b = buf(b"Line one\nLine two\nEOF\ntrailing\n");
        let data = b.read_until(b"EOF").unwrap();
        assert_eq!(data, b"Line one\nLine two\n");
        assert_eq!(b.next_line().unwrap(), Some(b"trailing".to_vec()));
    }

    #[test]
    fn lineno_tracks_across_pushback() {
        let mut b = buf(b"a\nb\nc\n");
        b.next_line().unwrap();
        assert_eq!(b.lineno(), 1);
        let l = b.next_line().unwrap().unwrap();
        assert_eq!(b.lineno(), 2);
        b.push_line(l);
        assert_eq!(b.lineno(), 1);
        b.next_line().unwrap();
        assert_eq!(b.lineno(), 2);
    }
}
