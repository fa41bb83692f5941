// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Error taxonomy for parsing, configuration, and dispatch.

use bstr::ByteSlice;
use thiserror::Error;

/// Errors raised while scanning the byte stream. All carry the 1-based line
/// number of the line whose parse failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {lineno}: {kind}")]
pub struct ParseError {
    pub lineno: u32,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(lineno: u32, kind: ParseErrorKind) -> Self {
        ParseError { lineno, kind }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("unexpected EOF - expected {expected} bytes, found {found}")]
    MissingBytes { expected: usize, found: usize },

    #[error("unexpected EOF - expected {:?} terminator", terminator.as_bstr())]
    MissingTerminator { terminator: Vec<u8> },

    #[error("invalid command {:?}", cmd.as_bstr())]
    InvalidCommand { cmd: Vec<u8> },

    #[error("command {cmd} is missing section {section}")]
    MissingSection {
        cmd: &'static str,
        section: &'static str,
    },

    #[error("bad format for section {section} in command {cmd}: found {:?}", text.as_bstr())]
    BadFormat {
        cmd: &'static str,
        section: &'static str,
        text: Vec<u8>,
    },

    #[error("timezone {:?} could not be converted.{reason}", timezone.as_bstr())]
    InvalidTimezone { timezone: Vec<u8>, reason: String },

    #[error("stream end before 'done' command")]
    PrematureEndOfStream,

    #[error("illegal path: {0}")]
    IllegalPath(#[from] PathError),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Input-shape errors: a path failed `check_path`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path starts with '/'")]
    LeadingSlash,
}

/// Configuration errors: something the caller asked of the library doesn't
/// exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown date format {format:?}")]
    UnknownDateFormat { format: String },

    #[error("unknown parameter {param:?}, known parameters: {known:?}")]
    UnknownParameter {
        param: String,
        known: &'static [&'static str],
    },
}

/// Raised by `parse_rfc2822`: the format is recognized but never implemented.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateError {
    #[error("rfc2822 date parsing is not implemented")]
    Rfc2822Unimplemented,
    #[error("timezone could not be parsed")]
    InvalidTimezone,
}

/// Raised by the processor dispatch layer (C5) when a command kind has no
/// registered handler.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("missing handler for command {cmd}")]
pub struct MissingHandler {
    pub cmd: &'static str,
}

/// Aggregate error for the whole crate, composing the layers above the way a
/// caller driving the full pipeline would see them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Handler(#[from] MissingHandler),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// A write failure while dumping a command back out (e.g. the filter or
/// info pipelines). Folded into the line-0 "no particular line" bucket of
/// `ParseError` since it isn't a parse-position error at all, but the
/// aggregate error needs a single type for callers driving a full pipeline.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Parse(ParseError::new(0, ParseErrorKind::Io(e.to_string())))
    }
}
