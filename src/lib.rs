// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Streaming parser and generator for the `git fast-import` interchange
//! format, plus a filtering transformer and a stream analyzer built on top
//! of it.

pub mod bytes;
pub mod command;
pub mod dates;
pub mod dump;
pub mod error;
pub mod filter;
pub mod helpers;
pub mod info;
pub mod parse;
pub mod processor;
pub mod reftracker;

pub use command::Command;
pub use dump::Dump;
pub use error::Error;
pub use parse::StreamParser;
pub use processor::{CommandProcessor, FileOpProcessor};
