// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! The command object model: one variant per stream command, plus the
//! file-op sub-commands nested inside a commit.

use std::collections::BTreeMap;

/// A fully parsed command from a fast-import stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Blob(BlobCommand),
    Commit(CommitCommand),
    Reset(ResetCommand),
    Tag(TagCommand),
    Feature(FeatureCommand),
    Progress(ProgressCommand),
    Checkpoint(CheckpointCommand),
}

impl Command {
    /// The wire name of this command's kind, e.g. `b"commit"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Blob(_) => "blob",
            Command::Commit(_) => "commit",
            Command::Reset(_) => "reset",
            Command::Tag(_) => "tag",
            Command::Feature(_) => "feature",
            Command::Progress(_) => "progress",
            Command::Checkpoint(_) => "checkpoint",
        }
    }
}

/// The names of every command kind, in the order `InfoProcessor` tallies
/// them.
pub const COMMAND_NAMES: &[&str] = &[
    "blob", "commit", "reset", "tag", "feature", "progress", "checkpoint",
];

/// The names of every file-op kind, in the order `InfoProcessor` tallies
/// them.
pub const FILE_COMMAND_NAMES: &[&str] =
    &["filemodify", "filedelete", "filecopy", "filerename", "filedeleteall", "notemodify"];

/// The feature names this crate recognizes without warning. Unrecognized
/// features are not errors -- the parser records them and processors may
/// warn that "parsing may fail".
pub const FEATURE_NAMES: &[&str] = &[
    "date-format",
    "import-marks",
    "export-marks",
    "relative-marks",
    "no-relative-marks",
    "force",
    "notes",
    "done",
    "get-mark",
    "cat-blob",
    "ls",
];

/// The (name, email, timestamp, timezone) quadruple appearing in `author`,
/// `committer`, and `tagger` lines. Immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct Authorship {
    pub name: Vec<u8>,
    pub email: Option<Vec<u8>>,
    /// Seconds since the epoch.
    pub timestamp: f64,
    /// UTC offset in seconds.
    pub timezone: i32,
}

impl Eq for Authorship {}

/// Computes the synthetic id of a command: `:mark` when a mark exists, else
/// `@lineno`.
pub fn synthetic_id(mark: Option<&[u8]>, lineno: u32) -> Vec<u8> {
    match mark {
        Some(mark) => {
            let mut id = Vec::with_capacity(mark.len() + 1);
            id.push(b':');
            id.extend_from_slice(mark);
            id
        }
        None => format!("@{lineno}").into_bytes(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobCommand {
    pub mark: Option<Vec<u8>>,
    pub original_oid: Option<Vec<u8>>,
    pub data: Vec<u8>,
    pub lineno: u32,
}

impl BlobCommand {
    pub fn id(&self) -> Vec<u8> {
        synthetic_id(self.mark.as_deref(), self.lineno)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitCommand {
    pub ref_: Vec<u8>,
    pub mark: Option<Vec<u8>>,
    pub author: Option<Authorship>,
    pub more_authors: Vec<Authorship>,
    pub committer: Authorship,
    pub message: Vec<u8>,
    pub from: Option<Vec<u8>>,
    pub merges: Vec<Vec<u8>>,
    pub file_ops: Vec<FileOp>,
    pub properties: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    pub original_oid: Option<Vec<u8>>,
    pub lineno: u32,
}

impl CommitCommand {
    pub fn id(&self) -> Vec<u8> {
        synthetic_id(self.mark.as_deref(), self.lineno)
    }

    /// Produce an independent copy. Synthetic fields (`id`) are recomputed
    /// from the copy's own `mark`/`lineno`, matching the original's
    /// exclusion of `id`/`name` from the copied field set. Since this
    /// crate's `file_ops` is always already a `Vec` (materialization
    /// happens at parse time, see `parse::StreamParser`), copying never
    /// needs to drain a pending iterator -- cloning the vector is the
    /// equivalent of the original's "materialize then duplicate" step.
    pub fn copy(&self) -> CommitCommand {
        self.clone()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetCommand {
    pub ref_: Vec<u8>,
    pub from: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagCommand {
    pub id: Vec<u8>,
    pub from: Option<Vec<u8>>,
    pub tagger: Option<Authorship>,
    pub message: Vec<u8>,
    pub original_oid: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureCommand {
    pub name: Vec<u8>,
    pub value: Option<Vec<u8>>,
    pub lineno: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressCommand {
    pub message: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointCommand;

/// A tree mutation inside a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOp {
    Modify(FileModify),
    Delete { path: Vec<u8> },
    Rename { old_path: Vec<u8>, new_path: Vec<u8> },
    Copy { src_path: Vec<u8>, dest_path: Vec<u8> },
    DeleteAll,
    NoteModify { from: Vec<u8>, data: Vec<u8> },
}

impl FileOp {
    pub fn kind(&self) -> &'static str {
        match self {
            FileOp::Modify(_) => "filemodify",
            FileOp::Delete { .. } => "filedelete",
            FileOp::Rename { .. } => "filerename",
            FileOp::Copy { .. } => "filecopy",
            FileOp::DeleteAll => "filedeleteall",
            FileOp::NoteModify { .. } => "notemodify",
        }
    }
}

/// `M MODE (DATAREF|inline) PATH`. Exactly one of `dataref`/`data` is set;
/// for an inline modify, `data` carries the payload and `dataref` is
/// `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileModify {
    pub path: Vec<u8>,
    pub mode: u32,
    pub dataref: Option<Vec<u8>>,
    pub data: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_id_from_mark() {
        assert_eq!(synthetic_id(Some(b"42"), 7), b":42");
    }

    #[test]
    fn synthetic_id_from_lineno() {
        assert_eq!(synthetic_id(None, 7), b"@7");
    }
}
