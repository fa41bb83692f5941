// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Accumulates statistics over a stream without rewriting it: command and
//! file-op tallies, a parent/merge histogram, blob reference tracking, and
//! ref-head tracking, then renders a human or machine-readable report.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;

use crate::bytes::Mode;
use crate::command::{
    BlobCommand, CheckpointCommand, CommitCommand, FeatureCommand, FileOp, ProgressCommand,
    ResetCommand, TagCommand, COMMAND_NAMES, FILE_COMMAND_NAMES,
};
use crate::error::Error;
use crate::processor::CommandProcessor;
use crate::reftracker::RefTracker;

#[derive(Default)]
pub struct InfoProcessor {
    command_counts: BTreeMap<&'static str, u32>,
    file_command_counts: BTreeMap<&'static str, u32>,
    parent_counts: BTreeMap<usize, u32>,
    merge_counts: BTreeMap<usize, u32>,
    committers: BTreeSet<Vec<u8>>,
    saw_executable: bool,
    saw_symlink: bool,
    saw_separate_author: bool,
    saw_blob_referenced_by_sha: bool,
    lightweight_tags: u32,
    blobs_new: HashSet<Vec<u8>>,
    blobs_used: HashSet<Vec<u8>>,
    blobs_unknown: HashSet<Vec<u8>>,
    blobs_unmarked: u32,
    blob_ref_counts: HashMap<Vec<u8>, u32>,
    renames_by_commit: HashMap<Vec<u8>, Vec<Vec<u8>>>,
    copies_by_commit: HashMap<Vec<u8>, Vec<Vec<u8>>>,
    reftracker: RefTracker,
}

impl InfoProcessor {
    pub fn new() -> Self {
        InfoProcessor::default()
    }

    fn bump_command(&mut self, kind: &'static str) {
        *self.command_counts.entry(kind).or_insert(0) += 1;
    }

    fn bump_file_command(&mut self, kind: &'static str) {
        *self.file_command_counts.entry(kind).or_insert(0) += 1;
    }

    /// Advance a referenced mark through new -> used -> counted(N), or into
    /// `unknown` if it was never declared by a `blob` command.
    fn track_blob_ref(&mut self, mark: &[u8]) {
        if let Some(count) = self.blob_ref_counts.get_mut(mark) {
            *count += 1;
        } else if self.blobs_used.remove(mark) {
            self.blob_ref_counts.insert(mark.to_vec(), 2);
        } else if self.blobs_new.remove(mark) {
            self.blobs_used.insert(mark.to_vec());
        } else {
            self.blobs_unknown.insert(mark.to_vec());
        }
    }

    /// Render the accumulated statistics. `verbosity` 0 is a compact
    /// human-readable summary; `>=1` is a ConfigObj-style `[section]`
    /// report; `>=2` additionally lists every rename/copy source path by
    /// commit.
    pub fn report(&self, verbosity: u8) -> String {
        if verbosity == 0 {
            self.report_human()
        } else {
            self.report_verbose(verbosity)
        }
    }

    fn report_human(&self) -> String {
        let mut out = String::new();
        writeln!(out, "Command counts:").unwrap();
        for name in COMMAND_NAMES {
            writeln!(out, "\t{}\t{}", name, self.command_counts.get(name).copied().unwrap_or(0))
                .unwrap();
        }
        writeln!(out, "File command counts:").unwrap();
        for name in FILE_COMMAND_NAMES {
            writeln!(out, "\t{}\t{}", name, self.file_command_counts.get(name).copied().unwrap_or(0))
                .unwrap();
        }
        writeln!(out, "Parent counts:").unwrap();
        for (n, count) in &self.parent_counts {
            writeln!(out, "\t{n}\t{count}").unwrap();
        }
        writeln!(out, "Merge counts:").unwrap();
        for (n, count) in &self.merge_counts {
            writeln!(out, "\t{n}\t{count}").unwrap();
        }
        writeln!(out, "Executables: {}", found(self.saw_executable)).unwrap();
        writeln!(out, "Symlinks: {}", found(self.saw_symlink)).unwrap();
        writeln!(out, "Separate authors: {}", found(self.saw_separate_author)).unwrap();
        writeln!(out, "Blobs referenced by SHA: {}", found(self.saw_blob_referenced_by_sha)).unwrap();
        writeln!(out, "Lightweight tags: {}", self.lightweight_tags).unwrap();
        writeln!(out, "Committers: {}", self.committers.len()).unwrap();
        writeln!(out, "Blobs: new={} used={} unknown={} unmarked={}",
            self.blobs_new.len(), self.blobs_used.len(), self.blobs_unknown.len(), self.blobs_unmarked)
            .unwrap();
        writeln!(out, "Heads: {}", self.reftracker.heads().len()).unwrap();
        out
    }

    fn report_verbose(&self, verbosity: u8) -> String {
        let mut out = String::new();
        writeln!(out, "[command counts]").unwrap();
        for name in COMMAND_NAMES {
            writeln!(out, "{} = {}", name, self.command_counts.get(name).copied().unwrap_or(0))
                .unwrap();
        }
        writeln!(out, "\n[file command counts]").unwrap();
        for name in FILE_COMMAND_NAMES {
            writeln!(out, "{} = {}", name, self.file_command_counts.get(name).copied().unwrap_or(0))
                .unwrap();
        }
        writeln!(out, "\n[history shape]").unwrap();
        writeln!(
            out,
            "parent counts = {}",
            iterable_as_config_list(self.parent_counts.iter().map(|(n, c)| format!("{n}: {c}")))
        )
        .unwrap();
        writeln!(
            out,
            "merge counts = {}",
            iterable_as_config_list(self.merge_counts.iter().map(|(n, c)| format!("{n}: {c}")))
        )
        .unwrap();
        writeln!(out, "executables = {}", found(self.saw_executable)).unwrap();
        writeln!(out, "symlinks = {}", found(self.saw_symlink)).unwrap();
        writeln!(out, "separate authors = {}", found(self.saw_separate_author)).unwrap();

        writeln!(out, "\n[head analysis]").unwrap();
        for (ref_, ids) in invert_heads(self.reftracker.heads()) {
            writeln!(
                out,
                "{} = {}",
                String::from_utf8_lossy(&ref_),
                iterable_as_config_list(ids.iter().map(|id| String::from_utf8_lossy(id).into_owned()))
            )
            .unwrap();
        }

        if verbosity >= 2 {
            writeln!(out, "\n[renames]").unwrap();
            for (id, paths) in &self.renames_by_commit {
                writeln!(
                    out,
                    "{} = {}",
                    String::from_utf8_lossy(id),
                    iterable_as_config_list(paths.iter().map(|p| String::from_utf8_lossy(p).into_owned()))
                )
                .unwrap();
            }
            writeln!(out, "\n[copies]").unwrap();
            for (id, paths) in &self.copies_by_commit {
                writeln!(
                    out,
                    "{} = {}",
                    String::from_utf8_lossy(id),
                    iterable_as_config_list(paths.iter().map(|p| String::from_utf8_lossy(p).into_owned()))
                )
                .unwrap();
            }
        }

        writeln!(out, "\n[blob usage]").unwrap();
        writeln!(out, "new = {}", self.blobs_new.len()).unwrap();
        writeln!(out, "used = {}", self.blobs_used.len()).unwrap();
        writeln!(out, "unknown = {}", self.blobs_unknown.len()).unwrap();
        writeln!(out, "unmarked = {}", self.blobs_unmarked).unwrap();
        writeln!(out, "blobs referenced by sha = {}", found(self.saw_blob_referenced_by_sha)).unwrap();

        writeln!(out, "\n[reset analysis]").unwrap();
        writeln!(out, "lightweight tags = {}", self.lightweight_tags).unwrap();
        out
    }
}

fn found(flag: bool) -> &'static str {
    if flag {
        "found"
    } else {
        "not found"
    }
}

/// Render an iterable of strings the way ConfigObj would a list value.
fn iterable_as_config_list(items: impl Iterator<Item = String>) -> String {
    let rendered: Vec<String> = items.collect();
    if rendered.is_empty() {
        "list()".to_string()
    } else {
        format!("list({})", rendered.join(", "))
    }
}

/// Invert a commit-id -> refs map into a ref -> commit-ids view, for the
/// "Head analysis" report section, matching the original's `invert_dictset`.
fn invert_heads(heads: &HashMap<Vec<u8>, HashSet<Vec<u8>>>) -> BTreeMap<Vec<u8>, Vec<Vec<u8>>> {
    let mut inverted: BTreeMap<Vec<u8>, Vec<Vec<u8>>> = BTreeMap::new();
    for (id, refs) in heads {
        for ref_ in refs {
            inverted.entry(ref_.clone()).or_default().push(id.clone());
        }
    }
    for ids in inverted.values_mut() {
        ids.sort();
    }
    inverted
}

impl CommandProcessor for InfoProcessor {
    fn blob_handler(&mut self, cmd: &BlobCommand) -> Result<(), Error> {
        self.bump_command("blob");
        match &cmd.mark {
            None => self.blobs_unmarked += 1,
            Some(mark) => {
                self.blobs_used.remove(mark);
                self.blobs_new.insert(mark.clone());
            }
        }
        Ok(())
    }

    fn commit_handler(&mut self, cmd: &CommitCommand) -> Result<(), Error> {
        self.bump_command("commit");

        let mut committer_key = cmd.committer.name.clone();
        committer_key.push(b'\0');
        committer_key.extend(cmd.committer.email.clone().unwrap_or_default());
        self.committers.insert(committer_key);

        if cmd.author.is_some() {
            self.saw_separate_author = true;
        }

        let num_parents = usize::from(cmd.from.is_some()) + cmd.merges.len();
        *self.parent_counts.entry(num_parents).or_insert(0) += 1;
        *self.merge_counts.entry(cmd.merges.len()).or_insert(0) += 1;

        for op in &cmd.file_ops {
            self.bump_file_command(op.kind());
            match op {
                FileOp::Modify(m) => {
                    if m.mode == Mode::EXECUTABLE {
                        self.saw_executable = true;
                    }
                    if m.mode == Mode::SYMLINK {
                        self.saw_symlink = true;
                    }
                    if let Some(dataref) = &m.dataref {
                        if let Some(mark) = dataref.strip_prefix(b":") {
                            self.track_blob_ref(mark);
                        } else {
                            self.saw_blob_referenced_by_sha = true;
                        }
                    }
                }
                FileOp::Rename { old_path, .. } => {
                    self.renames_by_commit.entry(cmd.id()).or_default().push(old_path.clone());
                }
                FileOp::Copy { src_path, .. } => {
                    self.copies_by_commit.entry(cmd.id()).or_default().push(src_path.clone());
                }
                FileOp::Delete { .. } | FileOp::DeleteAll | FileOp::NoteModify { .. } => {}
            }
        }

        self.reftracker.track_heads_for_commit(cmd);
        Ok(())
    }

    fn reset_handler(&mut self, cmd: &ResetCommand) -> Result<(), Error> {
        self.bump_command("reset");
        if cmd.ref_.starts_with(b"refs/tags/") {
            self.lightweight_tags += 1;
        } else if let Some(from) = &cmd.from {
            self.reftracker.track_heads_for_ref(&cmd.ref_, from.clone(), &[]);
        }
        Ok(())
    }

    fn tag_handler(&mut self, _cmd: &TagCommand) -> Result<(), Error> {
        self.bump_command("tag");
        Ok(())
    }

    fn feature_handler(&mut self, _cmd: &FeatureCommand) -> Result<(), Error> {
        self.bump_command("feature");
        Ok(())
    }

    fn progress_handler(&mut self, _cmd: &ProgressCommand) -> Result<(), Error> {
        self.bump_command("progress");
        Ok(())
    }

    fn checkpoint_handler(&mut self, _cmd: &CheckpointCommand) -> Result<(), Error> {
        self.bump_command("checkpoint");
        Ok(())
    }
}
