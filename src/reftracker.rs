// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Tracks which commit a ref currently points at, and which refs are
//! "heads" -- commits with no tracked child.

use std::collections::{HashMap, HashSet};

use crate::command::CommitCommand;

/// Tracks ref tips across a stream of commits: `last_ids` is the current
/// commit id each ref points to; `heads` is the set of refs, per commit id,
/// for commit ids that have not yet been used as someone's parent.
#[derive(Default)]
pub struct RefTracker {
    last_ref: Option<Vec<u8>>,
    last_ids: HashMap<Vec<u8>, Vec<u8>>,
    heads: HashMap<Vec<u8>, HashSet<Vec<u8>>>,
}

impl RefTracker {
    pub fn new() -> Self {
        RefTracker::default()
    }

    pub fn clear(&mut self) {
        self.last_ref = None;
        self.last_ids.clear();
        self.heads.clear();
    }

    pub fn last_ids(&self) -> &HashMap<Vec<u8>, Vec<u8>> {
        &self.last_ids
    }

    pub fn heads(&self) -> &HashMap<Vec<u8>, HashSet<Vec<u8>>> {
        &self.heads
    }

    /// Update head-tracking for a commit: its parents are no longer heads,
    /// and it becomes one itself. `from` is the commit's `from` (or, absent
    /// that, the previous commit on the same ref); `merges` lists any
    /// additional parents. Returns the parents this call consumed, for
    /// callers (like the filter transformer) that need to know when a
    /// parent stops being "interesting".
    pub fn track_heads_for_commit(&mut self, cmd: &CommitCommand) -> Vec<Vec<u8>> {
        let from = cmd.from.clone().or_else(|| {
            if self.last_ref.as_deref() == Some(cmd.ref_.as_slice()) {
                self.last_ids.get(&cmd.ref_).cloned()
            } else {
                None
            }
        });
        let mut parents: Vec<Vec<u8>> = from.into_iter().collect();
        parents.extend(cmd.merges.iter().cloned());
        self.track_heads_for_ref(&cmd.ref_, cmd.id(), &parents);
        parents
    }

    /// Core update: every parent in `parents` is dropped from `heads`
    /// entirely (it is no longer a head under any ref), and `id` is added as
    /// a head of `ref_`.
    pub fn track_heads_for_ref(&mut self, ref_: &[u8], id: Vec<u8>, parents: &[Vec<u8>]) {
        for parent in parents {
            self.heads.remove(parent);
        }
        self.heads.entry(id.clone()).or_default().insert(ref_.to_vec());
        self.last_ids.insert(ref_.to_vec(), id);
        self.last_ref = Some(ref_.to_vec());
    }
}
