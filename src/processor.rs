// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Command dispatch: a trait per command kind with a defaulted "missing
//! handler" body, plus a nested trait for the file-op sub-commands inside a
//! commit. Implementors override only the kinds they care about.

use paste::paste;

use crate::command::{
    BlobCommand, CheckpointCommand, Command, CommitCommand, FeatureCommand, FileOp, ProgressCommand,
    ResetCommand, TagCommand,
};
use crate::error::{ConfigError, Error, MissingHandler};

macro_rules! command_handlers {
    ($($kind:ident : $cmd_ty:ty),* $(,)?) => {
        /// Receives one callback per top-level command kind. The default
        /// body for each is a `MissingHandler` error, matching a processor
        /// that only implements the handful of kinds it cares about.
        pub trait CommandProcessor {
            paste! {
                $(
                    #[allow(unused_variables)]
                    fn [<$kind _handler>](&mut self, cmd: &$cmd_ty) -> Result<(), Error> {
                        Err(Error::Handler(MissingHandler { cmd: stringify!($kind) }))
                    }
                )*
            }

            /// Declared parameter names this processor recognizes from an
            /// external configuration source. The base trait recognizes
            /// none.
            fn known_params(&self) -> &'static [&'static str] {
                &[]
            }

            fn validate_parameters(&self, params: &[&str]) -> Result<(), ConfigError> {
                let known = self.known_params();
                for param in params {
                    if !known.contains(param) {
                        return Err(ConfigError::UnknownParameter {
                            param: param.to_string(),
                            known,
                        });
                    }
                }
                Ok(())
            }

            fn pre_process(&mut self) {}
            fn post_process(&mut self) {}
            #[allow(unused_variables)]
            fn pre_handler(&mut self, cmd: &Command) {}
            #[allow(unused_variables)]
            fn post_handler(&mut self, cmd: &Command) {}

            fn dispatch(&mut self, cmd: &Command) -> Result<(), Error> {
                paste! {
                    match cmd {
                        $(
                            Command::[<$kind:camel>](c) => self.[<$kind _handler>](c),
                        )*
                    }
                }
            }

            /// Drive a whole stream: `pre_process`, then for every command
            /// `pre_handler`/dispatch/`post_handler`, then `post_process`.
            fn process<I>(&mut self, commands: I) -> Result<(), Error>
            where
                I: IntoIterator<Item = Result<Command, Error>>,
                Self: Sized,
            {
                self.pre_process();
                for cmd in commands {
                    let cmd = cmd?;
                    self.pre_handler(&cmd);
                    self.dispatch(&cmd)?;
                    self.post_handler(&cmd);
                }
                self.post_process();
                Ok(())
            }
        }
    };
}

command_handlers! {
    blob: BlobCommand,
    commit: CommitCommand,
    reset: ResetCommand,
    tag: TagCommand,
    feature: FeatureCommand,
    progress: ProgressCommand,
    checkpoint: CheckpointCommand,
}

/// Receives one callback per file-op kind found inside a commit.
/// `process_file_ops` is the usual entry point: it calls
/// `pre_process_files`, dispatches every op, then `post_process_files`.
pub trait FileOpProcessor {
    fn pre_process_files(&mut self) {}
    fn post_process_files(&mut self) {}

    #[allow(unused_variables)]
    fn modify_handler(&mut self, op: &FileOp) -> Result<(), Error> {
        Err(Error::Handler(MissingHandler { cmd: "filemodify" }))
    }
    #[allow(unused_variables)]
    fn delete_handler(&mut self, op: &FileOp) -> Result<(), Error> {
        Err(Error::Handler(MissingHandler { cmd: "filedelete" }))
    }
    #[allow(unused_variables)]
    fn rename_handler(&mut self, op: &FileOp) -> Result<(), Error> {
        Err(Error::Handler(MissingHandler { cmd: "filerename" }))
    }
    #[allow(unused_variables)]
    fn copy_handler(&mut self, op: &FileOp) -> Result<(), Error> {
        Err(Error::Handler(MissingHandler { cmd: "filecopy" }))
    }
    #[allow(unused_variables)]
    fn deleteall_handler(&mut self, op: &FileOp) -> Result<(), Error> {
        Err(Error::Handler(MissingHandler { cmd: "filedeleteall" }))
    }
    #[allow(unused_variables)]
    fn notemodify_handler(&mut self, op: &FileOp) -> Result<(), Error> {
        Err(Error::Handler(MissingHandler { cmd: "notemodify" }))
    }

    fn process_file_ops(&mut self, ops: &[FileOp]) -> Result<(), Error>
    where
        Self: Sized,
    {
        self.pre_process_files();
        for op in ops {
            match op {
                FileOp::Modify(_) => self.modify_handler(op),
                FileOp::Delete { .. } => self.delete_handler(op),
                FileOp::Rename { .. } => self.rename_handler(op),
                FileOp::Copy { .. } => self.copy_handler(op),
                FileOp::DeleteAll => self.deleteall_handler(op),
                FileOp::NoteModify { .. } => self.notemodify_handler(op),
            }?;
        }
        self.post_process_files();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Authorship, FileModify};
    use std::collections::BTreeMap;

    struct Counter {
        blobs: u32,
        commits: u32,
    }

    impl CommandProcessor for Counter {
        fn blob_handler(&mut self, _cmd: &BlobCommand) -> Result<(), Error> {
            self.blobs += 1;
            Ok(())
        }
        fn commit_handler(&mut self, _cmd: &CommitCommand) -> Result<(), Error> {
            self.commits += 1;
            Ok(())
        }
    }

    fn committer() -> Authorship {
        Authorship { name: b"A".to_vec(), email: Some(b"a@example.com".to_vec()), timestamp: 0.0, timezone: 0 }
    }

    #[test]
    fn dispatch_routes_to_overridden_handlers() {
        let mut c = Counter { blobs: 0, commits: 0 };
        let blob = Command::Blob(BlobCommand { mark: None, original_oid: None, data: vec![], lineno: 1 });
        let commit = Command::Commit(CommitCommand {
            ref_: b"refs/heads/master".to_vec(),
            mark: None,
            author: None,
            more_authors: vec![],
            committer: committer(),
            message: vec![],
            from: None,
            merges: vec![],
            file_ops: vec![],
            properties: BTreeMap::new(),
            original_oid: None,
            lineno: 2,
        });
        c.process(vec![Ok(blob), Ok(commit)]).unwrap();
        assert_eq!(c.blobs, 1);
        assert_eq!(c.commits, 1);
    }

    #[test]
    fn unimplemented_handler_errors() {
        let mut c = Counter { blobs: 0, commits: 0 };
        let reset = Command::Reset(ResetCommand { ref_: b"refs/heads/x".to_vec(), from: None });
        let err = c.process(vec![Ok(reset)]).unwrap_err();
        assert!(matches!(err, Error::Handler(MissingHandler { cmd: "reset" })));
    }

    struct FileOpCounter {
        deletes: u32,
        modifies: u32,
    }

    impl FileOpProcessor for FileOpCounter {
        fn modify_handler(&mut self, _op: &FileOp) -> Result<(), Error> {
            self.modifies += 1;
            Ok(())
        }
        fn delete_handler(&mut self, _op: &FileOp) -> Result<(), Error> {
            self.deletes += 1;
            Ok(())
        }
    }

    #[test]
    fn file_op_dispatch_routes_modify_and_delete() {
        let mut c = FileOpCounter { deletes: 0, modifies: 0 };
        let ops = vec![
            FileOp::Modify(FileModify { path: b"a".to_vec(), mode: crate::bytes::Mode::FILE, dataref: Some(b":1".to_vec()), data: None }),
            FileOp::Delete { path: b"b".to_vec() },
        ];
        c.process_file_ops(&ops).unwrap();
        assert_eq!(c.modifies, 1);
        assert_eq!(c.deletes, 1);
    }
}
