// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Byte-exact serialization: the inverse of [`crate::parse`].

use std::io::{self, Write};

use enumflags2::BitFlags;

use crate::bytes::{format_path, Mode, QuoteFlags};
use crate::command::{
    Authorship, BlobCommand, CheckpointCommand, Command, CommitCommand, FeatureCommand, FileOp,
    ProgressCommand, ResetCommand, TagCommand,
};
use crate::dates::format_tz;

pub trait Dump {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()>;
}

fn dump_data<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    write!(w, "data {}\n", data.len())?;
    w.write_all(data)
}

fn dump_authorship<W: Write>(w: &mut W, section: &str, who: &Authorship) -> io::Result<()> {
    w.write_all(section.as_bytes())?;
    w.write_all(b" ")?;
    if !who.name.is_empty() {
        w.write_all(&who.name)?;
        w.write_all(b" ")?;
    }
    w.write_all(b"<")?;
    if let Some(email) = &who.email {
        w.write_all(email)?;
    }
    w.write_all(b"> ")?;
    write!(w, "{}", who.timestamp as i64)?;
    w.write_all(b" ")?;
    w.write_all(format_tz(who.timezone).as_bytes())?;
    w.write_all(b"\n")
}

impl Dump for Command {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Command::Blob(cmd) => cmd.dump(w),
            Command::Commit(cmd) => cmd.dump(w),
            Command::Reset(cmd) => cmd.dump(w),
            Command::Tag(cmd) => cmd.dump(w),
            Command::Feature(cmd) => cmd.dump(w),
            Command::Progress(cmd) => cmd.dump(w),
            Command::Checkpoint(cmd) => cmd.dump(w),
        }
    }
}

impl Dump for BlobCommand {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"blob\n")?;
        if let Some(mark) = &self.mark {
            write!(w, "mark :")?;
            w.write_all(mark)?;
            w.write_all(b"\n")?;
        }
        if let Some(oid) = &self.original_oid {
            w.write_all(b"original-oid ")?;
            w.write_all(oid)?;
            w.write_all(b"\n")?;
        }
        dump_data(w, &self.data)
    }
}

impl Dump for CommitCommand {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"commit ")?;
        w.write_all(&self.ref_)?;
        w.write_all(b"\n")?;
        if let Some(mark) = &self.mark {
            w.write_all(b"mark :")?;
            w.write_all(mark)?;
            w.write_all(b"\n")?;
        }
        if let Some(oid) = &self.original_oid {
            w.write_all(b"original-oid ")?;
            w.write_all(oid)?;
            w.write_all(b"\n")?;
        }
        if let Some(author) = &self.author {
            dump_authorship(w, "author", author)?;
        }
        for author in &self.more_authors {
            dump_authorship(w, "author", author)?;
        }
        dump_authorship(w, "committer", &self.committer)?;
        dump_data(w, &self.message)?;
        if let Some(from) = &self.from {
            w.write_all(b"\nfrom ")?;
            w.write_all(from)?;
        }
        for merge in &self.merges {
            w.write_all(b"\nmerge ")?;
            w.write_all(merge)?;
        }
        for (name, value) in &self.properties {
            w.write_all(b"\nproperty ")?;
            w.write_all(name)?;
            if let Some(value) = value {
                write!(w, " {}", value.len())?;
                w.write_all(b" ")?;
                w.write_all(value)?;
            }
        }
        for op in &self.file_ops {
            w.write_all(b"\n")?;
            op.dump(w)?;
        }
        Ok(())
    }
}

impl Dump for FileOp {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            FileOp::Modify(m) => {
                let path = format_path(&m.path, QuoteFlags::QuoteSpaces.into());
                if Mode::is_directory(m.mode) {
                    w.write_all(b"M ")?;
                    w.write_all(Mode::format(m.mode))?;
                    w.write_all(b" - ")?;
                    w.write_all(&path)
                } else if let Some(data) = &m.data {
                    w.write_all(b"M ")?;
                    w.write_all(Mode::format(m.mode))?;
                    w.write_all(b" inline ")?;
                    w.write_all(&path)?;
                    w.write_all(b"\n")?;
                    dump_data(w, data)
                } else {
                    w.write_all(b"M ")?;
                    w.write_all(Mode::format(m.mode))?;
                    w.write_all(b" ")?;
                    w.write_all(m.dataref.as_deref().unwrap_or(b""))?;
                    w.write_all(b" ")?;
                    w.write_all(&path)
                }
            }
            FileOp::Delete { path } => {
                w.write_all(b"D ")?;
                w.write_all(&format_path(path, QuoteFlags::QuoteSpaces.into()))
            }
            FileOp::Rename { old_path, new_path } => {
                w.write_all(b"R ")?;
                w.write_all(&format_path(old_path, QuoteFlags::QuoteSpaces.into()))?;
                w.write_all(b" ")?;
                w.write_all(&format_path(new_path, BitFlags::empty()))
            }
            FileOp::Copy { src_path, dest_path } => {
                w.write_all(b"C ")?;
                w.write_all(&format_path(src_path, QuoteFlags::QuoteSpaces.into()))?;
                w.write_all(b" ")?;
                w.write_all(&format_path(dest_path, BitFlags::empty()))
            }
            FileOp::DeleteAll => w.write_all(b"deleteall"),
            FileOp::NoteModify { from, data } => {
                w.write_all(b"N inline :")?;
                w.write_all(from)?;
                w.write_all(b"\n")?;
                dump_data(w, data)
            }
        }
    }
}

impl Dump for ResetCommand {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"reset ")?;
        w.write_all(&self.ref_)?;
        w.write_all(b"\n")?;
        if let Some(from) = &self.from {
            // The trailing LF after `from` is unconditional: git had a bug
            // (fixed post-1.5.4.3, commit 655e8515) that choked without it.
            w.write_all(b"from ")?;
            w.write_all(from)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Dump for TagCommand {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"tag ")?;
        w.write_all(&self.id)?;
        w.write_all(b"\n")?;
        if let Some(from) = &self.from {
            w.write_all(b"from ")?;
            w.write_all(from)?;
            w.write_all(b"\n")?;
        }
        if let Some(oid) = &self.original_oid {
            w.write_all(b"original-oid ")?;
            w.write_all(oid)?;
            w.write_all(b"\n")?;
        }
        if let Some(tagger) = &self.tagger {
            dump_authorship(w, "tagger", tagger)?;
        }
        dump_data(w, &self.message)
    }
}

impl Dump for FeatureCommand {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"feature ")?;
        w.write_all(&self.name)?;
        if let Some(value) = &self.value {
            w.write_all(b"=")?;
            w.write_all(value)?;
        }
        w.write_all(b"\n")
    }
}

impl Dump for ProgressCommand {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"progress ")?;
        w.write_all(&self.message)?;
        w.write_all(b"\n")
    }
}

impl Dump for CheckpointCommand {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"checkpoint\n")
    }
}

/// Serialize a value to an owned byte vector.
pub fn dump_to_vec<T: Dump>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.dump(&mut buf).expect("writing to a Vec is infallible");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FileModify;

    #[test]
    fn blob_round_trip_bytes() {
        let cmd = BlobCommand {
            mark: Some(b"1".to_vec()),
            original_oid: None,
            data: b"hello world".to_vec(),
            lineno: 1,
        };
        assert_eq!(dump_to_vec(&cmd), b"blob\nmark :1\ndata 11\nhello world");
    }

    #[test]
    fn reset_always_has_trailing_lf_after_from() {
        let cmd = ResetCommand { ref_: b"refs/heads/master".to_vec(), from: Some(b":1".to_vec()) };
        assert_eq!(dump_to_vec(&cmd), b"reset refs/heads/master\nfrom :1\n");
    }

    #[test]
    fn directory_modify_forces_dash_dataref() {
        let op = FileOp::Modify(FileModify {
            path: b"sub".to_vec(),
            mode: Mode::DIRECTORY,
            dataref: Some(b":99".to_vec()),
            data: None,
        });
        assert_eq!(dump_to_vec(&op), b"M 040000 - sub");
    }

    #[test]
    fn rename_quotes_only_first_path_on_space() {
        let op = FileOp::Rename { old_path: b"a b".to_vec(), new_path: b"c d".to_vec() };
        assert_eq!(dump_to_vec(&op), b"R \"a b\" c d");
    }

    #[test]
    fn commit_dump_has_no_trailing_lf_and_prefixes_trailer_sections() {
        use std::collections::BTreeMap;

        use crate::command::Authorship;

        let cmd = CommitCommand {
            ref_: b"refs/heads/master".to_vec(),
            mark: Some(b"2".to_vec()),
            author: None,
            more_authors: vec![],
            committer: Authorship {
                name: b"A U Thor".to_vec(),
                email: Some(b"a@example.com".to_vec()),
                timestamp: 0.0,
                timezone: 0,
            },
            message: b"msg".to_vec(),
            from: Some(b":1".to_vec()),
            merges: vec![],
            file_ops: vec![FileOp::Delete { path: b"a".to_vec() }],
            properties: BTreeMap::new(),
            original_oid: None,
            lineno: 1,
        };
        let out = dump_to_vec(&cmd);
        assert_eq!(
            out,
            b"commit refs/heads/master\nmark :2\ncommitter A U Thor <a@example.com> 0 +0000\n\
              data 3\nmsg\nfrom :1\nD a"
                .to_vec()
        );
        assert!(!out.ends_with(b"\n"));
    }
}
