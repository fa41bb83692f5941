// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! The stream grammar driver: turns a byte source into a lazy sequence of
//! [`Command`]s.

use std::collections::BTreeMap;
use std::io::BufRead;

use crate::bytes::{check_path, unquote_c_string, Mode};
use crate::command::{
    Authorship, BlobCommand, CheckpointCommand, Command, CommitCommand, FeatureCommand, FileModify,
    FileOp, ProgressCommand, ResetCommand, TagCommand,
};
use crate::dates::{self, DateFormat};
use crate::error::{ConfigError, DateError, Error, ParseError, ParseErrorKind, PathError};
use crate::parse::line_buffer::LineBuffer;

/// Parses a fast-import stream into a sequence of commands.
///
/// Iterate it directly: each `next()` call scans exactly one top-level
/// command (consuming any nested authorship/data/file-op lines it owns)
/// and returns `None` once the stream is exhausted.
pub struct StreamParser<R> {
    buf: LineBuffer<R>,
    date_format: Option<DateFormat>,
    features: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<R: BufRead> StreamParser<R> {
    pub fn new(input: R) -> Self {
        StreamParser { buf: LineBuffer::new(input), date_format: None, features: BTreeMap::new() }
    }

    /// Features named by `feature` commands seen so far, with any `=VALUE`.
    pub fn features(&self) -> &BTreeMap<Vec<u8>, Option<Vec<u8>>> {
        &self.features
    }

    fn lineno(&self) -> u32 {
        self.buf.lineno()
    }

    fn err(&self, kind: ParseErrorKind) -> Error {
        Error::Parse(ParseError::new(self.lineno(), kind))
    }

    fn next_command(&mut self) -> Result<Option<Command>, Error> {
        loop {
            let line = match self.buf.next_line()? {
                Some(line) => line,
                None => {
                    if self.features.contains_key(b"done".as_slice()) {
                        return Err(self.err(ParseErrorKind::PrematureEndOfStream));
                    }
                    return Ok(None);
                }
            };
            if line.is_empty() || line.starts_with(b"#") {
                continue;
            }
            if let Some(rest) = line.strip_prefix(b"commit ") {
                return Ok(Some(self.parse_commit(rest)?));
            } else if line.starts_with(b"blob") {
                return Ok(Some(self.parse_blob()?));
            } else if line == b"done" {
                return Ok(None);
            } else if let Some(rest) = line.strip_prefix(b"progress ") {
                return Ok(Some(Command::Progress(ProgressCommand { message: rest.to_vec() })));
            } else if let Some(rest) = line.strip_prefix(b"reset ") {
                return Ok(Some(self.parse_reset(rest)?));
            } else if let Some(rest) = line.strip_prefix(b"tag ") {
                return Ok(Some(self.parse_tag(rest)?));
            } else if line.starts_with(b"checkpoint") {
                return Ok(Some(Command::Checkpoint(CheckpointCommand)));
            } else if line.starts_with(b"feature") {
                let rest = if line.len() > b"feature ".len() { &line[b"feature ".len()..] } else { &[][..] };
                return Ok(Some(self.parse_feature(rest)?));
            } else {
                return Err(self.err(ParseErrorKind::InvalidCommand { cmd: line }));
            }
        }
    }

    // -- optional single-line lookaheads, each restoring the line on miss --

    fn get_mark_if_any(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.peek_prefixed(b"mark :")
    }

    fn get_original_oid(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.peek_prefixed(b"original-oid ")
    }

    fn peek_prefixed(&mut self, prefix: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        match self.buf.next_line()? {
            None => Ok(None),
            Some(line) => {
                if let Some(rest) = line.strip_prefix(prefix) {
                    Ok(Some(rest.to_vec()))
                } else {
                    self.buf.push_line(line);
                    Ok(None)
                }
            }
        }
    }

    fn get_from(&mut self, required_for: Option<&'static str>) -> Result<Option<Vec<u8>>, Error> {
        match self.buf.next_line()? {
            None => Ok(None),
            Some(line) => {
                if let Some(rest) = line.strip_prefix(b"from ") {
                    Ok(Some(rest.to_vec()))
                } else if let Some(cmd) = required_for {
                    Err(self.err(ParseErrorKind::MissingSection { cmd, section: "from" }))
                } else {
                    self.buf.push_line(line);
                    Ok(None)
                }
            }
        }
    }

    fn get_merge(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match self.buf.next_line()? {
            None => Ok(None),
            Some(line) => {
                if let Some(rest) = line.strip_prefix(b"merge ") {
                    Ok(Some(rest.to_vec()))
                } else {
                    self.buf.push_line(line);
                    Ok(None)
                }
            }
        }
    }

    fn get_property(&mut self) -> Result<Option<(Vec<u8>, Option<Vec<u8>>)>, Error> {
        match self.buf.next_line()? {
            None => Ok(None),
            Some(line) => {
                if let Some(rest) = line.strip_prefix(b"property ") {
                    Ok(Some(self.parse_name_value(rest)?))
                } else {
                    self.buf.push_line(line);
                    Ok(None)
                }
            }
        }
    }

    fn get_required_user_info(
        &mut self,
        cmd: &'static str,
        section: &'static str,
    ) -> Result<Authorship, Error> {
        self.get_user_info_inner(cmd, section, true, false)?
            .ok_or_else(|| self.err(ParseErrorKind::MissingSection { cmd, section }))
    }

    fn get_optional_user_info(
        &mut self,
        cmd: &'static str,
        section: &'static str,
        accept_just_who: bool,
    ) -> Result<Option<Authorship>, Error> {
        self.get_user_info_inner(cmd, section, false, accept_just_who)
    }

    fn get_user_info_inner(
        &mut self,
        cmd: &'static str,
        section: &'static str,
        required: bool,
        accept_just_who: bool,
    ) -> Result<Option<Authorship>, Error> {
        let mut prefix = section.as_bytes().to_vec();
        prefix.push(b' ');
        match self.buf.next_line()? {
            Some(line) if line.starts_with(&prefix) => {
                let rest = line[prefix.len()..].to_vec();
                Ok(Some(self.parse_who_when(&rest, accept_just_who)?))
            }
            Some(line) => {
                if required {
                    Err(self.err(ParseErrorKind::MissingSection { cmd, section }))
                } else {
                    self.buf.push_line(line);
                    Ok(None)
                }
            }
            None => {
                if required {
                    Err(self.err(ParseErrorKind::MissingSection { cmd, section }))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn get_data(&mut self, cmd: &'static str) -> Result<Vec<u8>, Error> {
        let section = "data";
        let line = self
            .buf
            .next_line()?
            .ok_or_else(|| self.err(ParseErrorKind::MissingSection { cmd, section }))?;
        let rest = line
            .strip_prefix(b"data ")
            .ok_or_else(|| self.err(ParseErrorKind::MissingSection { cmd, section }))?;
        if let Some(delim) = rest.strip_prefix(b"<<") {
            Ok(self.buf.read_until(delim)?)
        } else {
            let size: usize = std::str::from_utf8(rest)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    self.err(ParseErrorKind::BadFormat { cmd, section, text: rest.to_vec() })
                })?;
            let data = self.buf.read_bytes(size)?;
            // A single optional LF may follow a counted payload; anything
            // else gets pushed back for the next section to see.
            let raw = self.buf.read_raw_line()?;
            if raw != b"\n" {
                let mut pushed = raw;
                if pushed.last() == Some(&b'\n') {
                    pushed.pop();
                }
                self.buf.push_line(pushed);
            }
            Ok(data)
        }
    }

    fn parse_name_value(&mut self, s: &[u8]) -> Result<(Vec<u8>, Option<Vec<u8>>), Error> {
        let parts: Vec<&[u8]> = s.splitn(3, |&b| b == b' ').collect();
        let name = parts[0].to_vec();
        if parts.len() == 1 {
            return Ok((name, None));
        }
        let size: usize = std::str::from_utf8(parts[1])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                self.err(ParseErrorKind::BadFormat {
                    cmd: "commit",
                    section: "property",
                    text: s.to_vec(),
                })
            })?;
        let value_on_line = parts.get(2).copied().unwrap_or(b"");
        let still_to_read = size as isize - value_on_line.len() as isize;
        let value = if still_to_read > 0 {
            let extra = self.buf.read_bytes(still_to_read as usize)?;
            let mut v = value_on_line.to_vec();
            v.push(b'\n');
            v.extend_from_slice(&extra[..still_to_read as usize - 1]);
            v
        } else {
            value_on_line.to_vec()
        };
        Ok((name, Some(value)))
    }

    /// Parses `NAME <EMAIL> WHEN`, auto-detecting and caching the date
    /// format on the first authorship line seen. Falls back to a bare
    /// `NAME <EMAIL>` with no date (synthesized as "now") when
    /// `accept_just_who` allows it -- used for tagger lines, which may omit
    /// the date entirely.
    fn parse_who_when(&mut self, s: &[u8], accept_just_who: bool) -> Result<Authorship, Error> {
        if let Some(lt) = s.iter().position(|&b| b == b'<') {
            if let Some(gt_rel) = s[lt..].iter().rposition(|&b| b == b'>') {
                let gt = lt + gt_rel;
                if gt + 1 < s.len() && s[gt + 1] == b' ' && gt + 2 < s.len() {
                    let mut name = s[..lt].to_vec();
                    if name.last() == Some(&b' ') {
                        name.pop();
                    }
                    let email = s[lt + 1..gt].to_vec();
                    let mut datestr = &s[gt + 2..];
                    while datestr.first() == Some(&b' ') {
                        datestr = &datestr[1..];
                    }
                    let format = match self.date_format {
                        Some(f) => f,
                        None => {
                            let f = dates::detect_format(datestr);
                            self.date_format = Some(f);
                            f
                        }
                    };
                    let (timestamp, timezone) = dates::parse(format, datestr).map_err(|e| {
                        self.date_error_to_crate_error(e, datestr)
                    })?;
                    return Ok(Authorship { name, email: Some(email), timestamp, timezone });
                }
            }
        }
        // Fallback: a bare "NAME <EMAIL>" with no date section.
        if let Some(lt) = s.iter().position(|&b| b == b'<') {
            if let Some(gt_rel) = s[lt..].iter().rposition(|&b| b == b'>') {
                let gt = lt + gt_rel;
                let mut name = s[..lt].to_vec();
                if name.last() == Some(&b' ') {
                    name.pop();
                }
                let email = s[lt + 1..gt].to_vec();
                if accept_just_who {
                    log::warn!("missing date in who/when line, assuming 'now'");
                    let (timestamp, timezone) = dates::parse_now();
                    return Ok(Authorship { name, email: Some(email), timestamp, timezone });
                }
            }
        }
        if accept_just_who {
            log::warn!("missing date in who/when line, assuming 'now'");
            let (timestamp, timezone) = dates::parse_now();
            Ok(Authorship { name: s.to_vec(), email: None, timestamp, timezone })
        } else {
            Err(self.err(ParseErrorKind::BadFormat {
                cmd: "commit",
                section: "author",
                text: s.to_vec(),
            }))
        }
    }

    fn date_error_to_crate_error(&self, e: DateError, datestr: &[u8]) -> Error {
        match e {
            DateError::Rfc2822Unimplemented => {
                Error::Config(ConfigError::UnknownDateFormat { format: "rfc2822".to_string() })
            }
            DateError::InvalidTimezone => self.err(ParseErrorKind::InvalidTimezone {
                timezone: datestr.to_vec(),
                reason: String::new(),
            }),
        }
    }

    fn parse_path(&mut self, s: &[u8]) -> Result<Vec<u8>, Error> {
        if s.first() == Some(&b'"') {
            if s.len() < 2 || *s.last().unwrap() != b'"' {
                return Err(self.err(ParseErrorKind::BadFormat {
                    cmd: "filemodify",
                    section: "path",
                    text: s.to_vec(),
                }));
            }
            Ok(unquote_c_string(&s[1..s.len() - 1]))
        } else {
            Ok(s.to_vec())
        }
    }

    /// A path appearing in a file-op, validated per `check_path` (non-empty,
    /// not rooted). Feature values reuse the bare unquoting of `parse_path`
    /// without this check -- they aren't tree paths.
    fn parse_file_path(&mut self, s: &[u8]) -> Result<Vec<u8>, Error> {
        let path = self.parse_path(s)?;
        check_path(&path)?;
        Ok(path)
    }

    fn parse_path_pair(&mut self, s: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
        if s.first() == Some(&b'"') {
            // A quoted first path ends at the first `" ` boundary.
            let mut i = 1;
            loop {
                match s[i..].iter().position(|&b| b == b'"') {
                    Some(rel) => {
                        let idx = i + rel;
                        if idx + 1 < s.len() && s[idx + 1] == b' ' {
                            let first = unquote_c_string(&s[1..idx]);
                            check_path(&first)?;
                            let second = self.parse_file_path(&s[idx + 2..])?;
                            return Ok((first, second));
                        }
                        i = idx + 1;
                    }
                    None => {
                        return Err(self.err(ParseErrorKind::BadFormat {
                            cmd: "filerename",
                            section: "path-pair",
                            text: s.to_vec(),
                        }))
                    }
                }
            }
        } else {
            let idx = s.iter().position(|&b| b == b' ').ok_or_else(|| {
                self.err(ParseErrorKind::BadFormat {
                    cmd: "filerename",
                    section: "path-pair",
                    text: s.to_vec(),
                })
            })?;
            let first = s[..idx].to_vec();
            check_path(&first)?;
            let second = self.parse_file_path(&s[idx + 1..])?;
            Ok((first, second))
        }
    }

    fn parse_mode(&mut self, s: &[u8]) -> Result<u32, Error> {
        Mode::parse(s).ok_or_else(|| {
            self.err(ParseErrorKind::BadFormat { cmd: "filemodify", section: "mode", text: s.to_vec() })
        })
    }

    fn parse_file_ops(&mut self) -> Result<Vec<FileOp>, Error> {
        let mut ops = Vec::new();
        loop {
            let line = match self.buf.next_line()? {
                Some(l) => l,
                None => break,
            };
            if line.is_empty() || line.starts_with(b"#") {
                continue;
            }
            if let Some(rest) = line.strip_prefix(b"M ") {
                ops.push(self.parse_file_modify(rest)?);
            } else if let Some(rest) = line.strip_prefix(b"D ") {
                ops.push(FileOp::Delete { path: self.parse_file_path(rest)? });
            } else if let Some(rest) = line.strip_prefix(b"R ") {
                let (old_path, new_path) = self.parse_path_pair(rest)?;
                ops.push(FileOp::Rename { old_path, new_path });
            } else if let Some(rest) = line.strip_prefix(b"C ") {
                let (src_path, dest_path) = self.parse_path_pair(rest)?;
                ops.push(FileOp::Copy { src_path, dest_path });
            } else if line.starts_with(b"deleteall") {
                ops.push(FileOp::DeleteAll);
            } else if let Some(rest) = line.strip_prefix(b"N ") {
                ops.push(self.parse_note_modify(rest)?);
            } else {
                self.buf.push_line(line);
                break;
            }
        }
        Ok(ops)
    }

    fn parse_file_modify(&mut self, info: &[u8]) -> Result<FileOp, Error> {
        let parts: Vec<&[u8]> = info.splitn(3, |&b| b == b' ').collect();
        if parts.len() < 3 {
            return Err(self.err(ParseErrorKind::BadFormat {
                cmd: "filemodify",
                section: "path",
                text: info.to_vec(),
            }));
        }
        let mode = self.parse_mode(parts[0])?;
        let path = self.parse_file_path(parts[2])?;
        if parts[1] == b"inline" {
            let data = self.get_data("filemodify")?;
            Ok(FileOp::Modify(FileModify { path, mode, dataref: None, data: Some(data) }))
        } else {
            Ok(FileOp::Modify(FileModify { path, mode, dataref: Some(parts[1].to_vec()), data: None }))
        }
    }

    fn parse_note_modify(&mut self, info: &[u8]) -> Result<FileOp, Error> {
        let parts: Vec<&[u8]> = info.splitn(2, |&b| b == b' ').collect();
        if parts.len() < 2 || parts[0] != b"inline" {
            return Err(self.err(ParseErrorKind::BadFormat {
                cmd: "notemodify",
                section: "dataref",
                text: info.to_vec(),
            }));
        }
        let from = parts[1].strip_prefix(b":").unwrap_or(parts[1]).to_vec();
        let data = self.get_data("notemodify")?;
        Ok(FileOp::NoteModify { from, data })
    }

    fn parse_blob(&mut self) -> Result<Command, Error> {
        let lineno = self.lineno();
        let mark = self.get_mark_if_any()?;
        let original_oid = self.get_original_oid()?;
        let data = self.get_data("blob")?;
        Ok(Command::Blob(BlobCommand { mark, original_oid, data, lineno }))
    }

    fn parse_commit(&mut self, ref_: &[u8]) -> Result<Command, Error> {
        let lineno = self.lineno();
        let ref_ = ref_.to_vec();
        let mark = self.get_mark_if_any()?;
        let original_oid = self.get_original_oid()?;
        let author = self.get_optional_user_info("commit", "author", false)?;
        let mut more_authors = Vec::new();
        while let Some(a) = self.get_optional_user_info("commit", "author", false)? {
            more_authors.push(a);
        }
        let committer = self.get_required_user_info("commit", "committer")?;
        let message = self.get_data("commit")?;
        let from = self.get_from(None)?;
        let mut merges = Vec::new();
        while let Some(m) = self.get_merge()? {
            merges.extend(m.split(|&b| b == b' ').filter(|s| !s.is_empty()).map(|x| x.to_vec()));
        }
        let mut properties = BTreeMap::new();
        while let Some((name, value)) = self.get_property()? {
            properties.insert(name, value);
        }
        let file_ops = self.parse_file_ops()?;
        Ok(Command::Commit(CommitCommand {
            ref_,
            mark,
            author,
            more_authors,
            committer,
            message,
            from,
            merges,
            file_ops,
            properties,
            original_oid,
            lineno,
        }))
    }

    fn parse_reset(&mut self, ref_: &[u8]) -> Result<Command, Error> {
        let from = self.get_from(None)?;
        Ok(Command::Reset(ResetCommand { ref_: ref_.to_vec(), from }))
    }

    fn parse_tag(&mut self, name: &[u8]) -> Result<Command, Error> {
        let from = self.get_from(Some("tag"))?;
        let original_oid = self.get_original_oid()?;
        let tagger = self.get_optional_user_info("tag", "tagger", true)?;
        let message = self.get_data("tag")?;
        Ok(Command::Tag(TagCommand { id: name.to_vec(), from, tagger, message, original_oid }))
    }

    fn parse_feature(&mut self, info: &[u8]) -> Result<Command, Error> {
        let lineno = self.lineno();
        let mut parts = info.splitn(2, |&b| b == b'=');
        let name = parts.next().unwrap_or(b"").to_vec();
        let value = match parts.next() {
            Some(v) => Some(self.parse_path(v)?),
            None => None,
        };
        self.features.insert(name.clone(), value.clone());
        Ok(Command::Feature(FeatureCommand { name, value, lineno }))
    }
}

impl<R: BufRead> Iterator for StreamParser<R> {
    type Item = Result<Command, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_command().transpose()
    }
}
