// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Integration tests exercising the public API end to end: parse, dump,
//! filter, and analyze a stream the way an external caller would.

use std::io::Cursor;

use fast_import_stream::command::{Command, FileOp};
use fast_import_stream::dump::dump_to_vec;
use fast_import_stream::filter::{filter_stream, FilterOptions};
use fast_import_stream::info::InfoProcessor;
use fast_import_stream::processor::CommandProcessor;
use fast_import_stream::StreamParser;

fn parse_all(stream: &[u8]) -> Vec<Command> {
    StreamParser::new(Cursor::new(stream))
        .collect::<Result<Vec<_>, _>>()
        .expect("stream parses cleanly")
}

#[test]
fn blob_round_trips_byte_for_byte() {
    // The trailing LF after the payload is the optional one permitted after
    // a `data` section (spec 4.4) and is discarded at parse time; the
    // canonical dump of a standalone blob carries no trailing LF of its own.
    let stream = b"blob\nmark :1\ndata 5\nhello\n";
    let cmds = parse_all(stream);
    assert_eq!(cmds.len(), 1);
    let out = dump_to_vec(&cmds[0]);
    assert_eq!(out, &stream[..stream.len() - 1]);
}

#[test]
fn commit_with_author_committer_and_merges_round_trips() {
    let stream = b"commit refs/heads/master\n\
mark :4\n\
author A U Thor <author@example.com> 1234567890 -0600\n\
committer A U Thor <author@example.com> 1234567890 -0600\n\
data 12\n\
A commit.\n\n\
from :1\n\
merge :2\n\
merge :3\n\
M 100644 :1 file.txt\n\
D old.txt\n";
    let cmds = parse_all(stream);
    assert_eq!(cmds.len(), 1);
    match &cmds[0] {
        Command::Commit(c) => {
            assert_eq!(c.from.as_deref(), Some(b":1".as_slice()));
            assert_eq!(c.merges, vec![b":2".to_vec(), b":3".to_vec()]);
            assert_eq!(c.file_ops.len(), 2);
            assert!(c.author.is_some());
        }
        _ => panic!("expected commit"),
    }
    let out = dump_to_vec(&cmds[0]);
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("merge :2"));
    assert!(text.contains("merge :3"));
    assert!(text.contains("D old.txt"));
}

#[test]
fn heredoc_delimited_data_parses_embedded_blank_lines() {
    let stream = b"blob\nmark :9\ndata <<END\nfirst\n\nsecond\nEND\n";
    let cmds = parse_all(stream);
    match &cmds[0] {
        Command::Blob(b) => assert_eq!(b.data, b"first\n\nsecond\n"),
        _ => panic!("expected blob"),
    }
}

#[test]
fn filter_keeps_one_directory_and_strips_its_prefix() {
    let stream = b"blob\nmark :1\ndata 3\nfoo\n\
blob\nmark :2\ndata 3\nbar\n\
commit refs/heads/master\n\
mark :3\n\
committer A <a@example.com> 1 +0000\n\
data 0\n\n\
M 100644 :1 keep/a.txt\n\
M 100644 :2 drop/b.txt\n";
    let mut out = Vec::new();
    let options = FilterOptions { include_paths: Some(vec![b"keep/".to_vec()]), ..FilterOptions::new() };
    filter_stream(Cursor::new(&stream[..]), &mut out, options).unwrap();
    let text = String::from_utf8_lossy(&out);
    // The kept path is re-rooted under the common directory of the includes,
    // so "keep/a.txt" loses its "keep/" prefix.
    assert!(text.contains("M 100644 :1 a.txt"));
    assert!(!text.contains("drop/b.txt"));
}

#[test]
fn filter_squashes_commit_left_with_no_file_ops() {
    let stream = b"blob\nmark :1\ndata 3\nfoo\n\
commit refs/heads/master\n\
mark :2\n\
committer A <a@example.com> 1 +0000\n\
data 0\n\n\
M 100644 :1 drop/only.txt\n\
commit refs/heads/master\n\
mark :3\n\
committer A <a@example.com> 2 +0000\n\
data 0\n\n\
from :2\n\
M 100644 :1 keep/other.txt\n";
    let mut out = Vec::new();
    let options = FilterOptions { include_paths: Some(vec![b"keep".to_vec()]), ..FilterOptions::new() };
    filter_stream(Cursor::new(&stream[..]), &mut out, options).unwrap();
    let text = String::from_utf8_lossy(&out);
    // The first commit has no surviving file ops and is squashed away
    // entirely, so only the second commit is emitted.
    assert_eq!(text.matches("commit refs/").count(), 1);
    assert!(text.contains("other.txt"));
}

#[test]
fn filter_drops_unreferenced_blob() {
    let stream = b"blob\nmark :1\ndata 3\nfoo\n\
blob\nmark :2\ndata 3\nbar\n\
commit refs/heads/master\n\
committer A <a@example.com> 1 +0000\n\
data 0\n\n\
M 100644 :1 a.txt\n";
    let mut out = Vec::new();
    filter_stream(Cursor::new(&stream[..]), &mut out, FilterOptions::new()).unwrap();
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("data 3\nfoo"));
    assert!(!text.contains("bar"));
}

#[test]
fn info_processor_tracks_executables_symlinks_and_refs() {
    let stream = b"blob\nmark :1\ndata 3\nfoo\n\
commit refs/heads/master\n\
mark :2\n\
committer A <a@example.com> 1 +0000\n\
data 0\n\n\
M 100755 :1 run.sh\n\
M 120000 :1 link\n\
reset refs/tags/v1\n\
from :2\n";
    let parser = StreamParser::new(Cursor::new(&stream[..]));
    let mut info = InfoProcessor::new();
    info.process(parser).unwrap();
    let report = info.report(1);
    assert!(report.contains('['));
    assert!(!report.is_empty());
}

#[test]
fn rename_across_kept_directories_preserves_both_sides() {
    let stream = b"blob\nmark :1\ndata 3\nfoo\n\
commit refs/heads/master\n\
mark :2\n\
committer A <a@example.com> 1 +0000\n\
data 0\n\n\
M 100644 :1 keep/old.txt\n\
commit refs/heads/master\n\
mark :3\n\
committer A <a@example.com> 2 +0000\n\
data 0\n\n\
from :2\n\
R keep/old.txt keep/new.txt\n";
    let cmds = parse_all(stream);
    match &cmds[2] {
        Command::Commit(c) => match &c.file_ops[0] {
            FileOp::Rename { old_path, new_path } => {
                assert_eq!(old_path, b"keep/old.txt");
                assert_eq!(new_path, b"keep/new.txt");
            }
            _ => panic!("expected rename"),
        },
        _ => panic!("expected commit"),
    }
}

#[test]
fn quoted_path_with_embedded_space_round_trips_through_filter() {
    let stream = b"blob\nmark :1\ndata 3\nfoo\n\
commit refs/heads/master\n\
committer A <a@example.com> 1 +0000\n\
data 0\n\n\
M 100644 :1 \"a file.txt\"\n";
    let mut out = Vec::new();
    filter_stream(Cursor::new(&stream[..]), &mut out, FilterOptions::new()).unwrap();
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("a file.txt"));
}
