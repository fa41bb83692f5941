// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Byte-level primitives: C-style quoting and unquoting, path formatting,
//! and the file mode codec.

use enumflags2::{bitflags, BitFlags};

use crate::error::PathError;

/// Options controlling `format_path`'s quoting behavior.
#[bitflags]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteFlags {
    /// Quote the path if it contains a space, in addition to the
    /// unconditional quoting triggers (leading `"`, embedded LF).
    QuoteSpaces,
    /// Append an extra space after the closing quote, working around a bug
    /// in some ancient fast-import consumers. Off by default.
    TrailingQuoteSpace,
}

/// Quote a path for the wire format if needed.
///
/// A path containing LF always has its LFs replaced by the two-byte escape
/// `\n` and is always quoted. Otherwise the path is quoted iff it starts
/// with `"`, or `QuoteSpaces` is set and it contains a space.
pub fn format_path(path: &[u8], flags: BitFlags<QuoteFlags>) -> Vec<u8> {
    if path.contains(&b'\n') {
        let mut escaped = Vec::with_capacity(path.len() + 2);
        for &b in path {
            if b == b'\n' {
                escaped.extend_from_slice(b"\\n");
            } else {
                escaped.push(b);
            }
        }
        return quote(&escaped, flags);
    }
    let needs_quote = path.first() == Some(&b'"')
        || (flags.contains(QuoteFlags::QuoteSpaces) && path.contains(&b' '));
    if needs_quote {
        quote(path, flags)
    } else {
        path.to_vec()
    }
}

fn quote(path: &[u8], flags: BitFlags<QuoteFlags>) -> Vec<u8> {
    let mut out = Vec::with_capacity(path.len() + 3);
    out.push(b'"');
    out.extend_from_slice(path);
    out.push(b'"');
    if flags.contains(QuoteFlags::TrailingQuoteSpace) {
        out.push(b' ');
    }
    out
}

/// Validate a path per `check_path`: non-empty and not rooted.
pub fn check_path(path: &[u8]) -> Result<(), PathError> {
    if path.is_empty() {
        Err(PathError::Empty)
    } else if path.starts_with(b"/") {
        Err(PathError::LeadingSlash)
    } else {
        Ok(())
    }
}

/// Replace C-style escape sequences with the bytes they denote. Bytes that
/// are not part of a recognized escape pass through verbatim, so this is
/// safe to run over binary paths that only happen to contain valid escapes
/// where intended.
///
/// Recognizes `\U........` (8 hex digits), `\u....` (4 hex digits), `\x..`
/// (2 hex digits), octal `\[0-7]{1,3}`, and the single-character escapes
/// `\\ \' \" \a \b \f \n \r \t \v`. `\N{NAME}` (Unicode character by name)
/// is accepted syntactically but is not resolved against a names table; it
/// passes through unescaped, since this crate carries no Unicode Character
/// Database dependency (see DESIGN.md).
pub fn unquote_c_string(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        // Jump straight to the next candidate escape instead of walking
        // plain bytes one at a time -- paths are mostly escape-free.
        let next = match memchr::memchr(b'\\', &s[i..]) {
            Some(rel) => i + rel,
            None => {
                out.extend_from_slice(&s[i..]);
                break;
            }
        };
        out.extend_from_slice(&s[i..next]);
        i = next;
        if i + 1 >= s.len() {
            out.push(s[i]);
            i += 1;
            continue;
        }
        let rest = &s[i + 1..];
        if let Some((decoded, len)) = decode_escape(rest) {
            out.extend_from_slice(&decoded);
            i += 1 + len;
        } else {
            out.push(s[i]);
            i += 1;
        }
    }
    out
}

fn decode_escape(rest: &[u8]) -> Option<(Vec<u8>, usize)> {
    match rest.first()? {
        b'U' if rest.len() >= 9 && rest[1..9].iter().all(u8::is_ascii_hexdigit) => {
            let cp = u32::from_str_radix(std::str::from_utf8(&rest[1..9]).ok()?, 16).ok()?;
            let ch = char::from_u32(cp)?;
            let mut buf = [0u8; 4];
            Some((ch.encode_utf8(&mut buf).as_bytes().to_vec(), 9))
        }
        b'u' if rest.len() >= 5 && rest[1..5].iter().all(u8::is_ascii_hexdigit) => {
            let cp = u32::from_str_radix(std::str::from_utf8(&rest[1..5]).ok()?, 16).ok()?;
            let ch = char::from_u32(cp)?;
            let mut buf = [0u8; 4];
            Some((ch.encode_utf8(&mut buf).as_bytes().to_vec(), 5))
        }
        b'x' if rest.len() >= 3 && rest[1..3].iter().all(u8::is_ascii_hexdigit) => {
            let v = u8::from_str_radix(std::str::from_utf8(&rest[1..3]).ok()?, 16).ok()?;
            Some((vec![v], 3))
        }
        b'0'..=b'7' => {
            let mut n = 0usize;
            while n < 3 && n < rest.len() && (b'0'..=b'7').contains(&rest[n]) {
                n += 1;
            }
            let v = u16::from_str_radix(std::str::from_utf8(&rest[..n]).ok()?, 8).ok()?;
            Some((vec![v as u8], n))
        }
        b'N' if rest.get(1) == Some(&b'{') => {
            let end = rest.iter().position(|&b| b == b'}')?;
            // Named escapes are not resolved; pass the whole sequence through
            // as literal bytes (including the backslash the caller already
            // consumed).
            let mut raw = vec![b'\\'];
            raw.extend_from_slice(&rest[..=end]);
            Some((raw, end + 1))
        }
        b'\\' => Some((vec![b'\\'], 1)),
        b'\'' => Some((vec![b'\''], 1)),
        b'"' => Some((vec![b'"'], 1)),
        b'a' => Some((vec![0x07], 1)),
        b'b' => Some((vec![0x08], 1)),
        b'f' => Some((vec![0x0c], 1)),
        b'n' => Some((vec![b'\n'], 1)),
        b'r' => Some((vec![b'\r'], 1)),
        b't' => Some((vec![b'\t'], 1)),
        b'v' => Some((vec![0x0b], 1)),
        _ => None,
    }
}

/// The set of modes this crate accepts/emits. Any other value is an
/// internal error per the spec's invariants.
pub struct Mode;

impl Mode {
    pub const FILE: u32 = 0o100644;
    pub const EXECUTABLE: u32 = 0o100755;
    pub const DIRECTORY: u32 = 0o40000;
    pub const SYMLINK: u32 = 0o120000;
    pub const SUBMODULE: u32 = 0o160000;

    /// Parse a mode token, accepting with or without leading zero or leading
    /// "100".
    pub fn parse(s: &[u8]) -> Option<u32> {
        match s {
            b"644" | b"100644" | b"0100644" => Some(Self::FILE),
            b"755" | b"100755" | b"0100755" => Some(Self::EXECUTABLE),
            b"040000" | b"0040000" => Some(Self::DIRECTORY),
            b"120000" | b"0120000" => Some(Self::SYMLINK),
            b"160000" | b"0160000" => Some(Self::SUBMODULE),
            _ => None,
        }
    }

    /// Render a mode value in its canonical wire form: the 3-digit short
    /// form for plain/executable files, 6-digit for directory/symlink/
    /// submodule, matching `_format_mode` in the original. Panics on a mode
    /// not in the accepted set: this is an internal-error condition that the
    /// data model never constructs.
    pub fn format(mode: u32) -> &'static [u8] {
        match mode {
            Self::FILE => b"644",
            Self::EXECUTABLE => b"755",
            Self::DIRECTORY => b"040000",
            Self::SYMLINK => b"120000",
            Self::SUBMODULE => b"160000",
            _ => panic!("internal error: invalid file mode {mode:o}"),
        }
    }

    pub fn is_directory(mode: u32) -> bool {
        mode == Self::DIRECTORY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_path_plain() {
        assert_eq!(format_path(b"doc/README.txt", BitFlags::empty()), b"doc/README.txt");
    }

    #[test]
    fn format_path_leading_quote() {
        assert_eq!(format_path(b"\"weird", BitFlags::empty()), b"\"\"weird\"");
    }

    #[test]
    fn format_path_space_only_when_asked() {
        assert_eq!(format_path(b"a b", BitFlags::empty()), b"a b");
        assert_eq!(format_path(b"a b", QuoteFlags::QuoteSpaces.into()), b"\"a b\"");
    }

    #[test]
    fn format_path_newline_forces_quote_and_escape() {
        assert_eq!(format_path(b"a\nb", BitFlags::empty()), b"\"a\\nb\"");
    }

    #[test]
    fn format_path_trailing_quote_space_flag() {
        assert_eq!(
            format_path(b"\"x", QuoteFlags::TrailingQuoteSpace.into()),
            b"\"\"x\" "
        );
    }

    #[test]
    fn unquote_basic_escapes() {
        assert_eq!(unquote_c_string(br"a\nb\tc"), b"a\nb\tc");
        assert_eq!(unquote_c_string(br#"\"q\""#), b"\"q\"");
        assert_eq!(unquote_c_string(br"back\\slash"), b"back\\slash");
    }

    #[test]
    fn unquote_octal() {
        assert_eq!(unquote_c_string(br"\101\102\103"), b"ABC");
    }

    #[test]
    fn unquote_hex() {
        assert_eq!(unquote_c_string(br"\x41\x42"), b"AB");
    }

    #[test]
    fn unquote_passthrough_unmatched() {
        assert_eq!(unquote_c_string(b"plain text"), b"plain text");
    }

    #[test]
    fn mode_parse_and_format() {
        assert_eq!(Mode::parse(b"644"), Some(Mode::FILE));
        assert_eq!(Mode::parse(b"100644"), Some(Mode::FILE));
        assert_eq!(Mode::parse(b"0100755"), Some(Mode::EXECUTABLE));
        assert_eq!(Mode::parse(b"040000"), Some(Mode::DIRECTORY));
        assert_eq!(Mode::parse(b"bogus"), None);
        assert_eq!(Mode::format(Mode::EXECUTABLE), b"755");
        assert_eq!(Mode::format(Mode::DIRECTORY), b"040000");
    }

    #[test]
    fn check_path_rejects() {
        assert_eq!(check_path(b""), Err(PathError::Empty));
        assert_eq!(check_path(b"/abs"), Err(PathError::LeadingSlash));
        assert_eq!(check_path(b"ok/path"), Ok(()));
    }
}
