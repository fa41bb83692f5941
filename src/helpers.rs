// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Small path utilities shared by the filter transformer (C7) and the info
//! analyzer (C8).

/// The common leading bytes of two paths.
fn common_path(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).map(|(x, _)| *x).collect()
}

/// The deepest common directory of a list of paths, with a trailing slash.
/// `None` if the list is empty; `Some(b"")` if there's no common directory.
pub fn common_directory(paths: &[Vec<u8>]) -> Option<Vec<u8>> {
    match paths {
        [] => None,
        [single] => Some(dir_with_slash(single)),
        [first, rest @ ..] => {
            let mut common = first.clone();
            for path in rest {
                common = common_path(&common, path);
            }
            Some(dir_with_slash(&common))
        }
    }
}

fn dir_with_slash(path: &[u8]) -> Vec<u8> {
    if path.is_empty() || path.ends_with(b"/") {
        return path.to_vec();
    }
    match path.iter().rposition(|&b| b == b'/') {
        Some(idx) => path[..=idx].to_vec(),
        None => Vec::new(),
    }
}

/// True iff `fname` is inside `directory`. The empty directory name is
/// top-of-tree and matches everything.
pub fn is_inside(directory: &[u8], fname: &[u8]) -> bool {
    if directory == fname || directory.is_empty() {
        return true;
    }
    if directory.ends_with(b"/") {
        fname.starts_with(directory)
    } else {
        fname.len() > directory.len()
            && fname.starts_with(directory)
            && fname[directory.len()] == b'/'
    }
}

pub fn is_inside_any(dirs: &[Vec<u8>], fname: &[u8]) -> bool {
    dirs.iter().any(|dir| is_inside(dir, fname))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_directory_single() {
        assert_eq!(common_directory(&[b"doc/README.txt".to_vec()]), Some(b"doc/".to_vec()));
    }

    #[test]
    fn common_directory_multiple() {
        let paths = vec![b"doc/README.txt".to_vec(), b"doc/index.txt".to_vec()];
        assert_eq!(common_directory(&paths), Some(b"doc/".to_vec()));
    }

    #[test]
    fn common_directory_no_overlap() {
        let paths = vec![b"doc/README.txt".to_vec(), b"NEWS".to_vec()];
        assert_eq!(common_directory(&paths), Some(b"".to_vec()));
    }

    #[test]
    fn common_directory_empty_list() {
        assert_eq!(common_directory(&[]), None);
    }

    #[test]
    fn is_inside_matches_exact_and_nested() {
        assert!(is_inside(b"doc", b"doc"));
        assert!(is_inside(b"doc", b"doc/README.txt"));
        assert!(!is_inside(b"doc", b"document.txt"));
        assert!(is_inside(b"", b"anything"));
    }
}
