//! Numeric-aware filename ordering.
//!
//! Creators number frames sequentially (`1.png`, `2.png`, `10.png`), so digit
//! runs are compared by value rather than character by character.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Compare two strings treating embedded digit runs as numbers.
///
/// Text runs compare case-insensitively. Equal numeric values with different
/// zero padding (`01` vs `1`) order the shorter run first, and fully
/// equivalent names fall back to plain byte order so the result is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);
    let mut tiebreak = Ordering::Equal;

    loop {
        match (left.next(), right.next()) {
            (None, None) => return tiebreak.then_with(|| a.cmp(b)),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Digits(x)), Some(Chunk::Digits(y))) => {
                let xv = x.trim_start_matches('0');
                let yv = y.trim_start_matches('0');
                let ord = xv.len().cmp(&yv.len()).then_with(|| xv.cmp(yv));
                if ord != Ordering::Equal {
                    return ord;
                }
                if tiebreak == Ordering::Equal {
                    tiebreak = x.len().cmp(&y.len());
                }
            }
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => {
                let ord = x
                    .chars()
                    .flat_map(char::to_lowercase)
                    .cmp(y.chars().flat_map(char::to_lowercase));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(Chunk::Digits(_)), Some(Chunk::Text(_))) => return Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Digits(_))) => return Ordering::Greater,
        }
    }
}

/// Sort paths by their file name using [`natural_cmp`].
pub fn sort_paths_natural(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}
