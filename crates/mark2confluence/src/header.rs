use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use regex::Regex;

use crate::error::UnterminatedComment;

/// Header keys that make a Markdown file a publishing target.
pub const KNOWN_HEADER_KEYS: [&str; 3] = ["Space", "Parent", "Title"];
pub const SPACE_HEADER_KEY: &str = "Space";

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

/// True when the first line of `path` is a `<!-- Key: ... -->` comment for
/// one of `keys`. Key matching is case-insensitive; later lines are never read.
pub fn has_known_header(path: &Path, keys: &[&str]) -> io::Result<bool> {
    if keys.is_empty() {
        return Ok(false);
    }
    let first_line = read_first_line(path)?;
    Ok(header_regex(keys)?.is_match(&first_line))
}

pub fn has_any_known_header(path: &Path) -> io::Result<bool> {
    has_known_header(path, &KNOWN_HEADER_KEYS)
}

/// A file that names its own space on line one is never given a default parent.
pub fn declares_own_metadata(path: &Path) -> io::Result<bool> {
    has_known_header(path, &[SPACE_HEADER_KEY])
}

fn read_first_line(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line)
}

fn header_regex(keys: &[&str]) -> io::Result<Regex> {
    let alternatives = keys
        .iter()
        .map(|key| regex::escape(key))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)^<!--.?(?:{alternatives}):.*-->")).map_err(io::Error::other)
}

fn is_closed_comment(trimmed: &str) -> bool {
    trimmed.starts_with(COMMENT_OPEN)
        && trimmed.ends_with(COMMENT_CLOSE)
        && trimmed.len() >= COMMENT_OPEN.len() + COMMENT_CLOSE.len()
}

fn is_opening_comment(trimmed: &str) -> bool {
    trimmed.starts_with(COMMENT_OPEN) && !is_closed_comment(trimmed)
}

fn is_closing_comment(trimmed: &str) -> bool {
    trimmed.ends_with(COMMENT_CLOSE) && !is_closed_comment(trimmed)
}

/// Index of the first line of real content, skipping blank lines, one-line
/// comments and multi-line comment blocks. Equals `lines.len()` when the file
/// holds nothing else.
pub fn find_content_start_index<S: AsRef<str>>(
    lines: &[S],
) -> Result<usize, UnterminatedComment> {
    let mut inside_multiline_comment = false;
    let mut index = 0;

    for line in lines {
        let trimmed = line.as_ref().trim();
        if !inside_multiline_comment && is_opening_comment(trimmed) {
            inside_multiline_comment = true;
        } else if inside_multiline_comment && is_closing_comment(trimmed) {
            inside_multiline_comment = false;
        } else if !inside_multiline_comment && !trimmed.is_empty() && !is_closed_comment(trimmed)
        {
            return Ok(index);
        }
        index += 1;
    }

    if inside_multiline_comment {
        return Err(UnterminatedComment);
    }
    Ok(index)
}
