use std::fs;
use std::path::Path;

use crate::directive::ParentDirective;
use crate::error::HeaderError;
use crate::header::find_content_start_index;

/// Writes `directive`'s `Space`/`Parent` block in front of the existing content.
///
/// Callers must check `declares_own_metadata` first; calling this twice on a
/// file that still lacks its own space duplicates the block.
pub fn prepend_parent_header(path: &Path, directive: &ParentDirective) -> Result<(), HeaderError> {
    let content = fs::read_to_string(path).map_err(|err| HeaderError::io(path, err))?;
    let updated = format!("{}{}", directive.header(), content);
    fs::write(path, updated).map_err(|err| HeaderError::io(path, err))
}

/// Inserts `header` as a new line entry at `index`, shifting later lines down.
pub fn insert_at(path: &Path, index: usize, header: &str) -> Result<(), HeaderError> {
    let content = fs::read_to_string(path).map_err(|err| HeaderError::io(path, err))?;
    let mut lines = split_lines(&content);
    insert_line(&mut lines, index, header);
    fs::write(path, lines.concat()).map_err(|err| HeaderError::io(path, err))
}

/// Inserts `header` right before the first line of real content and returns
/// the index it landed on. Nothing is written when the file holds an
/// unterminated comment block.
pub fn insert_before_content(path: &Path, header: &str) -> Result<usize, HeaderError> {
    let content = fs::read_to_string(path).map_err(|err| HeaderError::io(path, err))?;
    let mut lines = split_lines(&content);
    let index = find_content_start_index(&lines).map_err(|_| HeaderError::UnterminatedComment {
        path: path.to_path_buf(),
    })?;
    insert_line(&mut lines, index, header);
    fs::write(path, lines.concat()).map_err(|err| HeaderError::io(path, err))?;
    Ok(index)
}

/// Splits content into lines that keep their own terminators.
pub fn split_lines(content: &str) -> Vec<String> {
    content.split_inclusive('\n').map(str::to_string).collect()
}

/// Inserts `header` as one entry. The header always ends with a newline, and
/// when appending after an unterminated last line that line gains one so the
/// header starts on a line of its own.
pub fn insert_line(lines: &mut Vec<String>, index: usize, header: &str) {
    let index = index.min(lines.len());
    if index == lines.len()
        && let Some(last) = lines.last_mut()
        && !last.ends_with('\n')
    {
        last.push('\n');
    }

    let mut entry = header.to_string();
    if !entry.ends_with('\n') {
        entry.push('\n');
    }
    lines.insert(index, entry);
}
