//! Section-scoped document patching
//!
//! Documents are Markdown-like text with `#` headings. An entry is inserted
//! at the end of a named section: after the section's last non-blank line
//! and before the next heading of the same or higher level. Nothing else in
//! the document changes.

use regex::Regex;

/// Result of applying an entry to a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// The full new document text
    pub text: String,
    /// Whether the section marker was found; `false` means the entry was
    /// appended at the end of the document
    pub section_found: bool,
}

/// Level of a `#` heading line, if it is one
fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_end();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    match trimmed[level..].chars().next() {
        None | Some(' ') | Some('\t') => Some(level),
        _ => None,
    }
}

/// Byte range of the section headed by `marker`: `(heading_end, insert_at)`
/// where `insert_at` is just past the section's last non-blank line.
fn locate_section(doc: &str, marker: &str) -> Option<(usize, usize)> {
    let marker = marker.trim();
    let level = heading_level(marker).unwrap_or(2);

    let mut offset = 0;
    let mut lines = doc.split_inclusive('\n');
    let heading_end = loop {
        let line = lines.next()?;
        offset += line.len();
        if line.trim_end() == marker {
            break offset;
        }
    };

    let mut insert_at = heading_end;
    for line in lines {
        if matches!(heading_level(line), Some(l) if l <= level) {
            break;
        }
        offset += line.len();
        if !line.trim().is_empty() {
            insert_at = offset;
        }
    }
    Some((heading_end, insert_at))
}

/// Insert `entry` at the end of the section headed by `marker`.
///
/// A missing section never loses the entry: it is appended at the end of
/// the document instead.
pub fn apply_to_document(doc: &str, marker: &str, entry: &str) -> PatchOutcome {
    let mut block = entry.trim_end_matches('\n').to_string();
    block.push('\n');

    let (insert_at, section_found) = match locate_section(doc, marker) {
        Some((_, insert_at)) => (insert_at, true),
        None => {
            tracing::warn!(
                "Section '{}' not found, appending entry at end of document",
                marker.trim()
            );
            (doc.len(), false)
        }
    };

    let (head, tail) = doc.split_at(insert_at);
    let mut text = String::with_capacity(doc.len() + block.len() + 1);
    text.push_str(head);
    if !head.is_empty() && !head.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&block);
    text.push_str(tail);

    PatchOutcome {
        text,
        section_found,
    }
}

/// Find a sub-heading inside `section` whose title equals `target`
/// (case-insensitive). Returns the heading line as written.
pub fn find_subsection(doc: &str, section: &str, target: &str) -> Option<String> {
    let section = section.trim();
    let level = heading_level(section).unwrap_or(2);
    let (heading_end, _) = locate_section(doc, section)?;
    let target = target.trim();

    for line in doc[heading_end..].lines() {
        match heading_level(line) {
            Some(l) if l <= level => return None,
            Some(l) => {
                let title = line[l..].trim();
                if title.eq_ignore_ascii_case(target) {
                    return Some(line.trim_end().to_string());
                }
            }
            None => {}
        }
    }
    None
}

/// Titles of the sub-headings under `section`
pub fn subsection_titles(doc: &str, section: &str) -> Vec<String> {
    let section = section.trim();
    let level = heading_level(section).unwrap_or(2);
    let Some((heading_end, _)) = locate_section(doc, section) else {
        return Vec::new();
    };

    let mut titles = Vec::new();
    for line in doc[heading_end..].lines() {
        match heading_level(line) {
            Some(l) if l <= level => break,
            Some(l) => titles.push(line[l..].trim().to_string()),
            None => {}
        }
    }
    titles
}

/// Replace the date after `prefix` (`<prefix>YYYY-MM-DD`) with `date`.
///
/// Best effort: returns `None` when no such marker exists.
pub fn update_last_updated(doc: &str, prefix: &str, date: &str) -> Option<String> {
    let pattern = format!(r"{}\d{{4}}-\d{{2}}-\d{{2}}", regex::escape(prefix));
    let re = Regex::new(&pattern).ok()?;
    if !re.is_match(doc) {
        return None;
    }
    let replacement = format!("{}{}", prefix, date);
    Some(re.replace(doc, regex::NoExpand(&replacement)).into_owned())
}
