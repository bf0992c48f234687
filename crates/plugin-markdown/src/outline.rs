//! Heading outline extraction.

use serde::Serialize;

/// One ATX heading (`# Title`) found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    /// Heading level, 1 to 6.
    pub level: u8,
    /// Heading text without markers.
    pub text: String,
    /// Zero-based line number.
    pub line: usize,
}

/// Returns the headings of `source` in document order.
///
/// Lines inside fenced code blocks are skipped.
pub fn outline(source: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut fence: Option<&str> = None;

    for (line_no, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();

        if let Some(marker) = fence_marker(trimmed) {
            match fence {
                Some(open) if open == marker => fence = None,
                Some(_) => {}
                None => fence = Some(marker),
            }
            continue;
        }
        if fence.is_some() {
            continue;
        }

        if let Some((level, text)) = parse_heading(trimmed) {
            headings.push(Heading {
                level,
                text: text.to_string(),
                line: line_no,
            });
        }
    }

    headings
}

pub(crate) fn fence_marker(line: &str) -> Option<&'static str> {
    if line.starts_with("```") {
        Some("```")
    } else if line.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Parses an ATX heading, tolerating a missing space after the hashes.
pub(crate) fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }

    let text = line[level..].trim().trim_end_matches('#').trim_end();
    if text.is_empty() {
        return None;
    }
    Some((level as u8, text))
}
