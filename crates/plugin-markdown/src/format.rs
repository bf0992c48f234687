//! The Markdown formatter service.

use serde::{Deserialize, Serialize};

use crate::outline::{Heading, fence_marker, outline, parse_heading};

/// Formatting preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Spaces substituted for each leading tab.
    pub tab_width: usize,
    /// Longest run of blank lines kept.
    pub max_blank_lines: usize,
    /// Insert the space in `#Heading`.
    pub heading_space: bool,
    /// Marker used for every unordered list item.
    pub bullet: char,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            tab_width: 4,
            max_blank_lines: 1,
            heading_space: true,
            bullet: '-',
        }
    }
}

/// Normalizes Markdown source. Registered as a service by the plugin.
#[derive(Debug, Clone, Default)]
pub struct MarkdownFormatter {
    options: FormatOptions,
}

impl MarkdownFormatter {
    /// Creates a formatter.
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Returns the active options.
    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Returns the document outline.
    pub fn outline(&self, source: &str) -> Vec<Heading> {
        outline(source)
    }

    /// Formats `source`. Fenced code blocks are left untouched.
    pub fn format(&self, source: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut fence: Option<&str> = None;
        let mut blank_run = 0;

        for raw in source.lines() {
            let trimmed = raw.trim_start();

            if let Some(open) = fence {
                if fence_marker(trimmed) == Some(open) {
                    fence = None;
                    out.push(self.expand_indent(raw).trim_end().to_string());
                } else {
                    out.push(raw.to_string());
                }
                continue;
            }

            let line = self.expand_indent(raw).trim_end().to_string();
            if line.is_empty() {
                blank_run += 1;
                if blank_run <= self.options.max_blank_lines && !out.is_empty() {
                    out.push(line);
                }
                continue;
            }
            blank_run = 0;

            if let Some(marker) = fence_marker(trimmed) {
                fence = Some(marker);
                out.push(line);
                continue;
            }

            out.push(self.format_line(line));
        }

        while out.last().is_some_and(|l| l.is_empty()) {
            out.pop();
        }
        if out.is_empty() {
            return String::new();
        }

        let mut formatted = out.join("\n");
        formatted.push('\n');
        formatted
    }

    fn expand_indent(&self, line: &str) -> String {
        let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let (indent, rest) = line.split_at(indent_len);
        let spaces = " ".repeat(self.options.tab_width);
        format!("{}{}", indent.replace('\t', &spaces), rest)
    }

    fn format_line(&self, line: String) -> String {
        let indent_len = line.len() - line.trim_start().len();
        let (indent, body) = line.split_at(indent_len);

        if self.options.heading_space && indent.is_empty() {
            if let Some((level, text)) = parse_heading(body) {
                return format!("{} {}", "#".repeat(level as usize), text);
            }
        }

        if is_bullet(body) && !is_thematic_break(body) {
            return format!("{}{}{}", indent, self.options.bullet, &body[1..]);
        }

        line
    }
}

fn is_bullet(body: &str) -> bool {
    matches!(body.as_bytes(), [b'-' | b'*' | b'+', b' ', ..])
}

fn is_thematic_break(body: &str) -> bool {
    let marks = body.chars().filter(|c| !c.is_whitespace()).count();
    marks >= 3 && body.chars().all(|c| matches!(c, '-' | '*' | '_') || c.is_whitespace())
}
