//! Tolerant parser for structured summary output.
//!
//! Summarization prompts ask the model for labeled sections. Models do not
//! always comply, so the parser never fails: a missing section parses as
//! empty, stray text before the first header is folded into the summary,
//! and header matching is case-insensitive.

/// Section headers expected in structured summary output.
pub const SUMMARY_HEADER: &str = "SUMMARY:";
pub const KEY_POINTS_HEADER: &str = "KEY POINTS:";
pub const RELATIONSHIPS_HEADER: &str = "RELATIONSHIPS:";
pub const DETAILS_HEADER: &str = "DETAILS:";

/// Parsed sections of a structured summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummarySections {
    pub summary: String,
    pub key_points: Vec<String>,
    pub relationships: Vec<String>,
    pub details: String,
}

impl SummarySections {
    /// True when no section carried any content.
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.key_points.is_empty()
            && self.relationships.is_empty()
            && self.details.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Summary,
    KeyPoints,
    Relationships,
    Details,
}

fn match_header(line: &str) -> Option<(Section, &str)> {
    let trimmed = line.trim_start();
    for (header, section) in [
        (SUMMARY_HEADER, Section::Summary),
        (KEY_POINTS_HEADER, Section::KeyPoints),
        (RELATIONSHIPS_HEADER, Section::Relationships),
        (DETAILS_HEADER, Section::Details),
    ] {
        if trimmed.len() >= header.len()
            && trimmed.is_char_boundary(header.len())
            && trimmed[..header.len()].eq_ignore_ascii_case(header)
        {
            return Some((section, trimmed[header.len()..].trim_start()));
        }
    }
    None
}

fn push_item(items: &mut Vec<String>, line: &str) {
    let stripped = line
        .trim()
        .trim_start_matches(['-', '*', '•'])
        .trim_start();
    if !stripped.is_empty() {
        items.push(stripped.to_string());
    }
}

/// Parse structured summary text into its sections.
///
/// Text before the first recognized header is treated as summary content,
/// so unstructured output still yields a usable result.
pub fn parse_sections(text: &str) -> SummarySections {
    let mut sections = SummarySections::default();
    let mut current = Section::Summary;
    let mut summary_lines: Vec<String> = Vec::new();
    let mut detail_lines: Vec<String> = Vec::new();

    for line in text.lines() {
        if let Some((section, rest)) = match_header(line) {
            current = section;
            if !rest.is_empty() {
                match current {
                    Section::Summary => summary_lines.push(rest.to_string()),
                    Section::KeyPoints => push_item(&mut sections.key_points, rest),
                    Section::Relationships => push_item(&mut sections.relationships, rest),
                    Section::Details => detail_lines.push(rest.to_string()),
                }
            }
            continue;
        }

        match current {
            Section::Summary => {
                if !line.trim().is_empty() {
                    summary_lines.push(line.trim().to_string());
                }
            }
            Section::KeyPoints => push_item(&mut sections.key_points, line),
            Section::Relationships => push_item(&mut sections.relationships, line),
            Section::Details => detail_lines.push(line.trim_end().to_string()),
        }
    }

    sections.summary = summary_lines.join(" ").trim().to_string();
    sections.details = detail_lines.join("\n").trim().to_string();
    sections
}

/// Extract the key-points block from previously rendered summary content.
///
/// Used to fold the most recent compressed memory into the next compression
/// prompt without re-feeding the entire summary. Returns None when the
/// content has no key-points block.
pub fn key_points_excerpt(content: &str) -> Option<String> {
    let start = content.find(KEY_POINTS_HEADER)? + KEY_POINTS_HEADER.len();
    let rest = &content[start..];
    let end = rest.find("\n\n").unwrap_or(rest.len());
    let excerpt = rest[..end].trim();
    if excerpt.is_empty() {
        None
    } else {
        Some(excerpt.to_string())
    }
}
