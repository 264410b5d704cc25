//! Content-driven title/category classification.
//!
//! The first line of note content drives the note title and, when it
//! carries the `\` separator, the category the note belongs to. The split
//! semantics are load-bearing for editor behavior and must not be
//! "improved": strip every `#`, trim, then take the segment before the
//! first `\` as the category and the segment between the first and second
//! `\` as the title.

use once_cell::sync::Lazy;
use regex::Regex;

/// Title assigned when the first content line is empty.
pub const DEFAULT_TITLE: &str = "Untitled";

static HEADING_MARK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("#+").expect("valid heading mark regex"));

/// Classification result for one content update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub title: String,
    /// Category title implied by the heading, when the separator is present.
    pub category: Option<String>,
}

/// Derives title and optional category from the first line of `content`.
pub fn classify_first_line(content: &str) -> Classified {
    let first_line = content.split('\n').next().unwrap_or("");
    if first_line.is_empty() {
        return Classified {
            title: DEFAULT_TITLE.to_string(),
            category: None,
        };
    }

    let stripped = HEADING_MARK_RE.replace_all(first_line, "");
    let trimmed = stripped.trim();
    let parts: Vec<&str> = trimmed.split('\\').collect();
    if parts.len() >= 2 {
        Classified {
            title: parts[1].to_string(),
            category: Some(parts[0].trim().to_string()),
        }
    } else {
        Classified {
            title: parts[0].to_string(),
            category: None,
        }
    }
}
