//! Markdown document handling: front matter plus title and description
//! derived from the body.
//!
//! The title is the first level-one heading (`# Title`). The description is
//! the first paragraph after the title, or after the start of the body when
//! there is no title. Both can be rewritten in place with [`with_title`] and
//! [`with_description`].

pub mod front_matter;

pub use front_matter::{Document, FrontMatter};

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s+(.+)$").expect("title pattern is valid"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,6}(\s|$)").expect("heading pattern is valid"));
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([-*+]|\d+[.)])(\s|$)").expect("list pattern is valid"));
static BLANK_RUNS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank run pattern is valid"));

/// Returns the first level-one heading of `body`, or `""` if there is none.
pub fn title(body: &str) -> String {
    let lines = lines(body);
    find_title(&lines).map(|(_, t)| t).unwrap_or_default()
}

/// Like [`title`], but a body without a level-one heading is an error.
///
/// `origin` names the document in the error.
pub fn require_title(body: &str, origin: &str) -> Result<String> {
    let lines = lines(body);
    find_title(&lines)
        .map(|(_, t)| t)
        .ok_or_else(|| Error::MissingTitle(origin.to_string()))
}

/// Returns the first paragraph following the title (or the start of the body).
///
/// Lines of a multi-line paragraph are joined with `\n`.
pub fn description(body: &str) -> Option<String> {
    let lines = lines(body);
    let range = description_range(&lines)?;
    Some(lines[range].join("\n"))
}

/// Replaces the title heading, or inserts one at the top of the body.
pub fn with_title(body: &str, text: &str) -> String {
    let mut lines: Vec<String> = lines(body).into_iter().map(String::from).collect();
    let heading = format!("# {}", text.trim());
    match find_title(&lines) {
        Some((idx, _)) => lines[idx] = heading,
        None => {
            lines.insert(0, heading);
            lines.insert(1, String::new());
        }
    }
    finish(&lines)
}

/// Replaces the description paragraph, or inserts one below the title.
///
/// A body without a title first gets `# default_title`. An empty `text` removes
/// the paragraph.
pub fn with_description(body: &str, text: &str, default_title: &str) -> String {
    let mut lines: Vec<String> = lines(body).into_iter().map(String::from).collect();
    let title_idx = match find_title(&lines) {
        Some((idx, _)) => idx,
        None => {
            lines.insert(0, format!("# {}", default_title.trim()));
            lines.insert(1, String::new());
            0
        }
    };

    let text = text.trim();
    let paragraph: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();

    match description_range(&lines) {
        Some(range) => {
            lines.splice(range, paragraph);
        }
        None if !text.is_empty() => {
            let mut inserted = vec![String::new()];
            inserted.extend(paragraph);
            inserted.push(String::new());
            let at = title_idx + 1;
            lines.splice(at..at, inserted);
        }
        None => {}
    }
    finish(&lines)
}

fn lines(body: &str) -> Vec<&str> {
    body.lines().map(|l| l.trim_end_matches('\r')).collect()
}

fn find_title<S: AsRef<str>>(lines: &[S]) -> Option<(usize, String)> {
    lines.iter().enumerate().find_map(|(idx, line)| {
        TITLE_RE
            .captures(line.as_ref())
            .map(|caps| (idx, caps[1].trim().to_string()))
    })
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_block_start(line: &str) -> bool {
    HEADING_RE.is_match(line) || LIST_ITEM_RE.is_match(line)
}

/// Line range of the description paragraph.
fn description_range<S: AsRef<str>>(lines: &[S]) -> Option<Range<usize>> {
    let mut idx = find_title(lines).map_or(0, |(idx, _)| idx + 1);
    while idx < lines.len() && is_blank(lines[idx].as_ref()) {
        idx += 1;
    }
    if idx >= lines.len() || is_block_start(lines[idx].as_ref()) {
        return None;
    }

    let start = idx;
    while idx < lines.len() {
        let line = lines[idx].as_ref();
        if is_blank(line) || is_block_start(line) {
            break;
        }
        idx += 1;
    }
    Some(start..idx)
}

/// Joins lines, collapses runs of blank lines and ends with a single newline.
fn finish(lines: &[String]) -> String {
    let joined = lines.join("\n");
    let collapsed = BLANK_RUNS_RE.replace_all(&joined, "\n\n");
    let trimmed = collapsed.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_description() {
        let body = "# Title\n\nFirst paragraph.\n\n## Next";
        assert_eq!(title(body), "Title");
        assert_eq!(description(body).as_deref(), Some("First paragraph."));
    }

    #[test]
    fn missing_title() {
        assert_eq!(title("No heading here"), "");
        assert_eq!(title("## Only a subheading"), "");
        assert!(matches!(
            require_title("text", "index.md"),
            Err(Error::MissingTitle(origin)) if origin == "index.md"
        ));
    }

    #[test]
    fn multi_line_description_is_kept() {
        let body = "# T\nline one\nline two\n\nnext paragraph";
        assert_eq!(description(body).as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn description_stops_at_heading_or_list() {
        assert_eq!(description("# T\nintro\n- item").as_deref(), Some("intro"));
        assert_eq!(description("# T\nintro\n## Sub").as_deref(), Some("intro"));
        assert_eq!(description("# T\n\n- item"), None);
        assert_eq!(description("# T\n\n## Sub\ntext"), None);
        assert_eq!(description("# T\n\n"), None);
    }

    #[test]
    fn description_without_title_starts_at_top() {
        assert_eq!(description("Lead text\n\n## Later").as_deref(), Some("Lead text"));
        // A later level-one heading is still the title.
        assert_eq!(description("Lead text\n\n# Later"), None);
    }

    #[test]
    fn with_title_replaces_existing() {
        let body = "# Old\n\nText\n";
        assert_eq!(with_title(body, "New"), "# New\n\nText\n");
    }

    #[test]
    fn with_title_inserts_at_top() {
        assert_eq!(with_title("Text\n", "New"), "# New\n\nText\n");
        assert_eq!(with_title("", "New"), "# New\n");
    }

    #[test]
    fn with_description_replaces_paragraph() {
        let body = "# T\n\nOld line one\nold line two\n\n## Next\n";
        assert_eq!(
            with_description(body, "Fresh", "unused"),
            "# T\n\nFresh\n\n## Next\n"
        );
    }

    #[test]
    fn with_description_inserts_below_title() {
        let body = "# T\n\n## Next\n";
        assert_eq!(with_description(body, "Fresh", "unused"), "# T\n\nFresh\n\n## Next\n");
    }

    #[test]
    fn with_description_adds_default_title() {
        assert_eq!(with_description("", "Fresh", "Default"), "# Default\n\nFresh\n");
    }

    #[test]
    fn with_description_empty_removes_paragraph() {
        let body = "# T\n\nOld\n\n## Next\n";
        assert_eq!(with_description(body, "", "unused"), "# T\n\n## Next\n");
    }

    #[test]
    fn blank_runs_are_collapsed() {
        let body = "# T\n\n\n\n\nText\n";
        assert_eq!(with_title(body, "T"), "# T\n\nText\n");
    }
}
