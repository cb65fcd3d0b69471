//! Note title extraction from markdown content.

use std::sync::LazyLock;

use regex::Regex;

static QUOTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\??>[> ]*\s*(.*)$").expect("valid quote regex"));
static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+ +(.*)").expect("valid heading regex"));
static SETEXT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=+$").expect("valid setext regex"));

/// Finds the title of a note.
///
/// Skips a leading `---` front-matter block and fenced code blocks, looks
/// through blockquote markers, and returns the first ATX heading or setext
/// (`===`) heading. Falls back to the first non-empty line.
///
/// # Examples
///
/// ```
/// use steep::title::find_note_title;
///
/// assert_eq!(find_note_title("# Tea Reserve\n\n|..|"), Some("Tea Reserve".to_string()));
/// assert_eq!(find_note_title("Sencha\n===\n"), Some("Sencha".to_string()));
/// assert_eq!(find_note_title("\n\nplain text"), Some("plain text".to_string()));
/// assert_eq!(find_note_title(""), None);
/// ```
pub fn find_note_title(value: &str) -> Option<String> {
    let mut lines: Vec<&str> = value.split('\n').collect();

    if lines.first() == Some(&"---")
        && let Some(end) = lines.iter().skip(1).position(|line| *line == "---")
    {
        lines.drain(..end + 2);
    }

    let mut visible: Vec<String> = Vec::with_capacity(lines.len());
    let mut in_code_block = false;

    for (index, raw) in lines.iter().enumerate() {
        let mut line = raw.trim();

        if line.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        } else if in_code_block {
            continue;
        } else if let Some(caps) = QUOTE_REGEX.captures(line) {
            line = caps.get(1).map_or("", |m| m.as_str());
        }

        if let Some(caps) = HEADING_REGEX.captures(line) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }

        let underlined = lines
            .get(index + 1)
            .is_some_and(|next| SETEXT_REGEX.is_match(next.trim()));
        if underlined {
            return Some(line.to_string());
        }

        visible.push(line.to_string());
    }

    visible.into_iter().find(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_front_matter() {
        let content = "---\ntitle: ignored\n---\n# Real title\n";
        assert_eq!(find_note_title(content), Some("Real title".into()));
    }

    #[test]
    fn ignores_headings_inside_code_blocks() {
        let content = "```\n# not a title\n```\n## Mizudashi";
        assert_eq!(find_note_title(content), Some("Mizudashi".into()));
    }

    #[test]
    fn reads_headings_inside_blockquotes() {
        assert_eq!(find_note_title("> # Quoted"), Some("Quoted".into()));
    }

    #[test]
    fn falls_back_to_first_non_empty_line() {
        assert_eq!(find_note_title("\n  \nbody line\nother"), Some("body line".into()));
    }

    #[test]
    fn unterminated_front_matter_is_kept() {
        assert_eq!(find_note_title("---\n# Title"), Some("Title".into()));
    }
}
