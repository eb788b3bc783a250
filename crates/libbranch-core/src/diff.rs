//! Text diff between two snapshots of a document

use std::sync::OnceLock;

use regex::Regex;
use similar::TextDiff;

fn hidden_element_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
            .expect("hidden element pattern is valid")
    })
}

fn line_break_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(?:p|div|h[1-6]|li|tr|table|ul|ol|blockquote|pre)\s*>")
            .expect("line break pattern is valid")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"))
}

/// Visible text of a markup document, one line per block element.
/// Scripts, styles and images are dropped; blank lines are skipped.
pub fn markup_to_text(markup: &str) -> String {
    let visible = hidden_element_regex().replace_all(markup, "");
    let broken = line_break_regex().replace_all(&visible, "\n");
    let stripped = tag_regex().replace_all(&broken, "");

    let mut text = String::new();
    for line in stripped.lines() {
        let line = decode_entities(line.trim_end());
        if line.trim().is_empty() {
            continue;
        }
        text.push_str(&line);
        text.push('\n');
    }
    text
}

fn decode_entities(line: &str) -> String {
    line.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Unified diff with three lines of context. Empty when the texts match.
pub fn unified_diff(old: &str, new: &str, from_label: &str, to_label: &str) -> String {
    let old = with_final_newline(old);
    let new = with_final_newline(new);
    TextDiff::from_lines(old.as_str(), new.as_str())
        .unified_diff()
        .context_radius(3)
        .header(from_label, to_label)
        .to_string()
}

fn with_final_newline(text: &str) -> String {
    let mut text = text.to_string();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
