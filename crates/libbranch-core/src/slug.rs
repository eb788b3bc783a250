use std::sync::OnceLock;

use regex::Regex;

use crate::blob::BLOBS_DIR;

/// Slug used when a title has no usable characters
pub const UNTITLED_SLUG: &str = "untitled";

fn unsafe_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("slug pattern is valid"))
}

/// Derive a filesystem-safe, ASCII-only directory name from a title.
///
/// Non-ASCII characters are dropped, every run of other characters becomes a
/// single `-`, and leading/trailing separators are trimmed. A slug never
/// names the shared blob directory.
pub fn slugify(title: &str) -> String {
    let ascii: String = title.chars().filter(|c| c.is_ascii()).collect();
    let slug = unsafe_run_regex().replace_all(&ascii, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        UNTITLED_SLUG.to_string()
    } else if slug.eq_ignore_ascii_case(BLOBS_DIR) {
        format!("{}-doc", slug)
    } else {
        slug.to_string()
    }
}
