//! Inline bookmark parsing.
//!
//! Narration text may contain self-closing tags such as
//! `<bookmark mark='reveal'/>`. They are not spoken; each one marks the
//! position of the character that follows it in the marker-stripped text.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::VoiceoverError;

static BOOKMARK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<bookmark\s*mark\s*=\s*(?:'(\w+)'|"(\w+)")\s*/>"#).expect("valid regex")
});

static BOOKMARK_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<bookmark\b").expect("valid regex"));

/// Narration text with bookmark tags removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedText {
    /// The text that is actually spoken.
    pub clean_text: String,
    /// Bookmark name to character offset in `clean_text`.
    pub bookmarks: HashMap<String, usize>,
}

/// Strip bookmark tags from `raw`, recording where each one sits in the clean text.
///
/// Offsets count characters, not bytes. When a name is declared twice the
/// later tag wins.
pub fn extract_bookmarks(raw: &str) -> Result<ExtractedText, VoiceoverError> {
    let mut clean_text = String::with_capacity(raw.len());
    let mut clean_len = 0usize;
    let mut bookmarks = HashMap::new();
    let mut last_end = 0usize;

    for caps in BOOKMARK_RE.captures_iter(raw) {
        let Some(tag) = caps.get(0) else {
            continue;
        };
        let segment = &raw[last_end..tag.start()];
        check_plain_segment(segment)?;
        clean_text.push_str(segment);
        clean_len += segment.chars().count();

        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| VoiceoverError::MalformedBookmark(tag.as_str().to_string()))?;
        if let Some(previous) = bookmarks.insert(name.clone(), clean_len) {
            log::warn!(
                "Bookmark '{name}' declared more than once; offset {previous} replaced by {clean_len}"
            );
        }
        last_end = tag.end();
    }

    let tail = &raw[last_end..];
    check_plain_segment(tail)?;
    clean_text.push_str(tail);

    Ok(ExtractedText {
        clean_text,
        bookmarks,
    })
}

/// Remove every well-formed bookmark tag, leaving anything else untouched.
pub fn remove_bookmarks(raw: &str) -> String {
    BOOKMARK_RE.replace_all(raw, "").into_owned()
}

fn check_plain_segment(segment: &str) -> Result<(), VoiceoverError> {
    match BOOKMARK_OPEN_RE.find(segment) {
        Some(open) => {
            let fragment: String = segment[open.start()..].chars().take(40).collect();
            Err(VoiceoverError::MalformedBookmark(fragment))
        }
        None => Ok(()),
    }
}
