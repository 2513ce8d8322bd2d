//! Small text helpers shared by the normalizer, formatter and tools.

use unicode_segmentation::UnicodeSegmentation;

/// Collapses all runs of whitespace (including newlines and tabs) into
/// single spaces and trims both ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates `text` to at most `max` grapheme clusters.
///
/// Returns the (possibly shortened) text and whether truncation happened.
#[must_use]
pub fn truncate_graphemes(text: &str, max: usize) -> (&str, bool) {
    match text.grapheme_indices(true).nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Truncates `text` to `max` graphemes and appends `marker` when cut.
#[must_use]
pub fn preview(text: &str, max: usize, marker: &str) -> String {
    let (head, cut) = truncate_graphemes(text, max);
    if cut {
        format!("{head}{marker}")
    } else {
        head.to_string()
    }
}
