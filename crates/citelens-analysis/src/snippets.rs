//! Snippet carving: expand occurrences into windows and merge overlaps.

use crate::occurrences::Occurrence;
use crate::text::CharMap;

/// Expand each occurrence by half the snippet length on both sides, merge
/// overlapping or adjacent windows, and emit the covered substrings in
/// ascending order.
///
/// The output is pairwise non-overlapping and never longer than the input.
pub fn extract_snippets(
    full_text: &str,
    map: &CharMap,
    occurrences: &[Occurrence],
    snippet_length: usize,
) -> Vec<String> {
    let half = snippet_length / 2;
    let n = map.char_len();

    let mut windows: Vec<(usize, usize)> = occurrences
        .iter()
        .map(|o| (o.start.saturating_sub(half), (o.end + half).min(n)))
        .collect();
    windows.sort_by_key(|w| w.0);

    let mut merged: Vec<(usize, usize)> = Vec::new();
    for window in windows {
        match merged.last_mut() {
            Some(last) if last.1 >= window.0 => last.1 = last.1.max(window.1),
            _ => merged.push(window),
        }
    }

    merged
        .iter()
        .map(|&(start, end)| map.slice(full_text, start, end).to_string())
        .collect()
}
