//! Locates the target paper in a citing document's reference list.
//!
//! A fuzzy sliding window finds the best title match inside the reference
//! section, then the surrounding text is probed for a numbered-entry style
//! ("[12]", "12.", or a bare number line) to read off the entry number that
//! in-text numeric citations will use.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::text::CharMap;

/// Section headings that begin a reference list, matched as whole lines.
/// The last occurrence wins; a heading can also appear in a table of contents.
const REFERENCE_HEADINGS: &[&str] = &["References", "Bibliography", "Works Cited", "参考文献"];

/// Width of the window inspected around the best title match.
const ANALYSIS_WINDOW: usize = 1000;
/// How far back from the title match the entry number is searched.
const NUMBER_SCAN: usize = 500;
/// Minimum length of a consecutive ascending run that qualifies a pattern.
const EXPECTED_RUN: usize = 3;
/// Entry numbers outside 0..=1500 are treated as noise (years, page numbers).
const MAX_PLAUSIBLE_NUMBER: u32 = 1500;
/// Documents longer than this only have their tail searched when no heading
/// was found.
const LONG_DOCUMENT: usize = 10_000;

lazy_static! {
    static ref HEADING_PATTERNS: Vec<Regex> = REFERENCE_HEADINGS
        .iter()
        .map(|h| Regex::new(&format!(r"(?im)^\s*{h}\s*$")).expect("static heading pattern"))
        .collect();
    /// Entry-numbering styles: bracketed, dotted, bare line.
    static ref NUMBERING_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?m)\[\s*(\d+)\s*\]").expect("static numbering pattern"),
        Regex::new(r"(?m)\b(\d+)\s*\.").expect("static numbering pattern"),
        Regex::new(r"(?m)^\s*(\d+)\s*$").expect("static numbering pattern"),
    ];
}

pub struct ReferenceLocator {
    /// Minimum 0–100 similarity for a reference-list title match.
    similarity_threshold: f64,
}

impl ReferenceLocator {
    pub fn new(similarity_threshold: f64) -> Self {
        Self { similarity_threshold }
    }

    /// Find the target's entry number in the document's reference list.
    ///
    /// None is a common, valid outcome: the document may not number its
    /// references, or may not list the title recognizably at all.
    pub fn locate(&self, title: &str, full_text: &str) -> Option<u32> {
        if title.is_empty() || full_text.is_empty() {
            return None;
        }

        let map = CharMap::new(full_text);
        let chars: Vec<char> = full_text.chars().collect();
        let lower: Vec<char> = chars
            .iter()
            .map(|c| c.to_lowercase().next().unwrap_or(*c))
            .collect();
        let title_lower = title.to_lowercase();
        let window = title.chars().count();
        let n = chars.len();
        if window > n {
            return None;
        }

        let reference_start = Self::reference_section_start(full_text, &map);

        // Without a heading, bound the scan to the tail of long documents
        let mut start_search = reference_start;
        if start_search == 0 && n > LONG_DOCUMENT {
            start_search = (n as f64 * 0.7) as usize;
        }

        let (best_pos, best_score) = best_window_match(&lower, &title_lower, start_search, window)?;
        if best_score < self.similarity_threshold {
            debug!(best_score, "Reference-list title match below threshold");
            return None;
        }

        let patterns = qualifying_patterns(full_text, &map, best_pos, reference_start, n)?;

        // Read the entry number closest to (before) the matched title
        let scan_start = best_pos.saturating_sub(NUMBER_SCAN);
        let search_text = map.slice(full_text, scan_start, best_pos);
        last_captured_number(search_text, &patterns)
    }

    /// Char offset where the reference section begins; 0 when no heading found.
    fn reference_section_start(full_text: &str, map: &CharMap) -> usize {
        for pattern in HEADING_PATTERNS.iter() {
            if let Some(m) = pattern.find_iter(full_text).last() {
                return map.byte_to_char(m.start());
            }
        }
        0
    }
}

/// Slide a title-sized window over `lower[start..]`, returning the position
/// and 0–100 score of the best fuzzy match.
fn best_window_match(
    lower: &[char],
    title_lower: &str,
    start: usize,
    window: usize,
) -> Option<(usize, f64)> {
    let n = lower.len();
    if start + window > n {
        return None;
    }
    let mut best_score = 0.0f64;
    let mut best_pos = None;
    for i in start..=(n - window) {
        let candidate: String = lower[i..i + window].iter().collect();
        let score = strsim::normalized_levenshtein(title_lower, &candidate) * 100.0;
        if score > best_score {
            best_score = score;
            best_pos = Some(i);
        }
    }
    best_pos.map(|pos| (pos, best_score))
}

/// Decide which numbering styles are plausible around the match position.
///
/// A window of up to `ANALYSIS_WINDOW` chars, biased to stay inside the
/// reference section, must show at least `EXPECTED_RUN` consecutive ascending
/// entry numbers for a style to qualify; a window too short for that test
/// accepts every style. None means the reference list is not numbered.
fn qualifying_patterns(
    full_text: &str,
    map: &CharMap,
    match_pos: usize,
    reference_start: usize,
    n: usize,
) -> Option<Vec<&'static Regex>> {
    let half = ANALYSIS_WINDOW / 2;
    let distance_to_start = (match_pos - reference_start).min(half);
    let distance_to_end = (n - match_pos).min(half);
    let win_start = match_pos
        .saturating_sub(ANALYSIS_WINDOW - distance_to_end)
        .max(reference_start);
    let win_end = (match_pos + (ANALYSIS_WINDOW - distance_to_start)).min(n);
    let window = map.slice(full_text, win_start, win_end);

    if window.chars().count() < ANALYSIS_WINDOW {
        return Some(NUMBERING_PATTERNS.iter().collect());
    }

    for pattern in NUMBERING_PATTERNS.iter() {
        let numbers: Vec<u32> = pattern
            .captures_iter(window)
            .filter_map(|c| c[1].parse::<u32>().ok())
            .filter(|&x| x <= MAX_PLAUSIBLE_NUMBER)
            .collect();
        if has_ascending_run(&numbers, EXPECTED_RUN) {
            return Some(vec![pattern]);
        }
    }
    None
}

/// True when `nums` contains a subsequence of consecutive ascending integers
/// (gap exactly 1) of at least `expected` length.
fn has_ascending_run(nums: &[u32], expected: usize) -> bool {
    let mut runs: std::collections::HashMap<u32, usize> = std::collections::HashMap::new();
    for &num in nums {
        let run = num
            .checked_sub(1)
            .and_then(|prev| runs.get(&prev))
            .copied()
            .unwrap_or(0)
            + 1;
        if run >= expected {
            return true;
        }
        let entry = runs.entry(num).or_insert(0);
        if run > *entry {
            *entry = run;
        }
    }
    false
}

/// Of all pattern matches in `search_text`, return the captured number of the
/// one starting latest (closest to the matched title).
fn last_captured_number(search_text: &str, patterns: &[&Regex]) -> Option<u32> {
    let mut last: Option<(usize, u32)> = None;
    for pattern in patterns {
        if let Some(caps) = pattern.captures_iter(search_text).last() {
            let m = caps.get(0)?;
            if let Ok(number) = caps[1].parse::<u32>() {
                if last.map_or(true, |(pos, _)| m.start() > pos) {
                    last = Some((m.start(), number));
                }
            }
        }
    }
    last.map(|(_, number)| number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> ReferenceLocator {
        ReferenceLocator::new(80.0)
    }

    #[test]
    fn test_locates_bracketed_entry() {
        let text = "Prior work [3] and [5-7] discuss X.\n\
                    References\n\
                    [1] Doe, J. First Entry.\n\
                    [2] Roe, A. Second Entry.\n\
                    [3] Smith, J. Title Match.\n";
        assert_eq!(locator().locate("Title Match", text), Some(3));
    }

    #[test]
    fn test_locates_dotted_entry() {
        let text = "Intro text.\n\
                    References\n\
                    1. Doe, J. First Entry.\n\
                    2. Smith, J. Robust Perception at Night.\n";
        assert_eq!(locator().locate("Robust Perception at Night", text), Some(2));
    }

    #[test]
    fn test_title_absent_returns_none() {
        let text = "References\n[1] Doe, J. Something Entirely Different About Birds.\n";
        assert_eq!(locator().locate("Robust Perception at Night", text), None);
    }

    #[test]
    fn test_empty_text_returns_none() {
        assert_eq!(locator().locate("Any Title", ""), None);
    }

    #[test]
    fn test_unnumbered_reference_list_returns_none() {
        // A long window with no qualifying ascending run of entry numbers
        let filler = "word ".repeat(400);
        let text = format!(
            "References\n{filler}\nSmith, J. Robust Perception at Night. CVPR.\n{filler}"
        );
        assert_eq!(locator().locate("Robust Perception at Night", &text), None);
    }

    #[test]
    fn test_uses_last_heading_occurrence() {
        // "References" in a TOC line must not anchor the search
        let text = "Contents\nReferences\nIntroduction text here.\n\
                    References\n\
                    [1] Doe, J. First Entry.\n\
                    [2] Smith, J. Title Match.\n";
        assert_eq!(locator().locate("Title Match", text), Some(2));
    }

    #[test]
    fn test_ascending_run_detection() {
        assert!(has_ascending_run(&[4, 1, 2, 3], 3));
        assert!(has_ascending_run(&[9, 1, 7, 2, 8, 3], 3));
        assert!(!has_ascending_run(&[1, 3, 5, 7], 3));
        assert!(!has_ascending_run(&[2, 2, 2], 3));
        assert!(!has_ascending_run(&[], 3));
    }

    #[test]
    fn test_last_captured_number_prefers_latest_match() {
        let patterns: Vec<&Regex> = NUMBERING_PATTERNS.iter().collect();
        assert_eq!(last_captured_number("[1] first [2] second [3] ", &patterns), Some(3));
        assert_eq!(last_captured_number("no numbers here", &patterns), None);
    }
}
