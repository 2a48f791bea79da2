//! In-text citation occurrence scanning.
//!
//! Three independent match families, merged into one start-sorted list:
//! numeric reference groups ("[3]", "[5-7]", "[1, 2][4]"), author-year
//! citations ("Smith et al. (2023)"), and literal alias-name mentions.
//! Overlaps and duplicates are resolved later, during snippet merging.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::text::CharMap;

/// One raw hit: a half-open char-offset interval believed to cite the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub start: usize,
    pub end: usize,
}

lazy_static! {
    /// A bracketed group of numbers, ranges and nested brackets, e.g.
    /// "[3]", "[5-7]", "[1, 2]", "[8][9]", "[10]-[12]" (en dash included).
    static ref NUMERIC_GROUP: Regex =
        Regex::new(r"\[([0-9,\-–\s\[\]]+)\]").expect("static numeric pattern");
}

/// Scan `full_text` for every position that cites the target paper.
pub fn find_occurrences(
    full_text: &str,
    map: &CharMap,
    authors: &[String],
    year: Option<i32>,
    reference_number: Option<u32>,
    alias_names: &[String],
) -> Vec<Occurrence> {
    let mut results = Vec::new();

    // Numeric citations, only meaningful with a resolved entry number
    if let Some(refno) = reference_number {
        for caps in NUMERIC_GROUP.captures_iter(full_text) {
            let group = caps[1]
                .replace(' ', "")
                .replace("][", ",")
                .replace("]-[", "-")
                .replace("]–[", "–");
            if group.split(',').any(|elem| element_covers(elem, refno)) {
                let m = caps.get(0).expect("whole match");
                results.push(Occurrence {
                    start: map.byte_to_char(m.start()),
                    end: map.byte_to_char(m.end()),
                });
            }
        }
    }

    // Author-year citations
    if let (false, Some(year)) = (authors.is_empty(), year) {
        if let Some(pattern) = author_year_pattern(authors, year) {
            match Regex::new(&pattern) {
                Ok(re) => {
                    for m in re.find_iter(full_text) {
                        results.push(Occurrence {
                            start: map.byte_to_char(m.start()),
                            end: map.byte_to_char(m.end()),
                        });
                    }
                }
                // Surnames are deliberately not escaped; a name that breaks
                // the pattern just disables this family for the document.
                Err(e) => debug!(error = %e, "Author-year pattern failed to compile"),
            }
        }
    }

    // Alias-name mentions
    for name in alias_names {
        if name.is_empty() {
            continue;
        }
        if let Ok(re) = Regex::new(&format!("(?i){}", regex::escape(name))) {
            for m in re.find_iter(full_text) {
                results.push(Occurrence {
                    start: map.byte_to_char(m.start()),
                    end: map.byte_to_char(m.end()),
                });
            }
        }
    }

    results.sort_by_key(|o| o.start);
    results
}

/// Does one comma-separated element ("12" or "9-14") cover `refno`?
/// Malformed ranges (more or fewer than two parts) are skipped silently.
fn element_covers(elem: &str, refno: u32) -> bool {
    if elem.contains('-') || elem.contains('–') {
        let parts: Vec<&str> = elem.split(['-', '–']).collect();
        if parts.len() != 2 {
            return false;
        }
        match (parts[0].trim().parse::<u32>(), parts[1].trim().parse::<u32>()) {
            (Ok(start), Ok(end)) => start <= refno && refno <= end,
            _ => false,
        }
    } else {
        elem.trim().parse::<u32>().map_or(false, |n| n == refno)
    }
}

/// Build the author-year regex: first surname, optional further surnames,
/// optional "et al.", then the year in parenthesized, bare, or bracketed form.
fn author_year_pattern(authors: &[String], year: i32) -> Option<String> {
    let surnames: Vec<&str> = authors
        .iter()
        .filter_map(|a| a.split_whitespace().last())
        .collect();
    let first = surnames.first()?;

    let sep = r"(?:\s+and\s+|\s*&\s*|\s*,\s*|\s+)";
    let mut pattern = format!("(?i)(?:{first}){sep}+");
    for surname in &surnames[1..] {
        pattern.push_str(&format!("(?:(?:{surname}){sep}+)?"));
    }
    pattern.push_str(&format!(
        r"(?:et\s+al\.?)?\s*(?:,\s*)?(?:\(\s*{year}\s*\)|{year}|\[\s*{year}\s*\])"
    ));
    Some(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrences(
        text: &str,
        authors: &[&str],
        year: Option<i32>,
        refno: Option<u32>,
        aliases: &[&str],
    ) -> Vec<Occurrence> {
        let map = CharMap::new(text);
        let authors: Vec<String> = authors.iter().map(|s| s.to_string()).collect();
        let aliases: Vec<String> = aliases.iter().map(|s| s.to_string()).collect();
        find_occurrences(text, &map, &authors, year, refno, &aliases)
    }

    fn texts_of(text: &str, occs: &[Occurrence]) -> Vec<String> {
        let map = CharMap::new(text);
        occs.iter().map(|o| map.slice(text, o.start, o.end).to_string()).collect()
    }

    #[test]
    fn test_numeric_single_and_range() {
        let text = "As shown in [3], and later refined [5-7], the method works.";
        let occs = occurrences(text, &[], None, Some(3), &[]);
        assert_eq!(texts_of(text, &occs), vec!["[3]"]);

        let occs = occurrences(text, &[], None, Some(6), &[]);
        assert_eq!(texts_of(text, &occs), vec!["[5-7]"]);
    }

    #[test]
    fn test_numeric_comma_list_and_adjacent_brackets() {
        let text = "Compare [1, 4, 9] with [2][4] and [10]-[12].";
        let occs = occurrences(text, &[], None, Some(4), &[]);
        assert_eq!(texts_of(text, &occs), vec!["[1, 4, 9]", "[2][4]"]);

        let occs = occurrences(text, &[], None, Some(11), &[]);
        assert_eq!(texts_of(text, &occs), vec!["[10]-[12]"]);
    }

    #[test]
    fn test_numeric_en_dash_range() {
        let text = "Earlier systems [5–7] did this.";
        let occs = occurrences(text, &[], None, Some(6), &[]);
        assert_eq!(texts_of(text, &occs), vec!["[5–7]"]);
    }

    #[test]
    fn test_malformed_range_skipped() {
        // Three-part dash elements are not a range; skipped without matching
        let text = "Broken citation [1-2-3] here, valid [4] there.";
        let occs = occurrences(text, &[], None, Some(2), &[]);
        assert!(occs.is_empty());
        let occs = occurrences(text, &[], None, Some(4), &[]);
        assert_eq!(texts_of(text, &occs), vec!["[4]"]);
    }

    #[test]
    fn test_no_reference_number_disables_numeric_family(){
        let text = "As shown in [3], the method works.";
        assert!(occurrences(text, &[], None, None, &[]).is_empty());
    }

    #[test]
    fn test_author_year_forms() {
        let text = "Smith et al. (2023) proposed X. Later Smith and Jones 2023 refined it. \
                    See also Smith [2023].";
        let occs = occurrences(text, &["Jane Smith", "Bob Jones"], Some(2023), None, &[]);
        assert_eq!(occs.len(), 3);
        let found = texts_of(text, &occs);
        assert!(found[0].starts_with("Smith et al."));
        assert!(found[1].starts_with("Smith and Jones"));
    }

    #[test]
    fn test_author_year_requires_both_fields() {
        let text = "Smith et al. (2023) proposed X.";
        assert!(occurrences(text, &["Jane Smith"], None, None, &[]).is_empty());
        assert!(occurrences(text, &[], Some(2023), None, &[]).is_empty());
    }

    #[test]
    fn test_unescaped_surname_never_panics() {
        // A pathological "surname" that breaks regex compilation is swallowed
        let text = "Some text mentioning (2023) here.";
        let occs = occurrences(text, &["Weird (Name"], Some(2023), None, &[]);
        assert!(occs.is_empty());
    }

    #[test]
    fn test_alias_case_insensitive_and_escaped() {
        let text = "Our baseline is cfa. The CFA method (a.k.a. C+F) wins. c+f too.";
        let occs = occurrences(text, &[], None, None, &["CFA", "C+F"]);
        assert_eq!(occs.len(), 4);
    }

    #[test]
    fn test_results_sorted_by_start() {
        let text = "CFA beats [3]; see Smith (2020) and again CFA [3].";
        let occs = occurrences(text, &["J Smith"], Some(2020), Some(3), &["CFA"]);
        let starts: Vec<usize> = occs.iter().map(|o| o.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(occs.len(), 5);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(occurrences("", &["J Smith"], Some(2020), Some(1), &["X"]).is_empty());
    }

    #[test]
    fn test_scanning_is_deterministic() {
        let text = "CFA beats [3]; see Smith (2020) and again CFA [3].";
        let first = occurrences(text, &["J Smith"], Some(2020), Some(3), &["CFA"]);
        let second = occurrences(text, &["J Smith"], Some(2020), Some(3), &["CFA"]);
        assert_eq!(first, second);
    }
}
