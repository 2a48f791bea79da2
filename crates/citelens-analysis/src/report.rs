//! Batch aggregate report.

use serde::{Deserialize, Serialize};
use std::path::Path;

use citelens_common::Result;

use crate::record::Judgment;

/// One citing document's contribution to the batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    #[serde(rename = "Citations")]
    pub judgments: Vec<Judgment>,
    /// Display label: "<title>. <info>".
    #[serde(rename = "Paper")]
    pub paper: String,
    /// 1-based position of the record in the input citation list.
    #[serde(rename = "ID")]
    pub id: usize,
    #[serde(rename = "Filename")]
    pub filename: String,
}

impl ReportEntry {
    pub fn positive_count(&self) -> usize {
        self.judgments.iter().filter(|j| j.positive).count()
    }
}

/// Within one document, positive judgments come first; both groups keep
/// their original order.
pub fn sort_judgments(judgments: &mut [Judgment]) {
    judgments.sort_by_key(|j| !j.positive);
}

/// Most positively cited documents first; ties keep input order.
pub fn sort_report(entries: &mut [ReportEntry]) {
    entries.sort_by_key(|e| std::cmp::Reverse(e.positive_count()));
}

/// Persist the sorted batch report.
pub fn write_report(path: &Path, entries: &[ReportEntry]) -> Result<()> {
    let data = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judgment(text: &str, positive: bool) -> Judgment {
        Judgment { text: text.to_string(), analysis: String::new(), positive }
    }

    fn entry(id: usize, positives: usize, negatives: usize) -> ReportEntry {
        let mut judgments = Vec::new();
        for i in 0..positives {
            judgments.push(judgment(&format!("p{i}"), true));
        }
        for i in 0..negatives {
            judgments.push(judgment(&format!("n{i}"), false));
        }
        ReportEntry { judgments, paper: format!("paper {id}"), id, filename: format!("f{id}") }
    }

    #[test]
    fn test_sort_judgments_positive_first_stable() {
        let mut judgments = vec![
            judgment("n1", false),
            judgment("p1", true),
            judgment("n2", false),
            judgment("p2", true),
        ];
        sort_judgments(&mut judgments);
        let order: Vec<&str> = judgments.iter().map(|j| j.text.as_str()).collect();
        assert_eq!(order, vec!["p1", "p2", "n1", "n2"]);
    }

    #[test]
    fn test_sort_report_descending_by_positive_count() {
        let mut entries = vec![entry(1, 0, 3), entry(2, 2, 0), entry(3, 5, 1)];
        sort_report(&mut entries);
        let ids: Vec<usize> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_report_ties_keep_input_order() {
        let mut entries = vec![entry(7, 2, 0), entry(8, 2, 5), entry(9, 3, 0)];
        sort_report(&mut entries);
        let ids: Vec<usize> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![9, 7, 8]);
    }

    #[test]
    fn test_report_field_names() {
        let value = serde_json::to_value(vec![entry(1, 1, 0)]).unwrap();
        assert!(value[0].get("Citations").is_some());
        assert!(value[0].get("Paper").is_some());
        assert_eq!(value[0]["ID"], 1);
        assert_eq!(value[0]["Filename"], "f1");
    }
}
