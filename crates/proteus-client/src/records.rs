//! Extraction of patent publication numbers from fetched pages.
//!
//! Pages spell the same publication many ways (`WO2024/123456`,
//! `WO 2024 123456`, `WO-2024-123456`). Everything is normalized to one
//! canonical form and deduplicated while keeping first-seen order, so the
//! output is stable across re-runs against the same page.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

static WO_RE: OnceLock<Regex> = OnceLock::new();
static BR_RE: OnceLock<Regex> = OnceLock::new();

// The optional suffix swallows kind codes (A1, B2, ...) so a listing like
// `WO2024123456A1` still yields the bare publication number.
fn wo_regex() -> &'static Regex {
    WO_RE.get_or_init(|| {
        Regex::new(r"\bWO[\s/\-]?(\d{4})[\s/\-]?(\d{6})(?:[A-Z]\d?)?\b").expect("valid regex")
    })
}

fn br_regex() -> &'static Regex {
    BR_RE.get_or_init(|| {
        Regex::new(r"\bBR[\s/\-]?(\d{7,12})(?:[A-Z]\d?)?\b").expect("valid regex")
    })
}

/// Publication numbers found in one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatentRecords {
    /// WIPO publications, normalized to `WO<year>/<serial>`.
    pub wo: Vec<String>,
    /// Brazilian publications, normalized to `BR<digits>`.
    pub br: Vec<String>,
}

impl PatentRecords {
    pub fn is_empty(&self) -> bool {
        self.wo.is_empty() && self.br.is_empty()
    }

    pub fn len(&self) -> usize {
        self.wo.len() + self.br.len()
    }
}

/// Extracts all WO and BR publication numbers from `content`.
pub fn extract_records(content: &str) -> PatentRecords {
    PatentRecords {
        wo: extract_wo_numbers(content),
        br: extract_br_numbers(content),
    }
}

/// WIPO publication numbers in first-seen order, deduplicated.
pub fn extract_wo_numbers(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut numbers = Vec::new();
    for caps in wo_regex().captures_iter(content) {
        let number = format!("WO{}/{}", &caps[1], &caps[2]);
        if seen.insert(number.clone()) {
            numbers.push(number);
        }
    }
    numbers
}

/// Brazilian publication numbers in first-seen order, deduplicated.
pub fn extract_br_numbers(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut numbers = Vec::new();
    for caps in br_regex().captures_iter(content) {
        let number = format!("BR{}", &caps[1]);
        if seen.insert(number.clone()) {
            numbers.push(number);
        }
    }
    numbers
}
