//! Packing-slip page classification
//!
//! A page is a packing slip when the marker text shows up among the first
//! words of the page. Spreadsheet exports put the sheet title at the top, so
//! looking at a short prefix keeps invoice pages that merely mention
//! "packing slip" further down from matching.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Configuration for page classification
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Marker that identifies a packing-slip page (compared uppercased)
    pub marker: String,
    /// Number of leading words searched for the marker (default: 20)
    pub max_leading_words: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            marker: "PACKING SLIP".to_string(),
            max_leading_words: 20,
        }
    }
}

impl ClassifierConfig {
    /// Classify extracted page text
    pub fn classify(&self, text: Option<&str>) -> bool {
        let Some(text) = text else {
            return false;
        };
        if text.trim().is_empty() {
            return false;
        }

        let prefix = leading_words(text, self.max_leading_words);
        prefix.contains(&self.marker.to_uppercase())
    }
}

/// Check if page text looks like a packing slip using the default marker
pub fn is_packing_slip_page(text: Option<&str>) -> bool {
    ClassifierConfig::default().classify(text)
}

/// Uppercase the text, collapse whitespace and keep the first `count` words
fn leading_words(text: &str, count: usize) -> String {
    let normalized = WHITESPACE_RE.replace_all(text.trim(), " ").to_uppercase();
    normalized
        .split(' ')
        .filter(|w| !w.is_empty())
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_empty_text() {
        assert!(!is_packing_slip_page(None));
        assert!(!is_packing_slip_page(Some("")));
        assert!(!is_packing_slip_page(Some("  \n\t ")));
    }

    #[test]
    fn test_marker_at_top() {
        assert!(is_packing_slip_page(Some("PACKING SLIP\nPO 12345")));
        assert!(is_packing_slip_page(Some("Acme Ltd.\npacking slip")));
    }

    #[test]
    fn test_marker_split_across_lines() {
        assert!(is_packing_slip_page(Some("PACKING\n\n   SLIP")));
    }

    #[test]
    fn test_marker_outside_window() {
        let filler = (0..20).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let text = format!("{} PACKING SLIP", filler);
        assert!(!is_packing_slip_page(Some(&text)));

        // Marker straddling the 20th word is cut in half
        let filler = (0..19).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let text = format!("{} PACKING SLIP", filler);
        assert!(!is_packing_slip_page(Some(&text)));

        let filler = (0..18).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let text = format!("{} PACKING SLIP", filler);
        assert!(is_packing_slip_page(Some(&text)));
    }

    #[test]
    fn test_invoice_page() {
        assert!(!is_packing_slip_page(Some("COMMERCIAL INVOICE\nINVOICE NO 42")));
    }

    #[test]
    fn test_custom_marker() {
        let config = ClassifierConfig {
            marker: "packing list".to_string(),
            max_leading_words: 5,
        };
        assert!(config.classify(Some("Packing List for PO 1")));
        assert!(!config.classify(Some("one two three four five packing list")));
    }

    #[test]
    fn test_leading_words_normalizes() {
        assert_eq!(leading_words(" a\t b \n\nc ", 2), "A B");
    }
}
