use regex::Regex;
use std::sync::LazyLock;

/// Capitalised words ending in a corporate suffix, optionally behind a
/// markdown heading marker.
static COMPANY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(#{1,6}[ \t]+)?\b((?:[A-Z][A-Za-z0-9&'\-]*,?[ \t]+){1,6}(?:Inc\.|Corporation\b|Corp\.|Ltd\.|Co\.|PLC\b|p\.l\.c\.|S\.A\.|N\.V\.))",
    )
    .unwrap()
});

/// First company name in the text, heading markers stripped.
pub fn find_company_name(text: &str) -> Option<String> {
    COMPANY_NAME
        .captures(text)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim_start_matches('#').trim().to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_markers_are_stripped() {
        let text = "Annual report\n### Acme Global Corp. is a leading maker of widgets.";
        assert_eq!(find_company_name(text).as_deref(), Some("Acme Global Corp."));
    }

    #[test]
    fn test_common_suffixes() {
        let cases = [
            ("Shares of Apple Inc. rose", "Apple Inc."),
            ("NVIDIA Corporation reported record revenue", "NVIDIA Corporation"),
            ("Unilever PLC annual report", "Unilever PLC"),
            ("Filed by Koninklijke Philips N.V. today", "Koninklijke Philips N.V."),
            ("Berkshire Hathaway, Inc. owns", "Berkshire Hathaway, Inc."),
        ];
        for (text, expected) in cases {
            assert_eq!(find_company_name(text).as_deref(), Some(expected), "{text}");
        }
    }

    #[test]
    fn test_does_not_span_lines() {
        let text = "Quarterly Report\nAcme Corp.";
        assert_eq!(find_company_name(text).as_deref(), Some("Acme Corp."));
    }

    #[test]
    fn test_no_suffix_no_name() {
        assert_eq!(find_company_name("The company had a strong year."), None);
        assert_eq!(find_company_name("acme corp. lowercase"), None);
    }
}
