//! Utility functions for cleaning raw marketplace fields

use crate::deals::types::{Condition, Tier};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use serde_json::Value;
use std::str::FromStr;

/// Parse a price string like "$1,299.00" or "USD 450"
/// Returns None when nothing numeric is left after stripping
pub fn parse_price_str(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned).ok()
}

/// Read a decimal out of a JSON number, numeric string, or `{amount|value}` object
pub fn json_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => parse_price_str(s),
        Value::Object(map) => map
            .get("amount")
            .or_else(|| map.get("value"))
            .and_then(json_to_decimal),
        _ => None,
    }
}

/// Elements whose content is never listing text
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that separate words when rendered
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Strip HTML tags and collapse whitespace.
///
/// Inline tags join their text without a gap; block elements separate it.
/// Literal `&` and `<` in the decoded text are re-escaped, so feeding the
/// output back in returns it unchanged.
pub fn html_to_text(raw: &str) -> String {
    if !raw.contains('<') && !raw.contains('&') {
        return collapse_whitespace(raw);
    }

    let fragment = Html::parse_fragment(raw);
    let mut text = String::with_capacity(raw.len());
    push_text(fragment.root_element(), &mut text);

    escape_markup(&collapse_whitespace(&text))
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }

                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push(' ');
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    push_text(child_element, out);
                }
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;")
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map marketplace condition labels onto the canonical scale
pub fn parse_condition(label: &str) -> Condition {
    let lower = label.trim().to_lowercase();

    // "very good" must be checked before "good"
    if lower.contains("very good") {
        Condition::VeryGood
    } else if lower.contains("mint")
        || lower.contains("excellent")
        || lower.contains("like new")
        || lower.contains("new")
        || lower.contains("b-stock")
    {
        Condition::Excellent
    } else if lower.contains("good") {
        Condition::Good
    } else if lower.contains("fair") {
        Condition::Fair
    } else if lower.contains("poor") || lower.contains("non functioning") {
        Condition::Poor
    } else {
        Condition::Unknown
    }
}

/// Parse a tier label; accepts both the canonical names and the catalog's
/// Entry/Standard/Professional/Premium vocabulary
pub fn parse_tier(label: &str) -> Option<Tier> {
    match label.trim().to_lowercase().as_str() {
        "entry" => Some(Tier::Entry),
        "mid" | "standard" => Some(Tier::Mid),
        "mid-high" | "mid_high" | "midhigh" => Some(Tier::MidHigh),
        "high" | "professional" => Some(Tier::High),
        "premium" => Some(Tier::Premium),
        _ => None,
    }
}

/// Parse RFC 3339, naive ISO datetimes, or bare `YYYY-MM-DD` dates
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Case- and padding-insensitive comparison for brand/model/type keys
pub fn same_key(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_price_str() {
        assert_eq!(parse_price_str("$1,299.00"), Some(dec!(1299.00)));
        assert_eq!(parse_price_str("USD 450"), Some(dec!(450)));
        assert_eq!(parse_price_str("call for price"), None);
        assert_eq!(parse_price_str("1.2.3"), None);
    }

    #[test]
    fn test_json_to_decimal() {
        assert_eq!(json_to_decimal(&serde_json::json!(799)), Some(dec!(799)));
        assert_eq!(json_to_decimal(&serde_json::json!(4.5)), Some(dec!(4.5)));
        assert_eq!(json_to_decimal(&serde_json::json!("€ 1,050")), Some(dec!(1050)));
        assert_eq!(
            json_to_decimal(&serde_json::json!({"amount": "899.99", "currency": "USD"})),
            Some(dec!(899.99))
        );
        assert_eq!(json_to_decimal(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(
            html_to_text("<p>Great   <b>Strat</b></p>\n<ul><li>Original case</li></ul>"),
            "Great Strat Original case"
        );
        assert_eq!(html_to_text("  plain\ttext  "), "plain text");
        assert_eq!(html_to_text("Tom &amp; Jerry"), "Tom &amp; Jerry");
        assert_eq!(html_to_text("Tom & Jerry"), "Tom &amp; Jerry");
    }

    #[test]
    fn test_html_to_text_keeps_inline_words_whole() {
        assert_eq!(html_to_text("<p>Plays <b>great</b>.</p>"), "Plays great.");
        assert_eq!(
            html_to_text("Neck was re<i>stored</i> in 2019"),
            "Neck was restored in 2019"
        );
        assert_eq!(html_to_text("Line one<br>line two"), "Line one line two");
    }

    #[test]
    fn test_html_to_text_skips_script_and_style() {
        assert_eq!(
            html_to_text("<style>p { color: red }</style><p>Clean</p><script>track()</script>"),
            "Clean"
        );
    }

    #[test]
    fn test_html_to_text_is_stable_on_its_own_output() {
        let inputs = [
            "Swap the &lt;b&gt;bridge&lt;/b&gt; pickup",
            "AT&amp;copy &amp;amp; more",
            "<div>a &lt; b</div><p>5 &gt; 3 &nbsp; ok</p>",
        ];

        for raw in inputs {
            let once = html_to_text(raw);
            assert_eq!(html_to_text(&once), once, "unstable for {:?}", raw);
        }

        assert_eq!(
            html_to_text("Swap the &lt;b&gt;bridge&lt;/b&gt; pickup"),
            "Swap the &lt;b>bridge&lt;/b> pickup"
        );
    }

    #[test]
    fn test_parse_condition() {
        assert_eq!(parse_condition("Mint"), Condition::Excellent);
        assert_eq!(parse_condition("Brand New"), Condition::Excellent);
        assert_eq!(parse_condition("Very Good"), Condition::VeryGood);
        assert_eq!(parse_condition("good"), Condition::Good);
        assert_eq!(parse_condition("Fair"), Condition::Fair);
        assert_eq!(parse_condition("Non Functioning"), Condition::Poor);
        assert_eq!(parse_condition("N/A"), Condition::Unknown);
    }

    #[test]
    fn test_parse_tier() {
        assert_eq!(parse_tier("Standard"), Some(Tier::Mid));
        assert_eq!(parse_tier("Professional"), Some(Tier::High));
        assert_eq!(parse_tier("mid-high"), Some(Tier::MidHigh));
        assert_eq!(parse_tier("boutique"), None);
    }

    #[test]
    fn test_parse_timestamp() {
        let dt = parse_timestamp("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:30:00+00:00");

        let date_only = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(date_only.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        assert!(parse_timestamp("yesterday").is_none());
    }
}
