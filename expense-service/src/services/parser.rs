//! Line grammar for expense messages.
//!
//! Each non-blank line is `<label><whitespace><amount>`. The amount is an
//! optionally signed number with at most one `.` or `,` separator that must
//! have digits on both sides. Anything else makes the line invalid; parsing
//! never fails as a whole.

use crate::models::{Entry, InvalidLine, ParseResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<label>.+?)\s+(?P<amount>[+-]?[0-9]+(?:[.,][0-9]+)?)$")
        .expect("line grammar must compile")
});

/// Non-blank lines of `text`, untrimmed. `\r\n`, `\r` and `\n` all end a line.
pub fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\r', '\n']).filter(|line| !line.trim().is_empty())
}

/// Parse one line into an entry, or `None` when it does not match the grammar
/// or the amount cannot be represented.
pub fn parse_line(line: &str) -> Option<Entry> {
    let caps = LINE_RE.captures(line.trim())?;

    let label = caps.name("label")?.as_str().trim();
    if label.is_empty() {
        return None;
    }

    let raw_amount = caps.name("amount")?.as_str();
    let normalized = raw_amount
        .strip_prefix('+')
        .unwrap_or(raw_amount)
        .replace(',', ".");
    let amount = Decimal::from_str(&normalized).ok()?;

    // Decimal rounds fractions beyond its precision instead of failing.
    let fraction_digits = normalized.split_once('.').map_or(0, |(_, f)| f.len());
    if amount.scale() as usize != fraction_digits {
        return None;
    }

    Some(Entry::new(label, amount))
}

/// Split `text` into entries and invalid lines, preserving order.
pub fn parse(text: &str) -> ParseResult {
    let mut result = ParseResult::default();

    for line in content_lines(text) {
        match parse_line(line) {
            Some(entry) => result.entries.push(entry),
            None => {
                tracing::debug!(line = %line, "Line does not match expense grammar");
                result.invalid_lines.push(InvalidLine::new(line));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn mixed_message_keeps_order() {
        let result = parse("Groceries 100\nbad line\nWater 50");

        assert_eq!(
            result.entries,
            vec![
                Entry::new("Groceries", dec("100")),
                Entry::new("Water", dec("50"))
            ]
        );
        assert_eq!(result.invalid_lines, vec![InvalidLine::new("bad line")]);
    }

    #[test]
    fn all_line_endings_are_equivalent() {
        let expected = parse("a 1\nb 2\nc 3");
        assert_eq!(parse("a 1\r\nb 2\r\nc 3"), expected);
        assert_eq!(parse("a 1\rb 2\rc 3"), expected);
        assert_eq!(parse("a 1\r\nb 2\rc 3\n"), expected);
        assert_eq!(expected.entries.len(), 3);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let result = parse("\n\n  Milk 10  \n\t\n");
        assert_eq!(result.entries, vec![Entry::new("Milk", dec("10"))]);
        assert!(result.invalid_lines.is_empty());
    }

    #[test]
    fn comma_is_a_decimal_separator() {
        assert_eq!(parse_line("Cheese 200,25"), Some(Entry::new("Cheese", dec("200.25"))));
        assert_eq!(parse_line("Bread 50.50").unwrap().amount, dec("50.50"));
    }

    #[test]
    fn signed_and_zero_amounts_are_valid() {
        assert_eq!(parse_line("correction -500.50").unwrap().amount, dec("-500.50"));
        assert_eq!(parse_line("bonus +5").unwrap().amount, dec("5"));
        assert_eq!(parse_line("free 0").unwrap().amount, Decimal::ZERO);
    }

    #[test]
    fn label_keeps_inner_words_and_digits() {
        let entry = parse_line("White bread 2 pcs 80").unwrap();
        assert_eq!(entry.label, "White bread 2 pcs");
        assert_eq!(entry.amount, dec("80"));

        let entry = parse_line("Молоко\t\t120").unwrap();
        assert_eq!(entry.label, "Молоко");
    }

    #[test]
    fn malformed_numbers_invalidate_the_line() {
        for line in [
            ".5 item",
            "item 5.",
            "item .5",
            "item 12.34.56",
            "item 1e5",
            "item 5,",
            "item 1,000.50",
            "item abc",
            "item 5-",
            "item --5",
        ] {
            assert_eq!(parse_line(line), None, "{line:?} should be invalid");
        }
    }

    #[test]
    fn missing_label_or_amount_is_invalid() {
        assert_eq!(parse_line("100"), None);
        assert_eq!(parse_line("Groceries"), None);
        assert_eq!(parse_line("Groceries100"), None);
    }

    #[test]
    fn non_ascii_digits_are_not_numbers() {
        assert_eq!(parse_line("item ٣"), None);
    }

    #[test]
    fn unrepresentable_amount_is_invalid() {
        let line = format!("item {}", "9".repeat(40));
        assert_eq!(parse_line(&line), None);
    }

    #[test]
    fn amount_beyond_decimal_precision_is_invalid() {
        assert_eq!(parse_line("item 0.1234567890123456789012345678901"), None);
        assert_eq!(parse_line("item 99999999999999999999.999999999"), None);

        let kept = parse_line("item 0.1234567890123456789012345678").unwrap();
        assert_eq!(kept.render(), "item 0.1234567890123456789012345678");
    }

    #[test]
    fn invalid_line_keeps_original_text() {
        let result = parse("Milk 10\n  oops here  \r\nTea 5");
        assert_eq!(result.invalid_lines, vec![InvalidLine::new("  oops here  ")]);
    }

    #[test]
    fn every_line_invalid_yields_no_entries() {
        let result = parse("hello\nworld");
        assert!(result.entries.is_empty());
        assert_eq!(result.invalid_lines.len(), 2);
    }

    #[test]
    fn rendered_entries_parse_back_to_the_same_amount() {
        for raw in ["0", "1", "-1", "100.5", "100,50", "-0.01", "123456789.987654321", "+42"] {
            let line = format!("Label {raw}");
            let entry = parse_line(&line).unwrap();
            let reparsed = parse_line(&entry.render()).unwrap();
            assert_eq!(reparsed, entry, "round trip failed for {raw}");
        }
    }

    #[test]
    fn parse_is_deterministic() {
        let text = "a 1\nb x\nc 2,5\n.5 d";
        assert_eq!(parse(text), parse(text));
    }
}
