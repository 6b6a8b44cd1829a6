//! Number, currency and timestamp formatting used in CSV and HTML output

use chrono::NaiveDateTime;

/// Suffix format embedded in artifact file names
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Human-readable generation time shown in reports
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%Y年%m月%d日 %H:%M";

/// Insert `,` every three digits: `1234567` -> `1,234,567`
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Render a yen amount: `4800` -> `¥4,800`
pub fn format_yen(amount: u64) -> String {
    format!("¥{}", group_thousands(amount))
}

/// Parse a cost cell. Accepts surrounding whitespace, a leading `¥`/`￥`
/// and thousands separators; anything else is rejected.
pub fn parse_yen(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let unprefixed = trimmed
        .strip_prefix('¥')
        .or_else(|| trimmed.strip_prefix('￥'))
        .unwrap_or(trimmed)
        .trim_start();
    if unprefixed.is_empty() || unprefixed.starts_with(',') || unprefixed.ends_with(',') {
        return None;
    }
    let digits: String = unprefixed.chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `part / whole * 100` rounded to one decimal; 0 when `whole` is 0
///
/// The ratio is rounded exactly in integer arithmetic, ties to even, so a
/// value such as 0.25% becomes 0.2 and 0.75% becomes 0.8.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let scaled = u128::from(part) * 1000;
    let whole = u128::from(whole);
    let mut tenths = scaled / whole;
    let twice_remainder = (scaled % whole) * 2;
    if twice_remainder > whole || (twice_remainder == whole && tenths % 2 == 1) {
        tenths += 1;
    }
    tenths as f64 / 10.0
}

/// Integer average rounded to the nearest yen; 0 for an empty population
pub fn average_yen(total: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    (total as f64 / count as f64).round() as u64
}

pub fn artifact_timestamp(at: &NaiveDateTime) -> String {
    at.format(ARTIFACT_TIMESTAMP_FORMAT).to_string()
}

pub fn display_timestamp(at: &NaiveDateTime) -> String {
    at.format(DISPLAY_TIMESTAMP_FORMAT).to_string()
}

/// Minimal HTML text escaping for generated fragments
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(4800), "4,800");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_format_yen() {
        assert_eq!(format_yen(2840), "¥2,840");
        assert_eq!(format_yen(0), "¥0");
    }

    #[test]
    fn test_parse_yen_accepts_export_variants() {
        assert_eq!(parse_yen("2840"), Some(2840));
        assert_eq!(parse_yen(" 960 "), Some(960));
        assert_eq!(parse_yen("¥1,000"), Some(1000));
        assert_eq!(parse_yen("￥12,345"), Some(12345));
    }

    #[test]
    fn test_parse_yen_rejects_non_integers() {
        assert_eq!(parse_yen(""), None);
        assert_eq!(parse_yen("12.5"), None);
        assert_eq!(parse_yen("-100"), None);
        assert_eq!(parse_yen("abc"), None);
        assert_eq!(parse_yen(",100"), None);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(157, 508), 30.9);
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_percentage_ties_round_to_even() {
        assert_eq!(percentage(1, 400), 0.2);
        assert_eq!(percentage(3, 400), 0.8);
        assert_eq!(percentage(5, 400), 1.2);
        assert_eq!(percentage(7, 400), 1.8);
        assert_eq!(percentage(508, 508), 100.0);
    }

    #[test]
    fn test_average_yen_guards_zero() {
        assert_eq!(average_yen(4800, 3), 1600);
        assert_eq!(average_yen(1000, 0), 0);
    }

    #[test]
    fn test_timestamps() {
        let at = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        assert_eq!(artifact_timestamp(&at), "20240701_090503");
        assert_eq!(display_timestamp(&at), "2024年07月01日 09:05");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("R&D <dev>"), "R&amp;D &lt;dev&gt;");
        assert_eq!(html_escape("O'Neil \"Jr\""), "O&#39;Neil &quot;Jr&quot;");
    }
}
