use std::collections::HashMap;
use std::fmt;

/// Placeholder strings scrapers write when a field is absent
const MISSING_SENTINELS: &[&str] = &[
    "n/a",
    "na",
    "nan",
    "none",
    "null",
    "data not available",
    "no price",
    "does not apply",
    "not available",
    "unknown",
];

pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || MISSING_SENTINELS.contains(&trimmed.to_lowercase().as_str())
}

/// Currency a raw price string was quoted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    Usd,
    Gbp,
    Eur,
    Inr,
    Mad,
    Aud,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
            Currency::Inr => "INR",
            Currency::Mad => "MAD",
            Currency::Aud => "AUD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

pub fn detect_currency(raw: &str) -> Option<Currency> {
    let upper = raw.to_uppercase();
    if upper.contains('₹') || upper.contains("INR") || upper.contains("RS.") {
        Some(Currency::Inr)
    } else if upper.contains("MAD") || upper.contains("DH") {
        Some(Currency::Mad)
    } else if upper.contains('£') || upper.contains("GBP") {
        Some(Currency::Gbp)
    } else if upper.contains('€') || upper.contains("EUR") {
        Some(Currency::Eur)
    } else if upper.contains("AUD") || upper.contains("AU $") || upper.contains("AU$") {
        Some(Currency::Aud)
    } else if upper.contains('$') || upper.contains("USD") {
        Some(Currency::Usd)
    } else {
        None
    }
}

/// Convert to USD with a configured rate; amounts without one pass through
pub fn to_usd(amount: f64, currency: Option<Currency>, rates: &HashMap<String, f64>) -> f64 {
    match currency.and_then(|c| rates.get(c.code())) {
        Some(rate) => (amount * rate * 100.0).round() / 100.0,
        None => amount,
    }
}

/// Parse a marketplace price string into a number.
///
/// Returns `None` for sentinels, text without digits, negative amounts and
/// anything that does not end up finite. For ranges the first amount wins.
pub fn parse_price(raw: &str) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }
    let lowered = raw.to_lowercase();
    let text = lowered.trim().trim_end_matches("/ea").trim();

    let first_digit = text.find(|c: char| c.is_ascii_digit())?;
    let prefix = &text[..first_digit];
    let prefix = prefix.trim_end_matches(|c: char| c.is_whitespace() || "$£€₹".contains(c));
    if prefix.ends_with('-') {
        return None;
    }

    let number = take_number(&text[first_digit..]);
    let value: f64 = resolve_separators(&number).parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Leading run of digits and separators; spaces count only between digits
fn take_number(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    for (i, c) in chars.iter().enumerate() {
        match c {
            '0'..='9' | '.' | ',' => out.push(*c),
            ' ' | '\u{a0}' | '\u{202f}' => {
                let next_is_digit = chars.get(i + 1).map_or(false, |n| n.is_ascii_digit());
                let prev_is_digit = i > 0 && chars[i - 1].is_ascii_digit();
                if !(next_is_digit && prev_is_digit) {
                    break;
                }
            }
            _ => break,
        }
    }
    out.trim_end_matches(['.', ',']).to_string()
}

fn resolve_separators(number: &str) -> String {
    let commas = number.matches(',').count();
    let dots = number.matches('.').count();

    match (commas, dots) {
        (0, 0) => number.to_string(),
        (_, 0) => {
            if commas > 1 || is_thousands_grouped(number, ',') {
                number.replace(',', "")
            } else {
                number.replace(',', ".")
            }
        }
        (0, _) => {
            if dots > 1 {
                if is_thousands_grouped(number, '.') {
                    number.replace('.', "")
                } else {
                    let mut parts = number.splitn(2, '.');
                    let whole = parts.next().unwrap_or_default();
                    let rest = parts.next().unwrap_or_default().replace('.', "");
                    format!("{}.{}", whole, rest)
                }
            } else {
                number.to_string()
            }
        }
        _ => {
            let last_comma = number.rfind(',').unwrap_or(0);
            let last_dot = number.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                number.replace('.', "").replace(',', ".")
            } else {
                number.replace(',', "")
            }
        }
    }
}

/// `1,234` or `1.234.567`: every group after the first has three digits
fn is_thousands_grouped(number: &str, sep: char) -> bool {
    let mut groups = number.split(sep);
    let head = groups.next().unwrap_or_default();
    if head.is_empty() || head.len() > 3 {
        return false;
    }
    let mut saw_group = false;
    for group in groups {
        if group.len() != 3 {
            return false;
        }
        saw_group = true;
    }
    saw_group
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_symbols_and_per_each_suffix() {
        assert_eq!(parse_price("$1,234.56/ea"), Some(1234.56));
        assert_eq!(parse_price("US $249.99"), Some(249.99));
        assert_eq!(parse_price("GBP 80.00"), Some(80.0));
        assert_eq!(parse_price("MAD 4 599.00"), Some(4599.0));
    }

    #[test]
    fn european_and_indian_grouping() {
        assert_eq!(parse_price("1.234,56 EUR"), Some(1234.56));
        assert_eq!(parse_price("₹1,23,456"), Some(123456.0));
        assert_eq!(parse_price("₹12,999"), Some(12999.0));
        assert_eq!(parse_price("12,5"), Some(12.5));
    }

    #[test]
    fn ranges_take_first_amount() {
        assert_eq!(parse_price("$10.00 to $20.00"), Some(10.0));
    }

    #[test]
    fn invalid_prices_are_none() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("N/A"), None);
        assert_eq!(parse_price("Data not available"), None);
        assert_eq!(parse_price("Free shipping"), None);
        assert_eq!(parse_price("-$5.00"), None);
    }

    #[test]
    fn parsed_prices_are_never_negative() {
        let inputs = ["$0.00", "-12", "€-3,50", "1e400", "  9  ", "$ 1 000"];
        for input in inputs {
            if let Some(p) = parse_price(input) {
                assert!(p >= 0.0 && p.is_finite(), "{} parsed to {}", input, p);
            }
        }
    }

    #[test]
    fn parsing_is_idempotent() {
        for input in ["$1,234.56/ea", "1.234,56 EUR", "₹1,23,456", "499"] {
            let once = parse_price(input).unwrap();
            let twice = parse_price(&once.to_string()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn detects_currency() {
        assert_eq!(detect_currency("₹12,999"), Some(Currency::Inr));
        assert_eq!(detect_currency("MAD 1 200"), Some(Currency::Mad));
        assert_eq!(detect_currency("AU $35.00"), Some(Currency::Aud));
        assert_eq!(detect_currency("$35.00"), Some(Currency::Usd));
        assert_eq!(detect_currency("35.00"), None);
    }

    #[test]
    fn conversion_uses_only_configured_rates() {
        let mut rates = HashMap::new();
        rates.insert("INR".to_string(), 0.0125);
        assert_eq!(to_usd(8000.0, Some(Currency::Inr), &rates), 100.0);
        assert_eq!(to_usd(8000.0, Some(Currency::Mad), &rates), 8000.0);
        assert_eq!(to_usd(8000.0, None, &rates), 8000.0);
    }
}
