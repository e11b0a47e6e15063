use crate::cleaning::price::is_missing;
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());
static CAPACITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(tb|gb|mb|t|g|m)?\b").unwrap());
static INCHES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\d+(?:\.\d+)?)\s*(?:inches|inch|in\b|"|''|”)"#).unwrap()
});

fn first_number_str(raw: &str) -> Option<f64> {
    NUMBER
        .find(raw)
        .and_then(|m| m.as_str().replace(',', ".").parse().ok())
}

/// First decimal number in the text, e.g. `"144 Hz"` or `"1 ms"`
pub fn parse_first_number(raw: &str) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }
    first_number_str(raw)
}

/// Memory or storage capacity in GB. Bare numbers are already GB.
///
/// The first number carrying a unit wins, so `"GDDR6 8GB"` is 8.
pub fn parse_capacity_gb(raw: &str) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }
    let all: Vec<_> = CAPACITY.captures_iter(raw).collect();
    let caps = all
        .iter()
        .find(|c| c.get(2).is_some())
        .or_else(|| all.first())?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();
    let gb = match unit.as_str() {
        "tb" | "t" => amount * 1024.0,
        "mb" | "m" => amount / 1024.0,
        _ => amount,
    };
    Some(round_to(gb, 4))
}

/// Screen or display size in inches.
///
/// Prefers an explicit inch marker (`"50.8 cm (20 inch)"` gives 20) and
/// falls back to the first number.
pub fn parse_inches(raw: &str) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }
    if let Some(caps) = INCHES.captures(raw) {
        return caps.get(1).and_then(|m| m.as_str().parse().ok());
    }
    if raw.to_lowercase().contains("cm") {
        return first_number_str(raw).map(|cm| round_to(cm / 2.54, 1));
    }
    first_number_str(raw)
}

/// Mean of comma-separated case sizes in millimetres
pub fn parse_case_size_mm(raw: &str) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }
    let sizes: Vec<f64> = raw
        .split([',', '/'])
        .filter_map(|part| {
            let cleaned = part.to_lowercase().replace("mm", "");
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                None
            } else {
                cleaned.parse::<f64>().ok()
            }
        })
        .collect();
    if sizes.is_empty() {
        return first_number_str(raw);
    }
    let mean = sizes.iter().sum::<f64>() / sizes.len() as f64;
    Some(round_to(mean, 2))
}

pub fn parse_battery_mah(raw: &str) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }
    let cleaned = raw.to_lowercase().replace("mah", "").replace(',', "");
    first_number_str(&cleaned).map(f64::round)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_units() {
        assert_eq!(parse_capacity_gb("512MB"), Some(0.5));
        assert_eq!(parse_capacity_gb("8 GB"), Some(8.0));
        assert_eq!(parse_capacity_gb("1TB"), Some(1024.0));
        assert_eq!(parse_capacity_gb("16"), Some(16.0));
        assert_eq!(parse_capacity_gb("8 GB GDDR6"), Some(8.0));
        assert_eq!(parse_capacity_gb("N/A"), None);
    }

    #[test]
    fn capacity_ignores_memory_type_digits() {
        assert_eq!(parse_capacity_gb("GDDR6 8GB"), Some(8.0));
        assert_eq!(parse_capacity_gb("DDR4 16 GB"), Some(16.0));
        assert_eq!(parse_capacity_gb("16 GB DDR4"), Some(16.0));
        assert_eq!(parse_capacity_gb("GDDR6X"), None);
    }

    #[test]
    fn capacity_is_idempotent() {
        for input in ["512MB", "1TB", "12 GB"] {
            let once = parse_capacity_gb(input).unwrap();
            assert_eq!(parse_capacity_gb(&once.to_string()), Some(once));
        }
    }

    #[test]
    fn inches_prefer_explicit_marker() {
        assert_eq!(parse_inches("50.8 cm (20 inch)"), Some(20.0));
        assert_eq!(parse_inches("15.6 in"), Some(15.6));
        assert_eq!(parse_inches("27\""), Some(27.0));
        assert_eq!(parse_inches("24"), Some(24.0));
        assert_eq!(parse_inches("68.58 cm"), Some(27.0));
    }

    #[test]
    fn first_number_for_rates_and_times() {
        assert_eq!(parse_first_number("144 Hz"), Some(144.0));
        assert_eq!(parse_first_number("0.5 ms"), Some(0.5));
        assert_eq!(parse_first_number("Does not apply"), None);
    }

    #[test]
    fn case_size_averages_variants() {
        assert_eq!(parse_case_size_mm("41mm, 45mm"), Some(43.0));
        assert_eq!(parse_case_size_mm("44 mm"), Some(44.0));
        assert_eq!(parse_case_size_mm("Does not apply"), None);
    }

    #[test]
    fn battery_rounds_to_whole_mah() {
        assert_eq!(parse_battery_mah("300 mAh"), Some(300.0));
        assert_eq!(parse_battery_mah("1,200mAh"), Some(1200.0));
        assert_eq!(parse_battery_mah("289.6"), Some(290.0));
    }
}
