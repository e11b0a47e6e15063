use crate::cleaning::text::clean_title;
use crate::models::{Listing, SpecValue};
use once_cell::sync::Lazy;
use regex::Regex;

pub const STANDARDIZED_TITLE: &str = "standardized_title";

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

fn sorted_tokens(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned = NON_ALNUM.replace_all(&lowered, " ");
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Word-order-insensitive similarity in `0..=100`
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    (strsim::normalized_levenshtein(&a, &b) * 100.0).round() as u8
}

/// Map each title onto the best-scoring canonical title above `threshold`.
///
/// Titles are visited in order; one that matches no earlier canonical title
/// becomes canonical itself. On equal scores the earlier canonical wins.
pub fn standardize_titles(titles: &[String], threshold: u8) -> Vec<String> {
    let mut canonical: Vec<&str> = Vec::new();
    let mut out = Vec::with_capacity(titles.len());

    for title in titles {
        if title.trim().is_empty() {
            out.push(title.clone());
            continue;
        }
        let mut best: Option<(u8, &str)> = None;
        for candidate in &canonical {
            let score = token_sort_ratio(title, candidate);
            if score > threshold && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, candidate));
            }
        }
        match best {
            Some((_, matched)) => out.push(matched.to_string()),
            None => {
                canonical.push(title.as_str());
                out.push(title.clone());
            }
        }
    }
    out
}

/// Attach a `standardized_title` spec to every listing, after stripping listing noise
pub fn apply_standardized_titles(listings: &mut [Listing], threshold: u8) {
    let titles: Vec<String> = listings.iter().map(|l| clean_title(&l.title)).collect();
    let standardized = standardize_titles(&titles, threshold);
    for (listing, title) in listings.iter_mut().zip(standardized) {
        listing
            .specs
            .insert(STANDARDIZED_TITLE.to_string(), SpecValue::Text(title));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_ignores_word_order_and_punctuation() {
        assert_eq!(token_sort_ratio("RTX 3060 MSI", "msi, rtx-3060"), 100);
        assert!(token_sort_ratio("MSI RTX 3060", "Sapphire RX 6600") < 50);
        assert_eq!(token_sort_ratio("", ""), 100);
    }

    #[test]
    fn near_identical_titles_merge() {
        let titles: Vec<String> = [
            "MSI GeForce RTX 3060 Ventus 12GB",
            "MSI GeForce RTX 3060 Ventus 2X 12GB",
            "Sapphire Pulse RX 6600 8GB",
            "",
            "GeForce RTX 3060 MSI Ventus 12GB",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let out = standardize_titles(&titles, 80);
        assert_eq!(out[0], titles[0]);
        assert_eq!(out[1], titles[0]);
        assert_eq!(out[2], titles[2]);
        assert_eq!(out[3], "");
        assert_eq!(out[4], titles[0]);
    }

    #[test]
    fn listings_gain_standardized_title() {
        use crate::models::{Category, Platform};
        let mut listings = vec![
            Listing::new("NEW MSI RTX 3060 Ventus 12GB - Free Shipping", Platform::Ebay, Category::GraphicsCards),
            Listing::new("MSI RTX 3060 Ventus 12GB", Platform::Amazon, Category::GraphicsCards),
        ];
        apply_standardized_titles(&mut listings, 80);
        assert_eq!(
            listings[0].spec(STANDARDIZED_TITLE),
            listings[1].spec(STANDARDIZED_TITLE)
        );
    }

    #[test]
    fn threshold_is_strict() {
        let titles = vec!["abcd".to_string(), "abcx".to_string()];
        // one substitution in four characters scores exactly 75
        assert_eq!(token_sort_ratio("abcd", "abcx"), 75);
        assert_eq!(standardize_titles(&titles, 75), titles);
        assert_eq!(standardize_titles(&titles, 74)[1], "abcd");
    }

    #[test]
    fn closest_canonical_wins_over_first_match() {
        let titles: Vec<String> = ["msi rtx 3060 ventus", "msi rtx 3060 ventus 2x oc", "msi rtx 3060 ventus 2x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(token_sort_ratio(&titles[0], &titles[1]), 76);
        assert_eq!(token_sort_ratio(&titles[2], &titles[0]), 86);
        assert_eq!(token_sort_ratio(&titles[2], &titles[1]), 88);

        let out = standardize_titles(&titles, 80);
        assert_eq!(out[1], titles[1]);
        assert_eq!(out[2], titles[1]);
    }
}
