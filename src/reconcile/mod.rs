pub mod fuzzy;

use crate::cleaning::CategoryProfile;
use crate::config::ReconcileConfig;
use crate::models::{Listing, Platform, ProductGroup, ProductKey, SpecValue};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Which platform sets make a product group worth comparing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformRule {
    AtLeast(usize),
    Exactly(usize),
    AllOf(BTreeSet<Platform>),
}

impl Default for PlatformRule {
    fn default() -> Self {
        PlatformRule::AtLeast(2)
    }
}

impl PlatformRule {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        if !config.required_platforms.is_empty() {
            PlatformRule::AllOf(config.required_platforms.iter().copied().collect())
        } else if config.exact {
            PlatformRule::Exactly(config.min_platforms)
        } else {
            PlatformRule::AtLeast(config.min_platforms)
        }
    }

    pub fn accepts<'a>(&self, platforms: impl IntoIterator<Item = &'a Platform>) -> bool {
        let seen: BTreeSet<Platform> = platforms.into_iter().copied().collect();
        match self {
            PlatformRule::AtLeast(n) => seen.len() >= *n,
            PlatformRule::Exactly(n) => seen.len() == *n,
            PlatformRule::AllOf(required) => required.is_subset(&seen),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub key_columns: Vec<String>,
    /// Numeric key columns rounded to whole numbers first
    pub rounded: Vec<String>,
    pub rule: PlatformRule,
}

impl ReconcileOptions {
    pub fn for_profile(profile: &CategoryProfile, config: &ReconcileConfig) -> Self {
        Self {
            key_columns: profile.reconcile_key.iter().map(|s| s.to_string()).collect(),
            rounded: profile.rounded_key.iter().map(|s| s.to_string()).collect(),
            rule: PlatformRule::from_config(config),
        }
    }

    /// Put `column` in front of the identity columns
    pub fn with_leading_key(mut self, column: &str) -> Self {
        self.key_columns.insert(0, column.to_string());
        self
    }

    pub fn key_of(&self, listing: &Listing) -> ProductKey {
        product_key(listing, &self.key_columns, &self.rounded)
    }
}

fn key_part(value: Option<&SpecValue>, rounded: bool) -> String {
    match value {
        Some(SpecValue::Number(n)) if rounded => SpecValue::Number(n.round()).to_string(),
        Some(v) => {
            let text = v.to_string().trim().to_lowercase();
            if text.is_empty() {
                "unknown".to_string()
            } else {
                text
            }
        }
        None => "unknown".to_string(),
    }
}

/// Exact-match identity of a listing over `key_columns`
pub fn product_key(listing: &Listing, key_columns: &[String], rounded: &[String]) -> ProductKey {
    ProductKey(
        key_columns
            .iter()
            .map(|column| key_part(listing.spec(column), rounded.contains(column)))
            .collect(),
    )
}

/// Group listings by product key, keeping the cheapest listing per platform.
///
/// Unpriced listings are skipped. Only groups whose platform set satisfies
/// the rule survive, ordered by key.
pub fn reconcile(listings: &[Listing], options: &ReconcileOptions) -> Vec<ProductGroup> {
    let mut grouped: BTreeMap<ProductKey, BTreeMap<Platform, Listing>> = BTreeMap::new();

    for listing in listings {
        let Some(price) = listing.price else {
            continue;
        };
        let best = grouped.entry(options.key_of(listing)).or_default();
        let replace = best
            .get(&listing.platform)
            .and_then(|current| current.price)
            .map_or(true, |current| price < current);
        if replace {
            best.insert(listing.platform, listing.clone());
        }
    }

    let total = grouped.len();
    let groups: Vec<ProductGroup> = grouped
        .into_iter()
        .filter(|(_, best)| options.rule.accepts(best.keys()))
        .map(|(key, best)| ProductGroup { key, best })
        .collect();
    debug!(
        "Reconciled {} listings into {} keys, {} kept by {:?}",
        listings.len(),
        total,
        groups.len(),
        options.rule
    );
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn card(platform: Platform, model: &str, memory: f64, price: Option<f64>) -> Listing {
        let mut listing = Listing::new(format!("{} card", model), platform, Category::GraphicsCards)
            .with_spec("gpu_model", SpecValue::Text(model.to_string()))
            .with_spec("memory_size", SpecValue::Number(memory));
        listing.price = price;
        listing
    }

    fn options(rule: PlatformRule) -> ReconcileOptions {
        ReconcileOptions {
            key_columns: vec!["gpu_model".into(), "memory_size".into()],
            rounded: Vec::new(),
            rule,
        }
    }

    #[test]
    fn key_is_lowercased_and_marks_missing() {
        let listing = card(Platform::Ebay, " RTX 3060 ", 12.0, Some(1.0));
        let key = product_key(
            &listing,
            &["gpu_model".into(), "memory_size".into(), "memory_type".into()],
            &[],
        );
        assert_eq!(key.to_string(), "rtx 3060|12|unknown");
    }

    #[test]
    fn rounded_columns_match_nearby_values() {
        let a = card(Platform::Ebay, "rtx 3060", 11.8, Some(1.0));
        let b = card(Platform::Amazon, "rtx 3060", 12.2, Some(1.0));
        let columns = vec!["memory_size".to_string()];
        assert_ne!(product_key(&a, &columns, &[]), product_key(&b, &columns, &[]));
        assert_eq!(
            product_key(&a, &columns, &columns),
            product_key(&b, &columns, &columns)
        );
    }

    #[test]
    fn keeps_groups_on_enough_platforms_with_cheapest_listing() {
        let listings = vec![
            card(Platform::Ebay, "rtx 3060", 12.0, Some(320.0)),
            card(Platform::Ebay, "rtx 3060", 12.0, Some(299.0)),
            card(Platform::Amazon, "rtx 3060", 12.0, Some(310.0)),
            card(Platform::Ebay, "rx 6600", 8.0, Some(199.0)),
            card(Platform::Flipkart, "rx 6600", 8.0, None),
        ];
        let groups = reconcile(&listings, &options(PlatformRule::AtLeast(2)));

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.key.to_string(), "rtx 3060|12");
        assert_eq!(group.platforms(), vec![Platform::Amazon, Platform::Ebay]);
        assert_eq!(group.best[&Platform::Ebay].price, Some(299.0));
        assert_eq!(group.best[&Platform::Amazon].price, Some(310.0));
    }

    #[test]
    fn platform_rules() {
        let listings = vec![
            card(Platform::Ebay, "a", 1.0, Some(1.0)),
            card(Platform::Flipkart, "a", 1.0, Some(2.0)),
            card(Platform::Ebay, "b", 1.0, Some(1.0)),
            card(Platform::Amazon, "b", 1.0, Some(2.0)),
            card(Platform::Flipkart, "b", 1.0, Some(3.0)),
            card(Platform::Amazon, "c", 1.0, Some(1.0)),
            card(Platform::Walmart, "c", 1.0, Some(2.0)),
        ];
        let keys = |rule| -> Vec<String> {
            reconcile(&listings, &options(rule))
                .iter()
                .map(|g| g.key.0[0].clone())
                .collect()
        };

        assert_eq!(keys(PlatformRule::AtLeast(2)), vec!["a", "b", "c"]);
        assert_eq!(keys(PlatformRule::Exactly(3)), vec!["b"]);
        let both = [Platform::Ebay, Platform::Flipkart].into_iter().collect();
        assert_eq!(keys(PlatformRule::AllOf(both)), vec!["a", "b"]);
    }

    #[test]
    fn rule_from_config() {
        let mut config = ReconcileConfig::default();
        assert_eq!(PlatformRule::from_config(&config), PlatformRule::AtLeast(2));
        config.exact = true;
        config.min_platforms = 3;
        assert_eq!(PlatformRule::from_config(&config), PlatformRule::Exactly(3));
        config.required_platforms = vec![Platform::Ebay];
        assert!(matches!(PlatformRule::from_config(&config), PlatformRule::AllOf(_)));
    }
}
