use crate::models::{Listing, Platform, ProductGroup, ProductKey};
use crate::reconcile::ReconcileOptions;
use crate::storage::write_rows;
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Cross-platform price spread of one product group
#[derive(Debug, Clone, Serialize)]
pub struct PriceComparison {
    pub key: ProductKey,
    pub prices: BTreeMap<Platform, f64>,
    pub min: f64,
    pub max: f64,
    pub price_diff: f64,
    pub price_diff_pct: f64,
    pub cheapest: Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTrendPoint {
    pub key: ProductKey,
    pub platform: Platform,
    pub date: NaiveDate,
    pub mean_price: f64,
}

fn compare_group(group: &ProductGroup) -> Option<PriceComparison> {
    let prices: BTreeMap<Platform, f64> = group
        .best
        .iter()
        .filter_map(|(platform, listing)| listing.price.map(|p| (*platform, p)))
        .collect();

    let (cheapest, min) = prices
        .iter()
        .fold(None, |acc: Option<(Platform, f64)>, (platform, price)| match acc {
            Some((_, best)) if best <= *price => acc,
            _ => Some((*platform, *price)),
        })?;
    let max = prices.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let price_diff = max - min;
    let price_diff_pct = if min > 0.0 { price_diff / min * 100.0 } else { 0.0 };

    Some(PriceComparison {
        key: group.key.clone(),
        prices,
        min,
        max,
        price_diff,
        price_diff_pct,
        cheapest,
    })
}

/// Price spread per group, widest first. Equal spreads are ordered by key.
pub fn compare_prices(groups: &[ProductGroup]) -> Vec<PriceComparison> {
    let mut comparisons: Vec<PriceComparison> = groups.iter().filter_map(compare_group).collect();
    comparisons.sort_by(|a, b| {
        b.price_diff
            .total_cmp(&a.price_diff)
            .then_with(|| a.key.cmp(&b.key))
    });
    comparisons
}

pub fn top_n(comparisons: &[PriceComparison], n: usize) -> &[PriceComparison] {
    &comparisons[..n.min(comparisons.len())]
}

/// Daily mean price per product and platform, for products that survived reconciliation
pub fn price_trends(
    listings: &[Listing],
    groups: &[ProductGroup],
    options: &ReconcileOptions,
) -> Vec<PriceTrendPoint> {
    let kept: HashSet<&ProductKey> = groups.iter().map(|g| &g.key).collect();
    let mut daily: BTreeMap<(ProductKey, NaiveDate, Platform), (f64, usize)> = BTreeMap::new();

    for listing in listings {
        let (Some(price), Some(date)) = (listing.price, listing.collection_date) else {
            continue;
        };
        let key = options.key_of(listing);
        if !kept.contains(&key) {
            continue;
        }
        let slot = daily.entry((key, date, listing.platform)).or_insert((0.0, 0));
        slot.0 += price;
        slot.1 += 1;
    }

    daily
        .into_iter()
        .map(|((key, date, platform), (sum, count))| PriceTrendPoint {
            key,
            platform,
            date,
            mean_price: sum / count as f64,
        })
        .collect()
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

pub fn write_comparisons(path: &Path, comparisons: &[PriceComparison]) -> Result<()> {
    let platforms: BTreeSet<Platform> = comparisons
        .iter()
        .flat_map(|c| c.prices.keys().copied())
        .collect();

    let mut headers = vec!["product".to_string()];
    headers.extend(platforms.iter().map(|p| format!("{}_price", p)));
    headers.extend(
        ["min_price", "max_price", "price_diff", "price_diff_pct", "cheapest_platform"]
            .iter()
            .map(|s| s.to_string()),
    );

    let rows: Vec<BTreeMap<String, String>> = comparisons
        .iter()
        .map(|c| {
            let mut row = BTreeMap::new();
            row.insert("product".to_string(), c.key.to_string());
            for (platform, price) in &c.prices {
                row.insert(format!("{}_price", platform), money(*price));
            }
            row.insert("min_price".to_string(), money(c.min));
            row.insert("max_price".to_string(), money(c.max));
            row.insert("price_diff".to_string(), money(c.price_diff));
            row.insert("price_diff_pct".to_string(), money(c.price_diff_pct));
            row.insert("cheapest_platform".to_string(), c.cheapest.to_string());
            row
        })
        .collect();

    write_rows(path, &headers, &rows)
}

pub fn write_trends(path: &Path, points: &[PriceTrendPoint]) -> Result<()> {
    let headers: Vec<String> = ["product", "platform", "date", "mean_price"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<BTreeMap<String, String>> = points
        .iter()
        .map(|p| {
            BTreeMap::from([
                ("product".to_string(), p.key.to_string()),
                ("platform".to_string(), p.platform.to_string()),
                ("date".to_string(), p.date.format("%Y-%m-%d").to_string()),
                ("mean_price".to_string(), money(p.mean_price)),
            ])
        })
        .collect();
    write_rows(path, &headers, &rows)
}
