use crate::models::{Listing, SpecValue};
use std::collections::{BTreeMap, HashMap};

/// How a missing spec value is filled in
#[derive(Debug, Clone, PartialEq)]
pub enum Imputation {
    Median,
    Mean,
    Mode,
    ForwardFill,
    /// Average of the `k` nearest rows over the other numeric columns
    Knn(usize),
    Constant(String),
    Zero,
    None,
}

#[derive(Debug, Clone)]
pub struct ImputeRule {
    pub column: &'static str,
    pub strategy: Imputation,
    /// Compute the statistic within groups sharing this column's value
    pub group_by: Option<&'static str>,
}

impl ImputeRule {
    pub fn new(column: &'static str, strategy: Imputation) -> Self {
        Self {
            column,
            strategy,
            group_by: None,
        }
    }

    pub fn grouped_by(mut self, column: &'static str) -> Self {
        self.group_by = Some(column);
        self
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Most frequent value; ties go to the smallest rendering
pub fn mode(values: &[&SpecValue]) -> Option<SpecValue> {
    let mut counts: BTreeMap<String, (usize, &SpecValue)> = BTreeMap::new();
    for value in values {
        counts.entry(value.to_string()).or_insert((0, *value)).0 += 1;
    }
    let mut best: Option<(usize, &SpecValue)> = None;
    for (count, value) in counts.values() {
        if best.map_or(true, |(c, _)| *count > c) {
            best = Some((*count, *value));
        }
    }
    best.map(|(_, v)| v.clone())
}

fn statistic(strategy: &Imputation, values: &[&SpecValue]) -> Option<SpecValue> {
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_number()).collect();
    match strategy {
        Imputation::Median | Imputation::Knn(_) => median(&numbers).map(SpecValue::Number),
        Imputation::Mean => mean(&numbers).map(SpecValue::Number),
        Imputation::Mode => mode(values),
        Imputation::Constant(s) => Some(SpecValue::Text(s.clone())),
        Imputation::Zero => Some(SpecValue::Number(0.0)),
        Imputation::ForwardFill | Imputation::None => None,
    }
}

/// Fill missing values of one column in place
pub fn impute(listings: &mut [Listing], rule: &ImputeRule) {
    let fills: Vec<(usize, SpecValue)> = match &rule.strategy {
        Imputation::None => return,
        Imputation::ForwardFill => forward_fill(listings, rule.column),
        Imputation::Knn(k) => knn_fill(listings, rule.column, *k),
        strategy => statistic_fill(listings, rule, strategy),
    };
    for (idx, value) in fills {
        listings[idx].specs.insert(rule.column.to_string(), value);
    }
}

fn statistic_fill(
    listings: &[Listing],
    rule: &ImputeRule,
    strategy: &Imputation,
) -> Vec<(usize, SpecValue)> {
    let present: Vec<&SpecValue> = listings
        .iter()
        .filter_map(|l| l.spec(rule.column))
        .collect();
    let overall = statistic(strategy, &present);

    let mut by_group: HashMap<String, Vec<&SpecValue>> = HashMap::new();
    if let Some(group_col) = rule.group_by {
        for listing in listings {
            if let (Some(g), Some(v)) = (listing.spec(group_col), listing.spec(rule.column)) {
                by_group.entry(g.to_string()).or_default().push(v);
            }
        }
    }

    let mut fills = Vec::new();
    for (idx, listing) in listings.iter().enumerate() {
        if listing.spec(rule.column).is_some() {
            continue;
        }
        let grouped = rule
            .group_by
            .and_then(|g| listing.spec(g))
            .and_then(|g| by_group.get(&g.to_string()))
            .and_then(|values| statistic(strategy, values));
        if let Some(value) = grouped.or_else(|| overall.clone()) {
            fills.push((idx, value));
        }
    }
    fills
}

fn forward_fill(listings: &[Listing], column: &str) -> Vec<(usize, SpecValue)> {
    let mut last: Option<&SpecValue> = None;
    let mut fills = Vec::new();
    for (idx, listing) in listings.iter().enumerate() {
        match listing.spec(column) {
            Some(v) => last = Some(v),
            None => {
                if let Some(v) = last {
                    fills.push((idx, v.clone()));
                }
            }
        }
    }
    fills
}

fn numeric_features<'a>(listing: &'a Listing, target: &str) -> BTreeMap<&'a str, f64> {
    listing
        .specs
        .iter()
        .filter(|(k, _)| k.as_str() != target)
        .filter_map(|(k, v)| v.as_number().map(|n| (k.as_str(), n)))
        .collect()
}

/// Euclidean distance over the columns both rows have; `None` when they share none
fn distance(a: &BTreeMap<&str, f64>, b: &BTreeMap<&str, f64>) -> Option<f64> {
    let mut shared = 0;
    let mut sum = 0.0;
    for (k, va) in a {
        if let Some(vb) = b.get(k) {
            shared += 1;
            sum += (va - vb).powi(2);
        }
    }
    if shared == 0 {
        None
    } else {
        Some(sum.sqrt())
    }
}

fn knn_fill(listings: &[Listing], column: &str, k: usize) -> Vec<(usize, SpecValue)> {
    let donors: Vec<(BTreeMap<&str, f64>, f64)> = listings
        .iter()
        .filter_map(|l| {
            l.spec(column)
                .and_then(|v| v.as_number())
                .map(|target| (numeric_features(l, column), target))
        })
        .collect();
    let fallback = median(&donors.iter().map(|(_, t)| *t).collect::<Vec<_>>());

    let mut fills = Vec::new();
    for (idx, listing) in listings.iter().enumerate() {
        if listing.spec(column).is_some() {
            continue;
        }
        let features = numeric_features(listing, column);
        let mut scored: Vec<(f64, f64)> = donors
            .iter()
            .filter_map(|(f, target)| distance(&features, f).map(|d| (d, *target)))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        let nearest: Vec<f64> = scored.iter().take(k.max(1)).map(|(_, t)| *t).collect();
        if let Some(value) = mean(&nearest).or(fallback) {
            fills.push((idx, SpecValue::Number(value)));
        }
    }
    fills
}
