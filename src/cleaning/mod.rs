pub mod dedup;
pub mod impute;
pub mod price;
pub mod profile;
pub mod text;
pub mod units;

pub use dedup::dedup_min_price;
pub use profile::CategoryProfile;

use crate::models::{Listing, Platform, RawRecord, SpecValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use price::{detect_currency, is_missing, parse_price, to_usd};
use profile::{DATE_SOURCES, PRICE_SOURCES, TITLE_SOURCES};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use text::{correct_brand, extract_brand, normalize_brand};
use tracing::debug;

/// Row counts for one cleaning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub input_rows: usize,
    pub missing_required: usize,
    pub too_many_unknowns: usize,
    pub duplicates: usize,
    pub invalid_price: usize,
    pub written: usize,
}

impl fmt::Display for CleanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows in, {} missing required specs, {} mostly unknown, {} duplicates, {} without a valid price, {} kept",
            self.input_rows,
            self.missing_required,
            self.too_many_unknowns,
            self.duplicates,
            self.invalid_price,
            self.written
        )
    }
}

#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub listings: Vec<Listing>,
    pub report: CleanReport,
}

/// `"Chipset/GPU Model"` becomes `"chipset/gpu_model"`
pub fn canonical_header(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    for c in header.trim().to_lowercase().chars() {
        let c = if c == ' ' || c == '-' { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

fn canonicalize(record: &RawRecord) -> HashMap<String, &str> {
    let mut out = HashMap::new();
    for (header, value) in record {
        let key = canonical_header(header);
        let entry = out.entry(key).or_insert(value.as_str());
        if is_missing(entry) && !is_missing(value) {
            *entry = value.as_str();
        }
    }
    out
}

fn first_present<'a>(row: &HashMap<String, &'a str>, sources: &[&str]) -> Option<&'a str> {
    sources
        .iter()
        .filter_map(|s| row.get(*s).copied())
        .find(|v| !is_missing(v))
}

/// Accepts the timestamp formats the scrapers have written over time
pub fn parse_collection_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d", "%Y_%m_%d", "%d/%m/%Y", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    None
}

/// Minimum similarity for a raw brand to be replaced by a known brand
const BRAND_MATCH_THRESHOLD: u8 = 85;

/// Parse one raw row into a listing without imputing anything
pub fn parse_record(
    record: &RawRecord,
    profile: &CategoryProfile,
    platform: Platform,
    rates: &HashMap<String, f64>,
) -> Listing {
    let row = canonicalize(record);
    let title = first_present(&row, TITLE_SOURCES).unwrap_or_default().trim();
    let mut listing = Listing::new(title, platform, profile.category);

    if let Some(raw) = first_present(&row, PRICE_SOURCES) {
        listing.price = parse_price(raw).map(|p| to_usd(p, detect_currency(raw), rates));
    }
    listing.collection_date = first_present(&row, DATE_SOURCES).and_then(parse_collection_date);

    for column in &profile.columns {
        let value = column
            .sources
            .iter()
            .filter_map(|s| row.get(*s))
            .find_map(|raw| column.kind.parse(raw))
            .or_else(|| column.extract_from_title(title));
        if let Some(v) = value {
            listing.specs.insert(column.name.to_string(), v);
        }
    }

    if let Some(SpecValue::Text(brand)) = listing.specs.get_mut("brand") {
        if let Some(known) = correct_brand(brand, profile.known_brands, BRAND_MATCH_THRESHOLD) {
            *brand = normalize_brand(&known);
        }
    }
    if listing.spec("brand").is_none() && profile.column("brand").is_some() {
        if let Some(brand) = extract_brand(title, profile.known_brands) {
            listing
                .specs
                .insert("brand".to_string(), SpecValue::Text(normalize_brand(&brand)));
        }
    }
    listing
}

fn missing_all_required(listing: &Listing, profile: &CategoryProfile) -> bool {
    !profile.required.is_empty() && profile.required.iter().all(|c| listing.spec(c).is_none())
}

fn unknown_count(listing: &Listing) -> usize {
    listing
        .specs
        .values()
        .filter_map(|v| v.as_text())
        .filter(|t| t.to_lowercase().starts_with("unknown"))
        .count()
}

/// Clean one raw table: parse, drop, impute, dedup, validate.
///
/// Rows missing every required column are dropped before imputation so no
/// row survives on synthetic values alone.
pub fn clean_records(
    records: &[RawRecord],
    profile: &CategoryProfile,
    platform: Platform,
    rates: &HashMap<String, f64>,
) -> CleanOutcome {
    let mut report = CleanReport {
        input_rows: records.len(),
        ..Default::default()
    };

    let mut listings: Vec<Listing> = Vec::with_capacity(records.len());
    for record in records {
        if record.values().all(|v| v.trim().is_empty()) {
            report.missing_required += 1;
            continue;
        }
        let listing = parse_record(record, profile, platform, rates);
        if missing_all_required(&listing, profile) {
            debug!("Dropping row without required specs: {}", listing.title);
            report.missing_required += 1;
            continue;
        }
        listings.push(listing);
    }

    for rule in &profile.imputation {
        impute::impute(&mut listings, rule);
    }

    if let Some(limit) = profile.max_unknown_fields {
        let before = listings.len();
        listings.retain(|l| unknown_count(l) <= limit);
        report.too_many_unknowns = before - listings.len();
    }

    let before = listings.len();
    let mut listings = dedup_min_price(listings, profile.dedup_key);
    report.duplicates = before - listings.len();

    let before = listings.len();
    listings.retain(|l| l.price.map_or(false, |p| p > 0.0));
    report.invalid_price = before - listings.len();

    report.written = listings.len();
    CleanOutcome { listings, report }
}

/// Flatten a listing into CSV cells using the profile's column order
pub fn listing_to_row(listing: &Listing, profile: &CategoryProfile) -> BTreeMap<String, String> {
    let mut row = BTreeMap::new();
    row.insert("title".to_string(), listing.title.clone());
    row.insert(
        "price".to_string(),
        listing.price.map(|p| format!("{:.2}", p)).unwrap_or_default(),
    );
    row.insert("platform".to_string(), listing.platform.to_string());
    row.insert(
        "collection_date".to_string(),
        listing
            .collection_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    );
    for name in profile.column_names() {
        row.insert(
            name.to_string(),
            listing.spec(name).map(|v| v.to_string()).unwrap_or_default(),
        );
    }
    row
}
