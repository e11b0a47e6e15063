use crate::cleaning::{listing_to_row, parse_record, CategoryProfile};
use crate::models::{Category, Listing, Platform, RawRecord};
use crate::scrapers::RawListing;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// `<root>/<platform>/<category>`
pub fn data_dir(root: &Path, platform: Platform, category: Category) -> PathBuf {
    root.join(platform.as_str()).join(category.as_str())
}

/// CSV files directly under `dir`, sorted by name. A missing directory is empty.
pub fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        warn!("Missing data directory: {}", dir.display());
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().map_or(false, |e| e.eq_ignore_ascii_case("csv")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Bad CSV row {} in {}", i + 1, path.display()))?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        records.push(record);
    }
    debug!("Loaded {} rows from {}", records.len(), path.display());
    Ok(records)
}

/// Write rows under the given header order, creating parent directories
pub fn write_rows(path: &Path, headers: &[String], rows: &[BTreeMap<String, String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(headers)?;
    for row in rows {
        let cells: Vec<&str> = headers
            .iter()
            .map(|h| row.get(h).map(String::as_str).unwrap_or(""))
            .collect();
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

/// `laptops_2025_01_29_scrape1.csv` becomes `laptops_2025_01_29_scrape1_cleaned.csv`
pub fn cleaned_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "listings".to_string());
    format!("{}_cleaned.csv", stem)
}

pub fn cleaned_headers(profile: &CategoryProfile) -> Vec<String> {
    let mut headers: Vec<String> = ["title", "price", "platform", "collection_date"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    headers.extend(profile.column_names().iter().map(|s| s.to_string()));
    headers
}

pub fn write_cleaned(path: &Path, listings: &[Listing], profile: &CategoryProfile) -> Result<()> {
    let rows: Vec<_> = listings.iter().map(|l| listing_to_row(l, profile)).collect();
    write_rows(path, &cleaned_headers(profile), &rows)
}

/// Cleaned files go back through the same parsers; they are idempotent on cleaned values
pub fn read_cleaned(path: &Path, profile: &CategoryProfile, platform: Platform) -> Result<Vec<Listing>> {
    let records = read_records(path)?;
    let no_rates = HashMap::new();
    Ok(records
        .iter()
        .map(|r| parse_record(r, profile, platform, &no_rates))
        .collect())
}

/// One past the highest `<category>_*_scrape<N>.csv` already in `dir`
pub fn next_scrape_number(dir: &Path, category: Category) -> Result<u32> {
    if !dir.exists() {
        return Ok(1);
    }
    let prefix = format!("{}_", category.as_str());
    let mut next = 1;
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) || !name.ends_with(".csv") {
            continue;
        }
        let number = name
            .trim_end_matches(".csv")
            .rsplit("_scrape")
            .next()
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(n) = number {
            next = next.max(n + 1);
        }
    }
    Ok(next)
}

pub fn scrape_file_name(category: Category, date: NaiveDate, number: u32) -> String {
    format!(
        "{}_{}_scrape{}.csv",
        category.as_str(),
        date.format("%Y_%m_%d"),
        number
    )
}

const RAW_COLUMNS: [&str; 4] = ["title", "price", "url", "collection_date"];

/// Raw scrape output: fixed columns followed by the union of spec labels
pub fn write_raw_listings(path: &Path, listings: &[RawListing]) -> Result<()> {
    let labels: BTreeSet<&str> = listings
        .iter()
        .flat_map(|l| l.specs.keys().map(String::as_str))
        .filter(|label| !RAW_COLUMNS.contains(label))
        .collect();

    let mut headers: Vec<String> = RAW_COLUMNS.iter().map(|s| s.to_string()).collect();
    headers.extend(labels.iter().map(|s| s.to_string()));

    let rows: Vec<BTreeMap<String, String>> = listings
        .iter()
        .map(|l| {
            let mut row = l.specs.clone();
            row.insert("title".to_string(), l.title.clone());
            row.insert("price".to_string(), l.price.clone());
            row.insert("url".to_string(), l.url.clone());
            row.insert(
                "collection_date".to_string(),
                l.collected_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            );
            row
        })
        .collect();

    write_rows(path, &headers, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpecValue;
    use temp_dir::TempDir;

    #[test]
    fn scrape_numbers_continue_from_existing_files() {
        let dir = TempDir::new().unwrap();
        assert_eq!(next_scrape_number(dir.path(), Category::Laptops).unwrap(), 1);

        for name in [
            "laptops_2025_01_28_scrape1.csv",
            "laptops_2025_01_29_scrape3.csv",
            "monitors_2025_01_29_scrape7.csv",
            "laptops_notes.txt",
        ] {
            fs::write(dir.child(name), "title\n").unwrap();
        }
        assert_eq!(next_scrape_number(dir.path(), Category::Laptops).unwrap(), 4);
        assert_eq!(next_scrape_number(dir.path(), Category::SmartWatches).unwrap(), 1);

        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(
            scrape_file_name(Category::Laptops, date, 4),
            "laptops_2025_02_01_scrape4.csv"
        );
    }

    #[test]
    fn cleaned_listings_survive_a_round_trip() {
        let dir = TempDir::new().unwrap();
        let profile = CategoryProfile::for_category(Category::GraphicsCards);
        let listing = Listing::new("ZOTAC RTX 3060", Platform::Ebay, Category::GraphicsCards)
            .with_price(289.99)
            .with_date(NaiveDate::from_ymd_opt(2025, 1, 28).unwrap())
            .with_spec("memory_size", SpecValue::Number(12.0))
            .with_spec("memory_type", SpecValue::Text("GDDR6".into()))
            .with_spec("gpu_model", SpecValue::Text("rtx 3060".into()));

        let path = dir.child("ebay/graphics_cards/cards_cleaned.csv");
        write_cleaned(&path, &[listing.clone()], &profile).unwrap();
        let loaded = read_cleaned(&path, &profile, Platform::Ebay).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].price, listing.price);
        assert_eq!(loaded[0].collection_date, listing.collection_date);
        for column in ["memory_size", "memory_type", "gpu_model"] {
            assert_eq!(loaded[0].spec(column), listing.spec(column), "{}", column);
        }
    }

    #[test]
    fn raw_listings_share_one_header() {
        let dir = TempDir::new().unwrap();
        let at = NaiveDate::from_ymd_opt(2025, 1, 29)
            .unwrap()
            .and_hms_opt(14, 2, 11)
            .unwrap();
        let listing = |title: &str, specs: &[(&str, &str)]| RawListing {
            title: title.to_string(),
            price: "$10.00".to_string(),
            url: String::new(),
            specs: specs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            collected_at: at,
        };
        let path = dir.child("raw.csv");
        write_raw_listings(
            &path,
            &[
                listing("a", &[("Brand", "Acer")]),
                listing("b", &[("Refresh Rate", "144 Hz"), ("title", "ignored")]),
            ],
        )
        .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Brand"], "Acer");
        assert_eq!(records[0]["Refresh Rate"], "");
        assert_eq!(records[1]["title"], "b");
        assert_eq!(records[1]["collection_date"], "2025-01-29 14:02:11");
    }

    #[test]
    fn lists_only_csv_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.child("b.csv"), "x\n").unwrap();
        fs::write(dir.child("a.CSV"), "x\n").unwrap();
        fs::write(dir.child("readme.md"), "x\n").unwrap();
        let files = csv_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(csv_files(&dir.child("missing")).unwrap().is_empty());
        assert_eq!(cleaned_file_name(&files[0]), "a_cleaned.csv");
    }
}
