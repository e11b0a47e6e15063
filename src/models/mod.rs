use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Marketplace a listing was collected from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Amazon,
    Ebay,
    Flipkart,
    Ubuy,
    Walmart,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Amazon,
        Platform::Ebay,
        Platform::Flipkart,
        Platform::Ubuy,
        Platform::Walmart,
    ];

    /// Lowercase name, also used as the data directory name
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Amazon => "amazon",
            Platform::Ebay => "ebay",
            Platform::Flipkart => "flipkart",
            Platform::Ubuy => "ubuy",
            Platform::Walmart => "walmart",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        match Platform::ALL.iter().find(|p| p.as_str() == lowered) {
            Some(p) => Ok(*p),
            None => bail!("Unknown platform: {}", s),
        }
    }
}

/// Product category, each with its own cleaning profile
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    GraphicsCards,
    Laptops,
    Monitors,
    SmartWatches,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::GraphicsCards,
        Category::Laptops,
        Category::Monitors,
        Category::SmartWatches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::GraphicsCards => "graphics_cards",
            Category::Laptops => "laptops",
            Category::Monitors => "monitors",
            Category::SmartWatches => "smart_watches",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase().replace([' ', '-'], "_");
        let category = match lowered.as_str() {
            "graphics_cards" | "gpu" | "gpus" => Category::GraphicsCards,
            "laptops" | "laptop" => Category::Laptops,
            "monitors" | "monitor" | "gaming_monitors" => Category::Monitors,
            "smart_watches" | "smartwatches" | "watches" => Category::SmartWatches,
            _ => bail!("Unknown category: {}", s),
        };
        Ok(category)
    }
}

/// A typed specification value after cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Number(f64),
    Text(String),
}

impl SpecValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SpecValue::Number(n) => Some(*n),
            SpecValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SpecValue::Text(t) => Some(t),
            SpecValue::Number(_) => None,
        }
    }
}

impl fmt::Display for SpecValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecValue::Number(n) => f.write_str(&format_number(*n)),
            SpecValue::Text(t) => f.write_str(t),
        }
    }
}

/// Renders integral values without a trailing `.0` so `8.0` and `8` agree
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let s = format!("{:.4}", n);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// One CSV row as read from disk, keyed by header
pub type RawRecord = BTreeMap<String, String>;

/// One cleaned product record from one marketplace at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub price: Option<f64>,
    pub platform: Platform,
    pub category: Category,
    pub collection_date: Option<NaiveDate>,
    pub specs: BTreeMap<String, SpecValue>,
}

impl Listing {
    pub fn new(title: impl Into<String>, platform: Platform, category: Category) -> Self {
        Self {
            title: title.into(),
            price: None,
            platform,
            category,
            collection_date: None,
            specs: BTreeMap::new(),
        }
    }

    pub fn spec(&self, column: &str) -> Option<&SpecValue> {
        self.specs.get(column)
    }
}

#[cfg(test)]
impl Listing {
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_spec(mut self, column: &str, value: SpecValue) -> Self {
        self.specs.insert(column.to_string(), value);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.collection_date = Some(date);
        self
    }
}

/// Exact-match identity built from normalized specification values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProductKey(pub Vec<String>);

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("|"))
    }
}

/// Listings across marketplaces that share a product key
#[derive(Debug, Clone)]
pub struct ProductGroup {
    pub key: ProductKey,
    /// Cheapest listing per platform
    pub best: BTreeMap<Platform, Listing>,
}

impl ProductGroup {
    pub fn platforms(&self) -> Vec<Platform> {
        self.best.keys().copied().collect()
    }
}
