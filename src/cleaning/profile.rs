use crate::cleaning::impute::{ImputeRule, Imputation};
use crate::cleaning::price::is_missing;
use crate::cleaning::text::{
    normalize_aspect_ratio, normalize_brand, normalize_cpu_model, normalize_gpu_model,
    normalize_memory_type, normalize_os, normalize_plain,
};
use crate::cleaning::units::{
    parse_battery_mah, parse_capacity_gb, parse_case_size_mm, parse_first_number, parse_inches,
    round_to,
};
use crate::models::{Category, SpecValue};
use regex::Regex;

/// How a raw cell is turned into a typed spec value
#[derive(Clone, Copy)]
pub enum ColumnKind {
    Capacity,
    Inches,
    Number,
    CaseSize,
    Battery,
    Text(fn(&str) -> String),
}

impl ColumnKind {
    pub fn parse(&self, raw: &str) -> Option<SpecValue> {
        if is_missing(raw) {
            return None;
        }
        let number = match self {
            ColumnKind::Capacity => parse_capacity_gb(raw),
            ColumnKind::Inches => parse_inches(raw).map(|v| round_to(v, 1)),
            ColumnKind::Number => parse_first_number(raw),
            ColumnKind::CaseSize => parse_case_size_mm(raw),
            ColumnKind::Battery => parse_battery_mah(raw),
            ColumnKind::Text(normalize) => return Some(SpecValue::Text(normalize(raw))),
        };
        number.map(SpecValue::Number)
    }
}

/// One canonical spec column of a category
#[derive(Clone)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Canonical raw headers tried in order
    pub sources: &'static [&'static str],
    /// Fallback extraction from the title; group 1 is parsed with `kind`
    pub title_pattern: Option<Regex>,
}

impl ColumnSpec {
    fn new(name: &'static str, kind: ColumnKind, sources: &'static [&'static str]) -> Self {
        Self {
            name,
            kind,
            sources,
            title_pattern: None,
        }
    }

    fn from_title(mut self, pattern: &str) -> Self {
        self.title_pattern = Some(Regex::new(pattern).unwrap());
        self
    }

    pub fn extract_from_title(&self, title: &str) -> Option<SpecValue> {
        let caps = self.title_pattern.as_ref()?.captures(title)?;
        self.kind.parse(caps.get(1)?.as_str())
    }
}

/// Everything needed to clean and reconcile one product category
#[derive(Clone)]
pub struct CategoryProfile {
    pub category: Category,
    pub columns: Vec<ColumnSpec>,
    /// A row missing all of these after parsing is dropped
    pub required: &'static [&'static str],
    pub imputation: Vec<ImputeRule>,
    pub dedup_key: &'static [&'static str],
    pub reconcile_key: &'static [&'static str],
    /// Key columns rounded to whole numbers before matching
    pub rounded_key: &'static [&'static str],
    pub known_brands: &'static [&'static str],
    /// Rows with more "unknown" text fields than this are dropped
    pub max_unknown_fields: Option<usize>,
}

pub const TITLE_SOURCES: &[&str] = &["title", "product_title", "product_name", "name"];
pub const PRICE_SOURCES: &[&str] = &["price", "product_price", "sale_price", "current_price"];
pub const DATE_SOURCES: &[&str] = &["collection_date", "date", "scraped_at", "collected_at"];

const BRAND_SOURCES: &[&str] = &["brand", "brand_name", "manufacturer"];
const MODEL_SOURCES: &[&str] = &["model", "model_name"];

impl CategoryProfile {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::GraphicsCards => Self::graphics_cards(),
            Category::Laptops => Self::laptops(),
            Category::Monitors => Self::monitors(),
            Category::SmartWatches => Self::smart_watches(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Output column order for cleaned CSVs
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    fn graphics_cards() -> Self {
        Self {
            category: Category::GraphicsCards,
            columns: vec![
                ColumnSpec::new("brand", ColumnKind::Text(normalize_brand), BRAND_SOURCES),
                ColumnSpec::new(
                    "memory_size",
                    ColumnKind::Capacity,
                    &["memory_size", "graphics_card_ram_size", "memory", "ram"],
                )
                .from_title(r"(?i)\b(\d+\s*gb)\b"),
                ColumnSpec::new(
                    "memory_type",
                    ColumnKind::Text(normalize_memory_type),
                    &["memory_type", "graphics_ram_type", "memory"],
                )
                .from_title(r"(?i)\b(g?ddr\d+x?)\b"),
                ColumnSpec::new(
                    "gpu_model",
                    ColumnKind::Text(normalize_gpu_model),
                    &["chipset/gpu_model", "gpu_model", "model_id", "graphics_coprocessor"],
                )
                .from_title(r"(?i)\b((?:rtx|gtx|gt|rx|arc)\s*[a-z]?\d{3,4})\b"),
                ColumnSpec::new(
                    "connectors",
                    ColumnKind::Text(normalize_plain),
                    &["connectors", "video_output_interface", "dvi_and_hdmi_interface"],
                ),
            ],
            required: &["memory_size", "memory_type", "gpu_model"],
            imputation: vec![
                ImputeRule::new("memory_size", Imputation::Median).grouped_by("gpu_model"),
                ImputeRule::new("memory_type", Imputation::Mode).grouped_by("gpu_model"),
                ImputeRule::new("connectors", Imputation::Mode).grouped_by("gpu_model"),
                ImputeRule::new("brand", Imputation::Constant("unknown".to_string())),
            ],
            dedup_key: &["brand", "memory_size", "memory_type", "gpu_model"],
            reconcile_key: &["memory_size", "memory_type", "gpu_model"],
            rounded_key: &[],
            known_brands: &[
                "ASUS", "MSI", "Gigabyte", "ZOTAC", "EVGA", "PNY", "Sapphire", "XFX", "PowerColor",
                "GALAX", "Inno3D", "Palit", "ASRock", "NVIDIA", "AMD", "Intel", "VisionTek",
            ],
            max_unknown_fields: Some(2),
        }
    }

    fn laptops() -> Self {
        Self {
            category: Category::Laptops,
            columns: vec![
                ColumnSpec::new("brand", ColumnKind::Text(normalize_brand), BRAND_SOURCES),
                ColumnSpec::new("model", ColumnKind::Text(normalize_plain), MODEL_SOURCES),
                ColumnSpec::new(
                    "ram",
                    ColumnKind::Capacity,
                    &["ram", "ram_size", "ram_memory_installed_size", "system_memory"],
                )
                .from_title(r"(?i)\b(\d+\s*gb)\s*(?:ddr\d\s*)?ram\b"),
                ColumnSpec::new(
                    "cpu",
                    ColumnKind::Text(normalize_cpu_model),
                    &["cpu", "processor", "processor_name", "cpu_model"],
                )
                .from_title(r"(?i)\b((?:core\s*)?i[3579](?:-\w+)?|ryzen\s*\d)\b"),
                ColumnSpec::new(
                    "storage",
                    ColumnKind::Capacity,
                    &["storage", "ssd_capacity", "hard_disk_size", "storage_capacity"],
                )
                .from_title(r"(?i)\b(\d+\s*(?:gb|tb))\s*(?:ssd|hdd|emmc)\b"),
                ColumnSpec::new(
                    "screen_size",
                    ColumnKind::Inches,
                    &["screen_size", "display_size"],
                )
                .from_title(r#"(?i)\b(\d{2}(?:\.\d)?\s*(?:inch|in\b|"))"#),
                ColumnSpec::new(
                    "gpu",
                    ColumnKind::Text(normalize_plain),
                    &["gpu", "graphics_coprocessor", "graphic_processor"],
                ),
            ],
            required: &["ram", "cpu", "storage", "screen_size"],
            imputation: vec![
                ImputeRule::new("ram", Imputation::Median),
                ImputeRule::new("storage", Imputation::Median),
                ImputeRule::new("screen_size", Imputation::Median),
                ImputeRule::new("cpu", Imputation::ForwardFill),
                ImputeRule::new("gpu", Imputation::Constant("Unknown".to_string())),
                ImputeRule::new("model", Imputation::Constant("Unknown".to_string())),
                ImputeRule::new("brand", Imputation::Constant("unknown".to_string())),
            ],
            dedup_key: &["model", "ram", "cpu", "brand", "storage"],
            reconcile_key: &["brand", "cpu", "ram"],
            rounded_key: &["ram"],
            known_brands: &[
                "ASUS", "Lenovo", "HP", "Dell", "Acer", "MSI", "Apple", "Samsung", "Alienware",
                "Microsoft", "Razer", "Gigabyte", "Infinix", "Zebronics",
            ],
            max_unknown_fields: None,
        }
    }

    fn monitors() -> Self {
        Self {
            category: Category::Monitors,
            columns: vec![
                ColumnSpec::new("brand", ColumnKind::Text(normalize_brand), BRAND_SOURCES),
                ColumnSpec::new("model", ColumnKind::Text(normalize_plain), MODEL_SOURCES),
                ColumnSpec::new(
                    "screen_size_in",
                    ColumnKind::Inches,
                    &["screen_size_in", "screen_size", "display_size"],
                )
                .from_title(r#"(?i)\b(\d{2}(?:\.\d)?\s*(?:inch|in\b|"))"#),
                ColumnSpec::new(
                    "aspect_ratio",
                    ColumnKind::Text(normalize_aspect_ratio),
                    &["aspect_ratio"],
                )
                .from_title(r"\b(\d{1,2}:\d{1,2})\b"),
                ColumnSpec::new(
                    "refresh_rate_hz",
                    ColumnKind::Number,
                    &["refresh_rate_hz", "refresh_rate", "maximum_refresh_rate"],
                )
                .from_title(r"(?i)\b(\d{2,3})\s*hz\b"),
                ColumnSpec::new(
                    "response_time_ms",
                    ColumnKind::Number,
                    &["response_time_ms", "response_time"],
                )
                .from_title(r"(?i)\b(\d+(?:\.\d+)?)\s*ms\b"),
                ColumnSpec::new(
                    "resolution",
                    ColumnKind::Text(normalize_plain),
                    &["resolution", "maximum_resolution"],
                ),
            ],
            required: &["screen_size_in", "aspect_ratio", "refresh_rate_hz", "response_time_ms"],
            imputation: vec![
                ImputeRule::new("screen_size_in", Imputation::Median),
                ImputeRule::new("refresh_rate_hz", Imputation::Median),
                ImputeRule::new("response_time_ms", Imputation::Median),
                ImputeRule::new("aspect_ratio", Imputation::Mode),
                ImputeRule::new("resolution", Imputation::Mode),
                ImputeRule::new("model", Imputation::Mode),
                ImputeRule::new("brand", Imputation::Constant("unknown".to_string())),
            ],
            dedup_key: &["brand", "model", "screen_size_in", "refresh_rate_hz", "resolution"],
            reconcile_key: &[
                "brand",
                "screen_size_in",
                "aspect_ratio",
                "refresh_rate_hz",
                "response_time_ms",
            ],
            rounded_key: &["screen_size_in"],
            known_brands: &[
                "HP", "Lenovo", "Sceptre", "Acer", "ASUS", "Samsung", "LG", "Dell", "BenQ", "AOC",
                "MSI", "ViewSonic", "Gigabyte", "Frontech", "ZEBRONICS",
            ],
            max_unknown_fields: None,
        }
    }

    fn smart_watches() -> Self {
        Self {
            category: Category::SmartWatches,
            columns: vec![
                ColumnSpec::new("brand", ColumnKind::Text(normalize_brand), BRAND_SOURCES),
                ColumnSpec::new("model", ColumnKind::Text(normalize_plain), MODEL_SOURCES),
                ColumnSpec::new("case_size", ColumnKind::CaseSize, &["case_size", "dial_size"])
                    .from_title(r"(?i)\b(\d{2}(?:\.\d+)?\s*mm)\b"),
                ColumnSpec::new(
                    "battery_capacity",
                    ColumnKind::Battery,
                    &["battery_capacity", "battery"],
                )
                .from_title(r"(?i)\b(\d{2,4})\s*mah\b"),
                ColumnSpec::new(
                    "operating_system",
                    ColumnKind::Text(normalize_os),
                    &["operating_system", "os", "compatible_os"],
                )
                .from_title(r"(?i)\b(wear\s*os|android|ios|watchos|tizen)\b"),
                ColumnSpec::new(
                    "storage_capacity",
                    ColumnKind::Capacity,
                    &["storage_capacity", "internal_storage", "storage"],
                ),
            ],
            required: &["case_size", "battery_capacity", "operating_system", "storage_capacity"],
            imputation: vec![
                ImputeRule::new("case_size", Imputation::Mean),
                ImputeRule::new("battery_capacity", Imputation::Knn(3)),
                ImputeRule::new("storage_capacity", Imputation::Median),
                ImputeRule::new("operating_system", Imputation::Constant("unknown".to_string())),
                ImputeRule::new("model", Imputation::Constant("Unknown".to_string())),
                ImputeRule::new("brand", Imputation::Constant("unknown".to_string())),
            ],
            dedup_key: &["brand", "model", "case_size", "storage_capacity"],
            reconcile_key: &["case_size", "battery_capacity", "operating_system", "storage_capacity"],
            rounded_key: &["case_size", "battery_capacity"],
            known_brands: &[
                "Apple", "Samsung", "Google", "Garmin", "Fitbit", "Fossil", "Amazfit", "Huawei",
                "Xiaomi", "Ticwatch", "Mobvoi", "Noise", "boAt", "Fire-Boltt", "COLMI", "Withings",
            ],
            max_unknown_fields: Some(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_a_consistent_profile() {
        for category in Category::ALL {
            let profile = CategoryProfile::for_category(category);
            assert_eq!(profile.category, category);
            for name in profile
                .required
                .iter()
                .chain(profile.reconcile_key)
                .chain(profile.dedup_key)
            {
                assert!(profile.column(name).is_some(), "{} missing {}", category, name);
            }
            for rule in &profile.imputation {
                assert!(profile.column(rule.column).is_some());
            }
        }
    }

    #[test]
    fn title_fallbacks() {
        let gpu = CategoryProfile::for_category(Category::GraphicsCards);
        let title = "MSI GeForce RTX 3060 VENTUS 2X 12GB GDDR6 Graphics Card";
        assert_eq!(
            gpu.column("memory_size").unwrap().extract_from_title(title),
            Some(SpecValue::Number(12.0))
        );
        assert_eq!(
            gpu.column("memory_type").unwrap().extract_from_title(title),
            Some(SpecValue::Text("GDDR6".into()))
        );
        assert_eq!(
            gpu.column("gpu_model").unwrap().extract_from_title(title),
            Some(SpecValue::Text("rtx 3060".into()))
        );

        let monitors = CategoryProfile::for_category(Category::Monitors);
        let title = "Acer 60.45 cm (23.8 inch) Full HD IPS 16:9 75 Hz 1 ms Monitor";
        assert_eq!(
            monitors.column("screen_size_in").unwrap().extract_from_title(title),
            Some(SpecValue::Number(23.8))
        );
        assert_eq!(
            monitors.column("refresh_rate_hz").unwrap().extract_from_title(title),
            Some(SpecValue::Number(75.0))
        );
        assert_eq!(
            monitors.column("aspect_ratio").unwrap().extract_from_title(title),
            Some(SpecValue::Text("169".into()))
        );
    }
}
