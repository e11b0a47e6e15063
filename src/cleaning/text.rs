use crate::cleaning::price::is_missing;
use once_cell::sync::Lazy;
use regex::Regex;

static GPU_VENDOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(geforce|amd|radeon|nvidia)\b").unwrap());
static GPU_VARIANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(twin edge|gaming oc|ventus|super|ti|oc|edition|white|black|gold|pro|mech|trinity|aorus|eagle|sg|lhr)\b",
    )
    .unwrap()
});
static CAPACITY_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\s?(gb|mb|tb)\b").unwrap());
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static CPU_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(intel|amd|core|processor|cpu|™|®|\(r\)|\(tm\)|series|generation|gen\b|gpu)")
        .unwrap()
});
static CPU_TIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(i\d)\b.*").unwrap());
static CPU_TIER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(i\d)[\s-]\S*").unwrap());
static MEMORY_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(g?ddr\d+x?|hbm\d*e?)\b").unwrap());
static TITLE_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(brand new|new|used|open box|refurbished|renewed|excellent|very good|good|condition|tested|working|warranty|fast|free|shipping|ship|oem|bulk|retail|with box|without box|grade [a-c]|black|white|silver|gold|gray|grey|blue|red|pink|\d+\s?(gb|tb|mb))\b",
    )
    .unwrap()
});

fn squash(text: &str) -> String {
    SPACES.replace_all(text, " ").trim().to_string()
}

/// Reduce a GPU chipset string to its model number, e.g. `"GeForce RTX 3060 Ti OC"` to `"rtx 3060"`
pub fn normalize_gpu_model(raw: &str) -> String {
    if is_missing(raw) {
        return "Unknown_GPU".to_string();
    }
    let lowered = raw.to_lowercase();
    let text = GPU_VENDOR.replace_all(&lowered, " ");
    let text = GPU_VARIANT.replace_all(&text, " ");
    let text = CAPACITY_TOKEN.replace_all(&text, " ");
    let text = NON_WORD.replace_all(&text, " ");
    let normalized = squash(&text);
    if normalized.is_empty() || normalized == "unknown_gpu" {
        "Unknown_GPU".to_string()
    } else {
        normalized
    }
}

/// Keep only the CPU family and tier, e.g. `"Intel Core i5-1135G7"` to `"i5"`
pub fn normalize_cpu_model(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    if is_missing(raw) || lowered == "unknown_cpu" {
        return "unknown_cpu".to_string();
    }
    let text = CPU_NOISE.replace_all(&lowered, " ");
    let text = CPU_TIER_PREFIX.replace_all(&text, "$1");
    let text = CPU_TIER.replace_all(&text, "$1");
    let normalized = squash(&text);
    if normalized.is_empty() {
        "unknown_cpu".to_string()
    } else {
        normalized
    }
}

pub fn normalize_os(raw: &str) -> String {
    if is_missing(raw) {
        return "unknown".to_string();
    }
    let os = raw.trim().to_lowercase();
    let android = os.contains("android") || os.contains("wear os");
    let ios = os.contains("ios") || os.contains("watchos") || os.contains("watch os");
    match (android, ios) {
        (true, true) => "android_ios".to_string(),
        (true, false) => "android".to_string(),
        (false, true) => "ios".to_string(),
        (false, false) => os,
    }
}

pub fn normalize_brand(raw: &str) -> String {
    if is_missing(raw) {
        return "unknown".to_string();
    }
    squash(&raw.to_lowercase())
}

/// `"16:9"` becomes `"169"`
pub fn normalize_aspect_ratio(raw: &str) -> String {
    if is_missing(raw) {
        return "unknown".to_string();
    }
    raw.replace(':', "").replace(' ', "").trim().to_string()
}

pub fn normalize_memory_type(raw: &str) -> String {
    if is_missing(raw) {
        return "Unknown".to_string();
    }
    match MEMORY_TYPE.find(raw) {
        Some(m) => m.as_str().to_uppercase(),
        None => squash(raw).to_uppercase(),
    }
}

/// Plain trim-and-collapse for free-text columns
pub fn normalize_plain(raw: &str) -> String {
    if is_missing(raw) {
        return "Unknown".to_string();
    }
    squash(raw)
}

/// Strip listing noise words and punctuation from a product title
pub fn clean_title(raw: &str) -> String {
    let text = TITLE_NOISE.replace_all(raw, " ");
    let text = NON_WORD.replace_all(&text, " ");
    squash(&text)
}

/// First known brand mentioned in the title, compared case-insensitively
pub fn extract_brand(title: &str, known_brands: &[&str]) -> Option<String> {
    let lowered = title.to_lowercase();
    known_brands
        .iter()
        .find(|brand| {
            let needle = brand.to_lowercase();
            lowered
                .split(|c: char| !c.is_alphanumeric() && c != '-')
                .any(|word| word == needle)
                || (needle.contains(' ') && lowered.contains(&needle))
        })
        .map(|brand| brand.to_string())
}

fn brand_score(a: &str, b: &str) -> u8 {
    (strsim::jaro_winkler(a, b) * 100.0).round() as u8
}

/// Known brand closest to `raw`, if it scores above `threshold`.
///
/// The whole value and each of its words are scored, so `"Lenovo Group Ltd"`
/// and misspellings like `"Zotak"` both land on a known brand.
pub fn correct_brand(raw: &str, known_brands: &[&str], threshold: u8) -> Option<String> {
    let lowered = squash(&raw.to_lowercase());
    if lowered.is_empty() {
        return None;
    }
    let words: Vec<&str> = lowered.split(' ').filter(|w| w.len() > 1).collect();

    let mut best: Option<(&str, u8)> = None;
    for brand in known_brands {
        let needle = brand.to_lowercase();
        let score = words
            .iter()
            .map(|w| brand_score(w, &needle))
            .chain(std::iter::once(brand_score(&lowered, &needle)))
            .max()
            .unwrap_or(0);
        if score > threshold && best.map_or(true, |(_, s)| score > s) {
            best = Some((brand, score));
        }
    }
    best.map(|(brand, _)| brand.to_string())
}
