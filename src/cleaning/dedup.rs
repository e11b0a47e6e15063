use crate::models::Listing;
use std::collections::HashMap;

/// Identity used for within-platform duplicate detection
pub fn dedup_key(listing: &Listing, key_columns: &[&str]) -> Vec<String> {
    let mut key = vec![listing.platform.to_string()];
    for column in key_columns {
        let value = match *column {
            "title" => listing.title.trim().to_lowercase(),
            _ => listing
                .spec(column)
                .map(|v| v.to_string().trim().to_lowercase())
                .unwrap_or_default(),
        };
        key.push(value);
    }
    key
}

fn cheaper(candidate: Option<f64>, current: Option<f64>) -> bool {
    match (candidate, current) {
        (Some(c), Some(cur)) => c < cur,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Keep one listing per key: the one with the minimum price.
///
/// Ties keep the first seen; unpriced listings lose to any priced one.
/// Output follows the order in which keys first appear.
pub fn dedup_min_price(listings: Vec<Listing>, key_columns: &[&str]) -> Vec<Listing> {
    let mut slots: HashMap<Vec<String>, usize> = HashMap::new();
    let mut kept: Vec<Listing> = Vec::new();

    for listing in listings {
        let key = dedup_key(&listing, key_columns);
        match slots.get(&key) {
            Some(&idx) => {
                if cheaper(listing.price, kept[idx].price) {
                    kept[idx] = listing;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(listing);
            }
        }
    }
    kept
}
