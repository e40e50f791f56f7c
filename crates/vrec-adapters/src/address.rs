//! Address-only matching against a catalog of canonical store addresses.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::similarity::token_sort_ratio;
use crate::AdapterError;

pub const DEFAULT_CANONICAL_THRESHOLD: f64 = 0.80;
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.85;

/// Spelling variants collapsed onto one canonical abbreviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abbreviation {
    pub canonical: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressCatalog {
    #[serde(default)]
    pub canonical_addresses: Vec<String>,
    #[serde(default)]
    pub abbreviations: Vec<Abbreviation>,
}

impl Default for AddressCatalog {
    fn default() -> Self {
        let abbr = |canonical: &str, variants: &[&str]| Abbreviation {
            canonical: canonical.to_string(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        };
        Self {
            canonical_addresses: Vec::new(),
            abbreviations: vec![
                abbr("ул.", &["улица", "ул."]),
                abbr("пр.", &["проспект", "пр."]),
                abbr("г.", &["город", "г."]),
                abbr("тц", &["торговый центр", "тц"]),
            ],
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledAbbreviation {
    pattern: Regex,
    canonical: String,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    display: String,
    comparable: String,
}

/// Snaps free-text addresses to catalog entries and decides whether two
/// addresses name the same store.
#[derive(Debug, Clone)]
pub struct AddressMatcher {
    abbreviations: Vec<CompiledAbbreviation>,
    symbols: Regex,
    catalog: Vec<CatalogEntry>,
    canonical_threshold: f64,
    match_threshold: f64,
}

impl AddressMatcher {
    pub fn new(catalog: &AddressCatalog) -> Result<Self, AdapterError> {
        let mut abbreviations = Vec::with_capacity(catalog.abbreviations.len());
        for abbr in &catalog.abbreviations {
            if let Some(pattern) = variant_alternation(&abbr.variants)? {
                abbreviations.push(CompiledAbbreviation {
                    pattern,
                    canonical: abbr.canonical.to_lowercase(),
                });
            }
        }

        Ok(Self {
            abbreviations,
            symbols: Regex::new(r"[^\w\s.,\-]")?,
            catalog: catalog
                .canonical_addresses
                .iter()
                .map(|display| CatalogEntry {
                    display: display.clone(),
                    comparable: comparable(display),
                })
                .collect(),
            canonical_threshold: DEFAULT_CANONICAL_THRESHOLD,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        })
    }

    pub fn with_thresholds(mut self, canonical_threshold: f64, match_threshold: f64) -> Self {
        self.canonical_threshold = canonical_threshold;
        self.match_threshold = match_threshold;
        self
    }

    /// Cleaned address, or the catalog entry it resembles closely enough.
    pub fn canonicalize(&self, raw: &str) -> String {
        let mut address = raw.trim().to_lowercase();
        if address.is_empty() {
            return address;
        }
        for abbr in &self.abbreviations {
            address = abbr
                .pattern
                .replace_all(&address, abbr.canonical.as_str())
                .into_owned();
        }
        let address = self.symbols.replace_all(&address, "");
        let address = address.split_whitespace().collect::<Vec<_>>().join(" ");

        let probe = comparable(&address);
        let best = self
            .catalog
            .iter()
            .map(|entry| (entry, token_sort_ratio(&probe, &entry.comparable)))
            .fold(None::<(&CatalogEntry, f64)>, |best, (entry, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((entry, score)),
            });

        match best {
            Some((entry, score)) if score > self.canonical_threshold => entry.display.clone(),
            _ => address,
        }
    }

    pub fn matches(&self, a: &str, b: &str) -> bool {
        let a = comparable(&self.canonicalize(a));
        let b = comparable(&self.canonicalize(b));
        token_sort_ratio(&a, &b) > self.match_threshold
    }
}

/// Lowercase alphanumerics separated by single spaces.
fn comparable(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn variant_alternation(variants: &[String]) -> Result<Option<Regex>, regex::Error> {
    let mut variants = variants
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>();
    if variants.is_empty() {
        return Ok(None);
    }
    variants.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
    variants.dedup();

    let alternation = variants
        .iter()
        .map(|v| {
            let mut pattern = regex::escape(v);
            if v.starts_with(char::is_alphanumeric) {
                pattern.insert_str(0, r"\b");
            }
            if v.ends_with(char::is_alphanumeric) {
                pattern.push_str(r"\b");
            }
            pattern
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?:{alternation})")).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> AddressCatalog {
        AddressCatalog {
            canonical_addresses: vec![
                "г. Москва, ул. Ленина, 10".to_string(),
                "г. Казань, ул. Баумана, 5".to_string(),
            ],
            ..AddressCatalog::default()
        }
    }

    #[test]
    fn abbreviations_are_unified() {
        let matcher = AddressMatcher::new(&AddressCatalog::default()).unwrap();
        assert_eq!(
            matcher.canonicalize("Город Самара, улица Куйбышева 12"),
            "г. самара, ул. куйбышева 12"
        );
        assert_eq!(matcher.canonicalize("ТЦ «Мега», проспект Мира"), "тц мега, пр. мира");
    }

    #[test]
    fn close_spelling_snaps_to_catalog() {
        let matcher = AddressMatcher::new(&catalog()).unwrap();
        assert_eq!(
            matcher.canonicalize("город Москва улица Ленина 10"),
            "г. Москва, ул. Ленина, 10"
        );
        assert_eq!(
            matcher.canonicalize("г. Омск, ул. Ленина, 20"),
            "г. омск, ул. ленина, 20"
        );
    }

    #[test]
    fn matches_same_store_only() {
        let matcher = AddressMatcher::new(&catalog()).unwrap();
        assert!(matcher.matches("Москва, Ленина ул., 10", "г. Москва, улица Ленина, 10"));
        assert!(!matcher.matches("г. Москва, ул. Ленина, 10", "г. Казань, ул. Баумана, 5"));
        assert!(!matcher.matches("", ""));
    }

    #[test]
    fn thresholds_are_overridable() {
        let strict = AddressMatcher::new(&AddressCatalog::default())
            .unwrap()
            .with_thresholds(0.99, 0.99);
        assert!(!strict.matches("ул. Ленина 10", "ул. Ленина 12"));
        let loose = AddressMatcher::new(&AddressCatalog::default())
            .unwrap()
            .with_thresholds(0.5, 0.5);
        assert!(loose.matches("ул. Ленина 10", "ул. Ленина 12"));
    }
}
