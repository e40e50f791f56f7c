//! Canonicalization of free-text employee names and store addresses.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::AdapterError;

/// Locale vocabulary stripped before comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerVocabulary {
    /// Street-type words, settlement prefixes and store-chain names.
    #[serde(default)]
    pub address_noise: Vec<String>,
    /// Honorifics and role words that show up next to employee names.
    #[serde(default)]
    pub name_noise: Vec<String>,
}

impl Default for NormalizerVocabulary {
    fn default() -> Self {
        Self {
            address_noise: [
                "тц", "тк", "трц", "магнит", "мария-ра", "мария ра", "марияра", "мария", "ашан",
                "пятёрочка", "пятерочка", "перекрёсток", "перекресток", "г", "город", "ул",
                "улица", "проспект", "пр", "дом", "д", "карла",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            name_noise: ["промоутер", "сотрудник"].into_iter().map(String::from).collect(),
        }
    }
}

/// Builds comparable token strings. Absent or garbage input yields `""`.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    address_noise: Option<Regex>,
    address_symbols: Regex,
    name_noise: HashSet<String>,
}

impl TextNormalizer {
    pub fn new(vocabulary: &NormalizerVocabulary) -> Result<Self, AdapterError> {
        Ok(Self {
            address_noise: word_alternation(&vocabulary.address_noise)?,
            address_symbols: Regex::new(r"[^\w\s/,.\-]")?,
            name_noise: vocabulary
                .name_noise
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        })
    }

    /// Lowercase, drop noise words and symbols, then sort the remaining tokens so
    /// word order stops mattering.
    pub fn address(&self, raw: &str) -> String {
        let lower = raw.trim().to_lowercase();
        let stripped = match &self.address_noise {
            Some(re) => re.replace_all(&lower, " ").into_owned(),
            None => lower,
        };
        let cleaned = self.address_symbols.replace_all(&stripped, " ");
        let mut tokens = cleaned
            .split_whitespace()
            .map(|t| t.trim_matches(|c| c == ',' || c == '.'))
            .filter(|t| t.chars().count() > 1)
            .collect::<Vec<_>>();
        tokens.sort_unstable();
        tokens.join(" ")
    }

    /// Alphabetic tokens only, sorted, capped at three to tolerate an extra or
    /// missing patronymic.
    pub fn employee(&self, raw: &str) -> String {
        let lower = raw.to_lowercase();
        let mut tokens = lower
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| t.chars().count() > 1)
            .filter(|t| !self.name_noise.contains(*t))
            .collect::<Vec<_>>();
        tokens.sort_unstable();
        tokens.truncate(3);
        tokens.join(" ")
    }
}

/// Whole-word alternation, longest entries first. A word ending in a letter or
/// digit also swallows one trailing dot (`ул.`).
pub(crate) fn word_alternation(words: &[String]) -> Result<Option<Regex>, regex::Error> {
    let mut words = words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>();
    if words.is_empty() {
        return Ok(None);
    }
    words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
    words.dedup();

    let alternation = words
        .iter()
        .map(|w| {
            let escaped = regex::escape(w);
            if w.ends_with(char::is_alphanumeric) {
                format!(r"{escaped}(?:\.|\b)")
            } else {
                escaped
            }
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})")).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::new(&NormalizerVocabulary::default()).unwrap()
    }

    #[test]
    fn address_spellings_converge() {
        let n = normalizer();
        let a = n.address("г. Москва, ул. Ленина, 10 (ТЦ Магнит)");
        let b = n.address("  Ленина улица 10,   москва  ");
        let c = n.address("МОСКВА г.,Ленина ул. 10");
        assert_eq!(a, "10 ленина москва");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn address_keeps_inner_separators() {
        let n = normalizer();
        assert_eq!(n.address("Ростов-на-Дону, Садовая 18/2"), "18/2 ростов-на-дону садовая");
        // only whitespace separates tokens; a comma between words stays inside one
        assert_eq!(n.address("Москва,Ленина 10"), "10 москва,ленина");
    }

    #[test]
    fn noise_word_inside_longer_word_survives() {
        let n = normalizer();
        // "г" and "д" are noise only as standalone words
        assert_eq!(n.address("Гагарина 15, Дзержинский"), "15 гагарина дзержинский");
    }

    #[test]
    fn chain_names_are_removed() {
        let n = normalizer();
        assert_eq!(n.address("Пятёрочка, Кирова 15"), n.address("Кирова 15"));
        assert_eq!(n.address("Мария-Ра Вайнера 12"), "12 вайнера");
    }

    #[test]
    fn empty_and_symbol_only_input() {
        let n = normalizer();
        assert_eq!(n.address(""), "");
        assert_eq!(n.address("  !!! ** "), "");
        assert_eq!(n.employee(""), "");
        assert_eq!(n.employee("1234 --"), "");
    }

    #[test]
    fn employee_tokens_sorted_and_capped() {
        let n = normalizer();
        assert_eq!(n.employee("Иванова Анна Сергеевна"), "анна иванова сергеевна");
        assert_eq!(n.employee("анна  ИВАНОВА"), "анна иванова");
        assert_eq!(n.employee("Промоутер: Иванова А. Анна"), "анна иванова");
        assert_eq!(
            n.employee("Zeta Alpha Mike Bravo"),
            "alpha bravo mike"
        );
    }

    #[test]
    fn empty_vocabulary_compiles() {
        let n = TextNormalizer::new(&NormalizerVocabulary {
            address_noise: vec![],
            name_noise: vec![],
        })
        .unwrap();
        assert_eq!(n.address("ул. Ленина 10"), "10 ленина ул");
    }
}
