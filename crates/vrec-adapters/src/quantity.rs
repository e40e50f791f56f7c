//! Free-text stock and visitor counts to non-negative integers.
//!
//! Text goes through an ordered rule chain; the first rule that recognizes the
//! text decides the value, and text no rule recognizes counts as `0`. Numeric
//! cells skip the chain and are truncated.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vrec_core::Cell;

use crate::AdapterError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantityError {
    #[error("quantity {0} is negative")]
    Negative(f64),
    #[error("quantity {0} is not a finite number")]
    NotFinite(f64),
    #[error("quantity {0} exceeds the supported range")]
    OutOfRange(f64),
}

/// One step of the chain, as written in `rules/quantity.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuantityRuleSpec {
    /// Blank text or a whole-field negation phrase → 0.
    Zero { phrases: Vec<String> },
    /// "Sold out" phrasing → first number in the text (the original stock), else 0.
    SoldOut { phrases: Vec<String> },
    /// Marker directly followed by a number → that number.
    Approximate { markers: Vec<String> },
    /// `X-Y` with any dash, or `X <connector> Y` → truncated mean.
    Range {
        #[serde(default)]
        connectors: Vec<String>,
    },
    /// First literal integer anywhere in the text.
    FirstInteger,
    /// Vague amount phrase → fixed estimate.
    Vague { phrases: Vec<String>, value: u32 },
    /// `more than N` → N + step, `less than N` → N - step (floored at 0).
    Comparative {
        more: Vec<String>,
        less: Vec<String>,
        step: u32,
        #[serde(default)]
        fallback: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityRuleSet {
    pub rules: Vec<QuantityRuleSpec>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for QuantityRuleSet {
    fn default() -> Self {
        Self {
            rules: vec![
                QuantityRuleSpec::Zero {
                    phrases: strings(&[
                        "nan", "нет", "не было", "отсутствует", "none", "not present", "absent",
                    ]),
                },
                QuantityRuleSpec::SoldOut {
                    phrases: strings(&[
                        "все продано", "всё продано", "всё ушло", "все ушло", "разобрали",
                        "sold out", "all gone",
                    ]),
                },
                QuantityRuleSpec::Approximate {
                    markers: strings(&[
                        "≈", "~", "примерно", "около", "порядка", "approximately", "about",
                    ]),
                },
                QuantityRuleSpec::Range {
                    connectors: strings(&["до", "to"]),
                },
                QuantityRuleSpec::FirstInteger,
                QuantityRuleSpec::Vague {
                    phrases: strings(&["много", "a lot", "many"]),
                    value: 50,
                },
                QuantityRuleSpec::Comparative {
                    more: strings(&["более", "больше", "more than"]),
                    less: strings(&["менее", "меньше", "less than"]),
                    step: 10,
                    fallback: Some(50),
                },
            ],
        }
    }
}

impl QuantityRuleSet {
    pub fn from_yaml_str(text: &str) -> Result<Self, AdapterError> {
        serde_yaml::from_str(text).map_err(|e| AdapterError::Message(format!("invalid quantity rules: {e}")))
    }
}

#[derive(Debug, Clone)]
enum CompiledRule {
    Zero(HashSet<String>),
    SoldOut(Vec<String>),
    Approximate(Regex),
    Range(Regex),
    FirstInteger,
    Vague {
        phrases: Vec<String>,
        value: u32,
    },
    Comparative {
        more: Option<Regex>,
        more_phrases: Vec<String>,
        less: Option<Regex>,
        step: u32,
        fallback: Option<u32>,
    },
}

impl CompiledRule {
    fn name(&self) -> &'static str {
        match self {
            Self::Zero(_) => "zero",
            Self::SoldOut(_) => "sold_out",
            Self::Approximate(_) => "approximate",
            Self::Range(_) => "range",
            Self::FirstInteger => "first_integer",
            Self::Vague { .. } => "vague",
            Self::Comparative { .. } => "comparative",
        }
    }

    /// `text` is already trimmed and lowercased.
    fn apply(&self, text: &str, digits: &Regex) -> Option<u32> {
        match self {
            Self::Zero(phrases) => (text.is_empty() || phrases.contains(text)).then_some(0),
            Self::SoldOut(phrases) => phrases
                .iter()
                .any(|p| text.contains(p.as_str()))
                .then(|| first_integer(text, digits).unwrap_or(0)),
            Self::Approximate(re) => re.captures(text).and_then(|c| c.get(1)).map(|m| parse_count(m.as_str())),
            Self::Range(re) => re.captures(text).and_then(|c| {
                let low = u64::from(parse_count(c.get(1)?.as_str()));
                let high = u64::from(parse_count(c.get(2)?.as_str()));
                Some(((low + high) / 2) as u32)
            }),
            Self::FirstInteger => first_integer(text, digits),
            Self::Vague { phrases, value } => {
                phrases.iter().any(|p| text.contains(p.as_str())).then_some(*value)
            }
            Self::Comparative {
                more,
                more_phrases,
                less,
                step,
                fallback,
            } => {
                if let Some(n) = capture_count(more.as_ref(), text) {
                    return Some(n.saturating_add(*step));
                }
                if let Some(n) = capture_count(less.as_ref(), text) {
                    return Some(n.saturating_sub(*step));
                }
                if more_phrases.iter().any(|p| text.contains(p.as_str())) {
                    return *fallback;
                }
                None
            }
        }
    }
}

/// Compiled, ordered rule chain.
#[derive(Debug, Clone)]
pub struct QuantityExtractor {
    rules: Vec<CompiledRule>,
    digits: Regex,
}

impl QuantityExtractor {
    pub fn new(rule_set: &QuantityRuleSet) -> Result<Self, AdapterError> {
        let rules = rule_set
            .rules
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules,
            digits: Regex::new("[0-9]+")?,
        })
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(CompiledRule::name).collect()
    }

    /// Text never fails: anything unrecognized is `0`.
    pub fn extract_text(&self, raw: &str) -> u32 {
        self.explain_text(raw).0
    }

    /// Value plus the name of the rule that produced it (`None` = fell through).
    pub fn explain_text(&self, raw: &str) -> (u32, Option<&'static str>) {
        let text = raw.trim().to_lowercase();
        self.rules
            .iter()
            .find_map(|rule| rule.apply(&text, &self.digits).map(|v| (v, Some(rule.name()))))
            .unwrap_or((0, None))
    }

    pub fn extract(&self, cell: &Cell) -> Result<u32, QuantityError> {
        match cell {
            Cell::Empty => Ok(0),
            Cell::Number(n) => number_to_count(*n),
            Cell::Text(s) => Ok(self.extract_text(s)),
        }
    }
}

fn compile_rule(spec: &QuantityRuleSpec) -> Result<CompiledRule, regex::Error> {
    Ok(match spec {
        QuantityRuleSpec::Zero { phrases } => CompiledRule::Zero(lowered(phrases).into_iter().collect()),
        QuantityRuleSpec::SoldOut { phrases } => CompiledRule::SoldOut(lowered(phrases)),
        QuantityRuleSpec::Approximate { markers } => {
            let markers = alternation(markers);
            CompiledRule::Approximate(Regex::new(&format!(r"(?:{markers})\s*([0-9]+)"))?)
        }
        QuantityRuleSpec::Range { connectors } => {
            let pattern = if connectors.is_empty() {
                r"([0-9]+)\s*[\-–—−]\s*([0-9]+)".to_string()
            } else {
                format!(
                    r"([0-9]+)\s*(?:[\-–—−]|\s(?:{})\s)\s*([0-9]+)",
                    alternation(connectors)
                )
            };
            CompiledRule::Range(Regex::new(&pattern)?)
        }
        QuantityRuleSpec::FirstInteger => CompiledRule::FirstInteger,
        QuantityRuleSpec::Vague { phrases, value } => CompiledRule::Vague {
            phrases: lowered(phrases),
            value: *value,
        },
        QuantityRuleSpec::Comparative {
            more,
            less,
            step,
            fallback,
        } => CompiledRule::Comparative {
            more: phrase_then_number(more)?,
            more_phrases: lowered(more),
            less: phrase_then_number(less)?,
            step: *step,
            fallback: *fallback,
        },
    })
}

fn lowered(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Escaped alternation body, longest phrases first.
fn alternation(values: &[String]) -> String {
    let mut values = lowered(values);
    values.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    values.iter().map(|v| regex::escape(v)).collect::<Vec<_>>().join("|")
}

fn phrase_then_number(phrases: &[String]) -> Result<Option<Regex>, regex::Error> {
    if lowered(phrases).is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"(?:{})\s*([0-9]+)", alternation(phrases))).map(Some)
}

fn capture_count(re: Option<&Regex>, text: &str) -> Option<u32> {
    re?.captures(text)?.get(1).map(|m| parse_count(m.as_str()))
}

fn first_integer(text: &str, digits: &Regex) -> Option<u32> {
    digits.find(text).map(|m| parse_count(m.as_str()))
}

/// Digit runs too long for `u32` saturate.
fn parse_count(digits: &str) -> u32 {
    digits.parse::<u32>().unwrap_or(u32::MAX)
}

fn number_to_count(n: f64) -> Result<u32, QuantityError> {
    if n.is_nan() {
        return Ok(0);
    }
    if !n.is_finite() {
        return Err(QuantityError::NotFinite(n));
    }
    let whole = n.trunc();
    if whole < 0.0 {
        return Err(QuantityError::Negative(n));
    }
    if whole > f64::from(u32::MAX) {
        return Err(QuantityError::OutOfRange(n));
    }
    Ok(whole as u32)
}
