use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use vrec_adapters::AddressMatcher;
use vrec_core::{IdentityKey, MatchedReport};

/// Identity keys already emitted within the current reporting day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRegistry {
    keys: BTreeSet<IdentityKey>,
}

impl DedupRegistry {
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.keys.contains(key)
    }

    /// `false` if the key was already present.
    pub fn insert(&mut self, key: IdentityKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Per-day state carried between reconciliation runs. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySession {
    day: NaiveDate,
    registry: DedupRegistry,
    reports: Vec<MatchedReport>,
}

impl DaySession {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            registry: DedupRegistry::default(),
            reports: Vec::new(),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn reports(&self) -> &[MatchedReport] {
        &self.reports
    }

    pub fn registry(&self) -> &DedupRegistry {
        &self.registry
    }

    pub fn is_emitted(&self, key: &IdentityKey) -> bool {
        self.registry.contains(key)
    }

    /// Keeps the report unless its identity key was already emitted today.
    pub fn record(&mut self, report: MatchedReport) -> bool {
        if !self.registry.insert(report.identity_key.clone()) {
            return false;
        }
        self.reports.push(report);
        true
    }

    /// Start a new reporting day, handing back the previous day's reports.
    pub fn rollover(&mut self, day: NaiveDate) -> Vec<MatchedReport> {
        info!(from = %self.day, to = %day, reports = self.reports.len(), "day rollover");
        self.day = day;
        self.registry.clear();
        std::mem::take(&mut self.reports)
    }

    /// First of today's reports whose store address matches the free-text `address`.
    pub fn find_by_address(&self, matcher: &AddressMatcher, address: &str) -> Option<&MatchedReport> {
        self.reports
            .iter()
            .find(|report| matcher.matches(address, &report.address))
    }
}
