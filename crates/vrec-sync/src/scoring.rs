//! Same-day pairwise scoring of morning against evening submissions.

use serde::{Deserialize, Serialize};
use vrec_adapters::similarity::token_set_ratio;
use vrec_core::{EveningSubmission, MorningSubmission};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub name: f64,
    pub address: f64,
    pub combined: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PairScorer {
    name_weight: f64,
    address_weight: f64,
}

impl PairScorer {
    pub fn new(name_weight: f64, address_weight: f64) -> Self {
        Self {
            name_weight,
            address_weight,
        }
    }

    /// A strong address match is never outweighed by a weak name match.
    pub fn score(&self, morning: &MorningSubmission, evening: &EveningSubmission) -> PairScore {
        let name = token_set_ratio(&morning.employee.normalized, &evening.employee.normalized);
        let address = token_set_ratio(&morning.address.normalized, &evening.address.normalized);
        let weighted = self.name_weight * name + self.address_weight * address;
        PairScore {
            name,
            address,
            combined: weighted.max(address),
        }
    }

    pub fn matrix(&self, morning: &[&MorningSubmission], evening: &[&EveningSubmission]) -> ScoreMatrix {
        let mut scores = Vec::with_capacity(morning.len() * evening.len());
        for m in morning {
            for e in evening {
                scores.push(self.score(m, e));
            }
        }
        ScoreMatrix {
            rows: morning.len(),
            columns: evening.len(),
            scores,
        }
    }
}

/// Row-major `morning × evening` grid of pair scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    rows: usize,
    columns: usize,
    scores: Vec<PairScore>,
}

impl ScoreMatrix {
    pub fn from_combined(rows: usize, columns: usize, combined: &[f64]) -> Option<Self> {
        if combined.len() != rows * columns {
            return None;
        }
        Some(Self {
            rows,
            columns,
            scores: combined
                .iter()
                .map(|&c| PairScore {
                    name: c,
                    address: c,
                    combined: c,
                })
                .collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns == 0
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&PairScore> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.scores.get(row * self.columns + column)
    }
}
