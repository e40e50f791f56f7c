//! Reconciliation pipeline: pair morning and evening submissions per day and
//! turn accepted pairs into sales reports.

pub mod aggregate;
pub mod assignment;
pub mod config;
pub mod metrics;
pub mod scoring;
pub mod session;

use std::collections::{BTreeMap, HashSet};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;
use vrec_adapters::{
    count_rows_on, AddressMatcher, QuantityExtractor, RowRejection, SubmissionAdapter,
    TextNormalizer, Vocabulary,
};
use vrec_core::{
    ColumnMapping, Dataset, EveningSubmission, MatchedReport, MorningSubmission, Summary,
};

pub use aggregate::summarize;
pub use config::EngineConfig;
pub use metrics::{MetricsCalculator, ReportError};
pub use scoring::{PairScore, PairScorer, ScoreMatrix};
pub use session::{DaySession, DedupRegistry};

pub const CRATE_NAME: &str = "vrec-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSide {
    Morning,
    Evening,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedRow {
    pub side: FeedSide,
    #[serde(flatten)]
    pub rejection: RowRejection,
}

/// Best available pairing that still fell short of the acceptance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedPair {
    pub date: NaiveDate,
    pub morning_row: usize,
    pub evening_row: usize,
    pub score: PairScore,
}

/// Accepted pair that produced no report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedPair {
    pub date: NaiveDate,
    pub morning_row: usize,
    pub evening_row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub run_id: Uuid,
    /// New reports, ordered by date then morning row.
    pub reports: Vec<MatchedReport>,
    pub below_threshold: Vec<RejectedPair>,
    pub skipped_duplicates: usize,
    pub dropped: Vec<DroppedPair>,
    pub excluded_rows: Vec<ExcludedRow>,
}

type DayBucket<'a> = (Vec<&'a MorningSubmission>, Vec<&'a EveningSubmission>);

pub struct Reconciler {
    config: EngineConfig,
    normalizer: TextNormalizer,
    extractor: QuantityExtractor,
    addresses: AddressMatcher,
}

impl Reconciler {
    pub fn new(config: EngineConfig, vocabulary: &Vocabulary) -> Result<Self> {
        let normalizer =
            TextNormalizer::new(&vocabulary.normalizer).context("compiling normalizer vocabulary")?;
        let extractor =
            QuantityExtractor::new(&vocabulary.quantity).context("compiling quantity rules")?;
        let addresses = AddressMatcher::new(&vocabulary.addresses)
            .context("compiling address catalog")?
            .with_thresholds(config.canonical_threshold, config.address_match_threshold);
        Ok(Self {
            config,
            normalizer,
            extractor,
            addresses,
        })
    }

    /// Engine with vocabulary read from `<workspace_root>/rules`.
    pub fn from_workspace(config: EngineConfig) -> Result<Self> {
        let vocabulary = Vocabulary::from_workspace_root(&config.workspace_root)
            .with_context(|| format!("loading rules from {}", config.workspace_root.display()))?;
        Self::new(config, &vocabulary)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn address_matcher(&self) -> &AddressMatcher {
        &self.addresses
    }

    pub fn quantity_extractor(&self) -> &QuantityExtractor {
        &self.extractor
    }

    /// Match both feeds date by date and record new reports in `session`.
    ///
    /// Row and pair faults are collected in the outcome; only an unusable
    /// column mapping fails the call.
    pub fn reconcile(
        &self,
        morning: &Dataset,
        evening: &Dataset,
        mapping: &ColumnMapping,
        session: &mut DaySession,
    ) -> Result<ReconcileOutcome> {
        validate_mapping(mapping)?;
        let run_id = Uuid::new_v4();
        let span = info_span!("reconcile", %run_id, day = %session.day());
        let _guard = span.enter();

        let adapter = SubmissionAdapter::new(mapping, &self.normalizer, &self.config.parse);
        let mornings = adapter.morning(morning);
        let evenings = adapter.evening(evening);

        let mut outcome = ReconcileOutcome {
            run_id,
            reports: Vec::new(),
            below_threshold: Vec::new(),
            skipped_duplicates: 0,
            dropped: Vec::new(),
            excluded_rows: Vec::new(),
        };
        for (side, rejected) in [
            (FeedSide::Morning, mornings.rejected),
            (FeedSide::Evening, evenings.rejected),
        ] {
            for rejection in rejected {
                warn!(
                    ?side,
                    row = rejection.row,
                    column = %rejection.column,
                    value = ?rejection.value,
                    "row excluded: {}",
                    rejection.reason
                );
                outcome.excluded_rows.push(ExcludedRow { side, rejection });
            }
        }

        let mut days: BTreeMap<NaiveDate, DayBucket<'_>> = BTreeMap::new();
        for m in &mornings.accepted {
            days.entry(m.date).or_default().0.push(m);
        }
        for e in &evenings.accepted {
            days.entry(e.date).or_default().1.push(e);
        }

        let scorer = PairScorer::new(self.config.name_weight, self.config.address_weight);
        let calculator = MetricsCalculator::new(&self.extractor, self.config.target_conversion);
        for (date, (day_mornings, day_evenings)) in &days {
            let matrix = scorer.matrix(day_mornings, day_evenings);
            for pair in assignment::solve(&matrix) {
                let m = day_mornings[pair.morning];
                let e = day_evenings[pair.evening];
                if pair.score.combined < self.config.acceptance_threshold {
                    debug!(
                        %date,
                        score = pair.score.combined,
                        morning = %m.identity_key(),
                        evening_employee = %e.employee.normalized,
                        evening_address = %e.address.normalized,
                        "pair below acceptance threshold"
                    );
                    outcome.below_threshold.push(RejectedPair {
                        date: *date,
                        morning_row: m.row,
                        evening_row: e.row,
                        score: pair.score,
                    });
                    continue;
                }

                let key = m.identity_key();
                if session.is_emitted(&key) {
                    debug!(%key, "report already emitted today");
                    outcome.skipped_duplicates += 1;
                    continue;
                }

                match calculator.build_report(m, e, pair.score.combined) {
                    Ok(report) => {
                        if session.record(report.clone()) {
                            info!(
                                %key,
                                score = pair.score.combined,
                                total_sold = report.total_sold,
                                efficiency = report.efficiency,
                                "matched visit"
                            );
                            outcome.reports.push(report);
                        } else {
                            outcome.skipped_duplicates += 1;
                        }
                    }
                    Err(err) => {
                        warn!(%date, morning_row = m.row, evening_row = e.row, "pair dropped: {err}");
                        outcome.dropped.push(DroppedPair {
                            date: *date,
                            morning_row: m.row,
                            evening_row: e.row,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            dates = days.len(),
            reports = outcome.reports.len(),
            below_threshold = outcome.below_threshold.len(),
            duplicates = outcome.skipped_duplicates,
            dropped = outcome.dropped.len(),
            excluded = outcome.excluded_rows.len(),
            "reconciliation finished"
        );
        Ok(outcome)
    }

    /// Morning rows dated `day`: the visits that should produce a report.
    pub fn expected_visits(&self, morning: &Dataset, mapping: &ColumnMapping, day: NaiveDate) -> usize {
        count_rows_on(morning, &mapping.morning.date, day, &self.config.parse)
    }

    /// Summary of the session's day, or `None` when no visit was expected.
    pub fn summarize_day(
        &self,
        morning: &Dataset,
        mapping: &ColumnMapping,
        session: &DaySession,
    ) -> Option<Summary> {
        let day = session.day();
        let expected = self.expected_visits(morning, mapping, day);
        if expected == 0 {
            info!(%day, "no visits expected; skipping summary");
            return None;
        }
        let reports = session
            .reports()
            .iter()
            .filter(|r| r.date == day)
            .cloned()
            .collect::<Vec<_>>();
        let summary = summarize(&reports, expected, reports.len());
        if let Some(s) = &summary {
            info!(
                %day,
                stores = s.total_stores,
                total_sold = s.total_sold,
                missing = s.missing_reports,
                "day summary built"
            );
        }
        summary
    }
}

fn validate_mapping(mapping: &ColumnMapping) -> Result<()> {
    let required = [
        ("morning.employee_name", &mapping.morning.employee_name),
        ("morning.address", &mapping.morning.address),
        ("morning.date", &mapping.morning.date),
        ("evening.employee_name", &mapping.evening.employee_name),
        ("evening.address", &mapping.evening.address),
        ("evening.date", &mapping.evening.date),
        ("evening.visitors", &mapping.evening.visitors),
    ];
    for (field, column) in required {
        if column.trim().is_empty() {
            bail!("column mapping field {field} is empty");
        }
    }
    let mut seen = HashSet::new();
    for product in &mapping.products {
        if !seen.insert(product.name.as_str()) {
            bail!("product {} is mapped twice", product.name);
        }
    }
    Ok(())
}
