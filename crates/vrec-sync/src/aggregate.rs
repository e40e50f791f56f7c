//! Folding matched reports into leaderboards and completeness stats.

use std::collections::HashMap;

use vrec_core::{round_to_tenth, DimensionStats, Leader, MatchedReport, ProductTotal, Summary};

/// Groups keyed by name, remembering first-seen order for tie-breaks.
#[derive(Debug, Default)]
struct Tally<T> {
    index: HashMap<String, usize>,
    entries: Vec<(String, T)>,
}

impl<T: Default> Tally<T> {
    fn entry(&mut self, name: &str) -> &mut T {
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                self.entries.push((name.to_string(), T::default()));
                self.index.insert(name.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    /// Largest by `key`; the earliest group wins a tie.
    fn best_by(&self, key: impl Fn(&T) -> u64) -> Option<Leader> {
        let mut best: Option<(&str, u64)> = None;
        for (name, value) in &self.entries {
            let total = key(value);
            if best.map_or(true, |(_, top)| total > top) {
                best = Some((name, total));
            }
        }
        best.map(|(name, total_sold)| Leader {
            name: name.to_string(),
            total_sold,
        })
    }
}

#[derive(Debug, Default)]
struct Group {
    stores: usize,
    total_sold: u64,
    visitors: u64,
    efficiency_sum: f64,
}

impl Group {
    fn add(&mut self, report: &MatchedReport) {
        self.stores += 1;
        self.total_sold += report.total_sold;
        self.visitors += u64::from(report.visitors);
        self.efficiency_sum += report.efficiency;
    }
}

fn breakdown(tally: Tally<Group>) -> Vec<DimensionStats> {
    let mut stats = tally
        .entries
        .into_iter()
        .map(|(name, g)| DimensionStats {
            name,
            stores: g.stores,
            total_sold: g.total_sold,
            visitors: g.visitors,
            average_efficiency: round_to_tenth(g.efficiency_sum / g.stores as f64),
        })
        .collect::<Vec<_>>();
    // stable: equal totals keep first-seen order
    stats.sort_by(|a, b| b.total_sold.cmp(&a.total_sold));
    stats
}

/// `None` for an empty collection. `missing_reports` is signed and may go negative.
pub fn summarize(reports: &[MatchedReport], expected: usize, actual: usize) -> Option<Summary> {
    if reports.is_empty() {
        return None;
    }

    let mut cities = Tally::<Group>::default();
    let mut networks = Tally::<Group>::default();
    let mut employees = Tally::<u64>::default();
    let mut products = Tally::<u64>::default();
    for report in reports {
        cities.entry(&report.city).add(report);
        networks.entry(&report.network).add(report);
        *employees.entry(&report.employee) += report.total_sold;
        for sales in &report.products {
            *products.entry(&sales.product) += u64::from(sales.sold);
        }
    }

    let best_city = cities.best_by(|g| g.total_sold)?;
    let best_network = networks.best_by(|g| g.total_sold)?;
    let best_employee = employees.best_by(|&sold| sold)?;
    let best_product = products.best_by(|&sold| sold);

    let efficiency_sum: f64 = reports.iter().map(|r| r.efficiency).sum();
    Some(Summary {
        best_city,
        best_network,
        best_employee,
        best_product,
        total_stores: reports.len(),
        expected_reports: expected,
        actual_reports: actual,
        missing_reports: expected as i64 - actual as i64,
        total_sold: reports.iter().map(|r| r.total_sold).sum(),
        total_visitors: reports.iter().map(|r| u64::from(r.visitors)).sum(),
        average_efficiency: round_to_tenth(efficiency_sum / reports.len() as f64),
        cities: breakdown(cities),
        networks: breakdown(networks),
        products: products
            .entries
            .into_iter()
            .map(|(product, sold)| ProductTotal { product, sold })
            .collect(),
    })
}
