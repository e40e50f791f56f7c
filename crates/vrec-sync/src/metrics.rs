use thiserror::Error;
use vrec_adapters::{QuantityError, QuantityExtractor};
use vrec_core::{
    round_to_tenth, Cell, EveningSubmission, MatchedReport, MorningSubmission, ProductSales, StockField,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    #[error("evening row {row} has no visitor column")]
    MissingVisitors { row: usize },
    #[error("uninterpretable {field}: {source}")]
    Quantity {
        field: String,
        #[source]
        source: QuantityError,
    },
}

/// Turns an accepted morning/evening pair into a [`MatchedReport`].
#[derive(Debug, Clone, Copy)]
pub struct MetricsCalculator<'a> {
    extractor: &'a QuantityExtractor,
    target_conversion: f64,
}

impl<'a> MetricsCalculator<'a> {
    pub fn new(extractor: &'a QuantityExtractor, target_conversion: f64) -> Self {
        Self {
            extractor,
            target_conversion,
        }
    }

    pub fn build_report(
        &self,
        morning: &MorningSubmission,
        evening: &EveningSubmission,
        match_score: f64,
    ) -> Result<MatchedReport, ReportError> {
        let visitors_cell = evening
            .visitors
            .as_ref()
            .ok_or(ReportError::MissingVisitors { row: evening.row })?;
        let visitors = self.quantity("visitors", visitors_cell)?;

        let mut products = Vec::with_capacity(morning.start_stock.len());
        for start_field in &morning.start_stock {
            let start = self.stock(start_field, "start")?;
            let end = match evening.end_stock.iter().find(|f| f.product == start_field.product) {
                Some(end_field) => self.stock(end_field, "end")?,
                None => 0,
            };
            products.push(ProductSales::new(start_field.product.clone(), start, end));
        }

        let total_sold: u64 = products.iter().map(|p| u64::from(p.sold)).sum();
        let total_start: u64 = products.iter().map(|p| u64::from(p.start)).sum();
        let (conversion, stock_factor) = if visitors > 0 {
            let visitors = f64::from(visitors);
            (
                total_sold as f64 / visitors,
                (total_start as f64 / (visitors * 2.0)).min(1.0),
            )
        } else {
            (0.0, 1.0)
        };
        let efficiency = if self.target_conversion > 0.0 {
            round_to_tenth(conversion / self.target_conversion * 100.0 * stock_factor)
        } else {
            0.0
        };

        Ok(MatchedReport {
            identity_key: morning.identity_key(),
            date: morning.date,
            city: evening.city.clone(),
            network: evening.network.clone(),
            employee: evening.employee.raw.clone(),
            address: evening.address.raw.clone(),
            normalized_address: evening.address.normalized.clone(),
            visitors,
            products,
            total_sold,
            conversion,
            stock_factor,
            efficiency,
            match_score,
            morning_row: morning.row,
            evening_row: evening.row,
        })
    }

    fn stock(&self, field: &StockField, side: &str) -> Result<u32, ReportError> {
        self.quantity(&format!("{} {side} stock", field.product), &field.value)
    }

    fn quantity(&self, field: &str, cell: &Cell) -> Result<u32, ReportError> {
        self.extractor.extract(cell).map_err(|source| ReportError::Quantity {
            field: field.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use vrec_adapters::QuantityRuleSet;
    use vrec_core::NormalizedText;

    fn text(raw: &str, normalized: &str) -> NormalizedText {
        NormalizedText {
            raw: raw.to_string(),
            normalized: normalized.to_string(),
        }
    }

    fn stock(values: &[Cell]) -> Vec<StockField> {
        ["Лёгкий", "Голландский", "Тильзитер", "Манжерок"]
            .iter()
            .zip(values)
            .map(|(p, v)| StockField {
                product: p.to_string(),
                value: v.clone(),
            })
            .collect()
    }

    fn pair(start: &[Cell], end: &[Cell], visitors: Option<Cell>) -> (MorningSubmission, EveningSubmission) {
        let date = NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
        let morning = MorningSubmission {
            row: 3,
            date,
            timestamp: None,
            employee: text("Иванова Анна", "анна иванова"),
            city: "Москва".into(),
            network: "Магнит".into(),
            address: text("ул. Ленина, 10", "10 ленина"),
            start_stock: stock(start),
        };
        let evening = EveningSubmission {
            row: 7,
            date,
            timestamp: None,
            employee: text("Анна Иванова", "анна иванова"),
            city: "Москва".into(),
            network: "Магнит".into(),
            address: text("Ленина 10", "10 ленина"),
            visitors,
            end_stock: stock(end),
        };
        (morning, evening)
    }

    fn nums(values: &[f64]) -> Vec<Cell> {
        values.iter().map(|&v| Cell::Number(v)).collect()
    }

    #[test]
    fn worked_example_scores_180() {
        let extractor = QuantityExtractor::new(&QuantityRuleSet::default()).unwrap();
        let calc = MetricsCalculator::new(&extractor, 0.5);
        let (m, e) = pair(
            &nums(&[10.0, 5.0, 0.0, 0.0]),
            &nums(&[2.0, 1.0, 0.0, 0.0]),
            Some(Cell::Number(10.0)),
        );
        let report = calc.build_report(&m, &e, 0.93).unwrap();
        let sold: Vec<u32> = report.products.iter().map(|p| p.sold).collect();
        assert_eq!(sold, vec![8, 4, 0, 0]);
        assert_eq!(report.total_sold, 12);
        assert!((report.conversion - 1.2).abs() < 1e-9);
        assert_eq!(report.stock_factor, 0.75);
        assert_eq!(report.efficiency, 180.0);
        assert_eq!(report.visitors, 10);
        assert_eq!(report.morning_row, 3);
        assert_eq!(report.evening_row, 7);
        assert_eq!(report.identity_key.as_str(), "2025-10-31_анна иванова_10 ленина");
    }

    #[test]
    fn display_fields_come_from_evening_key_from_morning() {
        let extractor = QuantityExtractor::new(&QuantityRuleSet::default()).unwrap();
        let calc = MetricsCalculator::new(&extractor, 0.5);
        let (mut m, mut e) = pair(&nums(&[5.0]), &nums(&[1.0]), Some(Cell::Number(4.0)));
        m.employee = text("Петров Пётр", "петров пётр");
        m.city = "г. Казань".into();
        m.network = "АШАН".into();
        m.address = text("г. Казань, ул. Баумана, 5", "баумана казань");
        e.employee = text("Пётр Петров", "петров пётр");
        e.city = "Казань".into();
        e.network = "Ашан".into();
        e.address = text("ул. Баумана 5", "баумана");

        let report = calc.build_report(&m, &e, 1.0).unwrap();
        assert_eq!(
            (report.employee.as_str(), report.city.as_str(), report.network.as_str()),
            ("Пётр Петров", "Казань", "Ашан")
        );
        assert_eq!(report.address, "ул. Баумана 5");
        assert_eq!(report.normalized_address, "баумана");
        assert_eq!(report.identity_key.as_str(), "2025-10-31_петров пётр_баумана казань");
    }

    #[test]
    fn free_text_quantities_flow_through() {
        let extractor = QuantityExtractor::new(&QuantityRuleSet::default()).unwrap();
        let calc = MetricsCalculator::new(&extractor, 0.5);
        let (m, e) = pair(
            &[Cell::text("≈20"), Cell::text("5-7"), Cell::Empty, Cell::text("нет")],
            &[Cell::text("все продано, было 12"), Cell::text("2"), Cell::Empty, Cell::Empty],
            Some(Cell::text("около 30")),
        );
        let report = calc.build_report(&m, &e, 0.8).unwrap();
        let sold: Vec<u32> = report.products.iter().map(|p| p.sold).collect();
        assert_eq!(sold, vec![8, 4, 0, 0]);
        assert_eq!(report.visitors, 30);
    }

    #[test]
    fn zero_visitors_means_zero_conversion_and_full_factor() {
        let extractor = QuantityExtractor::new(&QuantityRuleSet::default()).unwrap();
        let calc = MetricsCalculator::new(&extractor, 0.5);
        let (m, e) = pair(&nums(&[4.0]), &nums(&[9.0]), Some(Cell::Empty));
        let report = calc.build_report(&m, &e, 1.0).unwrap();
        assert_eq!(report.total_sold, 0);
        assert_eq!(report.conversion, 0.0);
        assert_eq!(report.stock_factor, 1.0);
        assert_eq!(report.efficiency, 0.0);
    }

    #[test]
    fn missing_visitor_column_drops_pair() {
        let extractor = QuantityExtractor::new(&QuantityRuleSet::default()).unwrap();
        let calc = MetricsCalculator::new(&extractor, 0.5);
        let (m, e) = pair(&nums(&[1.0]), &nums(&[0.0]), None);
        assert_eq!(
            calc.build_report(&m, &e, 1.0).unwrap_err(),
            ReportError::MissingVisitors { row: 7 }
        );
    }

    #[test]
    fn negative_stock_drops_pair() {
        let extractor = QuantityExtractor::new(&QuantityRuleSet::default()).unwrap();
        let calc = MetricsCalculator::new(&extractor, 0.5);
        let (m, e) = pair(&nums(&[-3.0]), &nums(&[0.0]), Some(Cell::Number(5.0)));
        let err = calc.build_report(&m, &e, 1.0).unwrap_err();
        assert!(matches!(err, ReportError::Quantity { ref field, .. } if field == "Лёгкий start stock"));
    }
}
