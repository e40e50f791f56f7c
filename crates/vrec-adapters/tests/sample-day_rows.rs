use std::path::Path;

use vrec_adapters::{
    load_column_mapping, load_dataset, ParseOptions, QuantityExtractor, SubmissionAdapter,
    TextNormalizer, Vocabulary,
};

#[test]
fn sample_day_rows_adapt_with_shipped_rules() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let vocabulary = Vocabulary::from_workspace_root(&root).unwrap();
    let mapping = load_column_mapping(root.join("config/columns.yaml")).unwrap();
    let normalizer = TextNormalizer::new(&vocabulary.normalizer).unwrap();
    let extractor = QuantityExtractor::new(&vocabulary.quantity).unwrap();
    let options = ParseOptions::default();
    let adapter = SubmissionAdapter::new(&mapping, &normalizer, &options);

    let morning = adapter.morning(&load_dataset(root.join("fixtures/sample-day/morning.json")).unwrap());
    assert_eq!(morning.accepted.len(), 5);
    assert!(morning.rejected.is_empty());
    let anna = &morning.accepted[1];
    assert_eq!(anna.employee.normalized, "анна иванова сергеевна");
    assert_eq!(anna.address.normalized, "10 ленина москва");
    assert_eq!(anna.start_stock.len(), 4);

    let petr = &morning.accepted[2];
    let starts: Vec<u32> = petr
        .start_stock
        .iter()
        .map(|f| extractor.extract(&f.value).unwrap())
        .collect();
    assert_eq!(starts, vec![12, 20, 0, 0]);

    let evening = adapter.evening(&load_dataset(root.join("fixtures/sample-day/evening.json")).unwrap());
    assert_eq!(evening.accepted.len(), 3);
    assert_eq!(evening.rejected.len(), 1);
    assert_eq!(evening.rejected[0].value.as_deref(), Some("вчера"));
    let olga = &evening.accepted[2];
    let visitors = olga.visitors.as_ref().unwrap();
    assert_eq!(extractor.extract(visitors).unwrap(), 50);
    assert_eq!(
        extractor.explain_text("всё продано"),
        (0, Some("sold_out"))
    );
}
