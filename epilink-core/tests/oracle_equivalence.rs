//! Cross-checks [`CircuitBuilder`] against the clear-text [`oracle`], per
//! §8's testable properties: the secure circuit and the oracle must agree
//! bit-for-bit on `index`/`match`/`tmatch`/`num`/`den` for identical inputs.

use std::collections::{BTreeMap, BTreeSet};

use epilink_core::builder::{CircuitBuilder, CircuitInput};
use epilink_core::oracle;
use epilink_types::{Comparator, CircuitConfig, Database, EpilinkConfig, FieldKind, FieldSpec, Record};

fn field(comparator: Comparator, kind: FieldKind, bitsize: u32) -> FieldSpec {
    FieldSpec { frequency: 0.01, error_rate: 0.01, comparator, kind, bitsize }
}

fn single_bitmask_config() -> CircuitConfig {
    let mut fields = BTreeMap::new();
    fields.insert("bm_1".to_string(), field(Comparator::Dice, FieldKind::Bitmask, 8));
    let epi = EpilinkConfig { fields, exchange_groups: vec![], threshold: 0.8, tentative_threshold: 0.5 };
    CircuitConfig::new(epi, false, 32).expect("valid config")
}

fn exchange_group_config() -> CircuitConfig {
    let mut fields = BTreeMap::new();
    fields.insert("bm_a".to_string(), field(Comparator::Dice, FieldKind::Bitmask, 8));
    fields.insert("bm_b".to_string(), field(Comparator::Dice, FieldKind::Bitmask, 8));
    let epi = EpilinkConfig {
        fields,
        exchange_groups: vec![BTreeSet::from(["bm_a".to_string(), "bm_b".to_string()])],
        threshold: 0.8,
        tentative_threshold: 0.5,
    };
    CircuitConfig::new(epi, false, 32).expect("valid config")
}

fn record(entries: &[(&str, Option<Vec<u8>>)]) -> Record {
    entries.iter().map(|(name, v)| (name.to_string(), v.clone())).collect()
}

fn database(columns: &[(&str, Vec<Option<Vec<u8>>>)]) -> Database {
    let mut cols = BTreeMap::new();
    for (name, column) in columns {
        cols.insert(name.to_string(), column.clone());
    }
    Database::new(cols).expect("equal-length columns")
}

fn run_linkage(cfg: &CircuitConfig, client: Record, db: Database, debug: bool) -> epilink_types::LinkageResult {
    let mut builder = CircuitBuilder::new(cfg.clone(), 7);
    builder.set_input(CircuitInput::Both(vec![client], db)).unwrap();
    builder.build_linkage_circuit(debug).unwrap();
    builder.execute().unwrap();
    builder.reveal_linkage().unwrap().into_iter().next().unwrap()
}

#[test]
fn property1_single_bitmask_matches_oracle() {
    let cfg = single_bitmask_config();
    let client = record(&[("bm_1", Some(vec![0b0111_0111]))]);
    let db = database(&[("bm_1", vec![Some(vec![0b1110_1110])])]);

    let circuit_result = run_linkage(&cfg, client.clone(), db.clone(), true);
    let oracle_result = oracle::oracle_linkage(&cfg, &client, &db, true).unwrap();

    assert_eq!(circuit_result.index, oracle_result.index);
    assert_eq!(circuit_result.is_match, oracle_result.is_match);
    assert_eq!(circuit_result.is_tentative_match, oracle_result.is_tentative_match);
    assert_eq!(circuit_result.num, oracle_result.num);
    assert_eq!(circuit_result.den, oracle_result.den);
}

#[test]
fn property1_argmax_picks_best_row() {
    let cfg = single_bitmask_config();
    let client = record(&[("bm_1", Some(vec![0xFF]))]);
    let db = database(&[("bm_1", vec![Some(vec![0x00]), Some(vec![0xFF]), Some(vec![0x0F])])]);

    let circuit_result = run_linkage(&cfg, client.clone(), db.clone(), false);
    let oracle_result = oracle::oracle_linkage(&cfg, &client, &db, false).unwrap();

    assert_eq!(circuit_result.index, 1);
    assert_eq!(circuit_result.index, oracle_result.index);
    assert!(circuit_result.is_match);
}

#[test]
fn property3_exchange_group_permutation_invariance() {
    let cfg = exchange_group_config();
    let client = record(&[("bm_a", Some(vec![0xF0])), ("bm_b", Some(vec![0x0F]))]);
    let db_straight = database(&[("bm_a", vec![Some(vec![0xF0])]), ("bm_b", vec![Some(vec![0x0F])])]);
    let db_swapped = database(&[("bm_a", vec![Some(vec![0x0F])]), ("bm_b", vec![Some(vec![0xF0])])]);

    let straight = run_linkage(&cfg, client.clone(), db_straight, true);
    let swapped = run_linkage(&cfg, client, db_swapped, true);

    assert_eq!(straight.num, swapped.num);
    assert_eq!(straight.den, swapped.den);
    assert_eq!(straight.is_match, swapped.is_match);
}

#[test]
fn property4_empty_field_contributes_nothing() {
    let mut fields = BTreeMap::new();
    fields.insert("bm_1".to_string(), field(Comparator::Dice, FieldKind::Bitmask, 8));
    fields.insert("bm_2".to_string(), field(Comparator::Dice, FieldKind::Bitmask, 8));
    let epi = EpilinkConfig { fields, exchange_groups: vec![], threshold: 0.8, tentative_threshold: 0.5 };
    let cfg = CircuitConfig::new(epi, false, 32).unwrap();

    let client_with_empty = record(&[("bm_1", Some(vec![0xFF])), ("bm_2", None)]);
    let db = database(&[("bm_1", vec![Some(vec![0xFF])]), ("bm_2", vec![Some(vec![0xAB])])]);

    let with_empty = run_linkage(&cfg, client_with_empty, db.clone(), true);
    let only_bm1 = {
        let mut fields = BTreeMap::new();
        fields.insert("bm_1".to_string(), field(Comparator::Dice, FieldKind::Bitmask, 8));
        let epi = EpilinkConfig { fields, exchange_groups: vec![], threshold: 0.8, tentative_threshold: 0.5 };
        let single_cfg = CircuitConfig::new(epi, false, 32).unwrap();
        let client = record(&[("bm_1", Some(vec![0xFF]))]);
        let single_db = database(&[("bm_1", vec![Some(vec![0xFF])])]);
        run_linkage(&single_cfg, client, single_db, true)
    };

    assert_eq!(with_empty.num, only_bm1.num);
    assert_eq!(with_empty.den, only_bm1.den);
}

#[test]
fn property5_threshold_monotonicity() {
    let mut fields = BTreeMap::new();
    fields.insert("bm_1".to_string(), field(Comparator::Dice, FieldKind::Bitmask, 8));
    let client = record(&[("bm_1", Some(vec![0b0111_0111]))]);
    let db = database(&[("bm_1", vec![Some(vec![0b1110_1110])])]);

    let epi_low = EpilinkConfig { fields: fields.clone(), exchange_groups: vec![], threshold: 0.3, tentative_threshold: 0.1 };
    let epi_high = EpilinkConfig { fields, exchange_groups: vec![], threshold: 0.95, tentative_threshold: 0.1 };
    let cfg_low = CircuitConfig::new(epi_low, false, 32).unwrap();
    let cfg_high = CircuitConfig::new(epi_high, false, 32).unwrap();

    let low = run_linkage(&cfg_low, client.clone(), db.clone(), false);
    let high = run_linkage(&cfg_high, client, db, false);

    assert!(low.is_match);
    // raising the threshold can only turn a match into a non-match, never the reverse
    if high.is_match {
        assert!(low.is_match);
    }
}

#[test]
fn property6_count_consistency() {
    let cfg = single_bitmask_config();
    let records = vec![
        record(&[("bm_1", Some(vec![0xFF]))]),
        record(&[("bm_1", Some(vec![0x00]))]),
        record(&[("bm_1", Some(vec![0xF0]))]),
    ];
    let db = database(&[("bm_1", vec![Some(vec![0xFF])])]);

    let mut linkage_matches: u32 = 0;
    for r in &records {
        if run_linkage(&cfg, r.clone(), db.clone(), false).is_match {
            linkage_matches += 1;
        }
    }

    let mut builder = CircuitBuilder::new(cfg.clone(), 7);
    builder.set_input(CircuitInput::Both(records.clone(), db.clone())).unwrap();
    builder.build_count_circuit().unwrap();
    builder.execute().unwrap();
    let count = builder.reveal_count().unwrap();

    assert_eq!(count.matches, linkage_matches);

    let oracle_count = oracle::oracle_count(&cfg, &records, &db).unwrap();
    assert_eq!(count.matches, oracle_count.matches);
    assert_eq!(count.tentative_matches, oracle_count.tentative_matches);
}
