//! Covers §4.5.4's requirement that the resulting circuits be bit-identical
//! across both multiplication spaces: `CircuitConfig::use_conversion` must
//! not change a linkage or count result, only which share type carries the
//! field-weight products internally.

use std::collections::BTreeMap;

use epilink_core::builder::{CircuitBuilder, CircuitInput};
use epilink_types::{Comparator, CircuitConfig, Database, EpilinkConfig, FieldKind, FieldSpec, Record};

fn field(comparator: Comparator, kind: FieldKind, bitsize: u32) -> FieldSpec {
    FieldSpec { frequency: 0.01, error_rate: 0.01, comparator, kind, bitsize }
}

fn cfg(use_conversion: bool) -> CircuitConfig {
    let mut fields = BTreeMap::new();
    fields.insert("bm_1".to_string(), field(Comparator::Dice, FieldKind::Bitmask, 16));
    fields.insert("exact".to_string(), field(Comparator::Binary, FieldKind::Bitmask, 8));
    let epi = EpilinkConfig { fields, exchange_groups: vec![], threshold: 0.8, tentative_threshold: 0.4 };
    let mut cfg = CircuitConfig::new(epi, false, 32).expect("valid config");
    cfg.use_conversion = use_conversion;
    cfg
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

fn run_linkage(cfg: &CircuitConfig, client: Record, db: Database) -> epilink_types::LinkageResult {
    let mut builder = CircuitBuilder::new(cfg.clone(), 11);
    builder.set_input(CircuitInput::Both(vec![client], db)).unwrap();
    builder.build_linkage_circuit(true).unwrap();
    builder.execute().unwrap();
    builder.reveal_linkage().unwrap().into_iter().next().unwrap()
}

#[test]
fn boolean_and_arithmetic_spaces_agree_on_a_winning_row() {
    let client = record(&[("bm_1", Some(vec![0x12, 0x34])), ("exact", Some(vec![0xAB]))]);
    let db = database(&[
        ("bm_1", vec![Some(vec![0x00, 0x00]), Some(vec![0x12, 0x30]), Some(vec![0x12, 0x34])]),
        ("exact", vec![Some(vec![0x00]), Some(vec![0xAB]), Some(vec![0xAB])]),
    ]);

    let arith = run_linkage(&cfg(true), client.clone(), db.clone());
    let bool_space = run_linkage(&cfg(false), client, db);

    assert_eq!(arith.index, bool_space.index);
    assert_eq!(arith.is_match, bool_space.is_match);
    assert_eq!(arith.is_tentative_match, bool_space.is_tentative_match);
    assert_eq!(arith.num, bool_space.num);
    assert_eq!(arith.den, bool_space.den);
}

#[test]
fn boolean_and_arithmetic_spaces_agree_on_exact_and_dice_weights() {
    let client = record(&[("bm_1", Some(vec![0xFF, 0xFF])), ("exact", None)]);
    let db = database(&[("bm_1", vec![Some(vec![0x0F, 0xFF])]), ("exact", vec![Some(vec![0xAB])])]);

    let arith = run_linkage(&cfg(true), client.clone(), db.clone());
    let bool_space = run_linkage(&cfg(false), client, db);

    assert_eq!(arith.num, bool_space.num);
    assert_eq!(arith.den, bool_space.den);
    assert_eq!(arith.is_match, bool_space.is_match);
}
