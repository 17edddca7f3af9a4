//! Covers the two testable properties [`oracle_equivalence`] doesn't:
//! Property 2 (integer-vs-double precision bound) and Property 7 (roundtrip
//! share semantics across reveal policies).

use std::collections::BTreeMap;

use epilink_core::oracle;
use epilink_core::share::{ArithShare, BoolShare, OutShare, Reveal, RevealPolicy, ShareKind};
use epilink_core::{CircUnit, backend::local::Party};
use epilink_types::{CircuitConfig, Comparator, Database, EpilinkConfig, FieldKind, FieldSpec, Record};

fn cfg() -> CircuitConfig {
    let mut fields = BTreeMap::new();
    fields.insert(
        "bm_1".to_string(),
        FieldSpec { frequency: 0.01, error_rate: 0.01, comparator: Comparator::Dice, kind: FieldKind::Bitmask, bitsize: 64 },
    );
    let epi = EpilinkConfig { fields, exchange_groups: vec![], threshold: 0.8, tentative_threshold: 0.5 };
    CircuitConfig::new(epi, false, 32).expect("valid config")
}

#[test]
fn property2_integer_oracle_tracks_double_oracle() {
    let c = cfg();
    let client: Record = BTreeMap::from([("bm_1".to_string(), Some(vec![0xAB, 0xCD, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]))]);
    let mut columns = BTreeMap::new();
    columns.insert(
        "bm_1".to_string(),
        vec![Some(vec![0xAB, 0xCD, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]), Some(vec![0x00, 0xFF, 0x12, 0x00, 0x56, 0x00, 0x9A, 0x00]), Some(vec![0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xAB, 0xCD])],
    );
    let db = Database::new(columns).unwrap();

    let (idx_int, num, den) = oracle::oracle_score_record(&c, &client, &db).unwrap();
    let (idx_f64, score_f64) = oracle::oracle_score_record_f64(&c, &client, &db).unwrap();
    assert_eq!(idx_int, idx_f64, "integer and double oracles must pick the same winning row");

    let score_int = (num as f64 / den as f64) / f64::from(1u32 << c.dice_prec());
    let deviation = (score_int - score_f64).abs();
    // bound from spec.md Property 2: O(nfields * 2^-weight_prec) + O(2^-dice_prec),
    // checked loosely here as "well under a percent" for one field at default precision.
    assert!(deviation < 0.01, "deviation {deviation} exceeds 1%");
}

#[test]
fn property7_reveal_policies_agree_with_manually_combined_halves() {
    let party = Party::new(42);
    let bool_share = BoolShare::from_clear(&party, &[0x1234u64, 0xABCDu64], 16, ShareKind::Gmw);

    let to_client = OutShare::new(bool_share.clone(), RevealPolicy::Client).open();
    let to_server = OutShare::new(bool_share.clone(), RevealPolicy::Server).open();
    let to_all = OutShare::new(bool_share.clone(), RevealPolicy::All).open();
    assert_eq!(to_client, to_server);
    assert_eq!(to_client, to_all);

    let (mine, peers) = bool_share.halves();
    let combined: Vec<CircUnit> = mine.iter().zip(peers).map(|(a, b)| a ^ b).collect();
    assert_eq!(combined, bool_share.reveal_clear());
    assert_eq!(combined, to_all);

    let arith_share = ArithShare::from_clear(&party, &[7u64, 99u64], 32);
    let arith_all = OutShare::new(arith_share.clone(), RevealPolicy::All).open();
    let (mine, peers) = arith_share.halves();
    let combined: Vec<CircUnit> = mine.iter().zip(peers).map(|(a, b)| a.wrapping_add(*b)).collect();
    assert_eq!(combined, arith_share.reveal_clear());
    assert_eq!(combined, arith_all);
}
