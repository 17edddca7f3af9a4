//! Clear-text scoring oracle (component **C6**): computes the exact same
//! fixed-point scores [`crate::builder::CircuitBuilder`] would, without any
//! sharing or circuit construction, for use as a cross-check in tests.
//!
//! Every integer operation here mirrors a specific gate in the secure
//! circuit bit-for-bit: [`oracle_hamming_weight`] mirrors
//! [`crate::share::BoolShare::hammingweight`], [`oracle_dice`] mirrors
//! [`crate::share::BoolShare::dice_round_divide`], and
//! [`oracle_best_permutation`] mirrors the exchange-group fold built from
//! [`crate::gadgets::binary_accumulate`] in `score_one_record`.

use itertools::Itertools;

use epilink_types::{CircuitConfig, Comparator, Database, FieldEntry, FieldName, LinkageResult, Record};

/// Popcount of a byte-serialised bitmask.
pub fn oracle_hamming_weight(bytes: &[u8]) -> u64 {
    bytes.iter().map(|b| u64::from(b.count_ones())).sum()
}

/// The Dice coefficient's rounding fixed-point division, matching
/// [`crate::share::BoolShare::dice_round_divide`] exactly: `0` when both
/// bitmasks are empty, else
/// `(2*hw_and*2^dice_prec + (hw_c+hw_s)/2) / (hw_c+hw_s)`.
pub fn oracle_dice(hw_c: u64, hw_s: u64, hw_and: u64, dice_prec: u32) -> u64 {
    let plus = hw_c + hw_s;
    if plus == 0 {
        0
    } else {
        (2 * hw_and * (1u64 << dice_prec) + plus / 2) / plus
    }
}

fn field_bytes(entry: &FieldEntry, bitsize: u32) -> Vec<u8> {
    entry.clone().unwrap_or_else(|| vec![0u8; bitsize.div_ceil(8) as usize])
}

fn field_comparison(cfg: &CircuitConfig, left: &FieldEntry, right: &FieldEntry, name_for_bitsize: &str) -> Result<u64, epilink_types::ConfigError> {
    let spec = cfg.epi.field(name_for_bitsize)?;
    let dice_prec = cfg.dice_prec();
    Ok(match spec.comparator {
        Comparator::Dice => {
            let lb = field_bytes(left, spec.bitsize);
            let rb = field_bytes(right, spec.bitsize);
            let and_bytes: Vec<u8> = lb.iter().zip(&rb).map(|(a, b)| a & b).collect();
            oracle_dice(oracle_hamming_weight(&lb), oracle_hamming_weight(&rb), oracle_hamming_weight(&and_bytes), dice_prec)
        }
        Comparator::Binary => {
            let lb = field_bytes(left, spec.bitsize);
            let rb = field_bytes(right, spec.bitsize);
            u64::from(lb == rb) << dice_prec
        }
    })
}

/// A plaintext `(numerator, denominator)` score pair, compared by
/// cross-multiplication exactly as [`crate::gadgets::quotient_select_bits`]
/// and `score_one_record`'s pairwise select do.
#[derive(Clone, Copy, Debug, Default)]
struct Quotient {
    num: u64,
    den: u64,
}

fn better(a: Quotient, b: Quotient) -> Quotient {
    let cross_a = u128::from(a.num) * u128::from(b.den);
    let cross_b = u128::from(b.num) * u128::from(a.den);
    if cross_a > cross_b || (cross_a == cross_b && a.den >= b.den) { a } else { b }
}

/// Scores every permutation of an exchange group and keeps the best,
/// matching `score_one_record`'s `binary_accumulate`-based fold. Returns the
/// identity quotient `(0, 0)` for an empty group (never produced by a
/// validated [`epilink_types::EpilinkConfig`]).
fn oracle_best_permutation(cfg: &CircuitConfig, client: &Record, server_row: &[(&FieldName, &FieldEntry)], group: &[FieldName]) -> Result<Quotient, epilink_types::ConfigError> {
    let mut best: Option<Quotient> = None;
    for perm in group.iter().permutations(group.len()) {
        let mut acc = Quotient::default();
        for (left, right) in group.iter().zip(perm) {
            let left_entry = client.get(left).cloned().unwrap_or(None);
            let right_entry = server_row.iter().find(|(n, _)| *n == right).map_or(None, |(_, v)| (*v).clone());
            let delta_l = u64::from(left_entry.is_some());
            let delta_r = u64::from(right_entry.is_some());
            let weight = u64::from(if left == right { cfg.rescaled_weight(left)? } else { cfg.rescaled_weight_pair(left, right)? });
            let comp = field_comparison(cfg, &left_entry, &right_entry, left)?;
            let delta = delta_l * delta_r;
            acc.num += delta * weight * comp;
            acc.den += delta * weight;
        }
        best = Some(match best {
            None => acc,
            Some(prev) => better(prev, acc),
        });
    }
    Ok(best.unwrap_or_default())
}

/// Scores one client record against every row of `db`, returning the
/// winning row's `(row_index, numerator, denominator)`, matching
/// `score_one_record`'s field-weight pipeline and argmax fold exactly (as
/// integers, with no secret sharing involved).
pub fn oracle_score_record(cfg: &CircuitConfig, client: &Record, db: &Database) -> Result<(u32, u64, u64), epilink_types::ConfigError> {
    let mut grouped = std::collections::BTreeSet::new();
    for group in &cfg.epi.exchange_groups {
        for name in group {
            grouped.insert(name.clone());
        }
    }

    let mut best: Option<(u32, Quotient)> = None;
    for row_index in 0..db.size().max(1) {
        let server_row: Vec<(&FieldName, &FieldEntry)> = db
            .columns()
            .map(|(name, column)| (name, column.get(row_index).unwrap_or(&None)))
            .collect();

        let mut row = Quotient::default();
        for group in &cfg.epi.exchange_groups {
            let members: Vec<FieldName> = group.iter().cloned().collect();
            let q = oracle_best_permutation(cfg, client, &server_row, &members)?;
            row.num += q.num;
            row.den += q.den;
        }
        for name in cfg.epi.fields.keys() {
            if grouped.contains(name) {
                continue;
            }
            let left_entry = client.get(name).cloned().unwrap_or(None);
            let right_entry = server_row.iter().find(|(n, _)| *n == name).map_or(None, |(_, v)| (*v).clone());
            let delta = u64::from(left_entry.is_some()) * u64::from(right_entry.is_some());
            let weight = u64::from(cfg.rescaled_weight(name)?);
            let comp = field_comparison(cfg, &left_entry, &right_entry, name)?;
            row.num += delta * weight * comp;
            row.den += delta * weight;
        }

        best = Some(match best {
            None => (row_index as u32, row),
            Some((prev_idx, prev)) => {
                let cross_a = u128::from(prev.num) * u128::from(row.den);
                let cross_b = u128::from(row.num) * u128::from(prev.den);
                if cross_b > cross_a || (cross_a == cross_b && row.den >= prev.den) {
                    (row_index as u32, row)
                } else {
                    (prev_idx, prev)
                }
            }
        });
    }
    let (idx, q) = best.expect("db.size().max(1) guarantees at least one row");
    Ok((idx, q.num, q.den))
}

/// Plaintext floating-point score pair, used by [`oracle_score_record_f64`]
/// to mirror the circuit's argmax/quotient selection over real numbers
/// instead of fixed-point integers, for the integer-vs-double deviation
/// bound.
#[derive(Clone, Copy, Debug, Default)]
struct QuotientF64 {
    num: f64,
    den: f64,
}

fn better_f64(a: QuotientF64, b: QuotientF64) -> QuotientF64 {
    let cross_a = a.num * b.den;
    let cross_b = b.num * a.den;
    if cross_a > cross_b || (cross_a == cross_b && a.den >= b.den) { a } else { b }
}

fn field_comparison_f64(cfg: &CircuitConfig, left: &FieldEntry, right: &FieldEntry, name: &str) -> Result<f64, epilink_types::ConfigError> {
    let spec = cfg.epi.field(name)?;
    Ok(match spec.comparator {
        Comparator::Dice => {
            let lb = field_bytes(left, spec.bitsize);
            let rb = field_bytes(right, spec.bitsize);
            let and_bytes: Vec<u8> = lb.iter().zip(&rb).map(|(a, b)| a & b).collect();
            let hw_c = oracle_hamming_weight(&lb) as f64;
            let hw_s = oracle_hamming_weight(&rb) as f64;
            let hw_and = oracle_hamming_weight(&and_bytes) as f64;
            if hw_c + hw_s == 0.0 { 0.0 } else { 2.0 * hw_and / (hw_c + hw_s) }
        }
        Comparator::Binary => {
            let lb = field_bytes(left, spec.bitsize);
            let rb = field_bytes(right, spec.bitsize);
            f64::from(lb == rb)
        }
    })
}

fn oracle_best_permutation_f64(cfg: &CircuitConfig, client: &Record, server_row: &[(&FieldName, &FieldEntry)], group: &[FieldName]) -> Result<QuotientF64, epilink_types::ConfigError> {
    let mut best: Option<QuotientF64> = None;
    for perm in group.iter().permutations(group.len()) {
        let mut acc = QuotientF64::default();
        for (left, right) in group.iter().zip(perm) {
            let left_entry = client.get(left).cloned().unwrap_or(None);
            let right_entry = server_row.iter().find(|(n, _)| *n == right).map_or(None, |(_, v)| (*v).clone());
            let delta = f64::from(left_entry.is_some()) * f64::from(right_entry.is_some());
            let weight = if left == right { cfg.epi.field(left)?.weight()? } else { (cfg.epi.field(left)?.weight()? + cfg.epi.field(right)?.weight()?) / 2.0 };
            let comp = field_comparison_f64(cfg, &left_entry, &right_entry, left)?;
            acc.num += delta * weight * comp;
            acc.den += delta * weight;
        }
        best = Some(match best {
            None => acc,
            Some(prev) => better_f64(prev, acc),
        });
    }
    Ok(best.unwrap_or_default())
}

/// The exact real-valued EpiLink score of the winning database row against
/// `client`, using real (unrescaled) weights and exact Dice coefficients —
/// the "exact double" oracle of §4.6, as opposed to the fixed-point integer
/// oracle [`oracle_score_record`] computes. Used only to bound the
/// precision loss the fixed-point circuit introduces (Property 2); it does
/// not itself drive any circuit or test threshold behaviour.
pub fn oracle_score_record_f64(cfg: &CircuitConfig, client: &Record, db: &Database) -> Result<(u32, f64), epilink_types::ConfigError> {
    let mut grouped = std::collections::BTreeSet::new();
    for group in &cfg.epi.exchange_groups {
        for name in group {
            grouped.insert(name.clone());
        }
    }

    let mut best: Option<(u32, QuotientF64)> = None;
    for row_index in 0..db.size().max(1) {
        let server_row: Vec<(&FieldName, &FieldEntry)> = db
            .columns()
            .map(|(name, column)| (name, column.get(row_index).unwrap_or(&None)))
            .collect();

        let mut row = QuotientF64::default();
        for group in &cfg.epi.exchange_groups {
            let members: Vec<FieldName> = group.iter().cloned().collect();
            let q = oracle_best_permutation_f64(cfg, client, &server_row, &members)?;
            row.num += q.num;
            row.den += q.den;
        }
        for name in cfg.epi.fields.keys() {
            if grouped.contains(name) {
                continue;
            }
            let left_entry = client.get(name).cloned().unwrap_or(None);
            let right_entry = server_row.iter().find(|(n, _)| *n == name).map_or(None, |(_, v)| (*v).clone());
            let delta = f64::from(left_entry.is_some()) * f64::from(right_entry.is_some());
            let weight = cfg.epi.field(name)?.weight()?;
            let comp = field_comparison_f64(cfg, &left_entry, &right_entry, name)?;
            row.num += delta * weight * comp;
            row.den += delta * weight;
        }

        best = Some(match best {
            None => (row_index as u32, row),
            Some((prev_idx, prev)) => {
                let cross_a = prev.num * row.den;
                let cross_b = row.num * prev.den;
                if cross_b > cross_a || (cross_a == cross_b && row.den >= prev.den) {
                    (row_index as u32, row)
                } else {
                    (prev_idx, prev)
                }
            }
        });
    }
    let (idx, q) = best.expect("db.size().max(1) guarantees at least one row");
    let score = if q.den == 0.0 { 0.0 } else { q.num / q.den };
    Ok((idx, score))
}

/// Full linkage result for one client record, including the threshold
/// tests, matching [`crate::builder::CircuitBuilder::reveal_linkage`].
///
/// `den` as reported here is shifted by `2^dice_prec` to match `num`'s scale
/// (per §4.6: "the integer variant returns denominator already shifted by
/// `dice_prec`"), even though the threshold test itself — like the circuit's
/// — compares against the unshifted `den` (`num` already carries the extra
/// `2^dice_prec` factor from `comp`, so `T_rescaled * den < num` holds
/// without re-scaling `den`; see `DESIGN.md`'s open-question resolution).
pub fn oracle_linkage(cfg: &CircuitConfig, client: &Record, db: &Database, debug: bool) -> Result<LinkageResult, epilink_types::ConfigError> {
    let (index, num, den) = oracle_score_record(cfg, client, db)?;
    let t_den = den * u64::from(cfg.threshold_rescaled());
    let tt_den = den * u64::from(cfg.tentative_threshold_rescaled());
    Ok(LinkageResult {
        index,
        is_match: num > t_den,
        is_tentative_match: num > tt_den,
        num: debug.then_some(num as u32),
        den: debug.then_some((den << cfg.dice_prec()) as u32),
    })
}

/// Counting result over a batch of client records, matching
/// [`crate::builder::CircuitBuilder::reveal_count`].
pub fn oracle_count(cfg: &CircuitConfig, clients: &[Record], db: &Database) -> Result<epilink_types::CountResult, epilink_types::ConfigError> {
    let mut result = epilink_types::CountResult::default();
    for client in clients {
        let r = oracle_linkage(cfg, client, db, false)?;
        result.matches += u32::from(r.is_match);
        result.tentative_matches += u32::from(r.is_tentative_match);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use epilink_types::{EpilinkConfig, FieldKind, FieldSpec};
    use std::collections::BTreeMap;

    fn cfg() -> CircuitConfig {
        let mut fields = BTreeMap::new();
        fields.insert(
            "bm".to_string(),
            FieldSpec { frequency: 0.01, error_rate: 0.01, comparator: Comparator::Dice, kind: FieldKind::Bitmask, bitsize: 16 },
        );
        let epi = EpilinkConfig { fields, exchange_groups: vec![], threshold: 0.9, tentative_threshold: 0.5 };
        CircuitConfig::new(epi, false, 32).unwrap()
    }

    #[test]
    fn identical_bitmasks_score_perfectly() {
        let c = cfg();
        let client: Record = BTreeMap::from([("bm".to_string(), Some(vec![0xFF, 0x00]))]);
        let mut columns = BTreeMap::new();
        columns.insert("bm".to_string(), vec![Some(vec![0xFF, 0x00])]);
        let db = Database::new(columns).unwrap();
        let result = oracle_linkage(&c, &client, &db, true).unwrap();
        assert_eq!(result.index, 0);
        assert!(result.is_match);
        // identical bitmasks score a perfect Dice coefficient, so num and the
        // (now dice_prec-shifted) den report the same scale-matched value.
        assert_eq!(result.num, result.den);
    }

    #[test]
    fn disjoint_bitmasks_never_match() {
        let c = cfg();
        let client: Record = BTreeMap::from([("bm".to_string(), Some(vec![0xFF, 0x00]))]);
        let mut columns = BTreeMap::new();
        columns.insert("bm".to_string(), vec![Some(vec![0x00, 0xFF])]);
        let db = Database::new(columns).unwrap();
        let result = oracle_linkage(&c, &client, &db, false).unwrap();
        assert!(!result.is_match);
        assert!(!result.is_tentative_match);
    }

    #[test]
    fn picks_the_best_scoring_row() {
        let c = cfg();
        let client: Record = BTreeMap::from([("bm".to_string(), Some(vec![0xFF, 0x00]))]);
        let mut columns = BTreeMap::new();
        columns.insert("bm".to_string(), vec![Some(vec![0x00, 0x00]), Some(vec![0xFF, 0x00]), Some(vec![0x0F, 0x00])]);
        let db = Database::new(columns).unwrap();
        let result = oracle_linkage(&c, &client, &db, false).unwrap();
        assert_eq!(result.index, 1);
    }
}
