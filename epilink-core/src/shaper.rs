//! Input shaping layer (component **C4**): turns plaintext records into
//! per-field [`EntryShare`]s batched over the comparison SIMD width, fills
//! in dummy values for the side that does not own a given input, and
//! memoizes the constant shares (rescaled weights, thresholds, the row
//! index) that the circuit builder reuses across every record comparison.

use std::collections::HashMap;
use std::rc::Rc;

use epilink_types::{CircuitConfig, Comparator, Database, FieldEntry, FieldName, Record};

use crate::backend::local::Party;
use crate::mult::MultShare;
use crate::share::{BoolShare, ShareKind, WideBoolShare};

/// Per-field shared input for one side of a comparison, batched over
/// `nvals` SIMD slots.
#[derive(Clone)]
pub struct EntryShare {
    /// The field's value, Boolean-shared at its declared `bitsize`.
    pub value: WideBoolShare,
    /// `1` where the field is present, `0` where it was missing, held in
    /// whichever space multiplications are currently performed.
    pub delta: MultShare,
    /// Precomputed Hamming weight of `value`, present only for
    /// [`Comparator::Dice`] fields. Computed locally by the owning party
    /// (it depends only on that party's own data) and shared like any
    /// other input.
    pub hw: Option<BoolShare>,
}

impl EntryShare {
    /// An all-zero, `delta = 0` placeholder for the side that does not own
    /// this field's true values (e.g. the server's side of the client's
    /// single-record input, broadcast across the comparison batch).
    pub fn dummy(circuit: &Rc<Party>, comparator: Comparator, bitsize: u32, nvals: usize, kind: ShareKind, use_conversion: bool) -> Self {
        let zero_bytes = vec![0u8; bitsize.div_ceil(8) as usize];
        let value = WideBoolShare::constant_bytes(circuit, &zero_bytes, bitsize, nvals, kind);
        let delta = MultShare::constant(circuit, 0, 1, nvals, use_conversion, kind);
        let hw = (comparator == Comparator::Dice)
            .then(|| BoolShare::constant(circuit, 0, CircuitConfig::hw_size(bitsize).max(1), nvals, kind));
        Self { value, delta, hw }
    }
}

fn entry_to_bytes(entry: &FieldEntry, bitsize: u32) -> Vec<u8> {
    entry.clone().unwrap_or_else(|| vec![0u8; bitsize.div_ceil(8) as usize])
}

fn build_entry(circuit: &Rc<Party>, entries: &[FieldEntry], comparator: Comparator, bitsize: u32, kind: ShareKind, use_conversion: bool) -> EntryShare {
    let bytes: Vec<Vec<u8>> = entries.iter().map(|e| entry_to_bytes(e, bitsize)).collect();
    let presence: Vec<u64> = entries.iter().map(|e| u64::from(e.is_some())).collect();
    let value = WideBoolShare::from_clear_bytes(circuit, &bytes, bitsize, kind);
    let delta_bits = BoolShare::from_clear(circuit, &presence, 1, kind);
    let delta = MultShare::from_bool(&delta_bits, use_conversion);
    let hw = (comparator == Comparator::Dice).then(|| {
        let weights: Vec<u64> = entries
            .iter()
            .map(|e| e.as_ref().map_or(0, |b| u64::from(b.iter().map(|byte| byte.count_ones()).sum::<u32>())))
            .collect();
        BoolShare::from_clear(circuit, &weights, CircuitConfig::hw_size(bitsize).max(1), kind)
    });
    EntryShare { value, delta, hw }
}

/// Shapes the client's single record, broadcast over `nvals` (the server
/// database size) SIMD slots: every comparison slot sees the same client
/// value.
pub fn shape_client_record(circuit: &Rc<Party>, cfg: &CircuitConfig, record: &Record, nvals: usize, kind: ShareKind, use_conversion: bool) -> HashMap<FieldName, EntryShare> {
    cfg.epi
        .fields
        .iter()
        .map(|(name, spec)| {
            let entry = record.get(name).cloned().unwrap_or(None);
            let repeated: Vec<FieldEntry> = vec![entry; nvals];
            (name.clone(), build_entry(circuit, &repeated, spec.comparator, spec.bitsize, kind, use_conversion))
        })
        .collect()
}

/// Shapes the server's per-field database columns: one value per SIMD slot.
pub fn shape_server_database(circuit: &Rc<Party>, cfg: &CircuitConfig, db: &Database, kind: ShareKind, use_conversion: bool) -> HashMap<FieldName, EntryShare> {
    cfg.epi
        .fields
        .iter()
        .map(|(name, spec)| {
            let column = db.column(name).map(<[FieldEntry]>::to_vec).unwrap_or_else(|| vec![None; db.size()]);
            (name.clone(), build_entry(circuit, &column, spec.comparator, spec.bitsize, kind, use_conversion))
        })
        .collect()
}

/// Owns the constant shares (rescaled field/pair weights, thresholds, the
/// SIMD row index) the builder reuses across every record comparison, and
/// memoizes rescaled weight shares per comparison pair so repeated
/// exchange-group permutations don't re-derive or re-share the same
/// constant.
pub struct ConstantCache {
    circuit: Rc<Party>,
    nvals: usize,
    kind: ShareKind,
    use_conversion: bool,
    weight_prec: u32,
    weights: HashMap<(FieldName, FieldName), MultShare>,
}

impl ConstantCache {
    /// Builds the cache and eagerly materialises the row-index constant.
    pub fn new(circuit: &Rc<Party>, cfg: &CircuitConfig, nvals: usize, kind: ShareKind, use_conversion: bool) -> Self {
        Self {
            circuit: circuit.clone(),
            nvals,
            kind,
            use_conversion,
            weight_prec: cfg.weight_prec(),
            weights: HashMap::new(),
        }
    }

    /// The rescaled weight share for a comparison pair (a single field
    /// compared with itself, or an averaged pair from an exchange group),
    /// deriving and caching it on first use.
    pub fn rescaled_weight(&mut self, cfg: &CircuitConfig, left: &FieldName, right: &FieldName) -> Result<MultShare, epilink_types::ConfigError> {
        let key = (left.clone(), right.clone());
        if let Some(w) = self.weights.get(&key) {
            return Ok(w.clone());
        }
        let raw = if left == right { cfg.rescaled_weight(left)? } else { cfg.rescaled_weight_pair(left, right)? };
        let share = MultShare::constant(&self.circuit, u64::from(raw), self.weight_prec, self.nvals, self.use_conversion, self.kind);
        self.weights.insert(key, share.clone());
        Ok(share)
    }

    /// `0..nvals` as a single-column constant, width `ceil_log2(nvals)`;
    /// used to carry the winning row index through [`crate::gadgets::QuotientFolder`].
    pub fn row_index(&self) -> BoolShare {
        let width = epilink_types::ceil_log2(self.nvals as u64).max(1);
        let values: Vec<u64> = (0..self.nvals as u64).collect();
        BoolShare::from_clear(&self.circuit, &values, width, self.kind)
    }

    /// The match threshold, rescaled to `dice_prec` and broadcast to `nvals` slots.
    pub fn threshold(&self, cfg: &CircuitConfig, width: u32, kind: ShareKind) -> BoolShare {
        BoolShare::constant(&self.circuit, u64::from(cfg.threshold_rescaled()), width, self.nvals, kind)
    }

    /// The tentative-match threshold, rescaled to `dice_prec` and broadcast
    /// to `nvals` slots.
    pub fn tentative_threshold(&self, cfg: &CircuitConfig, width: u32, kind: ShareKind) -> BoolShare {
        BoolShare::constant(&self.circuit, u64::from(cfg.tentative_threshold_rescaled()), width, self.nvals, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::share::Reveal;
    use epilink_types::{Comparator, EpilinkConfig, FieldKind, FieldSpec};
    use std::collections::BTreeMap;

    fn cfg() -> CircuitConfig {
        let mut fields = BTreeMap::new();
        fields.insert(
            "bm_1".to_string(),
            FieldSpec { frequency: 0.001, error_rate: 0.01, comparator: Comparator::Dice, kind: FieldKind::Bitmask, bitsize: 16 },
        );
        let epi = EpilinkConfig { fields, exchange_groups: vec![], threshold: 0.9, tentative_threshold: 0.7 };
        CircuitConfig::new(epi, false, 32).unwrap()
    }

    #[test]
    fn missing_entry_zeroes_delta_and_hw() {
        let circuit = Party::new(7);
        let c = cfg();
        let record: Record = BTreeMap::from([("bm_1".to_string(), None)]);
        let shares = shape_client_record(&circuit, &c, &record, 3, ShareKind::Gmw, true);
        let entry = &shares["bm_1"];
        assert_eq!(entry.delta.reveal_clear(), vec![0, 0, 0]);
        assert_eq!(entry.hw.as_ref().unwrap().reveal_clear(), vec![0, 0, 0]);
    }

    #[test]
    fn present_entry_reports_correct_hamming_weight() {
        let circuit = Party::new(7);
        let c = cfg();
        let record: Record = BTreeMap::from([("bm_1".to_string(), Some(vec![0b0111_0111]))]);
        let shares = shape_client_record(&circuit, &c, &record, 1, ShareKind::Gmw, true);
        let entry = &shares["bm_1"];
        assert_eq!(entry.delta.reveal_clear(), vec![1]);
        assert_eq!(entry.hw.as_ref().unwrap().reveal_clear(), vec![6]);
        assert_eq!(entry.value.hammingweight(ShareKind::Gmw).reveal_clear(), vec![6]);
    }

    #[test]
    fn weight_cache_reuses_share_for_same_pair() {
        let circuit = Party::new(7);
        let c = cfg();
        let mut cache = ConstantCache::new(&circuit, &c, 2, ShareKind::Gmw, true);
        let a = cache.rescaled_weight(&c, &"bm_1".to_string(), &"bm_1".to_string()).unwrap();
        let b = cache.rescaled_weight(&c, &"bm_1".to_string(), &"bm_1".to_string()).unwrap();
        assert_eq!(a.reveal_clear(), b.reveal_clear());
    }
}
