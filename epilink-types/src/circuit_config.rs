use serde::{Deserialize, Serialize};

use crate::{ConfigError, EpilinkConfig, FieldName};

/// Default working bit width for circuit values (`CircUnit = u64`, but 32
/// bits is plenty of headroom for the weight/Dice precisions this engine
/// derives).
pub const DEFAULT_BITLEN: u32 = u32::BITS;

/// Which Boolean sharing is primary; the other is reached only through a
/// conversion from the primary one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanSharing {
    /// Garbled-circuit (Yao) sharing is primary.
    Yao,
    /// GMW (secret-sharing based) Boolean sharing is primary.
    Gmw,
}

/// `ceil(log2(n))`: the number of bits needed to represent values `0..n`.
pub fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        64 - (n - 1).leading_zeros()
    }
}

/// Derived circuit configuration: wraps an [`EpilinkConfig`] with the
/// fixed-point precisions, bit width and sharing-space choices that govern
/// how the circuit builder lays out gates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// The public scoring configuration.
    pub epi: EpilinkConfig,
    /// If `true`, the winning record index is revealed in plaintext to both
    /// parties; if `false` it stays secret-shared.
    pub matching_mode: bool,
    /// Integer width used for circuit values (default 32).
    pub bitlen: u32,
    /// Whether multiplications go through Arithmetic sharing (`true`,
    /// usually faster) or stay entirely in Boolean space (`false`, cheaper
    /// when few multiplications occur).
    pub use_conversion: bool,
    /// Which Boolean sharing is primary.
    pub boolean_sharing: BooleanSharing,
    dice_prec: u32,
    weight_prec: u32,
}

impl CircuitConfig {
    /// Builds a `CircuitConfig` with automatically derived precisions (see
    /// [`CircuitConfig::set_precisions`]'s invariant).
    pub fn new(
        epi: EpilinkConfig,
        matching_mode: bool,
        bitlen: u32,
    ) -> Result<Self, ConfigError> {
        epi.validate()?;
        let max_bm_size = epi
            .fields
            .values()
            .filter(|f| f.comparator == crate::Comparator::Dice)
            .map(|f| f.bitsize as u64)
            .max()
            .unwrap_or(0);
        // the 16-bit fixed-point integer divider used for the Dice
        // coefficient leaves one sign/overflow guard bit and one bit per
        // power-of-two step needed to hold `max_bm_size + 1` ungrouped.
        let dice_prec = 16u32
            .saturating_sub(1)
            .saturating_sub(ceil_log2(max_bm_size + 1));
        let nfields = epi.nfields() as u64;
        let log_nn = ceil_log2(nfields * nfields);
        let weight_prec = (bitlen.saturating_sub(log_nn).saturating_sub(dice_prec)) / 2;

        let mut cfg = Self {
            epi,
            matching_mode,
            bitlen,
            use_conversion: true,
            boolean_sharing: BooleanSharing::Yao,
            dice_prec: 0,
            weight_prec: 0,
        };
        cfg.set_precisions(dice_prec, weight_prec)?;
        Ok(cfg)
    }

    /// Bits of fixed-point precision used for the Dice coefficient.
    pub fn dice_prec(&self) -> u32 {
        self.dice_prec
    }

    /// Bits of fixed-point precision used for rescaled weights.
    pub fn weight_prec(&self) -> u32 {
        self.weight_prec
    }

    /// Manually overrides the precisions, re-checking the overflow
    /// invariant `dice_prec + 2*weight_prec + ceil_log2(nfields^2) <= bitlen`.
    pub fn set_precisions(&mut self, dice_prec: u32, weight_prec: u32) -> Result<(), ConfigError> {
        let log_nn = ceil_log2(self.epi.nfields() as u64 * self.epi.nfields() as u64);
        let used = dice_prec as u64 + 2 * weight_prec as u64 + log_nn as u64;
        if used > self.bitlen as u64 {
            return Err(ConfigError::PrecisionOverflow {
                dice_prec,
                weight_prec,
                nfields: self.epi.nfields(),
                bitlen: self.bitlen,
            });
        }
        self.dice_prec = dice_prec;
        self.weight_prec = weight_prec;
        Ok(())
    }

    /// Sets "ideal" precisions that equally split the available bits
    /// between weight and Dice precision, ignoring the 16-bit limit of the
    /// prebuilt integer divider. Intended for benchmarking only: circuits
    /// built this way cannot reuse the shipped `<bitsize>_<dice_prec>.aby`
    /// divider files.
    pub fn set_ideal_precision(&mut self) -> Result<(), ConfigError> {
        let log_nn = ceil_log2(self.epi.nfields() as u64 * self.epi.nfields() as u64);
        let budget = self.bitlen.saturating_sub(log_nn);
        let weight_prec = budget / 3;
        let dice_prec = budget - 2 * weight_prec;
        self.set_precisions(dice_prec, weight_prec)
    }

    /// Rescaled integer weight for a single field:
    /// `round(w / max_weight * (2^weight_prec - 1))`.
    pub fn rescaled_weight(&self, name: &str) -> Result<u32, ConfigError> {
        let w = self.epi.field(name)?.weight()?;
        Ok(self.rescale(w))
    }

    /// Rescaled integer weight for a pair of fields from an exchange
    /// group: the arithmetic mean of their real weights, rescaled.
    pub fn rescaled_weight_pair(&self, left: &str, right: &str) -> Result<u32, ConfigError> {
        let w_left = self.epi.field(left)?.weight()?;
        let w_right = self.epi.field(right)?.weight()?;
        Ok(self.rescale((w_left + w_right) / 2.0))
    }

    fn rescale(&self, w: f64) -> u32 {
        let max_weight = match self.epi.max_weight() {
            Ok(w) if w > 0.0 => w,
            _ => return 0,
        };
        let max_val = (1u64 << self.weight_prec) - 1;
        ((w / max_weight * max_val as f64).round() as u64).min(max_val) as u32
    }

    /// `round(threshold * 2^dice_prec)`.
    pub fn threshold_rescaled(&self) -> u32 {
        (self.epi.threshold * (1u64 << self.dice_prec) as f64).round() as u32
    }

    /// `round(tentative_threshold * 2^dice_prec)`.
    pub fn tentative_threshold_rescaled(&self) -> u32 {
        (self.epi.tentative_threshold * (1u64 << self.dice_prec) as f64).round() as u32
    }

    /// Bits required to store the Hamming weight of a bitmask of the given
    /// bit size: `ceil_log2(size + 1)`.
    pub fn hw_size(size: u32) -> u32 {
        ceil_log2(size as u64 + 1)
    }

    /// All fields referenced by name, in `(left, right)` comparison pairs:
    /// exchange-group fields appear with every other member of their group,
    /// remaining fields appear paired with themselves.
    pub fn comparison_names(&self) -> Vec<(FieldName, FieldName)> {
        let mut pairs = Vec::new();
        let mut grouped = std::collections::BTreeSet::new();
        for group in &self.epi.exchange_groups {
            for left in group {
                for right in group {
                    pairs.push((left.clone(), right.clone()));
                }
                grouped.insert(left.clone());
            }
        }
        for name in self.epi.fields.keys() {
            if !grouped.contains(name) {
                pairs.push((name.clone(), name.clone()));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Comparator, FieldKind, FieldSpec};
    use std::collections::BTreeMap;

    fn simple_config() -> EpilinkConfig {
        let mut fields = BTreeMap::new();
        fields.insert(
            "bm_1".to_string(),
            FieldSpec {
                frequency: 0.001,
                error_rate: 0.01,
                comparator: Comparator::Dice,
                kind: FieldKind::Bitmask,
                bitsize: 500,
            },
        );
        EpilinkConfig {
            fields,
            exchange_groups: vec![],
            threshold: 0.9,
            tentative_threshold: 0.7,
        }
    }

    #[test]
    fn derives_precisions_within_bitlen() {
        let cfg = CircuitConfig::new(simple_config(), false, DEFAULT_BITLEN).unwrap();
        let log_nn = ceil_log2(1);
        assert!(cfg.dice_prec() + 2 * cfg.weight_prec() + log_nn <= cfg.bitlen);
    }

    #[test]
    fn rejects_precision_overflow() {
        let mut cfg = CircuitConfig::new(simple_config(), false, DEFAULT_BITLEN).unwrap();
        assert!(cfg.set_precisions(30, 30).is_err());
    }

    #[test]
    fn ceil_log2_matches_powers_of_two() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(501), 9);
    }
}
