use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, FieldName, FieldSpec};

/// The public EpiLink scoring configuration, agreed on by both parties
/// before the protocol starts.
///
/// Both parties must hold bit-identical copies: a pre-protocol handshake
/// compares a canonical serialisation of this struct and aborts on
/// mismatch (see `epilink-driver`'s `connect` step).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpilinkConfig {
    /// Field name to specification. Kept as a `BTreeMap` so that iteration
    /// order (used when emitting gates) is always lexicographic, a
    /// precondition for both parties building identical circuits.
    pub fields: BTreeMap<FieldName, FieldSpec>,
    /// Sets of fields whose order may be permuted during scoring, in
    /// user-supplied order. Each set must be disjoint from every other and
    /// all its members must share comparator and bitsize.
    pub exchange_groups: Vec<BTreeSet<FieldName>>,
    /// Score at or above which a record pair is a definitive match, in `[0, 1]`.
    pub threshold: f64,
    /// Score at or above which a record pair is a tentative match, in `[0, 1]`.
    pub tentative_threshold: f64,
}

impl EpilinkConfig {
    /// Validates the configuration, checking field soundness, exchange
    /// group disjointness/uniformity and threshold ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for spec in self.fields.values() {
            spec.weight()?;
        }

        let mut seen = BTreeSet::new();
        for group in &self.exchange_groups {
            if group.len() < 2 {
                continue;
            }
            let mut members = group.iter();
            let first_name = members.next().expect("checked len >= 2 above");
            let first = self.field(first_name)?;
            for name in members {
                let spec = self.field(name)?;
                if spec.comparator != first.comparator {
                    return Err(ConfigError::MixedComparatorExchangeGroup(name.clone()));
                }
                if spec.bitsize != first.bitsize {
                    return Err(ConfigError::MixedComparatorExchangeGroup(name.clone()));
                }
            }
            for name in group {
                if !seen.insert(name.clone()) {
                    return Err(ConfigError::OverlappingExchangeGroups(name.clone()));
                }
            }
        }

        if !(0.0..=1.0).contains(&self.threshold) || !(0.0..=1.0).contains(&self.tentative_threshold) {
            return Err(ConfigError::InvalidThreshold {
                threshold: self.threshold,
                tentative_threshold: self.tentative_threshold,
            });
        }
        if self.threshold < self.tentative_threshold {
            return Err(ConfigError::InvalidThreshold {
                threshold: self.threshold,
                tentative_threshold: self.tentative_threshold,
            });
        }
        Ok(())
    }

    /// Looks up a field by name, failing with [`ConfigError::UnknownField`]
    /// if it is not present in `fields`.
    pub fn field(&self, name: &str) -> Result<&FieldSpec, ConfigError> {
        self.fields
            .get(name)
            .ok_or_else(|| ConfigError::UnknownField(name.to_string()))
    }

    /// Number of configured fields.
    pub fn nfields(&self) -> usize {
        self.fields.len()
    }

    /// The maximum real-valued weight over all fields, used to rescale
    /// weights into fixed-point integers.
    pub fn max_weight(&self) -> Result<f64, ConfigError> {
        self.fields
            .values()
            .map(FieldSpec::weight)
            .try_fold(0.0_f64, |acc, w| w.map(|w| acc.max(w)))
    }

    /// Returns the exchange group containing `name`, if any.
    pub fn exchange_group_of<'a>(&'a self, name: &str) -> Option<&'a BTreeSet<FieldName>> {
        self.exchange_groups.iter().find(|g| g.contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Comparator, FieldKind};

    fn field(bitsize: u32, comparator: Comparator) -> FieldSpec {
        FieldSpec {
            frequency: 0.1,
            error_rate: 0.01,
            comparator,
            kind: FieldKind::Bitmask,
            bitsize,
        }
    }

    #[test]
    fn rejects_mixed_comparator_exchange_group() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), field(8, Comparator::Dice));
        fields.insert("b".to_string(), field(8, Comparator::Binary));
        let cfg = EpilinkConfig {
            fields,
            exchange_groups: vec![BTreeSet::from(["a".to_string(), "b".to_string()])],
            threshold: 0.9,
            tentative_threshold: 0.7,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MixedComparatorExchangeGroup(_))
        ));
    }

    #[test]
    fn rejects_overlapping_exchange_groups() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), field(8, Comparator::Dice));
        fields.insert("b".to_string(), field(8, Comparator::Dice));
        fields.insert("c".to_string(), field(8, Comparator::Dice));
        let cfg = EpilinkConfig {
            fields,
            exchange_groups: vec![
                BTreeSet::from(["a".to_string(), "b".to_string()]),
                BTreeSet::from(["b".to_string(), "c".to_string()]),
            ],
            threshold: 0.9,
            tentative_threshold: 0.7,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OverlappingExchangeGroups(_))
        ));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let cfg = EpilinkConfig {
            fields: BTreeMap::new(),
            exchange_groups: vec![],
            threshold: 0.5,
            tentative_threshold: 0.6,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidThreshold { .. })));
    }
}
