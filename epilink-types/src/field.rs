use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// How the clear value of a field is encoded on the wire before it is
/// fed into the circuit as a bitmask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldKind {
    /// Already a bitmask (e.g. an n-gram encoded string).
    Bitmask,
    /// A fixed-width integer, compared bitwise for equality.
    Integer,
    /// A floating point number, packed into its bit pattern before comparison.
    Number,
    /// A string, hashed or packed into a fixed-width bitmask.
    String,
}

/// The comparator applied to a field when scoring two records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Comparator {
    /// Dice coefficient similarity over n-gram bitmasks.
    Dice,
    /// Plain bitwise equality.
    Binary,
}

/// A single named, weighted, comparable record field.
///
/// The field's statistical weight is derived from its estimated error rate
/// and frequency: `w = log2((1 - error_rate) / frequency)`, following the
/// EpiLink scoring formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Estimated frequency of the field's value space, `(0, 1]`.
    pub frequency: f64,
    /// Estimated error rate of recording the field, `[0, 1)`.
    pub error_rate: f64,
    /// Which comparator to apply when scoring this field.
    pub comparator: Comparator,
    /// How the clear value is encoded.
    pub kind: FieldKind,
    /// Exact working bit width of the field on the wire.
    pub bitsize: u32,
}

impl FieldSpec {
    /// Validates the field and returns its real-valued weight
    /// `log2((1 - error_rate) / frequency)`.
    pub fn weight(&self) -> Result<f64, ConfigError> {
        if self.bitsize == 0 {
            return Err(ConfigError::ZeroBitsize);
        }
        if !(0.0..=1.0).contains(&self.frequency) || self.frequency == 0.0 {
            return Err(ConfigError::InvalidFrequency(self.frequency));
        }
        if !(0.0..1.0).contains(&self.error_rate) {
            return Err(ConfigError::InvalidErrorRate(self.error_rate));
        }
        let w = ((1.0 - self.error_rate) / self.frequency).log2();
        if w < 0.0 || !w.is_finite() {
            return Err(ConfigError::NegativeWeight {
                weight: w,
                frequency: self.frequency,
                error_rate: self.error_rate,
            });
        }
        Ok(w)
    }
}
