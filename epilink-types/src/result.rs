use serde::{Deserialize, Serialize};

/// The per-client-record result of a linkage computation.
///
/// `index`, `is_match` and `is_tentative_match` are revealed according to
/// the circuit's matching mode; `num`/`den` are only populated when the
/// debug result variant is requested (see `epilink-core::builder`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkageResult {
    /// Index of the best-matching database row.
    pub index: u32,
    /// Whether the best score cleared the definitive-match threshold.
    pub is_match: bool,
    /// Whether the best score cleared the tentative-match threshold.
    pub is_tentative_match: bool,
    /// Winning score numerator, only set in the debug result variant.
    pub num: Option<u32>,
    /// Winning score denominator, only set in the debug result variant.
    pub den: Option<u32>,
}

/// The aggregate result of a counting computation over a batch of client
/// records against a database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountResult {
    /// Number of client records whose best match cleared the definitive
    /// threshold.
    pub matches: u32,
    /// Number of client records whose best match cleared the tentative
    /// threshold.
    pub tentative_matches: u32,
}
