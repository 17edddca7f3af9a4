/// Errors raised while constructing or validating an [`crate::EpilinkConfig`]
/// or [`crate::CircuitConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field was declared with `bitsize = 0`.
    #[error("field has bitsize 0")]
    ZeroBitsize,
    /// A field's frequency is outside `(0, 1]`.
    #[error("invalid frequency {0}, must be in (0, 1]")]
    InvalidFrequency(f64),
    /// A field's error rate is outside `[0, 1)`.
    #[error("invalid error rate {0}, must be in [0, 1)")]
    InvalidErrorRate(f64),
    /// A field's derived weight is negative or non-finite.
    #[error(
        "field weight is negative or non-finite: log2((1 - {error_rate}) / {frequency}) = {weight}"
    )]
    NegativeWeight {
        /// The computed weight.
        weight: f64,
        /// The field's configured frequency.
        frequency: f64,
        /// The field's configured error rate.
        error_rate: f64,
    },
    /// An exchange group references a field name that is not in `fields`.
    #[error("exchange group references unknown field {0:?}")]
    UnknownField(String),
    /// Two fields in the same exchange group have different comparators or
    /// bit sizes.
    #[error("field {0:?} does not share comparator/bitsize with the rest of its exchange group")]
    MixedComparatorExchangeGroup(String),
    /// A field belongs to more than one exchange group.
    #[error("field {0:?} appears in more than one exchange group")]
    OverlappingExchangeGroups(String),
    /// `threshold < tentative_threshold`, or either is outside `[0, 1]`.
    #[error(
        "invalid thresholds: threshold={threshold}, tentative_threshold={tentative_threshold}"
    )]
    InvalidThreshold {
        /// The configured definitive-match threshold.
        threshold: f64,
        /// The configured tentative-match threshold.
        tentative_threshold: f64,
    },
    /// The requested precisions don't fit in `bitlen`:
    /// `dice_prec + 2*weight_prec + ceil_log2(nfields^2) > bitlen`.
    #[error(
        "precision overflow: dice_prec={dice_prec}, weight_prec={weight_prec}, nfields={nfields}, bitlen={bitlen}"
    )]
    PrecisionOverflow {
        /// Requested Dice precision.
        dice_prec: u32,
        /// Requested weight precision.
        weight_prec: u32,
        /// Number of configured fields.
        nfields: usize,
        /// Circuit integer width.
        bitlen: u32,
    },
}

/// Errors raised while shaping or validating per-party inputs.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// A database column's length doesn't match the others.
    #[error("database column length mismatch: expected {expected}, got {actual}")]
    ColumnLengthMismatch {
        /// Length of the first column seen.
        expected: usize,
        /// Length of the mismatched column.
        actual: usize,
    },
    /// `set_input` was called twice without an intervening `reset`.
    #[error("input already set; call reset() first")]
    InputAlreadySet,
    /// A field value's byte length exceeds the field's declared bitsize.
    #[error("field {field:?} value is {actual_bits} bits wide, exceeds declared bitsize {bitsize}")]
    ValueTooWide {
        /// The offending field.
        field: String,
        /// Bits the supplied value actually occupies.
        actual_bits: u32,
        /// The field's declared bit size.
        bitsize: u32,
    },
    /// A record is missing a field declared in the config.
    #[error("record is missing declared field {0:?}")]
    MissingField(String),
}

/// Errors raised by the circuit builder's lifecycle state machine.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// `set_input` was called while already past `UNBUILT`.
    #[error("cannot set input in state {state}, call reset() first")]
    InputAlreadySet {
        /// The state the builder was in.
        state: &'static str,
    },
    /// A build method was called before `set_input`.
    #[error("cannot build circuit before input is set (state {state})")]
    BuildBeforeInput {
        /// The state the builder was in.
        state: &'static str,
    },
    /// `run_setup_phase`/execute was called before `BUILT`.
    #[error("cannot execute before circuit is built (state {state})")]
    ExecuteBeforeBuild {
        /// The state the builder was in.
        state: &'static str,
    },
    /// A reveal was requested before execution completed.
    #[error("cannot reveal output before build+execute completes (state {state})")]
    RevealBeforeExecute {
        /// The state the builder was in.
        state: &'static str,
    },
}

/// Errors raised during the two-party connection / handshake protocol.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The peer disconnected mid-protocol.
    #[error("peer disconnected")]
    PeerDisconnected,
    /// The peer's canonical config serialisation didn't match ours.
    #[error("config mismatch detected during handshake")]
    ConfigMismatch,
    /// The peer aborted after partially revealing output.
    #[error("peer aborted mid-reveal, no partial result is available")]
    AbortedReveal,
}

/// Errors surfaced from the underlying MPC framework (the "host framework"
/// providing Boolean/Yao/Arithmetic sharings and their conversions).
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    /// A prebuilt integer-division sub-circuit file could not be opened.
    #[error("could not open division sub-circuit file {path:?}: {source}")]
    DivisionCircuitFile {
        /// Path that was opened.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The framework reported an internal (e.g. memory or I/O) failure.
    #[error("framework error: {0}")]
    Internal(String),
}
