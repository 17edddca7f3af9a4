#![deny(missing_docs)]
//! Shared type definitions for Secure EpiLinker.
//!
//! This crate groups together the plain-old-data types that both parties of
//! the two-party linkage protocol must agree on bit-for-bit before a circuit
//! is built: field specifications, the public [`EpilinkConfig`], the derived
//! [`circuit_config::CircuitConfig`], the record/database model, and the
//! error taxonomy raised by the [`epilink-core`](https://docs.rs/taceo-epilink-core)
//! and [`epilink-driver`](https://docs.rs/taceo-epilink-driver) crates.
//!
//! None of the types here know anything about secret sharing or circuits;
//! they are the "public config / cleartext shape" layer described in the
//! system's data model.

mod circuit_config;
mod config;
mod error;
mod field;
mod record;
mod result;

pub use circuit_config::{BooleanSharing, CircuitConfig, ceil_log2};
pub use config::EpilinkConfig;
pub use error::{ConfigError, FrameworkError, InputError, ProtocolError, StateError};
pub use field::{Comparator, FieldKind, FieldSpec};
pub use record::{Bitmask, ComparisonIndex, Database, FieldEntry, Record};
pub use result::{CountResult, LinkageResult};

/// The name of a field, used as the key in [`EpilinkConfig::fields`] and
/// throughout [`Record`]/[`Database`].
pub type FieldName = String;
