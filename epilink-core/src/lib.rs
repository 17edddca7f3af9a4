#![deny(missing_docs, clippy::unwrap_used)]
//! Secure circuit construction and evaluation engine for Secure EpiLinker.
//!
//! This crate implements the cryptography-adjacent core described by the
//! system: typed share wrappers over a pluggable two-party MPC backend
//! ([`share`]), the balanced-tree reduction and quotient-folding gadgets
//! that the scoring circuit is built from ([`gadgets`]), the per-field
//! input shaping layer ([`shaper`]), the EpiLink circuit builder itself
//! ([`builder`]), and a bit-identical clear-text oracle used to validate
//! the circuit in tests ([`oracle`]).
//!
//! The crate does not implement oblivious transfer or garbled circuits
//! itself; it is written against a small [`backend::Backend`] trait, with
//! one concrete, non-cryptographic reference implementation
//! ([`backend::local`]) shipped under the `local-backend` feature so the
//! circuit-construction logic can be exercised end-to-end without an
//! external framework.

pub mod backend;
pub mod builder;
pub mod gadgets;
pub mod mult;
pub mod oracle;
pub mod shaper;
pub mod share;

pub use builder::{CircuitBuilder, CircuitState};
pub use mult::MultShare;
pub use share::{ArithShare, BoolShare, CircUnit, OutShare, Role, WideBoolShare};
