//! The pluggable "host MPC framework" boundary.
//!
//! This system deliberately does not prescribe a secure two-party protocol
//! (oblivious transfer, garbled circuits, or which secret-sharing scheme
//! backs GMW) — it assumes a host framework that offers Boolean-Yao,
//! Boolean-GMW and Arithmetic sharings with efficient conversions, SIMD
//! gate batching, and reveal-to-one-or-both-parties. [`share`](crate::share)
//! is written directly against the single concrete implementation shipped
//! here, [`local`], rather than against an abstract trait: the protocol
//! itself is out of scope, and a second implementation would only be
//! useful once a concrete external framework is chosen for production use.
//!
//! [`local::Party`] is a non-cryptographic reference implementation: both
//! halves of every share are materialised in one process, and nonlinear
//! gates are evaluated by momentarily reconstructing the clear operand,
//! applying the gate function, and re-splitting the result with fresh
//! randomness. This is sufficient to validate that the circuit-construction
//! logic — the actual subject of this crate — produces results identical
//! to the clear-text oracle (see [`crate::oracle`] and Property 1 of the
//! design), without requiring an external OT/GC library. It provides no
//! confidentiality and must never be used outside of tests and local
//! demonstrations.

pub mod local;
