//! Reference in-process two-party executor.
//!
//! [`Party`] owns the randomness and gate-count bookkeeping for one circuit
//! build+execute cycle. Shares ([`crate::share::BoolShare`],
//! [`crate::share::ArithShare`]) hold an [`std::rc::Rc`] to a `Party`,
//! mirroring the design note that wrappers should borrow the owning
//! circuit rather than own it.

use std::cell::RefCell;
use std::rc::Rc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha12Rng;

/// Counts of gates emitted so far, used by `epilink-driver`'s `StatsPrinter`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateStats {
    /// Boolean AND gates (nonlinear).
    pub and_gates: u64,
    /// Boolean XOR gates (linear, free).
    pub xor_gates: u64,
    /// Arithmetic multiplication gates (nonlinear).
    pub mul_gates: u64,
    /// Sharing conversion gates (A2B, B2A, ...).
    pub conv_gates: u64,
    /// Upper bound on circuit depth, incremented on every nonlinear gate.
    pub depth: u64,
}

/// Owner of one party's view of a circuit build+execute cycle: the source
/// of shared randomness used to re-share intermediate values, and the gate
/// counters used for statistics.
pub struct Party {
    rng: RefCell<ChaCha12Rng>,
    stats: RefCell<GateStats>,
}

impl Party {
    /// Creates a new party context seeded deterministically, so that tests
    /// and benchmarks are reproducible.
    pub fn new(seed: u64) -> Rc<Self> {
        Rc::new(Self {
            rng: RefCell::new(ChaCha12Rng::seed_from_u64(seed)),
            stats: RefCell::new(GateStats::default()),
        })
    }

    /// A snapshot of the gate counters emitted so far.
    pub fn stats(&self) -> GateStats {
        *self.stats.borrow()
    }

    /// Resets gate counters for a fresh build+execute cycle; randomness is
    /// left running so successive cycles don't repeat the same shares.
    pub fn reset_stats(&self) {
        *self.stats.borrow_mut() = GateStats::default();
    }

    pub(crate) fn next_unit(&self) -> crate::share::CircUnit {
        self.rng.borrow_mut().next_u64()
    }

    pub(crate) fn bump_xor(&self, n: u64) {
        self.stats.borrow_mut().xor_gates += n;
    }

    pub(crate) fn bump_and(&self, n: u64) {
        let mut s = self.stats.borrow_mut();
        s.and_gates += n;
        s.depth += 1;
    }

    pub(crate) fn bump_mul(&self, n: u64) {
        let mut s = self.stats.borrow_mut();
        s.mul_gates += n;
        s.depth += 1;
    }

    pub(crate) fn bump_conv(&self, n: u64) {
        let mut s = self.stats.borrow_mut();
        s.conv_gates += n;
        s.depth += 1;
    }

    /// Splits each clear value in `values` into two XOR shares.
    pub(crate) fn reshare_xor(&self, values: &[crate::share::CircUnit], mask: crate::share::CircUnit) -> (Vec<crate::share::CircUnit>, Vec<crate::share::CircUnit>) {
        let mut a = Vec::with_capacity(values.len());
        let mut b = Vec::with_capacity(values.len());
        for &v in values {
            let r = self.next_unit() & mask;
            a.push(r);
            b.push((v ^ r) & mask);
        }
        (a, b)
    }

    /// Splits each clear value in `values` into two additive shares modulo
    /// `2^bitlen`.
    pub(crate) fn reshare_add(&self, values: &[crate::share::CircUnit], mask: crate::share::CircUnit) -> (Vec<crate::share::CircUnit>, Vec<crate::share::CircUnit>) {
        let mut a = Vec::with_capacity(values.len());
        let mut b = Vec::with_capacity(values.len());
        for &v in values {
            let r = self.next_unit() & mask;
            a.push(r);
            b.push(v.wrapping_sub(r) & mask);
        }
        (a, b)
    }
}
