//! Polymorphism over the multiplication space (see §4.5.4): the circuit
//! builder is written generically against [`MultShare`], which is either
//! [`ArithShare`] (`use_conversion = true`, usually cheaper) or
//! [`BoolShare`] (`use_conversion = false`, cheaper when few
//! multiplications occur). This uses a runtime strategy enum rather than a
//! compile-time generic, since the choice is a per-computation
//! `CircuitConfig` setting, not a type known at compile time.

use std::rc::Rc;

use crate::backend::local::Party;
use crate::share::{ArithShare, BoolShare, CircUnit, Reveal, ShareKind};

/// A share in whichever space multiplications are currently performed.
#[derive(Clone)]
pub enum MultShare {
    /// Multiplications happen in Arithmetic space (conversions used for AND/compare).
    Arith(ArithShare),
    /// Multiplications happen in Boolean space directly.
    Bool(BoolShare),
}

impl MultShare {
    /// A public constant in the active multiplication space.
    pub fn constant(circuit: &Rc<Party>, value: CircUnit, bitlen: u32, nvals: usize, use_conversion: bool, kind: ShareKind) -> Self {
        if use_conversion {
            MultShare::Arith(ArithShare::constant(circuit, value, bitlen, nvals))
        } else {
            MultShare::Bool(BoolShare::constant(circuit, value, bitlen, nvals, kind))
        }
    }

    /// Lifts a single-bit Boolean value (e.g. a `delta`/`eq` flag) into the
    /// active multiplication space.
    pub fn from_bool(b: &BoolShare, use_conversion: bool) -> Self {
        if use_conversion {
            MultShare::Arith(b.to_arith())
        } else {
            MultShare::Bool(b.clone())
        }
    }

    /// Number of SIMD slots.
    pub fn nvals(&self) -> usize {
        match self {
            MultShare::Arith(a) => a.nvals(),
            MultShare::Bool(b) => b.nvals(),
        }
    }

    /// Addition (linear in both spaces).
    pub fn add(&self, other: &Self) -> Self {
        match (self, other) {
            (MultShare::Arith(a), MultShare::Arith(b)) => MultShare::Arith(a.add(b)),
            (MultShare::Bool(a), MultShare::Bool(b)) => MultShare::Bool(a.xor(b)),
            _ => panic!("mismatched multiplication spaces"),
        }
    }

    /// Secret-secret multiplication, as unsigned integers in both spaces: a
    /// single conversion-free gate in Arithmetic space, a reveal-compute-
    /// reshare integer multiply in Boolean space. Per §4.5.4 the two must
    /// stay bit-identical; using [`BoolShare::and`] here would only be
    /// correct for single-bit operands (see `tests/multiplication_spaces.rs`).
    pub fn mul(&self, other: &Self) -> Self {
        match (self, other) {
            (MultShare::Arith(a), MultShare::Arith(b)) => MultShare::Arith(a.mul(b)),
            (MultShare::Bool(a), MultShare::Bool(b)) => MultShare::Bool(a.mul(b)),
            _ => panic!("mismatched multiplication spaces"),
        }
    }

    /// Multiplication by a *public* constant, as unsigned integers in both
    /// spaces: free in Arithmetic space (`a * c`); a reveal-compute-reshare
    /// integer multiply in Boolean space (a mux between `c` and zero would
    /// only be correct when `self` is a 0/1 flag, not a full-width operand
    /// like `den`).
    pub fn mul_public(&self, c: CircUnit) -> Self {
        match self {
            MultShare::Arith(a) => MultShare::Arith(a.mul_const(c)),
            MultShare::Bool(a) => MultShare::Bool(a.mul_const(c)),
        }
    }

    /// Converts to Boolean sharing, e.g. for threshold comparisons.
    pub fn to_bool(&self, kind: ShareKind) -> BoolShare {
        match self {
            MultShare::Arith(a) => a.to_bool(kind),
            MultShare::Bool(b) => b.to_kind(kind),
        }
    }

    /// Converts to Arithmetic sharing.
    pub fn to_arith(&self) -> ArithShare {
        match self {
            MultShare::Arith(a) => a.clone(),
            MultShare::Bool(b) => b.to_arith(),
        }
    }

    /// Multiplexes `a`/`b` per-slot according to the single-bit `sel`,
    /// staying in whichever multiplication space `a`/`b` occupy: a direct
    /// mux in Boolean space, `sel*a + (1-sel)*b` in Arithmetic space.
    pub fn select(sel: &BoolShare, a: &Self, b: &Self) -> Self {
        match (a, b) {
            (MultShare::Bool(a), MultShare::Bool(b)) => MultShare::Bool(sel.mux(a, b)),
            (MultShare::Arith(a), MultShare::Arith(b)) => {
                let circuit = a.circuit().clone();
                let arith_sel = sel.to_arith();
                let one = ArithShare::constant(&circuit, 1, a.bitlen(), a.nvals());
                let not_sel = one.sub(&arith_sel);
                MultShare::Arith(arith_sel.mul(a).add(&not_sel.mul(b)))
            }
            _ => panic!("mismatched multiplication spaces"),
        }
    }

    /// Reconstructs the clear value(s) (test/debug use only).
    pub fn reveal_clear(&self) -> Vec<CircUnit> {
        match self {
            MultShare::Arith(a) => a.reveal_clear(),
            MultShare::Bool(b) => b.reveal_clear(),
        }
    }
}
