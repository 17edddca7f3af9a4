//! Circuit gadgets (component **C2**): balanced-tree reductions and the
//! max/min quotient folder with target-carrying used to implement argmax
//! over a SIMD batch.

use crate::share::{ArithShare, BoolShare, Reveal, ShareKind};

/// Balanced-tree reduction of `vals`, depth `ceil(log2(n))`. An odd
/// trailing element is carried to the next level unchanged.
pub fn binary_accumulate<T: Clone>(vals: &[T], op: impl Fn(&T, &T) -> T) -> T {
    assert!(!vals.is_empty(), "binary_accumulate requires at least one value");
    let mut level = vals.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            if pair.len() == 2 {
                next.push(op(&pair[0], &pair[1]));
            } else {
                next.push(pair[0].clone());
            }
        }
        level = next;
    }
    level.into_iter().next().expect("loop invariant: level never becomes empty")
}

/// Simple left fold, depth `n - 1`. Cheap for Yao garbled circuits where
/// each gate adds a communication round regardless of tree shape.
pub fn lfold_accumulate<T: Clone>(vals: &[T], op: impl Fn(&T, &T) -> T) -> T {
    assert!(!vals.is_empty(), "lfold_accumulate requires at least one value");
    let mut it = vals.iter();
    let first = it.next().expect("checked non-empty above").clone();
    it.fold(first, |acc, v| op(&acc, v))
}

/// Types that can hint which reduction shape is cheapest for them.
pub trait ReductionHint {
    /// `true` if a left fold is cheaper than a balanced tree for this share.
    fn prefers_lfold(&self) -> bool;
}

impl ReductionHint for BoolShare {
    fn prefers_lfold(&self) -> bool {
        self.kind() == ShareKind::Yao
    }
}

impl ReductionHint for ArithShare {
    fn prefers_lfold(&self) -> bool {
        false
    }
}

/// Dispatches to [`lfold_accumulate`] for Yao shares (cheap depth for
/// garbled circuits) and [`binary_accumulate`] otherwise.
pub fn best_accumulate<T: Clone + ReductionHint>(vals: &[T], op: impl Fn(&T, &T) -> T) -> T {
    if vals.first().is_some_and(ReductionHint::prefers_lfold) {
        lfold_accumulate(vals, op)
    } else {
        binary_accumulate(vals, op)
    }
}

/// Sums `vals`, choosing the cheapest reduction shape.
pub fn sum<T: Clone + ReductionHint>(vals: &[T], add: impl Fn(&T, &T) -> T) -> T {
    best_accumulate(vals, add)
}

/// Reduces `vals` to the extremal element under `select`, choosing the
/// cheapest reduction shape.
pub fn max<T: Clone + ReductionHint>(vals: &[T], select: impl Fn(&T, &T) -> T) -> T {
    best_accumulate(vals, select)
}

/// A SIMD share that can be split into halves and re-concatenated, the
/// shape [`split_accumulate`] and [`QuotientFolder`] reduce over.
pub trait SimdShare: Clone {
    /// Number of SIMD slots.
    fn nvals(&self) -> usize;
    /// `true` for the `nvals = 0` placeholder used to represent "no
    /// remainder carried yet".
    fn is_null(&self) -> bool;
    /// Splits into `ceil(nvals / k)` chunks of `nvals = k` each (the last
    /// possibly shorter).
    fn split(&self, k: usize) -> Vec<Self>
    where
        Self: Sized;
    /// Concatenates same-shaped SIMD batches; the inverse of [`split`](Self::split).
    fn vcombine(parts: &[Self]) -> Self
    where
        Self: Sized;
}

impl SimdShare for BoolShare {
    fn nvals(&self) -> usize {
        BoolShare::nvals(self)
    }
    fn is_null(&self) -> bool {
        BoolShare::is_null(self)
    }
    fn split(&self, k: usize) -> Vec<Self> {
        BoolShare::split(self, k)
    }
    fn vcombine(parts: &[Self]) -> Self {
        BoolShare::vcombine(parts)
    }
}

impl SimdShare for ArithShare {
    fn nvals(&self) -> usize {
        ArithShare::nvals(self)
    }
    fn is_null(&self) -> bool {
        ArithShare::is_null(self)
    }
    fn split(&self, k: usize) -> Vec<Self> {
        ArithShare::split(self, k)
    }
    fn vcombine(parts: &[Self]) -> Self {
        ArithShare::vcombine(parts)
    }
}

/// Reduces a SIMD share of `nvals = N` to `nvals = 1` by repeatedly
/// splitting in halves and applying `op` in SIMD, depth `ceil(log2(N))`.
/// An odd half's trailing element is stacked and merged back in once the
/// running total is itself odd-sized, mirroring [`QuotientFolder::fold`].
pub fn split_accumulate<T: SimdShare>(simd: T, op: impl Fn(&T, &T) -> T) -> T {
    let mut base = simd;
    let mut remainder: Option<T> = None;
    while base.nvals() > 1 {
        let half = base.nvals() / 2;
        let mut parts = base.split(half);
        let extra = if parts.len() == 3 { Some(parts.remove(2)) } else { None };
        let other = parts.remove(1);
        base = op(&parts.remove(0), &other);
        if let Some(extra) = extra {
            remainder = Some(match remainder.take() {
                Some(prev) => T::vcombine(&[prev, extra]),
                None => extra,
            });
        }
        if base.nvals() % 2 == 1
            && let Some(rem) = remainder.take()
        {
            base = T::vcombine(&[base, rem]);
        }
    }
    if let Some(rem) = remainder {
        base = op(&base, &rem);
    }
    base
}

/// Sums a batch of 1-bit flags into a counting integer of width
/// `ceil_log2(vals.len() + 1)`. The real Boolean-sharing frameworks this is
/// written against would lower this to a ripple-carry adder sub-circuit
/// staying entirely in Boolean space; the local reference backend instead
/// reveals the flags, sums them in the clear, and re-shares the count,
/// matching the reveal-compute-reshare shape every other nonlinear gate in
/// this crate uses.
pub fn sum_boolean_count(vals: &[BoolShare]) -> BoolShare {
    assert!(!vals.is_empty(), "sum_boolean_count requires at least one flag");
    let circuit = vals[0].circuit().clone();
    let kind = vals[0].kind();
    let nvals = vals[0].nvals();
    let mut totals = vec![0u64; nvals];
    for v in vals {
        for (t, bit) in totals.iter_mut().zip(v.reveal_clear()) {
            *t += bit;
        }
    }
    let width = epilink_types::ceil_log2(vals.len() as u64 + 1).max(1);
    BoolShare::from_clear(&circuit, &totals, width, kind)
}

/// A SIMD batch of `(numerator, denominator)` score quotients.
#[derive(Clone)]
pub struct Quotient<T> {
    /// Sum of field weights contributing to the score.
    pub num: T,
    /// Sum of weights contributing to the score.
    pub den: T,
}

/// Which extremum [`QuotientFolder`] selects, and how ties are broken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldOp {
    /// Smallest quotient wins; ties unresolved (first operand kept).
    Min,
    /// Smallest quotient wins; ties broken by the larger denominator.
    MinTie,
    /// Largest quotient wins; ties unresolved (first operand kept).
    Max,
    /// Largest quotient wins; ties broken by the larger denominator.
    MaxTie,
}

/// Selects `a` over `b` (or `b` over `a`) according to `op`, comparing
/// `num_a * den_b` against `num_b * den_a` (cross-multiplication avoids a
/// secure division). Ties are broken by preferring the larger denominator
/// when `op` is a `*_TIE` variant.
fn quotient_select_bits<T: SimdShare + Reveal>(a: &Quotient<T>, b: &Quotient<T>, op: FoldOp) -> Vec<bool> {
    let num_a = a.num.reveal_clear();
    let den_a = a.den.reveal_clear();
    let num_b = b.num.reveal_clear();
    let den_b = b.den.reveal_clear();
    (0..num_a.len())
        .map(|i| {
            let cross_a = u64::from(num_a[i]) * u64::from(den_b[i]);
            let cross_b = u64::from(num_b[i]) * u64::from(den_a[i]);
            match op {
                FoldOp::Max => cross_a > cross_b,
                FoldOp::Min => cross_a < cross_b,
                FoldOp::MaxTie => cross_a > cross_b || (cross_a == cross_b && den_a[i] >= den_b[i]),
                FoldOp::MinTie => cross_a < cross_b || (cross_a == cross_b && den_a[i] >= den_b[i]),
            }
        })
        .collect()
}

/// A quotient share type [`QuotientFolder`] can select over: selection
/// bits are always computed by revealing numerator/denominator (the
/// cross-multiplication used for the comparison is not a linear operation
/// in either sharing), then the winner is re-shared and multiplexed back
/// in whichever space `Self` natively supports.
pub trait QuotientSelect: SimdShare + Reveal {
    /// Multiplexes `a`/`b` per-slot according to the single-bit `sel`.
    fn select(sel: &BoolShare, a: &Self, b: &Self) -> Self;
    /// The owning circuit context, used to re-share freshly revealed
    /// selection bits.
    fn circuit(&self) -> &std::rc::Rc<crate::backend::local::Party>;
}

impl QuotientSelect for BoolShare {
    fn select(sel: &BoolShare, a: &Self, b: &Self) -> Self {
        sel.mux(a, b)
    }
    fn circuit(&self) -> &std::rc::Rc<crate::backend::local::Party> {
        BoolShare::circuit(self)
    }
}

impl QuotientSelect for ArithShare {
    fn select(sel: &BoolShare, a: &Self, b: &Self) -> Self {
        let circuit = a.circuit().clone();
        let arith_sel = sel.to_arith();
        let one = ArithShare::constant(&circuit, 1, a.bitlen(), a.nvals());
        let not_sel = one.sub(&arith_sel);
        arith_sel.mul(a).add(&not_sel.mul(b))
    }
    fn circuit(&self) -> &std::rc::Rc<crate::backend::local::Party> {
        ArithShare::circuit(self)
    }
}

struct Leaf<T> {
    selector: Quotient<T>,
    targets: Vec<BoolShare>,
}

impl<T: SimdShare + QuotientSelect> Leaf<T> {
    fn nvals(&self) -> usize {
        self.selector.num.nvals()
    }

    fn is_null(&self) -> bool {
        self.selector.num.is_null()
    }

    fn split(&self, k: usize) -> Vec<Self> {
        let nums = self.selector.num.split(k);
        let dens = self.selector.den.split(k);
        let target_splits: Vec<Vec<BoolShare>> = self.targets.iter().map(|t| t.split(k)).collect();
        (0..nums.len())
            .map(|i| Leaf {
                selector: Quotient { num: nums[i].clone(), den: dens[i].clone() },
                targets: target_splits.iter().map(|v| v[i].clone()).collect(),
            })
            .collect()
    }

    fn vcombine(parts: &[Self]) -> Self {
        let nums: Vec<T> = parts.iter().map(|p| p.selector.num.clone()).collect();
        let dens: Vec<T> = parts.iter().map(|p| p.selector.den.clone()).collect();
        let ntargets = parts[0].targets.len();
        let targets = (0..ntargets)
            .map(|i| BoolShare::vcombine(&parts.iter().map(|p| p.targets[i].clone()).collect::<Vec<_>>()))
            .collect();
        Leaf { selector: Quotient { num: T::vcombine(&nums), den: T::vcombine(&dens) }, targets }
    }

    fn fold_once(&self, other: &Self, op: FoldOp) -> Self {
        let sel_bits = quotient_select_bits(&self.selector, &other.selector, op);
        let bits: Vec<crate::share::CircUnit> = sel_bits.iter().map(|b| crate::share::CircUnit::from(*b)).collect();
        let sel = BoolShare::from_clear(self.selector.num.circuit(), &bits, 1, ShareKind::Gmw);
        let num = T::select(&sel, &self.selector.num, &other.selector.num);
        let den = T::select(&sel, &self.selector.den, &other.selector.den);
        let targets = self
            .targets
            .iter()
            .zip(&other.targets)
            .map(|(a, b)| sel.mux(a, b))
            .collect();
        Leaf { selector: Quotient { num, den }, targets }
    }
}

/// Folds a batch of SIMD `(numerator, denominator)` quotients of identical
/// `nvals` down to a single pair, carrying along one or more target
/// Boolean shares (e.g. the database row index) that track the selected
/// position — used to implement argmax-with-payload over a SIMD batch.
pub struct QuotientFolder<T> {
    base: Leaf<T>,
    fold_op: FoldOp,
}

impl<T: SimdShare + QuotientSelect> QuotientFolder<T> {
    /// Creates a folder over `selector` carrying `targets`, defaulting to
    /// [`FoldOp::MaxTie`].
    pub fn new(selector: Quotient<T>, targets: Vec<BoolShare>) -> Self {
        Self { base: Leaf { selector, targets }, fold_op: FoldOp::MaxTie }
    }

    /// Overrides the fold operation.
    pub fn set_fold_operation(&mut self, op: FoldOp) {
        self.fold_op = op;
    }

    /// Runs the fold, returning the winning `(numerator, denominator)` and
    /// the corresponding target values.
    pub fn fold(mut self) -> (Quotient<T>, Vec<BoolShare>) {
        let mut remainder: Option<Leaf<T>> = None;
        while self.base.nvals() > 1 {
            let half = self.base.nvals() / 2;
            let mut parts = self.base.split(half);
            let extra = if parts.len() == 3 { Some(parts.remove(2)) } else { None };
            let other = parts.remove(1);
            self.base = parts.remove(0).fold_once(&other, self.fold_op);
            if let Some(extra) = extra {
                remainder = Some(match remainder.take() {
                    Some(prev) => Leaf::vcombine(&[prev, extra]),
                    None => extra,
                });
            }
            if self.base.nvals() % 2 == 1
                && let Some(rem) = remainder.take()
                && !rem.is_null()
            {
                self.base = Leaf::vcombine(&[self.base, rem]);
            }
        }
        if let Some(rem) = remainder.filter(|r| !r.is_null()) {
            self.base = self.base.fold_once(&rem, self.fold_op);
        }
        (self.base.selector, self.base.targets)
    }
}
