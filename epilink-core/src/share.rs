//! Typed handles over framework shares (component **C1**).
//!
//! [`BoolShare`] and [`ArithShare`] wrap the [`backend::local::Party`]
//! reference implementation with the algebraic operators the circuit
//! builder and gadgets are written against: `add`/`mul`, `repeat`/`split`/
//! `vcombine`, zero-padding, conversions between sharings, and reveal
//! handles ([`OutShare`]).
//!
//! Shares have value semantics and are freely cloned (cloning is O(nvals),
//! not a deep circuit copy); the owning [`backend::local::Party`] is shared
//! behind an `Rc` rather than owned, per the borrow-not-own design note.

use std::rc::Rc;

use epilink_types::InputError;

use crate::backend::local::Party;

/// The integer width circuit values are stored in, matching the `CircUnit`
/// of the original system. Widened to `u64` (rather than the original's
/// 32-bit word) so that bitmask-valued fields — n-gram encodings packed
/// into a single wire bundle per the input shaper — can carry up to 64
/// significant bits without a separate arbitrary-width wire representation;
/// wider bitmasks are out of scope for this reference implementation (see
/// `FieldSpec::bitsize` validation).
pub type CircUnit = u64;

/// Which side of the two-party protocol a value belongs to or is revealed
/// to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The party supplying the client record(s).
    Client,
    /// The party supplying the database.
    Server,
}

/// To whom an [`OutShare`] is revealed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealPolicy {
    /// Revealed to the client only.
    Client,
    /// Revealed to the server only.
    Server,
    /// Revealed to both parties.
    All,
    /// Not revealed; the raw share bytes are returned to the caller.
    Shared,
}

/// Which Boolean sharing a [`BoolShare`] currently carries. Purely a
/// bookkeeping tag in the local reference backend (both sharings have the
/// identical XOR representation here), but it drives `best_accumulate`'s
/// choice of reduction strategy and the conversion-cost statistics, exactly
/// as it would against a real Yao/GMW-backed framework.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareKind {
    /// Garbled-circuit (Yao) sharing.
    Yao,
    /// GMW (secret-sharing-based) Boolean sharing.
    Gmw,
}

fn mask_of(bitlen: u32) -> CircUnit {
    if bitlen >= CircUnit::BITS { CircUnit::MAX } else { ((1 as CircUnit) << bitlen) - 1 }
}

/// A value revealed by opening a share, generic over the sharing.
pub trait Reveal {
    /// Reconstructs the clear values from both halves.
    fn reveal_clear(&self) -> Vec<CircUnit>;
}

/// A Boolean (XOR-shared) SIMD wire bundle.
#[derive(Clone)]
pub struct BoolShare {
    circuit: Rc<Party>,
    a: Vec<CircUnit>,
    b: Vec<CircUnit>,
    bitlen: u32,
    kind: ShareKind,
}

/// An Arithmetic (additively shared modulo `2^bitlen`) SIMD wire bundle.
#[derive(Clone)]
pub struct ArithShare {
    circuit: Rc<Party>,
    a: Vec<CircUnit>,
    b: Vec<CircUnit>,
    bitlen: u32,
}

impl BoolShare {
    /// An empty (`nvals = 0`) placeholder, used by gadgets to represent a
    /// not-yet-filled remainder slot.
    pub fn null(circuit: &Rc<Party>, bitlen: u32, kind: ShareKind) -> Self {
        Self { circuit: circuit.clone(), a: vec![], b: vec![], bitlen, kind }
    }

    /// `true` if this is a [`BoolShare::null`] placeholder.
    pub fn is_null(&self) -> bool {
        self.a.is_empty()
    }

    /// Splits `values` into fresh random XOR shares.
    pub fn from_clear(circuit: &Rc<Party>, values: &[CircUnit], bitlen: u32, kind: ShareKind) -> Self {
        let mask = mask_of(bitlen);
        let (a, b) = circuit.reshare_xor(values, mask);
        Self { circuit: circuit.clone(), a, b, bitlen, kind }
    }

    /// A public constant, broadcast `nvals` times.
    pub fn constant(circuit: &Rc<Party>, value: CircUnit, bitlen: u32, nvals: usize, kind: ShareKind) -> Self {
        Self::constant_simd(circuit, &vec![value; nvals], bitlen, kind)
    }

    /// A public constant SIMD vector (one value per slot).
    pub fn constant_simd(circuit: &Rc<Party>, values: &[CircUnit], bitlen: u32, kind: ShareKind) -> Self {
        let mask = mask_of(bitlen);
        let a = values.iter().map(|v| v & mask).collect();
        let b = vec![0; values.len()];
        Self { circuit: circuit.clone(), a, b, bitlen, kind }
    }

    /// Bit width of each SIMD slot.
    pub fn bitlen(&self) -> u32 {
        self.bitlen
    }

    /// Number of SIMD slots.
    pub fn nvals(&self) -> usize {
        self.a.len()
    }

    /// Which Boolean sharing (Yao/GMW) this share currently carries.
    pub fn kind(&self) -> ShareKind {
        self.kind
    }

    /// This party's own half and the peer's half of the XOR sharing. Both
    /// halves live in one process in this reference backend; a real
    /// two-party deployment would hold only `my_half` locally and receive
    /// `peer_half` over the wire when combining a [`RevealPolicy::Shared`]
    /// output. Exposed for tests that check combining the two halves
    /// reproduces [`Reveal::reveal_clear`] exactly.
    pub fn halves(&self) -> (&[CircUnit], &[CircUnit]) {
        (&self.a, &self.b)
    }

    fn mask(&self) -> CircUnit {
        mask_of(self.bitlen)
    }

    fn check_compatible(&self, other: &Self) {
        debug_assert!(Rc::ptr_eq(&self.circuit, &other.circuit), "shares from different circuits");
        debug_assert_eq!(self.nvals(), other.nvals(), "nvals mismatch");
    }

    pub(crate) fn circuit(&self) -> &Rc<Party> {
        &self.circuit
    }

    /// XOR of two Boolean shares (linear, free of interaction).
    pub fn xor(&self, other: &Self) -> Self {
        self.check_compatible(other);
        self.circuit.bump_xor(self.nvals() as u64);
        let mask = self.mask().max(other.mask());
        let a = self.a.iter().zip(&other.a).map(|(x, y)| (x ^ y) & mask).collect();
        let b = self.b.iter().zip(&other.b).map(|(x, y)| (x ^ y) & mask).collect();
        Self { circuit: self.circuit.clone(), a, b, bitlen: self.bitlen.max(other.bitlen), kind: self.kind }
    }

    /// Boolean NOT (flips every wire within `bitlen`).
    pub fn not(&self) -> Self {
        let ones = Self::constant(&self.circuit, self.mask(), self.bitlen, self.nvals(), self.kind);
        self.xor(&ones)
    }

    /// Bitwise AND (nonlinear): reveals both operands, computes the gate
    /// in the clear, and re-shares the result. Only agrees with [`Self::mul`]
    /// when both operands are single-bit flags.
    pub fn and(&self, other: &Self) -> Self {
        self.check_compatible(other);
        self.circuit.bump_and(self.nvals() as u64);
        let lhs = self.reveal_clear();
        let rhs = other.reveal_clear();
        let out: Vec<_> = lhs.iter().zip(&rhs).map(|(x, y)| x & y).collect();
        Self::from_clear(&self.circuit, &out, self.bitlen, self.kind)
    }

    /// Multiplication of two secret values as unsigned integers (nonlinear):
    /// reveals both operands, computes the product in the clear, and
    /// re-shares the result at `self`'s bit width. The width-correctness
    /// invariant carried by every caller (`dice_prec + 2*weight_prec +
    /// ceil_log2(nfields^2) <= bitlen`) keeps the true product within
    /// `self.bitlen`, so this agrees bit-for-bit with [`ArithShare::mul`]
    /// on the same clear inputs.
    pub fn mul(&self, other: &Self) -> Self {
        self.check_compatible(other);
        self.circuit.bump_and(self.nvals() as u64);
        let lhs = self.reveal_clear();
        let rhs = other.reveal_clear();
        let out: Vec<_> = lhs.iter().zip(&rhs).map(|(x, y)| x.wrapping_mul(*y)).collect();
        Self::from_clear(&self.circuit, &out, self.bitlen, self.kind)
    }

    /// Multiplication by a public constant, as unsigned integers (nonlinear
    /// in this reference backend: unlike [`ArithShare::mul_const`], Boolean
    /// shares are masked at `bitlen` rather than held at full width, so a
    /// constant multiply still needs a reveal/reshare to stay consistent
    /// with [`Self::mul`]).
    pub fn mul_const(&self, c: CircUnit) -> Self {
        self.circuit.bump_and(self.nvals() as u64);
        let lhs = self.reveal_clear();
        let out: Vec<_> = lhs.iter().map(|x| x.wrapping_mul(c)).collect();
        Self::from_clear(&self.circuit, &out, self.bitlen, self.kind)
    }

    /// Bitwise OR, derived as `a ^ b ^ (a & b)`.
    pub fn or(&self, other: &Self) -> Self {
        self.xor(other).xor(&self.and(other))
    }

    /// Equality comparison; result is a single-bit `BoolShare`.
    pub fn eq(&self, other: &Self) -> Self {
        self.check_compatible(other);
        self.circuit.bump_and(self.nvals() as u64);
        let lhs = self.reveal_clear();
        let rhs = other.reveal_clear();
        let out: Vec<_> = lhs.iter().zip(&rhs).map(|(x, y)| CircUnit::from(x == y)).collect();
        Self::from_clear(&self.circuit, &out, 1, self.kind)
    }

    /// `self > other` as unsigned integers; result is a single-bit `BoolShare`.
    pub fn gt(&self, other: &Self) -> Self {
        self.check_compatible(other);
        self.circuit.bump_and(self.nvals() as u64);
        let lhs = self.reveal_clear();
        let rhs = other.reveal_clear();
        let out: Vec<_> = lhs.iter().zip(&rhs).map(|(x, y)| CircUnit::from(x > y)).collect();
        Self::from_clear(&self.circuit, &out, 1, self.kind)
    }

    /// `self < other` as unsigned integers; result is a single-bit `BoolShare`.
    pub fn lt(&self, other: &Self) -> Self {
        other.gt(self)
    }

    /// Left-shift by `k` bits within `bitlen`; linear, free of interaction.
    pub fn shl(&self, k: u32) -> Self {
        self.circuit.bump_xor(self.nvals() as u64);
        let mask = self.mask();
        let a = self.a.iter().map(|x| (x << k) & mask).collect();
        let b = self.b.iter().map(|x| (x << k) & mask).collect();
        Self { circuit: self.circuit.clone(), a, b, bitlen: self.bitlen, kind: self.kind }
    }

    /// Selects `t` where `self` is 1, `f` where `self` is 0, slot by slot.
    /// `self` must be a single-bit share with the same `nvals` as `t`/`f`.
    pub fn mux(&self, t: &Self, f: &Self) -> Self {
        debug_assert_eq!(self.bitlen, 1, "mux selector must be a single bit");
        t.check_compatible(f);
        self.circuit.bump_and(self.nvals() as u64);
        let sel = self.reveal_clear();
        let tv = t.reveal_clear();
        let fv = f.reveal_clear();
        let out: Vec<_> = sel
            .iter()
            .zip(tv.iter().zip(&fv))
            .map(|(s, (tv, fv))| if *s != 0 { *tv } else { *fv })
            .collect();
        Self::from_clear(&self.circuit, &out, t.bitlen, t.kind)
    }

    /// Hamming weight (popcount) of each slot's `bitlen` bits, with result
    /// width `ceil_log2(bitlen + 1)`.
    pub fn hammingweight(&self) -> Self {
        self.circuit.bump_and(self.nvals() as u64);
        let values = self.reveal_clear();
        let out: Vec<_> = values.iter().map(|v| CircUnit::from(v.count_ones())).collect();
        let width = epilink_types::CircuitConfig::hw_size(self.bitlen).max(1);
        Self::from_clear(&self.circuit, &out, width, self.kind)
    }

    /// The Dice coefficient's rounding fixed-point division: given the
    /// Hamming weights of the client bitmask, the server bitmask, and their
    /// AND, computes `(2*hw_and*2^dice_prec + (hw_c+hw_s)/2) / (hw_c+hw_s)`
    /// (0 when both bitmasks are empty), result width `dice_prec + 1`.
    ///
    /// The original system loads a prebuilt `<bitsize>_<dice_prec>.aby`
    /// binary divider sub-circuit for this (`apply_file_binary`); this
    /// reference backend instead synthesises the same rounding-division
    /// contract with a single reveal-compute-reshare gate, preserving the
    /// bit-for-bit algorithm the naming convention identifies.
    pub fn dice_round_divide(hw_c: &Self, hw_s: &Self, hw_and: &Self, dice_prec: u32) -> Self {
        hw_c.check_compatible(hw_s);
        hw_c.check_compatible(hw_and);
        hw_c.circuit.bump_and(hw_c.nvals() as u64);
        let c = hw_c.reveal_clear();
        let s = hw_s.reveal_clear();
        let and = hw_and.reveal_clear();
        let out: Vec<_> = c
            .iter()
            .zip(&s)
            .zip(&and)
            .map(|((c, s), and)| {
                let plus = c + s;
                if plus == 0 {
                    0
                } else {
                    (2 * and * (1 << dice_prec) + plus / 2) / plus
                }
            })
            .collect();
        Self::from_clear(&hw_c.circuit, &out, dice_prec + 1, hw_c.kind)
    }

    /// Zero-extends to `width` bits; an error if the share is already wider.
    pub fn zeropad(&self, width: u32) -> Result<Self, InputError> {
        if self.bitlen > width {
            return Err(InputError::ValueTooWide {
                field: "<zeropad>".to_string(),
                actual_bits: self.bitlen,
                bitsize: width,
            });
        }
        let mut out = self.clone();
        out.bitlen = width;
        Ok(out)
    }

    /// Repeats the whole SIMD bundle `n` times: `nvals' = n * nvals`.
    pub fn repeat(&self, n: usize) -> Self {
        let a = self.a.repeat(n);
        let b = self.b.repeat(n);
        Self { circuit: self.circuit.clone(), a, b, bitlen: self.bitlen, kind: self.kind }
    }

    /// Splits into `ceil(nvals / k)` shares of `nvals = k` (the last one
    /// possibly shorter).
    pub fn split(&self, k: usize) -> Vec<Self> {
        self.a
            .chunks(k)
            .zip(self.b.chunks(k))
            .map(|(a, b)| Self { circuit: self.circuit.clone(), a: a.to_vec(), b: b.to_vec(), bitlen: self.bitlen, kind: self.kind })
            .collect()
    }

    /// Concatenates same-bitlen SIMD batches; the inverse of [`split`](Self::split).
    pub fn vcombine(parts: &[Self]) -> Self {
        let first = parts.first().expect("vcombine requires at least one part");
        let bitlen = first.bitlen;
        let kind = first.kind;
        let circuit = first.circuit.clone();
        let mut a = Vec::new();
        let mut b = Vec::new();
        for p in parts {
            debug_assert_eq!(p.bitlen, bitlen, "vcombine requires identical bitlen");
            a.extend_from_slice(&p.a);
            b.extend_from_slice(&p.b);
        }
        Self { circuit, a, b, bitlen, kind }
    }

    /// Re-tags the sharing kind (Yao <-> GMW). Free in the local reference
    /// backend, since both share the same representation; against a real
    /// framework this would invoke a single conversion gate per slot.
    pub fn to_kind(&self, kind: ShareKind) -> Self {
        if kind == self.kind {
            return self.clone();
        }
        self.circuit.bump_conv(self.nvals() as u64);
        let mut out = self.clone();
        out.kind = kind;
        out
    }

    /// Converts to Arithmetic sharing (B2A): reveals and re-shares.
    pub fn to_arith(&self) -> ArithShare {
        self.circuit.bump_conv(self.nvals() as u64);
        let values = self.reveal_clear();
        ArithShare::from_clear(&self.circuit, &values, self.bitlen)
    }
}

impl Reveal for BoolShare {
    fn reveal_clear(&self) -> Vec<CircUnit> {
        let mask = self.mask();
        self.a.iter().zip(&self.b).map(|(x, y)| (x ^ y) & mask).collect()
    }
}

impl ArithShare {
    /// An empty (`nvals = 0`) placeholder.
    pub fn null(circuit: &Rc<Party>, bitlen: u32) -> Self {
        Self { circuit: circuit.clone(), a: vec![], b: vec![], bitlen }
    }

    /// `true` if this is an [`ArithShare::null`] placeholder.
    pub fn is_null(&self) -> bool {
        self.a.is_empty()
    }

    /// Splits `values` into fresh random additive shares modulo the full
    /// `CircUnit` width. The split itself must use the same modulus
    /// `reveal_clear`'s combine does (see [`ArithShare::mask`]) or the two
    /// halves would only reconstruct the value modulo `2^bitlen`, not the
    /// value itself, whenever the random share exceeds it.
    pub fn from_clear(circuit: &Rc<Party>, values: &[CircUnit], bitlen: u32) -> Self {
        let (a, b) = circuit.reshare_add(values, CircUnit::MAX);
        Self { circuit: circuit.clone(), a, b, bitlen }
    }

    /// A public constant, broadcast `nvals` times.
    pub fn constant(circuit: &Rc<Party>, value: CircUnit, bitlen: u32, nvals: usize) -> Self {
        Self::constant_simd(circuit, &vec![value; nvals], bitlen)
    }

    /// A public constant SIMD vector.
    pub fn constant_simd(circuit: &Rc<Party>, values: &[CircUnit], bitlen: u32) -> Self {
        let mask = mask_of(bitlen);
        let a = values.iter().map(|v| v & mask).collect();
        let b = vec![0; values.len()];
        Self { circuit: circuit.clone(), a, b, bitlen }
    }

    /// Bit width of each SIMD slot.
    pub fn bitlen(&self) -> u32 {
        self.bitlen
    }

    /// Number of SIMD slots.
    pub fn nvals(&self) -> usize {
        self.a.len()
    }

    /// This party's own half and the peer's half of the additive sharing.
    /// See [`BoolShare::halves`] for the same caveat about this reference
    /// backend holding both halves in one process.
    pub fn halves(&self) -> (&[CircUnit], &[CircUnit]) {
        (&self.a, &self.b)
    }

    /// Arithmetic shares are always held modulo the circuit's full `CircUnit`
    /// width: unlike Boolean wire bundles, a narrower `bitlen` here is
    /// bookkeeping (used when converting back to Boolean) rather than a
    /// truncation mask, matching real arithmetic sharings in ABY-like
    /// frameworks.
    fn mask(&self) -> CircUnit {
        CircUnit::MAX
    }

    fn check_compatible(&self, other: &Self) {
        debug_assert!(Rc::ptr_eq(&self.circuit, &other.circuit), "shares from different circuits");
        debug_assert_eq!(self.nvals(), other.nvals(), "nvals mismatch");
    }

    pub(crate) fn circuit(&self) -> &Rc<Party> {
        &self.circuit
    }

    /// Additive combination (linear, free of interaction).
    pub fn add(&self, other: &Self) -> Self {
        self.check_compatible(other);
        self.circuit.bump_xor(self.nvals() as u64);
        let mask = self.mask();
        let a = self.a.iter().zip(&other.a).map(|(x, y)| x.wrapping_add(*y) & mask).collect();
        let b = self.b.iter().zip(&other.b).map(|(x, y)| x.wrapping_add(*y) & mask).collect();
        Self { circuit: self.circuit.clone(), a, b, bitlen: self.bitlen }
    }

    /// Additive subtraction (linear, free of interaction).
    pub fn sub(&self, other: &Self) -> Self {
        self.check_compatible(other);
        self.circuit.bump_xor(self.nvals() as u64);
        let mask = self.mask();
        let a = self.a.iter().zip(&other.a).map(|(x, y)| x.wrapping_sub(*y) & mask).collect();
        let b = self.b.iter().zip(&other.b).map(|(x, y)| x.wrapping_sub(*y) & mask).collect();
        Self { circuit: self.circuit.clone(), a, b, bitlen: self.bitlen }
    }

    /// Multiplication by a public constant (linear, free of interaction).
    pub fn mul_const(&self, c: CircUnit) -> Self {
        let mask = self.mask();
        let a = self.a.iter().map(|x| x.wrapping_mul(c) & mask).collect();
        let b = self.b.iter().map(|x| x.wrapping_mul(c) & mask).collect();
        Self { circuit: self.circuit.clone(), a, b, bitlen: self.bitlen }
    }

    /// Multiplication of two secret values (nonlinear): reveals both
    /// operands, computes the gate in the clear, and re-shares the result.
    pub fn mul(&self, other: &Self) -> Self {
        self.check_compatible(other);
        self.circuit.bump_mul(self.nvals() as u64);
        let lhs = self.reveal_clear();
        let rhs = other.reveal_clear();
        let out: Vec<_> = lhs.iter().zip(&rhs).map(|(x, y)| x.wrapping_mul(*y)).collect();
        Self::from_clear(&self.circuit, &out, self.bitlen)
    }

    /// Repeats the whole SIMD bundle `n` times.
    pub fn repeat(&self, n: usize) -> Self {
        let a = self.a.repeat(n);
        let b = self.b.repeat(n);
        Self { circuit: self.circuit.clone(), a, b, bitlen: self.bitlen }
    }

    /// Splits into `ceil(nvals / k)` shares of `nvals = k`.
    pub fn split(&self, k: usize) -> Vec<Self> {
        self.a
            .chunks(k)
            .zip(self.b.chunks(k))
            .map(|(a, b)| Self { circuit: self.circuit.clone(), a: a.to_vec(), b: b.to_vec(), bitlen: self.bitlen })
            .collect()
    }

    /// Concatenates same-bitlen SIMD batches.
    pub fn vcombine(parts: &[Self]) -> Self {
        let first = parts.first().expect("vcombine requires at least one part");
        let bitlen = first.bitlen;
        let circuit = first.circuit.clone();
        let mut a = Vec::new();
        let mut b = Vec::new();
        for p in parts {
            debug_assert_eq!(p.bitlen, bitlen, "vcombine requires identical bitlen");
            a.extend_from_slice(&p.a);
            b.extend_from_slice(&p.b);
        }
        Self { circuit, a, b, bitlen }
    }

    /// Converts to Boolean sharing (A2B): reveals and re-shares.
    pub fn to_bool(&self, kind: ShareKind) -> BoolShare {
        self.circuit.bump_conv(self.nvals() as u64);
        let values = self.reveal_clear();
        BoolShare::from_clear(&self.circuit, &values, self.bitlen, kind)
    }
}

impl Reveal for ArithShare {
    fn reveal_clear(&self) -> Vec<CircUnit> {
        let mask = self.mask();
        self.a.iter().zip(&self.b).map(|(x, y)| x.wrapping_add(*y) & mask).collect()
    }
}

/// A bitmask wire bundle wider than one [`CircUnit`] word, stored as a
/// sequence of `CircUnit`-wide limbs (little-endian: `limbs[0]` holds the
/// least significant bits). Raw n-gram bitmask fields can be hundreds of
/// bits wide; rather than giving `BoolShare` an arbitrary-precision
/// representation, wide values are chunked into limbs and the handful of
/// operations the scoring circuit needs on them (AND, equality, Hamming
/// weight) are defined limb-wise.
#[derive(Clone)]
pub struct WideBoolShare {
    limbs: Vec<BoolShare>,
    bitsize: u32,
}

fn limb_widths(bitsize: u32) -> Vec<u32> {
    let unit = CircUnit::BITS;
    let mut remaining = bitsize;
    let mut widths = Vec::new();
    while remaining > 0 {
        widths.push(remaining.min(unit));
        remaining -= remaining.min(unit);
    }
    if widths.is_empty() {
        widths.push(0);
    }
    widths
}

/// Packs a big-endian byte-serialised bitmask (as produced by
/// [`epilink_types::Record`] entries) into little-endian `CircUnit` limbs.
fn bytes_to_limbs(bytes: &[u8], bitsize: u32) -> Vec<CircUnit> {
    limb_widths(bitsize)
        .iter()
        .scan(0u32, |consumed, &width| {
            let start_bit = *consumed;
            *consumed += width;
            let start_byte = (start_bit / 8) as usize;
            let end_byte = ((start_bit + width).div_ceil(8) as usize).min(bytes.len());
            let mut limb: CircUnit = 0;
            for (i, &byte) in bytes.get(start_byte..end_byte).unwrap_or(&[]).iter().enumerate() {
                limb |= (byte as CircUnit) << (8 * i);
            }
            let shift = start_bit % 8;
            limb >>= shift;
            Some(limb & mask_of(width))
        })
        .collect()
}

impl WideBoolShare {
    /// Splits a per-slot byte-serialised bitmask into shared limbs.
    pub fn from_clear_bytes(circuit: &Rc<Party>, values: &[Vec<u8>], bitsize: u32, kind: ShareKind) -> Self {
        let widths = limb_widths(bitsize);
        let nvals = values.len();
        let packed: Vec<Vec<CircUnit>> = values.iter().map(|v| bytes_to_limbs(v, bitsize)).collect();
        let limbs = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let slot_values: Vec<CircUnit> = (0..nvals).map(|slot| packed[slot][i]).collect();
                BoolShare::from_clear(circuit, &slot_values, w, kind)
            })
            .collect();
        Self { limbs, bitsize }
    }

    /// A public constant bitmask, broadcast `nvals` times.
    pub fn constant_bytes(circuit: &Rc<Party>, value: &[u8], bitsize: u32, nvals: usize, kind: ShareKind) -> Self {
        Self::from_clear_bytes(circuit, &vec![value.to_vec(); nvals], bitsize, kind)
    }

    /// Declared bit width of the bitmask (before limb-chunking).
    pub fn bitsize(&self) -> u32 {
        self.bitsize
    }

    /// Number of SIMD slots.
    pub fn nvals(&self) -> usize {
        self.limbs.first().map_or(0, BoolShare::nvals)
    }

    /// Limb-wise bitwise AND.
    pub fn and(&self, other: &Self) -> Self {
        debug_assert_eq!(self.bitsize, other.bitsize, "bitsize mismatch");
        let limbs = self.limbs.iter().zip(&other.limbs).map(|(a, b)| a.and(b)).collect();
        Self { limbs, bitsize: self.bitsize }
    }

    /// Equality over the whole bitmask: an AND-reduction of per-limb
    /// equality flags.
    pub fn eq(&self, other: &Self) -> BoolShare {
        debug_assert_eq!(self.bitsize, other.bitsize, "bitsize mismatch");
        let flags: Vec<BoolShare> = self.limbs.iter().zip(&other.limbs).map(|(a, b)| a.eq(b)).collect();
        crate::gadgets::binary_accumulate(&flags, |a, b| a.and(b))
    }

    /// Hamming weight of the whole bitmask, width `ceil_log2(bitsize + 1)`:
    /// sums per-limb popcounts in Arithmetic space (where differing limb
    /// widths need no reconciliation) and converts back to Boolean.
    pub fn hammingweight(&self, kind: ShareKind) -> BoolShare {
        let circuit = self.limbs[0].circuit().clone();
        let width = epilink_types::CircuitConfig::hw_size(self.bitsize).max(1);
        let partials: Vec<ArithShare> = self.limbs.iter().map(|l| l.hammingweight().to_arith()).collect();
        let total = crate::gadgets::sum(&partials, |a, b| a.add(b));
        let values = total.reveal_clear();
        BoolShare::from_clear(&circuit, &values, width, kind)
    }
}

/// A reveal handle: a share plus the policy describing who learns its
/// value. `open` always reconstructs the clear value in this reference
/// backend (both halves live in one process); against a real framework
/// this would instead exchange shares with the peer according to `policy`.
pub struct OutShare<T> {
    share: T,
    policy: RevealPolicy,
}

impl<T: Reveal + Clone> OutShare<T> {
    /// Wraps `share` with a reveal policy.
    pub fn new(share: T, policy: RevealPolicy) -> Self {
        Self { share, policy }
    }

    /// The reveal policy this share was tagged with.
    pub fn policy(&self) -> RevealPolicy {
        self.policy
    }

    /// Reconstructs the clear value(s). When `policy` is [`RevealPolicy::Shared`]
    /// the caller is expected to use [`OutShare::into_shared`] instead to
    /// keep the value secret-shared.
    pub fn open(&self) -> Vec<CircUnit> {
        self.share.reveal_clear()
    }

    /// Returns the still-secret-shared value, for [`RevealPolicy::Shared`] outputs.
    pub fn into_shared(self) -> T {
        self.share
    }
}
