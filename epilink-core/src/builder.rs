//! The EpiLink circuit builder (component **C5** — core of the core):
//! composes the weighted Dice/equality scoring circuit, the exchange-group
//! permutation search, the database-wide argmax, and the threshold tests
//! out of the gadgets in [`crate::gadgets`] and the share wrappers in
//! [`crate::share`].

use std::collections::HashMap;
use std::rc::Rc;

use itertools::Itertools;

use epilink_types::{CircuitConfig, Comparator, ComparisonIndex, Database, FieldName, LinkageResult, Record, StateError};

use crate::backend::local::Party;
use crate::gadgets::{FoldOp, Quotient, QuotientFolder};
use crate::mult::MultShare;
use crate::shaper::{self, ConstantCache, EntryShare};
use crate::share::{BoolShare, CircUnit, OutShare, RevealPolicy, ShareKind};

/// Lifecycle state of a [`CircuitBuilder`], per §4.5.5.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    /// No input has been set since construction or the last `reset()`.
    Unbuilt,
    /// `set_input` has been called; ready to build.
    InputSet,
    /// A circuit has been built; ready to execute.
    Built,
    /// The circuit has executed; outputs are ready to reveal.
    Executed,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Unbuilt => "UNBUILT",
            CircuitState::InputSet => "INPUT_SET",
            CircuitState::Built => "BUILT",
            CircuitState::Executed => "EXECUTED",
        };
        f.write_str(s)
    }
}

/// Which side(s) of the protocol supplied real data for this cycle. The
/// non-supplying side's entries are filled in with [`EntryShare::dummy`].
pub enum CircuitInput {
    /// Only the client's records are real; the server side is dummy.
    ClientOnly(Vec<Record>),
    /// Only the server's database is real; the client side is dummy.
    ServerOnly(Database),
    /// Both sides are real — used by tests and local demonstrations, where
    /// both parties' plaintext happens to be available in one process.
    Both(Vec<Record>, Database),
}

/// Per-client-record output of [`CircuitBuilder::build_linkage_circuit`],
/// still secret-shared/un-opened; see [`CircuitBuilder::reveal_linkage`].
pub struct LinkageShare {
    index: OutShare<BoolShare>,
    is_match: OutShare<BoolShare>,
    is_tentative_match: OutShare<BoolShare>,
    num: Option<OutShare<BoolShare>>,
    den: Option<OutShare<BoolShare>>,
}

/// Output of [`CircuitBuilder::build_count_circuit`].
pub struct CountShare {
    matches: OutShare<BoolShare>,
    tentative_matches: OutShare<BoolShare>,
}

enum BuiltOutput {
    Linkage(Vec<LinkageShare>),
    Count(CountShare),
}

/// Composes and evaluates the EpiLink scoring circuit against the local
/// reference backend. Holds the per-cycle caches (`ConstantCache`, the
/// `(record_index, left, right)` field-weight memoization map) that the
/// config model's design notes call for, and enforces the
/// UNBUILT → INPUT_SET → BUILT → EXECUTED lifecycle.
pub struct CircuitBuilder {
    circuit: Rc<Party>,
    cfg: CircuitConfig,
    kind: ShareKind,
    state: CircuitState,
    client_records: Vec<Record>,
    database: Database,
    output: Option<BuiltOutput>,
}

impl CircuitBuilder {
    /// Creates a builder for one computation, seeding the local reference
    /// backend's randomness deterministically.
    pub fn new(cfg: CircuitConfig, seed: u64) -> Self {
        let kind = match cfg.boolean_sharing {
            epilink_types::BooleanSharing::Yao => ShareKind::Yao,
            epilink_types::BooleanSharing::Gmw => ShareKind::Gmw,
        };
        Self {
            circuit: Party::new(seed),
            cfg,
            kind,
            state: CircuitState::Unbuilt,
            client_records: Vec::new(),
            database: Database::default(),
            output: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Gate-count statistics accumulated so far (for `epilink-driver`'s
    /// `StatsPrinter`).
    pub fn stats(&self) -> crate::backend::local::GateStats {
        self.circuit.stats()
    }

    /// Supplies this cycle's input. Fails with [`StateError::InputAlreadySet`]
    /// unless the builder is `UNBUILT`.
    pub fn set_input(&mut self, input: CircuitInput) -> Result<(), StateError> {
        if self.state != CircuitState::Unbuilt {
            return Err(StateError::InputAlreadySet { state: state_name(self.state) });
        }
        match input {
            CircuitInput::ClientOnly(records) => self.client_records = records,
            CircuitInput::ServerOnly(db) => self.database = db,
            CircuitInput::Both(records, db) => {
                self.client_records = records;
                self.database = db;
            }
        }
        self.state = CircuitState::InputSet;
        Ok(())
    }

    /// Drops all shares and caches and returns to `UNBUILT`. The local
    /// backend's randomness keeps running across cycles so successive
    /// computations don't repeat shares.
    pub fn reset(&mut self) {
        self.circuit.reset_stats();
        self.client_records.clear();
        self.database = Database::default();
        self.output = None;
        self.state = CircuitState::Unbuilt;
    }

    /// Shapes the server side of a comparison batch: the real database
    /// columns when one was supplied (`Both`/`ServerOnly`), or `nvals`
    /// dummy rows per field (`EntryShare::dummy`) when it wasn't
    /// (`ClientOnly`) — mirroring how the client side already falls back to
    /// a single all-absent [`Record`] when no client records were supplied.
    /// Without this, a single-sided [`CircuitInput`] would shape the server
    /// columns over the empty default `Database` (`nvals = 0`), which
    /// mismatches the client side's `nvals` and panics downstream.
    fn shape_server(&self, nvals: usize) -> HashMap<FieldName, EntryShare> {
        if self.database.size() == 0 {
            self.cfg
                .epi
                .fields
                .iter()
                .map(|(name, spec)| {
                    let entry = EntryShare::dummy(&self.circuit, spec.comparator, spec.bitsize, nvals, self.kind, self.cfg.use_conversion);
                    (name.clone(), entry)
                })
                .collect()
        } else {
            shaper::shape_server_database(&self.circuit, &self.cfg, &self.database, self.kind, self.cfg.use_conversion)
        }
    }

    fn require(&self, state: CircuitState) -> Result<(), StateError> {
        if self.state != state {
            return Err(match state {
                CircuitState::InputSet => StateError::BuildBeforeInput { state: state_name(self.state) },
                CircuitState::Built => StateError::ExecuteBeforeBuild { state: state_name(self.state) },
                CircuitState::Executed => StateError::RevealBeforeExecute { state: state_name(self.state) },
                CircuitState::Unbuilt => StateError::InputAlreadySet { state: state_name(self.state) },
            });
        }
        Ok(())
    }

    /// Builds the per-record linkage circuit: one [`LinkageShare`] per
    /// client record, each carrying the best-matching database row's index
    /// and the two threshold flags. When `debug` is set, the winning
    /// numerator/denominator are also revealed (for precision studies).
    pub fn build_linkage_circuit(&mut self, debug: bool) -> Result<(), StateError> {
        self.require(CircuitState::InputSet)?;
        let nvals = self.database.size().max(1);
        let server_entries = self.shape_server(nvals);
        let mut cache = ConstantCache::new(&self.circuit, &self.cfg, nvals, self.kind, self.cfg.use_conversion);
        let idx = cache.row_index();

        let records = if self.client_records.is_empty() { vec![Record::new()] } else { self.client_records.clone() };
        let mut out = Vec::with_capacity(records.len());
        for (record_index, record) in records.iter().enumerate() {
            let client_entries = shaper::shape_client_record(&self.circuit, &self.cfg, record, nvals, self.kind, self.cfg.use_conversion);
            out.push(self.score_one_record(record_index, &client_entries, &server_entries, &mut cache, idx.clone(), debug)?);
        }
        self.output = Some(BuiltOutput::Linkage(out));
        self.state = CircuitState::Built;
        Ok(())
    }

    /// Builds the counting circuit (§4.5.3): evaluates per-record
    /// `match`/`tmatch` as in linkage, discards indices, and reveals only
    /// the two totals across all client records.
    pub fn build_count_circuit(&mut self) -> Result<(), StateError> {
        self.require(CircuitState::InputSet)?;
        let nvals = self.database.size().max(1);
        let server_entries = self.shape_server(nvals);
        let mut cache = ConstantCache::new(&self.circuit, &self.cfg, nvals, self.kind, self.cfg.use_conversion);
        let idx = cache.row_index();

        let records = if self.client_records.is_empty() { vec![Record::new()] } else { self.client_records.clone() };
        let mut match_flags = Vec::with_capacity(records.len());
        let mut tmatch_flags = Vec::with_capacity(records.len());
        for (record_index, record) in records.iter().enumerate() {
            let client_entries = shaper::shape_client_record(&self.circuit, &self.cfg, record, nvals, self.kind, self.cfg.use_conversion);
            let share = self.score_one_record(record_index, &client_entries, &server_entries, &mut cache, idx.clone(), false)?;
            match_flags.push(share.is_match.into_shared());
            tmatch_flags.push(share.is_tentative_match.into_shared());
        }
        let matches = crate::gadgets::sum_boolean_count(&match_flags);
        let tentative_matches = crate::gadgets::sum_boolean_count(&tmatch_flags);
        self.output = Some(BuiltOutput::Count(CountShare {
            matches: OutShare::new(matches, RevealPolicy::All),
            tentative_matches: OutShare::new(tentative_matches, RevealPolicy::All),
        }));
        self.state = CircuitState::Built;
        Ok(())
    }

    /// Marks the circuit as executed. The local reference backend evaluates
    /// every gate eagerly as it is constructed, so this is a state-machine
    /// transition only; against a real framework this would run the online
    /// phase.
    pub fn execute(&mut self) -> Result<(), StateError> {
        self.require(CircuitState::Built)?;
        self.state = CircuitState::Executed;
        Ok(())
    }

    /// Opens the per-record linkage outputs. Fails unless the last build
    /// was [`CircuitBuilder::build_linkage_circuit`] and `execute()` has run.
    pub fn reveal_linkage(&self) -> Result<Vec<LinkageResult>, StateError> {
        self.require(CircuitState::Executed)?;
        let Some(BuiltOutput::Linkage(shares)) = &self.output else {
            return Err(StateError::RevealBeforeExecute { state: state_name(self.state) });
        };
        Ok(shares
            .iter()
            .map(|s| LinkageResult {
                index: s.index.open()[0] as u32,
                is_match: s.is_match.open()[0] != 0,
                is_tentative_match: s.is_tentative_match.open()[0] != 0,
                num: s.num.as_ref().map(|n| n.open()[0] as u32),
                den: s.den.as_ref().map(|d| d.open()[0] as u32),
            })
            .collect())
    }

    /// Opens the count output. Fails unless the last build was
    /// [`CircuitBuilder::build_count_circuit`] and `execute()` has run.
    pub fn reveal_count(&self) -> Result<epilink_types::CountResult, StateError> {
        self.require(CircuitState::Executed)?;
        let Some(BuiltOutput::Count(share)) = &self.output else {
            return Err(StateError::RevealBeforeExecute { state: state_name(self.state) });
        };
        Ok(epilink_types::CountResult {
            matches: share.matches.open()[0] as u32,
            tentative_matches: share.tentative_matches.open()[0] as u32,
        })
    }

    fn score_one_record(
        &self,
        record_index: usize,
        client_entries: &HashMap<FieldName, EntryShare>,
        server_entries: &HashMap<FieldName, EntryShare>,
        cache: &mut ConstantCache,
        idx: BoolShare,
        debug: bool,
    ) -> Result<LinkageShare, StateError> {
        let dice_prec = self.cfg.dice_prec();
        let use_conversion = self.cfg.use_conversion;

        let mut pair_scores: HashMap<ComparisonIndex, (MultShare, MultShare)> = HashMap::new();
        for (left, right) in self.cfg.comparison_names() {
            let spec = self
                .cfg
                .epi
                .field(&left)
                .map_err(|_| StateError::BuildBeforeInput { state: state_name(self.state) })?;
            let client_entry = &client_entries[&left];
            let server_entry = &server_entries[&right];

            let delta = client_entry.delta.mul(&server_entry.delta);
            let weight_share = cache
                .rescaled_weight(&self.cfg, &left, &right)
                .map_err(|_| StateError::BuildBeforeInput { state: state_name(self.state) })?;
            let weight = delta.mul(&weight_share);

            let comp_bool = match spec.comparator {
                Comparator::Dice => {
                    let hw_and = client_entry.value.and(&server_entry.value).hammingweight(self.kind);
                    BoolShare::dice_round_divide(
                        client_entry.hw.as_ref().expect("dice field has hw share"),
                        server_entry.hw.as_ref().expect("dice field has hw share"),
                        &hw_and,
                        dice_prec,
                    )
                }
                Comparator::Binary => {
                    let eq = client_entry.value.eq(&server_entry.value);
                    eq.zeropad(dice_prec + 1).expect("eq is 1 bit, never wider than dice_prec + 1").shl(dice_prec)
                }
            };
            let comp = MultShare::from_bool(&comp_bool, use_conversion);
            let field_weight = weight.mul(&comp);
            pair_scores.insert(ComparisonIndex { record_index, left, right }, (field_weight, weight));
        }

        let mut quotients: Vec<Quotient<MultShare>> = Vec::new();
        let mut grouped = std::collections::BTreeSet::new();
        for group in &self.cfg.epi.exchange_groups {
            let members: Vec<FieldName> = group.iter().cloned().collect();
            let perm_quotients: Vec<Quotient<MultShare>> = members
                .iter()
                .cloned()
                .permutations(members.len())
                .map(|perm| {
                    let mut num = None;
                    let mut den = None;
                    for (left, right) in members.iter().zip(&perm) {
                        let key = ComparisonIndex { record_index, left: left.clone(), right: right.clone() };
                        let (fw, w) = &pair_scores[&key];
                        num = Some(match num {
                            None => fw.clone(),
                            Some(acc) => MultShare::add(&acc, fw),
                        });
                        den = Some(match den {
                            None => w.clone(),
                            Some(acc) => MultShare::add(&acc, w),
                        });
                    }
                    Quotient { num: num.expect("group has >=1 member"), den: den.expect("group has >=1 member") }
                })
                .collect();
            let best = crate::gadgets::binary_accumulate(&perm_quotients, |a, b| self.select_quotient(a, b, FoldOp::MaxTie));
            quotients.push(best);
            grouped.extend(members);
        }
        for name in self.cfg.epi.fields.keys() {
            if !grouped.contains(name) {
                let key = ComparisonIndex { record_index, left: name.clone(), right: name.clone() };
                let (fw, w) = pair_scores[&key].clone();
                quotients.push(Quotient { num: fw, den: w });
            }
        }

        let aggregate = quotients
            .into_iter()
            .reduce(|a, b| Quotient { num: MultShare::add(&a.num, &b.num), den: MultShare::add(&a.den, &b.den) })
            .expect("at least one field is configured");

        let (winner, targets) = self.fold_argmax(aggregate, idx);
        let winning_idx = targets.into_iter().next().expect("one target (row index) was carried");

        let num_bool = winner.num.to_bool(self.kind);
        let den_bool = winner.den.to_bool(self.kind);
        let t_den = winner.den.mul_public(CircUnit::from(self.cfg.threshold_rescaled())).to_bool(self.kind);
        let tt_den = winner.den.mul_public(CircUnit::from(self.cfg.tentative_threshold_rescaled())).to_bool(self.kind);
        let is_match = num_bool.gt(&t_den);
        let is_tentative_match = num_bool.gt(&tt_den);

        let match_policy = if self.cfg.matching_mode { RevealPolicy::All } else { RevealPolicy::Shared };
        let (num, den) = if debug {
            // Reported den is shifted by dice_prec to match num's scale, per
            // §4.6; the threshold test above compares against the unshifted
            // den, which is already correct without the extra factor.
            let dice_prec = self.cfg.dice_prec();
            let den_reported = den_bool.clone().zeropad(den_bool.bitlen() + dice_prec).expect("widening never narrows").shl(dice_prec);
            (Some(OutShare::new(num_bool, RevealPolicy::All)), Some(OutShare::new(den_reported, RevealPolicy::All)))
        } else {
            (None, None)
        };
        Ok(LinkageShare {
            index: OutShare::new(winning_idx, RevealPolicy::Shared),
            is_match: OutShare::new(is_match, match_policy),
            is_tentative_match: OutShare::new(is_tentative_match, match_policy),
            num,
            den,
        })
    }

    /// Reduces a single-field's worth of selection logic shared by the
    /// exchange-group permutation fold and the database-wide argmax: cross-
    /// multiply comparison, revealed and re-shared once, then multiplexed
    /// back in whichever multiplication space the operands occupy.
    fn select_quotient(&self, a: &Quotient<MultShare>, b: &Quotient<MultShare>, op: FoldOp) -> Quotient<MultShare> {
        let num_a = a.num.reveal_clear();
        let den_a = a.den.reveal_clear();
        let num_b = b.num.reveal_clear();
        let den_b = b.den.reveal_clear();
        let bits: Vec<CircUnit> = (0..num_a.len())
            .map(|i| {
                let cross_a = u128::from(num_a[i]) * u128::from(den_b[i]);
                let cross_b = u128::from(num_b[i]) * u128::from(den_a[i]);
                let keep = match op {
                    FoldOp::Max => cross_a > cross_b,
                    FoldOp::Min => cross_a < cross_b,
                    FoldOp::MaxTie => cross_a > cross_b || (cross_a == cross_b && den_a[i] >= den_b[i]),
                    FoldOp::MinTie => cross_a < cross_b || (cross_a == cross_b && den_a[i] >= den_b[i]),
                };
                CircUnit::from(keep)
            })
            .collect();
        let sel = BoolShare::from_clear(&self.circuit, &bits, 1, self.kind);
        Quotient { num: MultShare::select(&sel, &a.num, &b.num), den: MultShare::select(&sel, &a.den, &b.den) }
    }

    /// Folds the SIMD-`nvals` aggregate quotient down to a single pair,
    /// carrying `idx` to track the winning database row. `QuotientFolder`
    /// is generic over a single concrete share type, so this dispatches on
    /// which multiplication space is active and re-wraps the result.
    fn fold_argmax(&self, aggregate: Quotient<MultShare>, idx: BoolShare) -> (Quotient<MultShare>, Vec<BoolShare>) {
        match (aggregate.num, aggregate.den) {
            (MultShare::Arith(num), MultShare::Arith(den)) => {
                let mut folder = QuotientFolder::new(Quotient { num, den }, vec![idx]);
                folder.set_fold_operation(FoldOp::MaxTie);
                let (q, targets) = folder.fold();
                (Quotient { num: MultShare::Arith(q.num), den: MultShare::Arith(q.den) }, targets)
            }
            (MultShare::Bool(num), MultShare::Bool(den)) => {
                let mut folder = QuotientFolder::new(Quotient { num, den }, vec![idx]);
                folder.set_fold_operation(FoldOp::MaxTie);
                let (q, targets) = folder.fold();
                (Quotient { num: MultShare::Bool(q.num), den: MultShare::Bool(q.den) }, targets)
            }
            _ => panic!("mismatched multiplication spaces"),
        }
    }
}

fn state_name(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Unbuilt => "UNBUILT",
        CircuitState::InputSet => "INPUT_SET",
        CircuitState::Built => "BUILT",
        CircuitState::Executed => "EXECUTED",
    }
}
