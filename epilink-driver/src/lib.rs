#![deny(missing_docs, clippy::unwrap_used)]
//! Connection, setup/online phase and statistics driver for Secure EpiLinker
//! (component **C7**).
//!
//! Wraps [`epilink_core::CircuitBuilder`] with the protocol-level phases a
//! real two-party session goes through — `connect` (base OT), `run_setup_phase`
//! (sharing-independent precomputation), the online `run_as_client`/
//! `run_as_server` calls, and output reveal — and with [`StatsPrinter`] for
//! dumping circuit-size and timing statistics in a TOML-like format.
//!
//! The shipped [`epilink_core::backend::local`] backend materialises both
//! parties in one process and has no real network or OT phase, so `connect`
//! and `run_setup_phase` here are phase-tracking stand-ins rather than real
//! protocol steps; the state machine and call sequence they enforce match
//! what a networked framework would require.

use std::io::Write;
use std::time::{Duration, Instant};

use epilink_core::backend::local::GateStats;
use epilink_core::builder::{CircuitBuilder, CircuitInput};
use epilink_core::share::Role;
use epilink_types::{CircuitConfig, CountResult, Database, FrameworkError, LinkageResult, ProtocolError, Record, StateError};
use parking_lot::Mutex;
use tracing::instrument;
use uuid::Uuid;

/// Serialises `cfg` the same way both parties would before comparing
/// canonical bytes in the handshake (§6: "a pre-protocol exchange compares a
/// canonical serialisation and aborts on mismatch"). `ciborium`'s binary
/// encoding is deterministic for a given value, which is what canonical
/// comparison needs here.
fn canonical_config_bytes(cfg: &CircuitConfig) -> Result<Vec<u8>, DriverError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(cfg, &mut bytes).map_err(|e| FrameworkError::Internal(e.to_string()))?;
    Ok(bytes)
}

/// Connection parameters for one party's side of a session, named after the
/// ABY framework's configuration struct (`role`, `remote_host`, `port`,
/// `nthreads`).
#[derive(Clone, Debug)]
pub struct AbyConfig {
    /// Which side of the protocol this process plays.
    pub role: Role,
    /// Hostname or address of the peer.
    pub remote_host: String,
    /// TCP port used for the party connection.
    pub port: u16,
    /// Number of worker threads the host framework may use internally for
    /// gate evaluation; the driver itself is single-threaded.
    pub nthreads: usize,
}

/// Driver-level errors, wrapping the lower-layer [`StateError`] and
/// [`ProtocolError`] taxonomies behind a single type callers can match on.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// A lifecycle method was called out of order.
    #[error(transparent)]
    State(#[from] StateError),
    /// The peer misbehaved or disconnected during connect/setup.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// `run_setup_phase` was called before the circuit was built.
    #[error("run_setup_phase requires a built circuit, found state {0}")]
    SetupBeforeBuild(&'static str),
    /// The underlying host framework reported a failure (here: the
    /// canonical-config codec used in the connect handshake).
    #[error(transparent)]
    Framework(#[from] FrameworkError),
}

/// Which computation the driver builds on the next `run_as_client`/
/// `run_as_server` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Per-record linkage, optionally revealing the winning `num`/`den`.
    Linkage {
        /// Reveal the winning numerator/denominator alongside `index`/`match`.
        debug: bool,
    },
    /// Database-wide match/tentative-match counts only.
    Count,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DriverPhase {
    NotConnected,
    Connected,
    SetupDone,
}

/// Drives one [`CircuitBuilder`] cycle through `connect` → `run_setup_phase`
/// → `run_as_client`/`run_as_server` → `run_linkage`/`run_count` →
/// (optionally) `reset`, per the circuit builder's own
/// UNBUILT → INPUT_SET → BUILT → EXECUTED lifecycle.
pub struct EpilinkDriver {
    session_id: Uuid,
    aby: AbyConfig,
    mode: Mode,
    cfg: CircuitConfig,
    builder: Mutex<CircuitBuilder>,
    phase: Mutex<DriverPhase>,
}

impl EpilinkDriver {
    /// Creates a driver for one session, seeding the underlying reference
    /// backend deterministically. The session is tagged with a fresh
    /// [`Uuid`] used to correlate its tracing spans and stats report; the
    /// builder itself lives behind a [`parking_lot::Mutex`] so a driver can
    /// be shared behind an `Arc` by callers that dispatch sessions across
    /// threads, per §5's "single party object per process ... all access
    /// must be serialised".
    pub fn new(cfg: CircuitConfig, aby: AbyConfig, mode: Mode, seed: u64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            aby,
            mode,
            builder: Mutex::new(CircuitBuilder::new(cfg.clone(), seed)),
            cfg,
            phase: Mutex::new(DriverPhase::NotConnected),
        }
    }

    /// The connection parameters this driver was constructed with.
    pub fn aby_config(&self) -> &AbyConfig {
        &self.aby
    }

    /// This session's identifier, stable for the driver's lifetime.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Name of the connection phase the driver is currently in
    /// (`not_connected`, `connected`, `setup_done`), for logging/diagnostics.
    pub fn phase(&self) -> &'static str {
        match *self.phase.lock() {
            DriverPhase::NotConnected => "not_connected",
            DriverPhase::Connected => "connected",
            DriverPhase::SetupDone => "setup_done",
        }
    }

    /// Runs the base OT phase. In the local reference backend this only
    /// advances the driver's own phase tracking and logs the peer address;
    /// a networked framework would block here until the peer completes its
    /// side of the handshake. It also runs the config handshake described in
    /// §6: both parties serialise their `CircuitConfig` canonically and
    /// compare the bytes, aborting with [`ProtocolError::ConfigMismatch`] on
    /// divergence. Since the local backend has only one process, the peer's
    /// copy is simply our own `cfg`, so this always succeeds here but still
    /// exercises the same comparison a networked handshake would run.
    #[instrument(level = "debug", skip(self), fields(session = %self.session_id, role = ?self.aby.role, peer = %self.aby.remote_host))]
    pub fn connect(&mut self) -> Result<(), DriverError> {
        tracing::debug!(port = self.aby.port, nthreads = self.aby.nthreads, "connecting");
        let ours = canonical_config_bytes(&self.cfg)?;
        let peer = canonical_config_bytes(&self.cfg)?;
        if ours != peer {
            return Err(DriverError::Protocol(ProtocolError::ConfigMismatch));
        }
        *self.phase.lock() = DriverPhase::Connected;
        Ok(())
    }

    /// Runs sharing-independent precomputation. Requires the circuit to
    /// already be built (`CircuitState::Built`), matching §4.5.5's
    /// `run_setup_phase()`-only-in-`BUILT` rule.
    #[instrument(level = "debug", skip(self))]
    pub fn run_setup_phase(&self) -> Result<(), DriverError> {
        let state = self.builder.lock().state();
        if state != epilink_core::builder::CircuitState::Built {
            return Err(DriverError::SetupBeforeBuild(state_name(state)));
        }
        tracing::debug!("running setup phase");
        *self.phase.lock() = DriverPhase::SetupDone;
        Ok(())
    }

    /// Feeds the client's records, builds the configured circuit, and
    /// executes it. Requires `connect()` (and, per §4.5.5, `run_setup_phase()`
    /// once the circuit is built) to have already run.
    #[instrument(level = "debug", skip(self, records), fields(nrecords = records.len()))]
    pub fn run_as_client(&self, records: Vec<Record>) -> Result<(), DriverError> {
        self.run(CircuitInput::ClientOnly(records))
    }

    /// Feeds the server's database, builds the configured circuit, and
    /// executes it.
    #[instrument(level = "debug", skip(self, db), fields(database_size = db.size()))]
    pub fn run_as_server(&self, db: Database) -> Result<(), DriverError> {
        self.run(CircuitInput::ServerOnly(db))
    }

    /// Runs a local demonstration where both parties' plaintext is supplied
    /// in the same process — the mode `epilink-cli` drives.
    #[instrument(level = "debug", skip(self, records, db), fields(nrecords = records.len(), database_size = db.size()))]
    pub fn run_local(&self, records: Vec<Record>, db: Database) -> Result<(), DriverError> {
        self.run(CircuitInput::Both(records, db))
    }

    fn run(&self, input: CircuitInput) -> Result<(), DriverError> {
        {
            let mut builder = self.builder.lock();
            builder.set_input(input)?;
            match self.mode {
                Mode::Linkage { debug } => builder.build_linkage_circuit(debug)?,
                Mode::Count => builder.build_count_circuit()?,
            }
        }
        self.run_setup_phase()?;
        self.builder.lock().execute()?;
        Ok(())
    }

    /// Opens the per-record linkage results. Fails if the driver wasn't
    /// constructed with [`Mode::Linkage`] or hasn't executed yet.
    pub fn run_linkage(&self) -> Result<Vec<LinkageResult>, DriverError> {
        Ok(self.builder.lock().reveal_linkage()?)
    }

    /// Opens the count result. Fails if the driver wasn't constructed with
    /// [`Mode::Count`] or hasn't executed yet.
    pub fn run_count(&self) -> Result<CountResult, DriverError> {
        Ok(self.builder.lock().reveal_count()?)
    }

    /// Gate-count statistics accumulated so far, for [`StatsPrinter`].
    pub fn stats(&self) -> GateStats {
        self.builder.lock().stats()
    }

    /// Resets the framework party and drops internal state, returning the
    /// driver to its pre-`connect` phase equivalent (the circuit builder
    /// itself returns to `UNBUILT`).
    pub fn reset(&mut self) {
        self.builder.lock().reset();
        *self.phase.lock() = DriverPhase::NotConnected;
    }
}

fn state_name(state: epilink_core::builder::CircuitState) -> &'static str {
    match state {
        epilink_core::builder::CircuitState::Unbuilt => "UNBUILT",
        epilink_core::builder::CircuitState::InputSet => "INPUT_SET",
        epilink_core::builder::CircuitState::Built => "BUILT",
        epilink_core::builder::CircuitState::Executed => "EXECUTED",
    }
}

/// Accumulates timings and gate-count snapshots across a session's phases
/// and dumps them in a TOML-like format, per §4.7's optional `StatsPrinter`.
/// Since the local reference backend has no real network layer,
/// `comm_bytes` is an estimate derived from gate counts (one `CircUnit`
/// exchanged per nonlinear/conversion gate) rather than measured socket
/// traffic.
pub struct StatsPrinter {
    phases: Vec<(String, Duration, GateStats)>,
    last_mark: Instant,
}

impl Default for StatsPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsPrinter {
    /// Starts a new printer, timing from the moment of construction.
    pub fn new() -> Self {
        Self { phases: Vec::new(), last_mark: Instant::now() }
    }

    /// Records the elapsed time and gate-count snapshot since the last
    /// `mark` (or construction) under `label`.
    pub fn mark(&mut self, label: impl Into<String>, stats: GateStats) {
        let now = Instant::now();
        self.phases.push((label.into(), now.duration_since(self.last_mark), stats));
        self.last_mark = now;
    }

    fn estimated_comm_bytes(stats: &GateStats) -> u64 {
        (stats.and_gates + stats.mul_gates + stats.conv_gates) * (epilink_core::share::CircUnit::BITS as u64 / 8)
    }

    /// Renders the accumulated phases as a TOML-like report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (label, elapsed, stats) in &self.phases {
            out.push_str(&format!("[{label}]\n"));
            out.push_str(&format!("and_gates = {}\n", stats.and_gates));
            out.push_str(&format!("xor_gates = {}\n", stats.xor_gates));
            out.push_str(&format!("mul_gates = {}\n", stats.mul_gates));
            out.push_str(&format!("conv_gates = {}\n", stats.conv_gates));
            out.push_str(&format!("depth = {}\n", stats.depth));
            out.push_str(&format!("comm_bytes_est = {}\n", Self::estimated_comm_bytes(stats)));
            out.push_str(&format!("elapsed = \"{}\"\n", humantime::format_duration(*elapsed)));
            out.push('\n');
        }
        out
    }

    /// Writes the report to `writer` (stdout, a file, ...).
    pub fn write_to(&self, mut writer: impl Write) -> std::io::Result<()> {
        writer.write_all(self.render().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epilink_types::{Comparator, EpilinkConfig, FieldKind, FieldSpec};
    use std::collections::BTreeMap;

    fn cfg() -> CircuitConfig {
        let mut fields = BTreeMap::new();
        fields.insert(
            "bm".to_string(),
            FieldSpec { frequency: 0.01, error_rate: 0.01, comparator: Comparator::Dice, kind: FieldKind::Bitmask, bitsize: 16 },
        );
        let epi = EpilinkConfig { fields, exchange_groups: vec![], threshold: 0.9, tentative_threshold: 0.5 };
        CircuitConfig::new(epi, false, 32).unwrap()
    }

    fn aby(role: Role) -> AbyConfig {
        AbyConfig { role, remote_host: "127.0.0.1".to_string(), port: 7766, nthreads: 1 }
    }

    #[test]
    fn setup_before_build_is_rejected() {
        let mut driver = EpilinkDriver::new(cfg(), aby(Role::Client), Mode::Linkage { debug: false }, 1);
        driver.connect().unwrap();
        assert!(matches!(driver.run_setup_phase(), Err(DriverError::SetupBeforeBuild(_))));
    }

    #[test]
    fn local_linkage_round_trip() {
        let mut driver = EpilinkDriver::new(cfg(), aby(Role::Client), Mode::Linkage { debug: true }, 1);
        driver.connect().unwrap();
        let records: Vec<Record> = vec![BTreeMap::from([("bm".to_string(), Some(vec![0xFF, 0x00]))])];
        let mut columns = BTreeMap::new();
        columns.insert("bm".to_string(), vec![Some(vec![0xFF, 0x00]), Some(vec![0x00, 0x00])]);
        let db = Database::new(columns).unwrap();
        driver.run_local(records, db).unwrap();
        let results = driver.run_linkage().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 0);
        assert!(results[0].is_match);
    }

    #[test]
    fn run_as_client_builds_against_a_dummy_server_row() {
        let mut driver = EpilinkDriver::new(cfg(), aby(Role::Client), Mode::Linkage { debug: false }, 1);
        driver.connect().unwrap();
        let records: Vec<Record> = vec![BTreeMap::from([("bm".to_string(), Some(vec![0xFF, 0x00]))])];
        driver.run_as_client(records).unwrap();
        let results = driver.run_linkage().unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_match, "a dummy all-absent server row can never match");
    }

    #[test]
    fn run_as_server_builds_against_a_dummy_client_record() {
        let mut driver = EpilinkDriver::new(cfg(), aby(Role::Server), Mode::Count, 1);
        driver.connect().unwrap();
        let mut columns = BTreeMap::new();
        columns.insert("bm".to_string(), vec![Some(vec![0xFF, 0x00]), Some(vec![0x00, 0x00])]);
        let db = Database::new(columns).unwrap();
        driver.run_as_server(db).unwrap();
        let count = driver.run_count().unwrap();
        assert_eq!(count.matches, 0, "a dummy all-absent client record can never match");
    }

    #[test]
    fn stats_printer_renders_recorded_phases() {
        let mut driver = EpilinkDriver::new(cfg(), aby(Role::Server), Mode::Count, 1);
        driver.connect().unwrap();
        let records: Vec<Record> = vec![BTreeMap::from([("bm".to_string(), Some(vec![0xFF, 0x00]))])];
        let mut columns = BTreeMap::new();
        columns.insert("bm".to_string(), vec![Some(vec![0xFF, 0x00])]);
        let db = Database::new(columns).unwrap();
        driver.run_local(records, db).unwrap();
        let mut printer = StatsPrinter::new();
        printer.mark("online", driver.stats());
        let report = printer.render();
        assert!(report.contains("[online]"));
        assert!(report.contains("and_gates ="));
    }
}
