use anyhow::{bail, Context, Result};
use incentives_oracle::OracleConfig;
use incentives_postage::{LedgerConfig, MAX_DEPTH};
use incentives_redistribution::bmt::CHUNK_SIZE;
use incentives_redistribution::{GameConfig, SAMPLE_SIZE};
use incentives_staking::StakingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default location checked when no `--config` is given
pub const DEFAULT_CONFIG_PATH: &str = "./incentives.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncentivesConfig {
    pub oracle: OracleConfig,
    pub staking: StakingConfig,
    pub ledger: LedgerConfig,
    pub game: GameConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
    pub file_output: Option<PathBuf>,
    /// Per-target overrides, e.g. `incentives_redistribution = "debug"`
    pub module_filters: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub rounds: u64,
    pub nodes: usize,
    /// Seeds keys, stakes, nonces and chunk data
    pub seed: u64,
    /// Stake of each node is drawn from `min_stake..=max_stake`
    pub min_stake: u64,
    pub max_stake: u64,
    /// Chunks in the reserve every node stores
    pub reserve_chunks: usize,
    pub chunk_size: usize,
    /// Storage depth nodes reveal
    pub depth: u8,
    pub batch_depth: u8,
    pub bucket_depth: u8,
    pub balance_per_chunk: u64,
    /// Feed a random redundancy signal to the oracle every round
    pub adjust_price: bool,
    /// Accept any sample. Synthetic reserves are far too small to meet the
    /// production bound on the last transformed address.
    pub relax_sample_bound: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rounds: 20,
            nodes: 4,
            seed: 42,
            min_stake: 1_000,
            max_stake: 10_000,
            reserve_chunks: 32,
            chunk_size: 1024,
            depth: 0,
            batch_depth: 16,
            bucket_depth: 8,
            balance_per_chunk: 100_000_000,
            adjust_price: true,
            relax_sample_bound: true,
        }
    }
}

impl IncentivesConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        // env overrides are applied by the caller so CLI flags can win
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// File at `path` if given, else `./incentives.toml` if present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `INCENTIVES_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        // Logging
        if let Ok(level) = env::var("INCENTIVES_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(format) = env::var("INCENTIVES_LOG_FORMAT") {
            if !format.is_empty() {
                self.logging.format = format;
            }
        }
        if let Ok(file) = env::var("INCENTIVES_LOG_FILE") {
            self.logging.file_output = (!file.is_empty()).then(|| PathBuf::from(file));
        }

        // Components
        if let Some(id) = parsed_var("INCENTIVES_NETWORK_ID") {
            self.staking.network_id = id;
        }
        if let Some(price) = parsed_var("INCENTIVES_MINIMUM_PRICE") {
            self.oracle.minimum_price = price;
        }
        if let Some(price) = parsed_var("INCENTIVES_INITIAL_PRICE") {
            self.oracle.initial_price = price;
        }
        if let Some(length) = parsed_var("INCENTIVES_PHASE_LENGTH") {
            self.game.phase_length = length;
        }
        if let Some(length) = parsed_var("INCENTIVES_ROUND_LENGTH") {
            self.game.round_length = length;
        }
        if let Some(rounds) = parsed_var("INCENTIVES_STAKE_MATURITY_ROUNDS") {
            self.game.stake_maturity_rounds = rounds;
        }

        // Simulation
        if let Some(rounds) = parsed_var("INCENTIVES_SIM_ROUNDS") {
            self.simulation.rounds = rounds;
        }
        if let Some(nodes) = parsed_var("INCENTIVES_SIM_NODES") {
            self.simulation.nodes = nodes;
        }
        if let Some(seed) = parsed_var("INCENTIVES_SIM_SEED") {
            self.simulation.seed = seed;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.game.schedule()?;

        if self.oracle.minimum_price == 0 {
            bail!("oracle.minimum_price must be positive");
        }
        if self.ledger.minimum_bucket_depth == 0 || self.ledger.minimum_bucket_depth >= MAX_DEPTH {
            bail!(
                "ledger.minimum_bucket_depth must be in 1..{}, got {}",
                MAX_DEPTH,
                self.ledger.minimum_bucket_depth
            );
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            bail!("logging.format must be pretty, compact or json, got {}", self.logging.format);
        }

        let sim = &self.simulation;
        if sim.nodes == 0 {
            bail!("simulation.nodes must be positive");
        }
        if sim.min_stake == 0 || sim.min_stake > sim.max_stake {
            bail!(
                "simulation stake range {}..={} is empty or zero",
                sim.min_stake,
                sim.max_stake
            );
        }
        if sim.reserve_chunks < SAMPLE_SIZE {
            bail!(
                "simulation.reserve_chunks must be at least {}, got {}",
                SAMPLE_SIZE,
                sim.reserve_chunks
            );
        }
        if sim.chunk_size == 0 || sim.chunk_size > CHUNK_SIZE {
            bail!(
                "simulation.chunk_size must be in 1..={}, got {}",
                CHUNK_SIZE,
                sim.chunk_size
            );
        }
        if sim.bucket_depth < self.ledger.minimum_bucket_depth || sim.bucket_depth >= sim.batch_depth {
            bail!(
                "simulation bucket depth {} must be at least {} and below batch depth {}",
                sim.bucket_depth,
                self.ledger.minimum_bucket_depth,
                sim.batch_depth
            );
        }
        if sim.batch_depth > 32 {
            bail!("simulation.batch_depth above 32 is not supported");
        }
        Ok(())
    }
}

fn parsed_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}
