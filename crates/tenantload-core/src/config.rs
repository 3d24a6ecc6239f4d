//! Configuration management for tenantload
//!
//! Sources, lowest precedence first:
//! - Hardcoded defaults
//! - `/etc/tenantload/tenantload.{yaml,toml,json}`
//! - `./config/tenantload.{yaml,toml,json}`
//! - File named by `TENANTLOAD_CONFIG`
//! - Environment variables (`TENANTLOAD_SECTION__KEY`)
//!
//! CLI flags are applied on top by the binary.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::tenant::ActivityStatus;
use crate::vector::VectorRange;

/// Default concurrency sweep: 1..=10, then 20..=50 in steps of ten.
pub const DEFAULT_LEVELS: [usize; 14] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 20, 30, 40, 50];

/// Root configuration structure for a harness run
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct HarnessConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub steady: SteadyConfig,

    #[serde(default)]
    pub transition: TransitionConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Seed for the process-wide random source. Unset means OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl HarnessConfig {
    /// Load configuration from all sources and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("TENANTLOAD_CONFIG").ok();
        Self::load_with(explicit.as_deref().map(Path::new))
    }

    /// Same as [`HarnessConfig::load`] but with an explicit config file.
    pub fn load_with(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::load_layered(config_file)?;
        config.validate()?;
        Ok(config)
    }

    /// Merges every source without validating, so callers can apply
    /// further overrides (CLI flags) before [`HarnessConfig::validate`].
    pub fn load_layered(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        builder = builder
            .add_source(File::with_name("/etc/tenantload/tenantload").required(false))
            .add_source(File::with_name("./config/tenantload").required(false));

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Example: TENANTLOAD_SIMULATION__USERS=50, TENANTLOAD_SWEEP__LEVELS=1,2,4
        builder = builder.add_source(
            Environment::with_prefix("TENANTLOAD")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("sweep.levels")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Load configuration from a single file on top of the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: HarnessConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            // Target
            .set_default("target.scheme", "http")?
            .set_default("target.host", "localhost:8080")?
            .set_default("target.collection", "MultiTenancyTest")?
            // Query
            .set_default("query.dimensions", 1536)?
            .set_default("query.limit", 10)?
            // Sweep
            .set_default("sweep.iterations", 1)?
            // Simulation
            .set_default("simulation.users", 1000)?
            .set_default("simulation.query_deadline_ms", 60_000)?
            .set_default("simulation.sleep_min_ms", 1000)?
            .set_default("simulation.sleep_max_ms", 6000)?
            .set_default("simulation.cleanup_on_failure", false)?
            .set_default("simulation.launch.initial_interval_ms", 500)?
            .set_default("simulation.launch.step_ms", 5)?
            .set_default("simulation.launch.step_every", 10)?
            .set_default("simulation.launch.floor_ms", 10)?
            // Steady
            .set_default("steady.tenant_count", 10)?
            .set_default("steady.parallel_per_tenant", 3)?
            .set_default("steady.queries_per_user", 1000)?
            .set_default("steady.queries_per_minute", 30)?
            // Transition
            .set_default("transition.per_cycle", 10)?
            .set_default("transition.wait_timeout_secs", 600)?
            .set_default("transition.poll_interval_ms", 1000)?
            // Metrics
            .set_default("metrics.linger_secs", 30)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.host.trim().is_empty() {
            return Err(ConfigError::Message("target.host must not be empty".to_string()));
        }

        if self.target.collection.trim().is_empty() {
            return Err(ConfigError::Message(
                "target.collection must not be empty".to_string(),
            ));
        }

        if self.query.dimensions == 0 {
            return Err(ConfigError::Message("query.dimensions must be > 0".to_string()));
        }

        if self.query.limit == 0 {
            return Err(ConfigError::Message("query.limit must be > 0".to_string()));
        }

        self.sweep.validate()?;

        if self.simulation.users == 0 {
            return Err(ConfigError::Message("simulation.users must be > 0".to_string()));
        }

        if self.simulation.sleep_max_ms < self.simulation.sleep_min_ms {
            return Err(ConfigError::Message(
                "simulation.sleep_max_ms must be >= sleep_min_ms".to_string(),
            ));
        }

        let launch = &self.simulation.launch;
        if launch.floor_ms > launch.initial_interval_ms {
            return Err(ConfigError::Message(
                "simulation.launch.floor_ms must be <= initial_interval_ms".to_string(),
            ));
        }

        if launch.step_every == 0 {
            return Err(ConfigError::Message(
                "simulation.launch.step_every must be > 0".to_string(),
            ));
        }

        if self.steady.queries_per_minute == 0 {
            return Err(ConfigError::Message(
                "steady.queries_per_minute must be > 0".to_string(),
            ));
        }

        if self.transition.per_cycle == 0 || self.transition.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "transition.per_cycle and transition.poll_interval_ms must be > 0".to_string(),
            ));
        }

        if self.steady.tenant_count == 0 || self.steady.parallel_per_tenant == 0 {
            return Err(ConfigError::Message(
                "steady.tenant_count and steady.parallel_per_tenant must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Where the data service lives and what to target
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// `http` or `https`
    pub scheme: String,

    /// `host[:port]`
    pub host: String,

    /// Collection (class) whose tenants are exercised
    pub collection: String,

    /// Per-request timeout. Unset means the harness imposes none.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Restrict the tenant pool to one activity status
    #[serde(default)]
    pub tenant_status: Option<ActivityStatus>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost:8080".to_string(),
            collection: "MultiTenancyTest".to_string(),
            request_timeout_ms: None,
            tenant_status: None,
        }
    }
}

impl TargetConfig {
    /// Base URL of the service, e.g. `http://localhost:8080`.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Request timeout, if one was configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Shape of every similarity query
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Vector dimensionality
    pub dimensions: usize,

    /// Result limit per query
    pub limit: usize,

    /// Component range of generated vectors
    #[serde(default)]
    pub vector_range: VectorRange,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            dimensions: 1536,
            limit: 10,
            vector_range: VectorRange::Unit,
        }
    }
}

/// Concurrency sweep configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    /// Strictly ascending concurrency levels
    #[serde(default = "default_levels", deserialize_with = "one_or_many")]
    pub levels: Vec<usize>,

    /// Number of full passes over `levels`
    pub iterations: usize,
}

fn default_levels() -> Vec<usize> {
    DEFAULT_LEVELS.to_vec()
}

/// Accepts `[1, 2]`, `5` and `"1,2"`. The environment layer only yields a
/// list when the value contains the separator, and its list items are strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Level {
        Number(usize),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Level),
        Many(Vec<Level>),
    }

    let items = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(level) => vec![level],
        OneOrMany::Many(levels) => levels,
    };

    let mut levels = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Level::Number(level) => levels.push(level),
            Level::Text(text) => {
                for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let level = part.parse::<usize>().map_err(|e| {
                        serde::de::Error::custom(format!("invalid level `{part}`: {e}"))
                    })?;
                    levels.push(level);
                }
            }
        }
    }
    Ok(levels)
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            levels: default_levels(),
            iterations: 1,
        }
    }
}

impl SweepConfig {
    /// Rejects empty, zero or non-ascending level sequences.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels.is_empty() {
            return Err(ConfigError::Message("sweep.levels must not be empty".to_string()));
        }

        if self.levels.contains(&0) {
            return Err(ConfigError::Message("sweep.levels must all be > 0".to_string()));
        }

        if self.levels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Message(
                "sweep.levels must be strictly ascending".to_string(),
            ));
        }

        if self.iterations == 0 {
            return Err(ConfigError::Message("sweep.iterations must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Sustained-user simulation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Number of user tasks launched
    pub users: usize,

    /// How long each user keeps querying after activation
    pub query_deadline_ms: u64,

    /// Lower bound of the pause between two queries
    pub sleep_min_ms: u64,

    /// Upper bound (exclusive) of the pause between two queries
    pub sleep_max_ms: u64,

    /// Deactivate the tenant even when the query loop failed
    #[serde(default)]
    pub cleanup_on_failure: bool,

    #[serde(default)]
    pub launch: LaunchConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            users: 1000,
            query_deadline_ms: 60_000,
            sleep_min_ms: 1000,
            sleep_max_ms: 6000,
            cleanup_on_failure: false,
            launch: LaunchConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Querying phase length
    pub fn query_deadline(&self) -> Duration {
        Duration::from_millis(self.query_deadline_ms)
    }

    /// Bounds of the pause between two queries
    pub fn sleep_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.sleep_min_ms),
            Duration::from_millis(self.sleep_max_ms),
        )
    }
}

/// Linear launch ramp: the interval shrinks by `step_ms` every `step_every`
/// launches until it reaches `floor_ms`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LaunchConfig {
    pub initial_interval_ms: u64,
    pub step_ms: u64,
    pub step_every: usize,
    pub floor_ms: u64,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            step_ms: 5,
            step_every: 10,
            floor_ms: 10,
        }
    }
}

/// Steady per-tenant query load configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SteadyConfig {
    /// Tenants picked (with replacement)
    pub tenant_count: usize,

    /// Users started per picked tenant
    pub parallel_per_tenant: usize,

    /// Queries each user issues
    pub queries_per_user: usize,

    /// Target query rate of one user
    pub queries_per_minute: u32,
}

impl Default for SteadyConfig {
    fn default() -> Self {
        Self {
            tenant_count: 10,
            parallel_per_tenant: 3,
            queries_per_user: 1000,
            queries_per_minute: 30,
        }
    }
}

impl SteadyConfig {
    /// Mean pause between two queries of one user
    pub fn average_wait(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.queries_per_minute.max(1)))
    }
}

/// Bulk tenant status transitions (offload / onload cycles)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransitionConfig {
    /// Tenants updated per cycle
    pub per_cycle: usize,

    /// Tenants to transition in total; unset means every tenant not yet in the target status
    #[serde(default)]
    pub total: Option<usize>,

    /// How long one cycle waits for the service to report the new status
    pub wait_timeout_secs: u64,

    /// Pause between two status polls
    pub poll_interval_ms: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            per_cycle: 10,
            total: None,
            wait_timeout_secs: 600,
            poll_interval_ms: 1000,
        }
    }
}

impl TransitionConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Prometheus exposition configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Address to serve `/metrics` on; unset disables the endpoint
    #[serde(default)]
    pub listen_addr: Option<String>,

    /// Seconds to keep serving after the run so the final values get scraped
    pub linger_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: None,
            linger_secs: 30,
        }
    }
}

impl MetricsConfig {
    pub fn linger(&self) -> Duration {
        Duration::from_secs(self.linger_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;

    // Environment variables are process-wide
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock();
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let result = f();
        for (key, _) in vars {
            std::env::remove_var(key);
        }
        result
    }

    #[test]
    fn test_default_configuration() {
        let config = HarnessConfig::default();

        assert_eq!(config.target.base_url(), "http://localhost:8080");
        assert_eq!(config.target.collection, "MultiTenancyTest");
        assert!(config.target.request_timeout().is_none());

        assert_eq!(config.query.dimensions, 1536);
        assert_eq!(config.query.limit, 10);

        assert_eq!(config.sweep.levels, DEFAULT_LEVELS.to_vec());
        assert_eq!(config.sweep.iterations, 1);

        assert_eq!(config.simulation.users, 1000);
        assert_eq!(config.simulation.query_deadline(), Duration::from_secs(60));
        assert!(!config.simulation.cleanup_on_failure);
        assert_eq!(config.simulation.launch.initial_interval_ms, 500);

        assert_eq!(config.steady.average_wait(), Duration::from_secs(2));
        assert!(config.metrics.listen_addr.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sweep_levels_must_ascend() {
        let mut sweep = SweepConfig::default();
        assert!(sweep.validate().is_ok());

        sweep.levels = vec![1, 2, 2, 3];
        assert!(sweep.validate().is_err());

        sweep.levels = vec![3, 2];
        assert!(sweep.validate().is_err());

        sweep.levels = vec![0, 1];
        assert!(sweep.validate().is_err());

        sweep.levels = Vec::new();
        assert!(sweep.validate().is_err());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = HarnessConfig::default();

        config.query.dimensions = 0;
        assert!(config.validate().is_err());
        config.query.dimensions = 32;

        config.simulation.sleep_min_ms = 10;
        config.simulation.sleep_max_ms = 5;
        assert!(config.validate().is_err());
        config.simulation.sleep_max_ms = 10;
        assert!(config.validate().is_ok());

        config.simulation.launch.floor_ms = 1000;
        assert!(config.validate().is_err());
        config.simulation.launch.floor_ms = 10;

        config.steady.queries_per_minute = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "target:\n  host: weaviate.internal:8080\n  collection: TenaciousT\n  tenant_status: COLD\n\
             query:\n  dimensions: 32\n\
             sweep:\n  levels: [1, 2, 4]\n\
             simulation:\n  users: 5\n  query_deadline_ms: 0\n"
        )
        .unwrap();

        let config = HarnessConfig::from_file(file.path()).unwrap();

        assert_eq!(config.target.base_url(), "http://weaviate.internal:8080");
        assert_eq!(config.target.collection, "TenaciousT");
        assert_eq!(config.target.tenant_status, Some(ActivityStatus::Cold));
        assert_eq!(config.query.dimensions, 32);
        assert_eq!(config.query.limit, 10);
        assert_eq!(config.sweep.levels, vec![1, 2, 4]);
        assert_eq!(config.simulation.users, 5);
        assert_eq!(config.simulation.query_deadline(), Duration::ZERO);
        assert_eq!(config.simulation.sleep_min_ms, 1000);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "sweep:\n  levels: [5, 1]\n").unwrap();

        assert!(HarnessConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = with_env(
            &[
                ("TENANTLOAD_SWEEP__LEVELS", "1,2,4"),
                ("TENANTLOAD_SIMULATION__USERS", "50"),
                ("TENANTLOAD_TARGET__HOST", "db:9000"),
            ],
            || HarnessConfig::load_with(None),
        )
        .unwrap();

        assert_eq!(config.sweep.levels, vec![1, 2, 4]);
        assert_eq!(config.simulation.users, 50);
        assert_eq!(config.target.host, "db:9000");
    }

    #[test]
    fn test_env_single_level() {
        let config = with_env(&[("TENANTLOAD_SWEEP__LEVELS", "5")], || {
            HarnessConfig::load_with(None)
        })
        .unwrap();

        assert_eq!(config.sweep.levels, vec![5]);
    }

    #[test]
    fn test_layered_load_defers_validation() {
        let mut config = with_env(&[("TENANTLOAD_QUERY__DIMENSIONS", "0")], || {
            HarnessConfig::load_layered(None)
        })
        .unwrap();

        assert_eq!(config.query.dimensions, 0);
        assert!(config.validate().is_err());

        // A later override repairs the value before validation
        config.query.dimensions = 8;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "target:\n  host: file-host:8080\n  collection: FromFile\n").unwrap();

        let from_file = with_env(&[], || HarnessConfig::load_with(Some(file.path()))).unwrap();
        assert_eq!(from_file.target.host, "file-host:8080");

        let config = with_env(&[("TENANTLOAD_TARGET__HOST", "env-host:9000")], || {
            HarnessConfig::load_with(Some(file.path()))
        })
        .unwrap();
        assert_eq!(config.target.host, "env-host:9000");
        assert_eq!(config.target.collection, "FromFile");
    }

    #[test]
    fn test_levels_accept_comma_string_in_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "sweep:\n  levels: \"1, 3, 9\"\n").unwrap();

        let config = HarnessConfig::from_file(file.path()).unwrap();
        assert_eq!(config.sweep.levels, vec![1, 3, 9]);
    }

    #[test]
    fn test_transition_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.transition.per_cycle, 10);
        assert!(config.transition.total.is_none());
        assert_eq!(config.transition.wait_timeout(), Duration::from_secs(600));
        assert_eq!(config.transition.poll_interval(), Duration::from_secs(1));
    }
}
