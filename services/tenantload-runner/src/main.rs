use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use tenantload_core::{ActivityStatus, HarnessConfig, HarnessResult};
use tenantload_runner::metrics_server::MetricsServer;
use tenantload_runner::telemetry::{init_logging, LogFormat};
use tenantload_runner::Harness;

#[derive(Parser, Debug)]
#[command(name = "tenantload")]
#[command(about = "Latency and lifecycle load harness for multi-tenant vector search", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(long, global = true, env = "TENANTLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Service host and port (e.g. localhost:8080)
    #[arg(long, global = true, env = "HOST")]
    host: Option<String>,

    /// URL scheme (http or https)
    #[arg(long, global = true)]
    scheme: Option<String>,

    /// Collection whose tenants are queried
    #[arg(long, global = true, env = "CLASS_NAME")]
    collection: Option<String>,

    /// Query vector dimensionality
    #[arg(long, global = true, env = "DIMENSIONS")]
    dimensions: Option<usize>,

    /// Only use tenants with this activity status (HOT or COLD)
    #[arg(long, global = true)]
    tenant_status: Option<ActivityStatus>,

    /// Seed for reproducible tenant picks and vectors
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Serve Prometheus metrics on this address during the run
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the tenants of the collection
    Tenants,

    /// Compare one tenant vs. many tenants at rising concurrency
    Sweep {
        /// Concurrency levels, ascending (e.g. 1,2,5,10)
        #[arg(long, value_delimiter = ',')]
        levels: Option<Vec<usize>>,

        /// Number of full sweeps, each with a freshly picked tenant
        #[arg(long)]
        iterations: Option<usize>,
    },

    /// Simulate users activating, querying and deactivating tenants
    Simulate {
        /// Number of users to launch
        #[arg(long)]
        users: Option<usize>,

        /// Seconds each user keeps querying
        #[arg(long)]
        query_deadline_secs: Option<u64>,

        /// Lower bound of the pause between queries, in milliseconds
        #[arg(long)]
        sleep_min_ms: Option<u64>,

        /// Upper bound of the pause between queries, in milliseconds
        #[arg(long)]
        sleep_max_ms: Option<u64>,

        /// Deactivate the tenant even when a query failed
        #[arg(long)]
        cleanup_on_failure: bool,
    },

    /// Run fixed-rate query load against a set of tenants
    Steady {
        /// Tenants to pick (with replacement)
        #[arg(long)]
        tenant_count: Option<usize>,

        /// Users per picked tenant
        #[arg(long)]
        parallel_per_tenant: Option<usize>,

        /// Queries each user issues
        #[arg(long)]
        queries_per_user: Option<usize>,

        /// Target query rate per user
        #[arg(long)]
        queries_per_minute: Option<u32>,
    },

    /// Offload (COLD) or onload (HOT) tenants in bulk cycles
    Transition {
        /// Target activity status (HOT or COLD)
        #[arg(long)]
        status: ActivityStatus,

        /// Tenants updated per cycle
        #[arg(long)]
        per_cycle: Option<usize>,

        /// Stop after this many tenants were transitioned
        #[arg(long)]
        total: Option<usize>,

        /// Seconds one cycle waits for the new status
        #[arg(long)]
        wait_timeout_secs: Option<u64>,
    },

    /// Generate a configuration template
    GenerateConfig {
        /// Output configuration file path
        #[arg(long, default_value = "tenantload.yaml")]
        output: PathBuf,
    },
}

impl Cli {
    /// Applies flags on top of the layered configuration.
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(host) = &self.host {
            config.target.host = host.clone();
        }
        if let Some(scheme) = &self.scheme {
            config.target.scheme = scheme.clone();
        }
        if let Some(collection) = &self.collection {
            config.target.collection = collection.clone();
        }
        if let Some(dimensions) = self.dimensions {
            config.query.dimensions = dimensions;
        }
        if self.tenant_status.is_some() {
            config.target.tenant_status = self.tenant_status;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.metrics_addr.is_some() {
            config.metrics.listen_addr = self.metrics_addr.clone();
        }

        match &self.command {
            Commands::Sweep { levels, iterations } => {
                if let Some(levels) = levels {
                    config.sweep.levels = levels.clone();
                }
                if let Some(iterations) = iterations {
                    config.sweep.iterations = *iterations;
                }
            }
            Commands::Simulate {
                users,
                query_deadline_secs,
                sleep_min_ms,
                sleep_max_ms,
                cleanup_on_failure,
            } => {
                if let Some(users) = users {
                    config.simulation.users = *users;
                }
                if let Some(secs) = query_deadline_secs {
                    config.simulation.query_deadline_ms = secs * 1000;
                }
                if let Some(ms) = sleep_min_ms {
                    config.simulation.sleep_min_ms = *ms;
                }
                if let Some(ms) = sleep_max_ms {
                    config.simulation.sleep_max_ms = *ms;
                }
                if *cleanup_on_failure {
                    config.simulation.cleanup_on_failure = true;
                }
            }
            Commands::Steady {
                tenant_count,
                parallel_per_tenant,
                queries_per_user,
                queries_per_minute,
            } => {
                if let Some(n) = tenant_count {
                    config.steady.tenant_count = *n;
                }
                if let Some(n) = parallel_per_tenant {
                    config.steady.parallel_per_tenant = *n;
                }
                if let Some(n) = queries_per_user {
                    config.steady.queries_per_user = *n;
                }
                if let Some(n) = queries_per_minute {
                    config.steady.queries_per_minute = *n;
                }
            }
            Commands::Transition {
                per_cycle,
                total,
                wait_timeout_secs,
                ..
            } => {
                if let Some(n) = per_cycle {
                    config.transition.per_cycle = *n;
                }
                if total.is_some() {
                    config.transition.total = *total;
                }
                if let Some(secs) = wait_timeout_secs {
                    config.transition.wait_timeout_secs = *secs;
                }
            }
            Commands::Tenants | Commands::GenerateConfig { .. } => {}
        }
    }
}

/// Merges file and environment sources, applies flags, then validates once.
fn resolve_config(cli: &Cli) -> HarnessResult<HarnessConfig> {
    let mut config = HarnessConfig::load_layered(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    if let Commands::GenerateConfig { output } = &cli.command {
        std::fs::write(output, CONFIG_TEMPLATE)?;
        println!("Configuration template written to: {}", output.display());
        println!("\nEdit the file and use it with:");
        println!("  tenantload --config {} sweep", output.display());
        return Ok(());
    }

    let config = resolve_config(&cli)?;

    let run_id = Uuid::new_v4();
    let span = info_span!("run", run_id = %run_id);
    let failed = run(&cli.command, config).instrument(span).await?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Runs one command. Returns `true` when any query or user failed.
async fn run(command: &Commands, config: HarnessConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let metrics = match &config.metrics.listen_addr {
        Some(addr) => Some(MetricsServer::start(addr).await?),
        None => None,
    };
    let linger = config.metrics.linger();
    let harness = Harness::connect(config)?;

    let failed = match command {
        Commands::Tenants => {
            let tenants = harness.fetch_tenants().await?;
            for tenant in &tenants {
                println!("{}\t{}", tenant.name, tenant.activity_status.as_str());
            }
            false
        }

        Commands::Sweep { .. } => {
            let summary = harness.sweep().await?;
            let errors: Vec<_> = summary.errors().collect();
            for err in &errors {
                error!(tenant = %err.tenant, error = %err, "batch error");
            }
            info!(
                batches = summary.reports.len(),
                failing_batches = errors.len(),
                "sweep finished"
            );
            !errors.is_empty()
        }

        Commands::Simulate { .. } => {
            let summary = harness.simulate().await?;
            for err in &summary.errors {
                error!(tenant = err.tenant(), phase = err.phase(), error = %err, "user error");
            }
            info!(
                launched = summary.launched,
                completed = summary.completed,
                queries = summary.queries,
                errors = summary.errors.len(),
                "simulation finished"
            );
            !summary.errors.is_empty()
        }

        Commands::Steady { .. } => {
            let summary = harness.steady().await?;
            info!(
                users = summary.users,
                tenants = summary.tenants,
                succeeded = summary.succeeded,
                failed = summary.failed,
                aborted_users = summary.aborted_users,
                "steady load finished"
            );
            summary.failed > 0 || summary.aborted_users > 0
        }

        Commands::Transition { status, .. } => {
            let summary = harness.transition(*status).await?;
            info!(
                status = %status.as_str(),
                cycles = summary.cycles,
                transitioned = summary.transitioned,
                failed_updates = summary.failed_updates,
                timed_out_cycles = summary.timed_out_cycles,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "transition finished"
            );
            !summary.is_complete()
        }

        Commands::GenerateConfig { .. } => false,
    };

    if let Some(server) = metrics {
        server.shutdown_after(linger).await;
    }
    Ok(failed)
}

const CONFIG_TEMPLATE: &str = r#"# tenantload configuration
# Every key can be overridden with TENANTLOAD_<SECTION>__<KEY>, e.g. TENANTLOAD_TARGET__HOST

target:
  scheme: http
  host: localhost:8080
  collection: MultiTenancyTest
  # request_timeout_ms: 30000  # unset: no client-side timeout
  # tenant_status: COLD        # only use tenants with this status

query:
  dimensions: 1536
  limit: 10
  vector_range: unit  # unit: [0, 1), symmetric: [-1, 1)

sweep:
  levels: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 20, 30, 40, 50]
  iterations: 1

simulation:
  users: 1000
  query_deadline_ms: 60000
  sleep_min_ms: 1000
  sleep_max_ms: 6000
  cleanup_on_failure: false  # deactivate the tenant after a failed query
  launch:
    initial_interval_ms: 500
    step_ms: 5
    step_every: 10
    floor_ms: 10

steady:
  tenant_count: 10
  parallel_per_tenant: 3
  queries_per_user: 1000
  queries_per_minute: 30

transition:
  per_cycle: 10
  # total: 100           # unset: every tenant not yet in the target status
  wait_timeout_secs: 600
  poll_interval_ms: 1000

metrics:
  # listen_addr: 0.0.0.0:9100
  linger_secs: 30

# seed: 42
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenantload.yaml");
        std::fs::write(&path, CONFIG_TEMPLATE).unwrap();

        let config = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(config.target.collection, "MultiTenancyTest");
        assert_eq!(config.sweep.levels.len(), 14);
        assert!(!config.simulation.cleanup_on_failure);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "tenantload",
            "--host",
            "db:9000",
            "--dimensions",
            "8",
            "sweep",
            "--levels",
            "1,2,4",
        ]);
        let mut config = HarnessConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.target.host, "db:9000");
        assert_eq!(config.query.dimensions, 8);
        assert_eq!(config.sweep.levels, vec![1, 2, 4]);
    }

    #[test]
    fn test_transition_flags() {
        let cli = Cli::parse_from([
            "tenantload",
            "transition",
            "--status",
            "cold",
            "--per-cycle",
            "25",
            "--total",
            "100",
        ]);
        let mut config = HarnessConfig::default();
        cli.apply(&mut config);

        assert!(matches!(
            cli.command,
            Commands::Transition {
                status: ActivityStatus::Cold,
                ..
            }
        ));
        assert_eq!(config.transition.per_cycle, 25);
        assert_eq!(config.transition.total, Some(100));
        assert_eq!(config.transition.wait_timeout_secs, 600);
    }

    #[test]
    fn test_flag_repairs_invalid_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenantload.yaml");
        std::fs::write(&path, "query:\n  dimensions: 0\n").unwrap();
        let path = path.to_str().unwrap();

        let without_flag = Cli::parse_from(["tenantload", "--config", path, "tenants"]);
        assert!(resolve_config(&without_flag).is_err());

        let with_flag = Cli::parse_from([
            "tenantload",
            "--config",
            path,
            "--dimensions",
            "8",
            "tenants",
        ]);
        let config = resolve_config(&with_flag).unwrap();
        assert_eq!(config.query.dimensions, 8);
    }
}
