//! Load drivers for multi-tenant vector search services.
//!
//! - [`sweep`]: latency of one tenant vs. many tenants at rising concurrency
//! - [`simulation`]: users cycling tenants COLD -> HOT -> COLD
//! - [`steady`]: fixed-rate per-tenant query load
//! - [`transition`]: bulk offload / onload cycles

pub mod app;
pub mod collector;
pub mod executor;
pub mod metrics_server;
pub mod pacing;
pub mod runner;
pub mod simulation;
pub mod steady;
pub mod sweep;
pub mod telemetry;
pub mod transition;

pub use app::Harness;
pub use collector::{ErrorCollector, ErrorReporter};
pub use executor::{QueryExecutor, QueryOutcome, Scenario};
pub use pacing::{Clock, LaunchSchedule, TokioClock};
pub use runner::{run_batch, BatchOutcome, ConcurrencyRunner};
pub use simulation::{SimulatedUser, SimulationDriver, SimulationSummary, UserState};
pub use steady::{SteadyDriver, SteadySummary};
pub use sweep::{ScenarioReport, SweepDriver, SweepSummary};
pub use transition::{TransitionDriver, TransitionSummary};
