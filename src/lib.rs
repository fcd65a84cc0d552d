//! Bombard - live-tunable HTTP load generator
//!
//! Drives a continuous stream of JSON POST requests against a fixed target
//! while an operator adjusts concurrency, rate, and payload shape on the
//! fly. The core is the dispatch engine: a rate-paced request loop with a
//! resizable concurrency bound, pause/resume control, and thread-safe
//! statistics.
//!
//! # Example
//! ```rust,no_run
//! use bombard::{Engine, EngineConfig, ParamUpdate};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let engine = Engine::new(EngineConfig::default())?;
//! engine.start()?;
//!
//! // Tune while running; each update is clamped to its declared range.
//! engine.set_parameter(ParamUpdate::RateHz(250.0));
//! engine.set_parameter(ParamUpdate::Concurrency(20));
//!
//! let stats = engine.stats();
//! println!("sent={} errors={}", stats.total_sent, stats.errors);
//!
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod errors;

// Re-export commonly used items for convenience
pub use config::EngineConfig;
pub use core::{Engine, EngineState, ParamUpdate, Parameters, StatsSnapshot};
pub use errors::{EngineError, EngineResult};
