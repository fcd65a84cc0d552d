//! Engine core: parameters, payload generation, concurrency limiting,
//! request execution, statistics, and the dispatch loop that ties them
//! together.

pub mod dispatcher;
pub mod executor;
pub mod limiter;
pub mod params;
pub mod payload;
pub mod stats;

pub use dispatcher::{Engine, EngineState};
pub use executor::{FailureKind, RequestExecutor, RequestOutcome};
pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use params::{ParamUpdate, Parameters, SharedParameters};
pub use payload::{Coordinate, Payload};
pub use stats::{StatsAggregator, StatsSnapshot};
