//! Live-tunable engine parameters
//!
//! The five knobs an operator can turn while the engine is running. Each
//! field has its own declared range and is clamped independently by the
//! writer; there are no cross-field invariants.
//!
//! Sharing discipline: parameters are published through an
//! [`arc_swap::ArcSwap`] snapshot. The presentation side clamps, clones and
//! stores a new immutable value; the dispatcher loads a consistent snapshot
//! at the top of every loop iteration. No lock is held across either side.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Declared ranges for every tunable field.
///
/// The defaults and ranges mirror the control surface this engine is driven
/// from: concurrency 1..=200, rate 1..=1500 req/s, radius 1..=150,
/// transparency 0..=1, growth time 100..=5000 ms.
pub mod bounds {
    pub const CONCURRENCY_MIN: usize = 1;
    pub const CONCURRENCY_MAX: usize = 200;
    pub const RATE_HZ_MIN: f64 = 1.0;
    pub const RATE_HZ_MAX: f64 = 1500.0;
    pub const RADIUS_MIN: f64 = 1.0;
    pub const RADIUS_MAX: f64 = 150.0;
    pub const TRANSPARENCY_MIN: f64 = 0.0;
    pub const TRANSPARENCY_MAX: f64 = 1.0;
    pub const GROWTH_MS_MIN: u64 = 100;
    pub const GROWTH_MS_MAX: u64 = 5000;
}

/// Mutable knobs read by the dispatcher every iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    /// Maximum number of in-flight requests
    pub concurrency: usize,
    /// Target dispatch rate in requests per second
    pub rate_hz: f64,
    /// Payload radius, passed through to the target unchanged
    pub radius: f64,
    /// Payload transparency in [0, 1], passed through unchanged
    pub transparency: f64,
    /// Payload growth time in milliseconds
    pub growth_ms: u64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            concurrency: 100,
            rate_hz: 1000.0,
            radius: 30.0,
            transparency: 1.0,
            growth_ms: 400,
        }
    }
}

/// A single clamped update to one parameter field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamUpdate {
    Concurrency(usize),
    RateHz(f64),
    Radius(f64),
    Transparency(f64),
    GrowthMs(u64),
}

impl Parameters {
    /// Apply one update, clamping the value to its declared range.
    pub fn apply(&mut self, update: ParamUpdate) {
        use self::bounds::*;

        match update {
            ParamUpdate::Concurrency(v) => {
                self.concurrency = v.clamp(CONCURRENCY_MIN, CONCURRENCY_MAX);
            }
            ParamUpdate::RateHz(v) => {
                self.rate_hz = clamp_finite(v, RATE_HZ_MIN, RATE_HZ_MAX);
            }
            ParamUpdate::Radius(v) => {
                self.radius = clamp_finite(v, RADIUS_MIN, RADIUS_MAX);
            }
            ParamUpdate::Transparency(v) => {
                self.transparency = clamp_finite(v, TRANSPARENCY_MIN, TRANSPARENCY_MAX);
            }
            ParamUpdate::GrowthMs(v) => {
                self.growth_ms = v.clamp(GROWTH_MS_MIN, GROWTH_MS_MAX);
            }
        }
    }

    /// Return a copy with every field clamped to its declared range.
    pub fn clamped(mut self) -> Self {
        use self::bounds::*;

        self.concurrency = self.concurrency.clamp(CONCURRENCY_MIN, CONCURRENCY_MAX);
        self.rate_hz = clamp_finite(self.rate_hz, RATE_HZ_MIN, RATE_HZ_MAX);
        self.radius = clamp_finite(self.radius, RADIUS_MIN, RADIUS_MAX);
        self.transparency = clamp_finite(self.transparency, TRANSPARENCY_MIN, TRANSPARENCY_MAX);
        self.growth_ms = self.growth_ms.clamp(GROWTH_MS_MIN, GROWTH_MS_MAX);
        self
    }
}

/// NaN maps to the lower bound rather than poisoning the pacing math.
fn clamp_finite(v: f64, min: f64, max: f64) -> f64 {
    if v.is_nan() { min } else { v.clamp(min, max) }
}

/// Snapshot-and-publish holder for [`Parameters`].
///
/// Written by the presentation side, read by the dispatcher. A reader never
/// observes a half-applied update.
#[derive(Debug)]
pub struct SharedParameters {
    inner: ArcSwap<Parameters>,
}

impl SharedParameters {
    pub fn new(initial: Parameters) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial.clamped()),
        }
    }

    /// Latest published value.
    pub fn snapshot(&self) -> Parameters {
        **self.inner.load()
    }

    /// Clamp and publish a single field update.
    pub fn update(&self, update: ParamUpdate) {
        let mut next = self.snapshot();
        next.apply(update);
        self.inner.store(Arc::new(next));
    }
}
