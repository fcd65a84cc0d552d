//! Payload generation and coordinate sampling
//!
//! A payload is a pure function of the current wall-clock time, a randomly
//! sampled board coordinate, and the current parameter snapshot. The HSL
//! color channels sweep continuously over time and space; `radius` and
//! `transparency` pass through from the parameters unchanged.

use std::f64::consts::PI;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng as _;
use serde::Serialize;

use super::params::Parameters;

/// A board position, sampled uniformly per request and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    pub x: u32,
    pub y: u32,
}

/// Wire payload for one request.
///
/// Serializes to the fixed JSON shape the target expects:
/// `{"color":[h,s,l],"radius":r,"transparency":t,"time_to_grow":ms}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Payload {
    /// HSL channels as integers: hue in [0, 360), saturation and lightness
    /// as percentages
    pub color: [u16; 3],
    pub radius: f64,
    pub transparency: f64,
    pub time_to_grow: u64,
}

/// Sample a coordinate uniformly over `[0, max_coord]²`.
pub fn sample_coordinate(max_coord: u32) -> Coordinate {
    let mut rng = rand::rng();
    Coordinate {
        x: rng.random_range(0..=max_coord),
        y: rng.random_range(0..=max_coord),
    }
}

/// Current wall-clock time as fractional epoch milliseconds.
pub fn epoch_millis_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
        * 1000.0
}

/// Build the payload for one request.
///
/// Deterministic in `(epoch_ms, coord, max_coord, params)`; the only
/// randomness in a dispatched request is the coordinate itself.
pub fn build_payload(
    epoch_ms: f64,
    coord: Coordinate,
    max_coord: u32,
    params: &Parameters,
) -> Payload {
    Payload {
        color: hsl_channels(epoch_ms, coord, max_coord),
        radius: params.radius,
        transparency: params.transparency,
        time_to_grow: params.growth_ms,
    }
}

/// HSL sweep over time and board position.
///
/// ```text
/// hue   = (t*0.05 + (x/max)*360 + (y/max)*180) mod 360
/// sat   = 85 + 15*sin(t*0.01 + (x/max)*π)
/// light = 45 + 20*cos(t*0.008 − (y/max)*2)
/// ```
///
/// Channels are truncated to integers, matching the target's expectations.
fn hsl_channels(t: f64, coord: Coordinate, max_coord: u32) -> [u16; 3] {
    let fx = f64::from(coord.x) / f64::from(max_coord);
    let fy = f64::from(coord.y) / f64::from(max_coord);

    let hue = (t * 0.05 + fx * 360.0 + fy * 180.0) % 360.0;
    let sat = 85 + (15.0 * (t * 0.01 + fx * PI).sin()) as i32;
    let light = 45 + (20.0 * (t * 0.008 - fy * 2.0).cos()) as i32;

    [hue as u16, sat as u16, light as u16]
}
