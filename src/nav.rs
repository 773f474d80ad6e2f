//! Great-circle navigation between two fixes.

use libm::{atan2, cos, sin, sqrt};

use crate::Position;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Eight-point compass rose.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinal {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Cardinal {
    const ROSE: [Cardinal; 8] = [
        Cardinal::N,
        Cardinal::NE,
        Cardinal::E,
        Cardinal::SE,
        Cardinal::S,
        Cardinal::SW,
        Cardinal::W,
        Cardinal::NW,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Cardinal::N => "N",
            Cardinal::NE => "NE",
            Cardinal::E => "E",
            Cardinal::SE => "SE",
            Cardinal::S => "S",
            Cardinal::SW => "SW",
            Cardinal::W => "W",
            Cardinal::NW => "NW",
        }
    }
}

/// Forward azimuth from `from` towards `to`, in `[0, 360)`.
pub fn bearing(from: Position, to: Position) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let y = sin(d_lon) * cos(lat2);
    let x = cos(lat1) * sin(lat2) - sin(lat1) * cos(lat2) * cos(d_lon);
    let deg = atan2(y, x).to_degrees();
    let norm = (deg + 360.0) % 360.0;
    // -0.0 and rounding up to exactly 360 both belong to north
    if norm >= 360.0 {
        0.0
    } else {
        norm.abs()
    }
}

/// Haversine distance in metres.
pub fn distance_meters(a: Position, b: Position) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (b.lon - a.lon).to_radians();

    let h = sin(d_lat / 2.0) * sin(d_lat / 2.0)
        + cos(lat1) * cos(lat2) * sin(d_lon / 2.0) * sin(d_lon / 2.0);
    let c = 2.0 * atan2(sqrt(h), sqrt(1.0 - h));
    EARTH_RADIUS_M * c
}

/// 45 degree buckets centred on each compass point.
pub fn cardinal(bearing_deg: f64) -> Cardinal {
    let b = bearing_deg % 360.0;
    let b = if b < 0.0 { b + 360.0 } else { b };
    // Shift by half a bucket so N covers [337.5, 360) and [0, 22.5)
    let bucket = ((b + 22.5) / 45.0) as usize % 8;
    Cardinal::ROSE[bucket]
}

/// Average ground speed between two timestamped fixes, `None` unless time
/// moved forward.
pub fn speed_kmh(a: Position, t_a_ms: u64, b: Position, t_b_ms: u64) -> Option<f32> {
    if t_b_ms <= t_a_ms {
        return None;
    }
    let hours = (t_b_ms - t_a_ms) as f64 / 3_600_000.0;
    Some((distance_meters(a, b) / 1000.0 / hours) as f32)
}

/// Samples the position stream at a fixed spacing and keeps the latest
/// speed estimate.
#[derive(Debug, Clone, Copy)]
pub struct SpeedTracker {
    interval_ms: u64,
    last: Option<(Position, u64)>,
    speed_kmh: Option<f32>,
}

impl SpeedTracker {
    pub const fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last: None,
            speed_kmh: None,
        }
    }

    pub fn update(&mut self, position: Position, now_ms: u64) {
        let Some((last_pos, last_ms)) = self.last else {
            self.last = Some((position, now_ms));
            return;
        };
        if now_ms.saturating_sub(last_ms) < self.interval_ms {
            return;
        }
        if let Some(speed) = speed_kmh(last_pos, last_ms, position, now_ms) {
            self.speed_kmh = Some(speed);
        }
        self.last = Some((position, now_ms));
    }

    pub fn speed_kmh(&self) -> Option<f32> {
        self.speed_kmh
    }
}
