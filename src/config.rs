use crate::battery::Calibration;

/// Display refresh (and battery sample) interval
pub const DISPLAY_REFRESH_MS: u64 = 1_000;
/// Any screen but the main menu falls back to it after this long without input
pub const INACTIVITY_TIMEOUT_MS: u64 = 30_000;
/// Minimum spacing between the fixes used for a speed estimate
pub const SPEED_INTERVAL_MS: u64 = 2_000;
/// Charging state is re-evaluated at this cadence, not every sample
pub const CHARGING_CHECK_MS: u64 = 10_000;
/// Minimum time between accepted press starts
pub const DEBOUNCE_MS: u64 = 200;
/// Hold time that turns a press into a long press
pub const LONG_PRESS_MS: u64 = 1_000;
/// HDOP x this factor is shown as the accuracy estimate in metres
pub const HDOP_TO_METERS: f32 = 5.0;

/// Tunables for one tracker instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub display_refresh_ms: u64,
    pub inactivity_timeout_ms: u64,
    pub speed_interval_ms: u64,
    pub charging_check_ms: u64,
    pub debounce_ms: u64,
    pub long_press_ms: u64,
    pub hdop_to_meters: f32,
    pub battery: Calibration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_refresh_ms: DISPLAY_REFRESH_MS,
            inactivity_timeout_ms: INACTIVITY_TIMEOUT_MS,
            speed_interval_ms: SPEED_INTERVAL_MS,
            charging_check_ms: CHARGING_CHECK_MS,
            debounce_ms: DEBOUNCE_MS,
            long_press_ms: LONG_PRESS_MS,
            hdop_to_meters: HDOP_TO_METERS,
            battery: Calibration::default(),
        }
    }
}
