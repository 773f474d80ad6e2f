//! Battery voltage from the divider ADC, mapped to a smoothed percentage.

const SMOOTHING_WINDOW: usize = 5;

// (volts, percent), ascending
const DISCHARGE_CURVE: [(f32, f32); 9] = [
    (3.30, 0.0),
    (3.50, 5.0),
    (3.60, 15.0),
    (3.70, 30.0),
    (3.80, 50.0),
    (3.90, 70.0),
    (4.00, 85.0),
    (4.10, 95.0),
    (4.20, 100.0),
];

const CHARGING_ABOVE_V: f32 = 4.15;
const CHARGING_RISE_V: f32 = 0.05;
const DISCHARGING_BELOW_V: f32 = 4.10;
const DISCHARGING_DROP_V: f32 = -0.02;

/// Source of raw battery ADC codes.
pub trait BatteryAdc {
    /// 12-bit code, `0..=4095`.
    fn read_raw(&mut self) -> u16;
}

/// ADC scaling and divider ratios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub adc_max: f32,
    pub reference_v: f32,
    pub divider: f32,
    /// Divider ratio measured against a meter; percentage and charging
    /// state are derived from this one
    pub calibrated_divider: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            adc_max: 4095.0,
            reference_v: 3.3,
            divider: 4.90,
            calibrated_divider: 5.05,
        }
    }
}

impl Calibration {
    fn scale(&self, raw: u16, ratio: f32) -> f32 {
        f32::from(raw) / self.adc_max * self.reference_v * ratio
    }

    pub fn voltage(&self, raw: u16) -> f32 {
        self.scale(raw, self.divider)
    }

    pub fn calibrated_voltage(&self, raw: u16) -> f32 {
        self.scale(raw, self.calibrated_divider)
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BatteryReading {
    pub raw: u16,
    pub voltage: f32,
    pub calibrated_voltage: f32,
    pub percent: u8,
    pub smoothed_percent: u8,
    pub is_charging: bool,
}

/// Piecewise-linear charge estimate, clamped to `0..=100`.
pub fn voltage_to_percent(voltage: f32) -> u8 {
    let (v_min, _) = DISCHARGE_CURVE[0];
    let (v_max, _) = DISCHARGE_CURVE[DISCHARGE_CURVE.len() - 1];
    if !(voltage > v_min) {
        return 0;
    }
    if voltage >= v_max {
        return 100;
    }

    DISCHARGE_CURVE
        .windows(2)
        .find(|w| voltage <= w[1].0)
        .map(|w| {
            let ((v0, p0), (v1, p1)) = (w[0], w[1]);
            let pct = p0 + (voltage - v0) / (v1 - v0) * (p1 - p0);
            libm::roundf(pct).clamp(0.0, 100.0) as u8
        })
        .unwrap_or(100)
}

pub struct BatteryEstimator {
    calibration: Calibration,
    check_interval_ms: u64,
    window: [u8; SMOOTHING_WINDOW],
    cursor: usize,
    window_full: bool,
    last_check: Option<(u64, f32)>,
    is_charging: bool,
}

impl BatteryEstimator {
    pub fn new(calibration: Calibration, check_interval_ms: u64) -> Self {
        Self {
            calibration,
            check_interval_ms,
            window: [0; SMOOTHING_WINDOW],
            cursor: 0,
            window_full: false,
            last_check: None,
            is_charging: false,
        }
    }

    pub fn sample(&mut self, raw: u16, now_ms: u64) -> BatteryReading {
        let calibrated_voltage = self.calibration.calibrated_voltage(raw);
        let percent = voltage_to_percent(calibrated_voltage);
        let smoothed_percent = self.smooth(percent);
        self.check_charging(calibrated_voltage, now_ms);

        BatteryReading {
            raw,
            voltage: self.calibration.voltage(raw),
            calibrated_voltage,
            percent,
            smoothed_percent,
            is_charging: self.is_charging,
        }
    }

    fn smooth(&mut self, percent: u8) -> u8 {
        self.window[self.cursor] = percent;
        self.cursor = (self.cursor + 1) % SMOOTHING_WINDOW;
        if self.cursor == 0 {
            self.window_full = true;
        }
        if !self.window_full {
            return percent;
        }
        let sum: u32 = self.window.iter().map(|&p| u32::from(p)).sum();
        libm::roundf(sum as f32 / SMOOTHING_WINDOW as f32) as u8
    }

    fn check_charging(&mut self, voltage: f32, now_ms: u64) {
        match self.last_check {
            None => {
                self.last_check = Some((now_ms, voltage));
                self.is_charging = false;
            }
            Some((at, _)) if now_ms.saturating_sub(at) < self.check_interval_ms => {}
            Some((_, baseline)) => {
                let delta = voltage - baseline;
                if voltage > CHARGING_ABOVE_V && delta > CHARGING_RISE_V {
                    if !self.is_charging {
                        debug!("charging detected at {}V", voltage);
                    }
                    self.is_charging = true;
                } else if voltage < DISCHARGING_BELOW_V || delta < DISCHARGING_DROP_V {
                    self.is_charging = false;
                }
                self.last_check = Some((now_ms, voltage));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Raw code that reads back as roughly `volts` after calibration.
    fn raw_for(volts: f32) -> u16 {
        let c = Calibration::default();
        libm::roundf(volts / (c.reference_v * c.calibrated_divider) * c.adc_max) as u16
    }

    #[test]
    fn curve_endpoints_and_breakpoints() {
        assert_eq!(voltage_to_percent(0.0), 0);
        assert_eq!(voltage_to_percent(3.30), 0);
        assert_eq!(voltage_to_percent(3.60), 15);
        assert_eq!(voltage_to_percent(3.75), 40);
        assert_eq!(voltage_to_percent(3.80), 50);
        assert_eq!(voltage_to_percent(4.20), 100);
        assert_eq!(voltage_to_percent(5.00), 100);
        assert_eq!(voltage_to_percent(f32::NAN), 0);
    }

    #[test]
    fn curve_is_monotone() {
        let mut last = 0;
        for mv in 3000..=4400 {
            let pct = voltage_to_percent(mv as f32 / 1000.0);
            assert!(pct >= last, "{mv} mV gave {pct} after {last}");
            assert!(pct <= 100);
            last = pct;
        }
    }

    #[test]
    fn voltage_uses_both_dividers() {
        let c = Calibration::default();
        assert_eq!(c.voltage(0), 0.0);
        assert!((c.voltage(4095) - 3.3 * 4.90).abs() < 1e-4);
        assert!((c.calibrated_voltage(4095) - 3.3 * 5.05).abs() < 1e-4);
    }

    #[test]
    fn smoothing_starts_after_window_fills() {
        let mut est = BatteryEstimator::new(Calibration::default(), 10_000);
        let mut est_smooth = |pct| est.smooth(pct);
        assert_eq!(est_smooth(100), 100);
        assert_eq!(est_smooth(50), 50);
        assert_eq!(est_smooth(50), 50);
        assert_eq!(est_smooth(50), 50);
        // Fifth sample fills the window: (100 + 4*50) / 5
        assert_eq!(est_smooth(50), 60);
        // Oldest sample (100) is replaced
        assert_eq!(est_smooth(50), 50);
    }

    #[test]
    fn sample_reports_instant_and_smoothed() {
        let mut est = BatteryEstimator::new(Calibration::default(), 10_000);
        let r = est.sample(raw_for(3.80), 0);
        assert_eq!(r.percent, r.smoothed_percent);
        assert!((r.calibrated_voltage - 3.80).abs() < 0.01);
        assert!(r.calibrated_voltage > r.voltage);
        assert!(!r.is_charging);
    }

    #[test]
    fn charging_detection_over_check_intervals() {
        let mut est = BatteryEstimator::new(Calibration::default(), 10_000);
        assert!(!est.sample(raw_for(4.10), 0).is_charging);
        // Not yet due
        assert!(!est.sample(raw_for(4.30), 5_000).is_charging);
        assert!(est.sample(raw_for(4.18), 10_000).is_charging);
        assert!(est.sample(raw_for(4.22), 20_000).is_charging);
        // Flat above 4.10 keeps the previous verdict
        assert!(est.sample(raw_for(4.22), 30_000).is_charging);
        assert!(!est.sample(raw_for(4.05), 40_000).is_charging);
    }

    #[test]
    fn voltage_drop_clears_charging() {
        let mut est = BatteryEstimator::new(Calibration::default(), 10_000);
        est.sample(raw_for(4.00), 0);
        assert!(est.sample(raw_for(4.16), 10_000).is_charging);
        assert!(!est.sample(raw_for(4.12), 20_000).is_charging);
    }
}
