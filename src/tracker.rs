//! The polled main loop tying the receiver, the button and the screen
//! together.

use embedded_hal::digital::v2::InputPin;
use embedded_hal::serial;

use crate::battery::{BatteryAdc, BatteryEstimator, BatteryReading};
use crate::display::Renderer;
use crate::fix::{FixSnapshot, FixState};
use crate::nav::SpeedTracker;
use crate::nmea::{self, LineAssembler, SentenceEffect};
use crate::schedule::Periodic;
use crate::tactile::{self, PressDetector};
use crate::ui::{show_message, Action, FrameData, Painter, ScreenState, UiContext};
use crate::waypoints::{default_name, Storage, WaypointStore};
use crate::{Config, Position};

/// Sleep control provided by the board.
pub trait Power {
    /// Halts until any enabled interrupt fires.
    fn wait_for_interrupt(&mut self);
    /// Enters the lowest power state. On hardware this does not return;
    /// the next boot starts from scratch.
    fn power_off(&mut self);
}

/// Peripherals the tracker borrows for one `poll`.
pub struct Hardware<BTN, GNSS, ADC, DISP, PWR> {
    /// Active-low user button
    pub button: BTN,
    /// NMEA byte stream from the receiver
    pub gnss: GNSS,
    pub adc: ADC,
    pub display: DISP,
    pub power: PWR,
}

pub struct Tracker<S> {
    config: Config,
    assembler: LineAssembler,
    fix: FixState,
    speed: SpeedTracker,
    waypoints: WaypointStore<S>,
    battery: BatteryEstimator,
    last_battery: BatteryReading,
    button: PressDetector,
    screen: ScreenState,
    painter: Painter,
    refresh: Periodic,
}

impl<S: Storage> Tracker<S> {
    pub fn new(config: Config, storage: S) -> Self {
        Self {
            assembler: LineAssembler::new(),
            fix: FixState::new(),
            speed: SpeedTracker::new(config.speed_interval_ms),
            waypoints: WaypointStore::load(storage),
            battery: BatteryEstimator::new(config.battery, config.charging_check_ms),
            last_battery: BatteryReading::default(),
            button: PressDetector::new(config.debounce_ms, config.long_press_ms),
            screen: ScreenState::new(0),
            painter: Painter::new(),
            refresh: Periodic::new(config.display_refresh_ms),
            config,
        }
    }

    /// One loop iteration: button, receiver, timeout, then the periodic
    /// battery sample and redraw.
    pub fn poll<BTN, GNSS, ADC, DISP, PWR>(
        &mut self,
        now_ms: u64,
        hw: &mut Hardware<BTN, GNSS, ADC, DISP, PWR>,
    ) where
        BTN: InputPin,
        GNSS: serial::Read<u8>,
        ADC: BatteryAdc,
        DISP: Renderer,
        PWR: Power,
    {
        let event = self.button.update(tactile::is_pressed(&hw.button), now_ms);
        let ctx = self.ui_context();
        if let Some(action) = self.screen.handle(event, now_ms, &ctx) {
            self.perform(action, now_ms, hw);
        }

        self.drain_gnss(&mut hw.gnss, now_ms);

        self.screen
            .check_timeout(now_ms, self.config.inactivity_timeout_ms);

        if self.refresh.poll(now_ms) {
            self.last_battery = self.battery.sample(hw.adc.read_raw(), now_ms);
            trace!("battery {}", self.last_battery);
            self.render(&mut hw.display);
        }
    }

    /// Feeds one complete sentence, as if it had arrived over the UART.
    pub fn ingest(&mut self, line: &[u8], now_ms: u64) {
        let effect = nmea::parse(line);
        if let SentenceEffect::FixReport {
            position: Some(position),
            ..
        } = effect
        {
            self.speed.update(position, now_ms);
        }
        if let Some(home) = self.fix.apply(effect) {
            debug!("home at {}", home);
        }
    }

    pub fn snapshot(&self) -> FixSnapshot {
        self.fix.snapshot()
    }

    pub fn home(&self) -> Option<Position> {
        self.fix.home()
    }

    pub fn speed_kmh(&self) -> Option<f32> {
        self.speed.speed_kmh()
    }

    pub fn screen(&self) -> &ScreenState {
        &self.screen
    }

    pub fn waypoints(&self) -> &WaypointStore<S> {
        &self.waypoints
    }

    pub fn battery(&self) -> BatteryReading {
        self.last_battery
    }

    pub fn into_storage(self) -> S {
        self.waypoints.into_storage()
    }

    fn ui_context(&self) -> UiContext {
        UiContext {
            waypoint_set: self.waypoints.waypoints().map(|wp| wp.is_set),
            ready_to_mark: self.fix.snapshot().ready_to_mark(),
        }
    }

    fn drain_gnss<GNSS: serial::Read<u8>>(&mut self, gnss: &mut GNSS, now_ms: u64) {
        loop {
            match gnss.read() {
                Ok(byte) => {
                    if let Some(line) = self.assembler.feed(byte) {
                        self.ingest(&line, now_ms);
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => {
                    warn!("GNSS UART error");
                    break;
                }
            }
        }
    }

    fn render<DISP: Renderer>(&mut self, display: &mut DISP) {
        let data = FrameData {
            fix: self.fix.snapshot(),
            home: self.fix.home(),
            speed_kmh: self.speed.speed_kmh(),
            battery_percent: self.last_battery.smoothed_percent,
            waypoints: self.waypoints.waypoints(),
            hdop_to_meters: self.config.hdop_to_meters,
        };
        if self.painter.paint(&mut self.screen, &data, display).is_err() {
            warn!("display update failed");
        }
    }

    fn perform<BTN, GNSS, ADC, DISP, PWR>(
        &mut self,
        action: Action,
        now_ms: u64,
        hw: &mut Hardware<BTN, GNSS, ADC, DISP, PWR>,
    ) where
        BTN: InputPin,
        DISP: Renderer,
        PWR: Power,
    {
        info!("action {}", action);
        match action {
            Action::SaveWaypoint(slot) => {
                let Some(position) = self.fix.snapshot().position else {
                    return;
                };
                let name = default_name(slot);
                if let Err(e) = self
                    .waypoints
                    .set(slot, position, name.as_str().unwrap_or_default())
                {
                    error!("saving waypoint failed: {}", e);
                }
            }
            Action::ClearWaypoint(slot) => {
                if let Err(e) = self.waypoints.clear(slot) {
                    error!("clearing waypoint failed: {}", e);
                }
            }
            Action::ScreenOff => {
                if show_message(&mut hw.display, &[]).is_err() {
                    warn!("display update failed");
                }
            }
            Action::LightSleep => {
                if show_message(&mut hw.display, &["ENTERING SLEEP", "Press to wake"]).is_err() {
                    warn!("display update failed");
                }
                loop {
                    hw.power.wait_for_interrupt();
                    if tactile::is_pressed(&hw.button) {
                        break;
                    }
                }
                // The waking press must not also act on the menu
                self.button.suppress_until_release();
                self.screen.wake(now_ms);
            }
            Action::DeepSleep => {
                if show_message(&mut hw.display, &["DEEP SLEEP", "Hold button", "to wake up"])
                    .is_err()
                {
                    warn!("display update failed");
                }
                hw.power.power_off();
                // Only reached if the board could not power down
                self.screen.force_redraw = true;
            }
        }
    }
}
