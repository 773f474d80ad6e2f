//! Single-button menu state machine.
//!
//! A long press scrolls the highlighted item of a menu, a short press picks
//! it. Outside menus a short press moves on and a long press goes home to
//! the main menu.

use crate::tactile::ButtonEvent;
use crate::waypoints::WAYPOINT_COUNT;

pub mod render;

pub use render::{show_message, Frame, FrameData, Painter, ROW_WIDTH};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Status,
    /// Direction and distance to home
    Navigation,
    MainMenu,
    WaypointMenu,
    WaypointNav(usize),
    SetWaypoint(usize),
    /// Navigate / Reset / Cancel for a waypoint that is already set
    WaypointReset(usize),
    SystemInfo,
    PowerMenu,
}

impl Screen {
    /// Number of selectable items, `None` for screens that are not menus.
    pub fn menu_items(self) -> Option<usize> {
        match self {
            Screen::MainMenu => Some(MainItem::ALL.len()),
            Screen::WaypointMenu => Some(WAYPOINT_COUNT + 1),
            Screen::WaypointReset(_) => Some(ResetItem::ALL.len()),
            Screen::PowerMenu => Some(PowerItem::ALL.len()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainItem {
    Status,
    Waypoints,
    SystemInfo,
    PowerMenu,
}

impl MainItem {
    pub const ALL: [MainItem; 4] = [
        MainItem::Status,
        MainItem::Waypoints,
        MainItem::SystemInfo,
        MainItem::PowerMenu,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MainItem::Status => "Status",
            MainItem::Waypoints => "Waypoints",
            MainItem::SystemInfo => "System Info",
            MainItem::PowerMenu => "Power Menu",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetItem {
    Navigate,
    Reset,
    Cancel,
}

impl ResetItem {
    pub const ALL: [ResetItem; 3] = [ResetItem::Navigate, ResetItem::Reset, ResetItem::Cancel];

    pub fn label(self) -> &'static str {
        match self {
            ResetItem::Navigate => "Navigate",
            ResetItem::Reset => "Reset",
            ResetItem::Cancel => "Cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerItem {
    SleepMode,
    DeepSleep,
    ScreenOff,
    Back,
}

impl PowerItem {
    pub const ALL: [PowerItem; 4] = [
        PowerItem::SleepMode,
        PowerItem::DeepSleep,
        PowerItem::ScreenOff,
        PowerItem::Back,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PowerItem::SleepMode => "Sleep Mode",
            PowerItem::DeepSleep => "Deep Sleep",
            PowerItem::ScreenOff => "Screen Off",
            PowerItem::Back => "Back",
        }
    }
}

/// Side effects the UI asks its owner to carry out.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Store the current position in this slot
    SaveWaypoint(usize),
    ClearWaypoint(usize),
    LightSleep,
    DeepSleep,
    ScreenOff,
}

/// What the state machine needs to know about the rest of the device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UiContext {
    pub waypoint_set: [bool; WAYPOINT_COUNT],
    pub ready_to_mark: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenState {
    pub screen: Screen,
    pub menu_index: usize,
    pub last_activity_ms: u64,
    /// Raised on every transition, cleared by the next render
    pub force_redraw: bool,
    pub display_on: bool,
}

impl ScreenState {
    pub fn new(now_ms: u64) -> Self {
        Self {
            screen: Screen::MainMenu,
            menu_index: 0,
            last_activity_ms: now_ms,
            force_redraw: true,
            display_on: true,
        }
    }

    pub fn handle(&mut self, event: ButtonEvent, now_ms: u64, ctx: &UiContext) -> Option<Action> {
        if event == ButtonEvent::None {
            return None;
        }
        self.last_activity_ms = now_ms;

        if !self.display_on {
            debug!("display woken");
            self.display_on = true;
            self.force_redraw = true;
            return None;
        }

        match event {
            ButtonEvent::LongPress => {
                match self.screen.menu_items() {
                    Some(items) => self.menu_index = (self.menu_index + 1) % items,
                    None => self.go(Screen::MainMenu, 0),
                }
                None
            }
            ButtonEvent::ShortPress => self.select(ctx),
            ButtonEvent::None => None,
        }
    }

    /// Falls back to the main menu after `timeout_ms` without input.
    /// Returns whether it did.
    pub fn check_timeout(&mut self, now_ms: u64, timeout_ms: u64) -> bool {
        if self.screen == Screen::MainMenu
            || now_ms.saturating_sub(self.last_activity_ms) < timeout_ms
        {
            return false;
        }
        debug!("inactivity timeout");
        self.go(Screen::MainMenu, 0);
        true
    }

    /// Screen shown after waking from light sleep.
    pub fn wake(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
        self.display_on = true;
        self.go(Screen::MainMenu, 0);
    }

    fn go(&mut self, screen: Screen, menu_index: usize) {
        self.screen = screen;
        self.menu_index = menu_index;
        self.force_redraw = true;
    }

    fn select(&mut self, ctx: &UiContext) -> Option<Action> {
        match self.screen {
            Screen::MainMenu => match MainItem::ALL.get(self.menu_index)? {
                MainItem::Status => self.go(Screen::Status, 0),
                MainItem::Waypoints => self.go(Screen::WaypointMenu, 0),
                MainItem::SystemInfo => self.go(Screen::SystemInfo, 0),
                MainItem::PowerMenu => self.go(Screen::PowerMenu, 0),
            },
            Screen::WaypointMenu => {
                let slot = self.menu_index;
                match ctx.waypoint_set.get(slot) {
                    Some(true) => self.go(Screen::WaypointReset(slot), 0),
                    Some(false) => self.go(Screen::SetWaypoint(slot), 0),
                    None => self.go(Screen::MainMenu, MainItem::Waypoints.index()),
                }
            }
            Screen::SetWaypoint(slot) => {
                if !ctx.ready_to_mark {
                    debug!("no fix, waypoint not saved");
                    return None;
                }
                self.go(Screen::WaypointMenu, slot);
                return Some(Action::SaveWaypoint(slot));
            }
            Screen::WaypointReset(slot) => match ResetItem::ALL.get(self.menu_index)? {
                ResetItem::Navigate => self.go(Screen::WaypointNav(slot), 0),
                ResetItem::Reset => {
                    self.go(Screen::SetWaypoint(slot), 0);
                    return Some(Action::ClearWaypoint(slot));
                }
                ResetItem::Cancel => self.go(Screen::WaypointMenu, slot),
            },
            Screen::PowerMenu => match PowerItem::ALL.get(self.menu_index)? {
                PowerItem::SleepMode => return Some(Action::LightSleep),
                PowerItem::DeepSleep => return Some(Action::DeepSleep),
                PowerItem::ScreenOff => {
                    // Comes back on the status screen
                    self.go(Screen::Status, 0);
                    self.display_on = false;
                    return Some(Action::ScreenOff);
                }
                PowerItem::Back => self.go(Screen::MainMenu, MainItem::PowerMenu.index()),
            },
            Screen::Status => self.go(Screen::Navigation, 0),
            Screen::Navigation | Screen::WaypointNav(_) | Screen::SystemInfo => {
                self.go(Screen::MainMenu, 0)
            }
        }
        None
    }
}
