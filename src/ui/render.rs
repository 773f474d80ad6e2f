//! Screen composition and row-level differential drawing.

use core::fmt::{self, Write};

use chrono::Timelike;
use tinyvec::ArrayVec;

use super::{MainItem, PowerItem, ResetItem, Screen, ScreenState};
use crate::display::Renderer;
use crate::fix::FixSnapshot;
use crate::nav::{bearing, cardinal, distance_meters};
use crate::waypoints::{Waypoint, WAYPOINT_COUNT};
use crate::{FmtBuf, Position};

pub const ROW_WIDTH: usize = 16;
pub const ROW_HEIGHT: i32 = 16;
pub const MAX_ROWS: usize = 5;

/// Speeds at or above this are not shown
const SPEED_DISPLAY_LIMIT: f32 = 99.9;
const SCREEN_KINDS: usize = 9;

pub type Row = FmtBuf<ROW_WIDTH>;
pub type Frame = ArrayVec<[Row; MAX_ROWS]>;

/// Everything a render pass reads, copied out of the tracker's state.
#[derive(Debug, Clone, Copy)]
pub struct FrameData<'a> {
    pub fix: FixSnapshot,
    pub home: Option<Position>,
    pub speed_kmh: Option<f32>,
    pub battery_percent: u8,
    pub waypoints: &'a [Waypoint; WAYPOINT_COUNT],
    pub hdop_to_meters: f32,
}

fn row(args: fmt::Arguments) -> Row {
    let mut r = Row::new();
    let _ = r.write_fmt(args);
    r.pad_to(ROW_WIDTH);
    r
}

fn menu_row(label: &str, selected: bool) -> Row {
    row(format_args!("{}{}", if selected { "> " } else { "  " }, label))
}

fn direction_row(from: Option<Position>, to: Option<Position>, have_fix: bool) -> Row {
    if !have_fix {
        return row(format_args!("Dir: O"));
    }
    let label = match (from, to) {
        (Some(from), Some(to)) => cardinal(bearing(from, to)).label(),
        _ => "N",
    };
    row(format_args!("Dir: {}", label))
}

fn distance_row(prefix: fmt::Arguments, from: Option<Position>, to: Option<Position>) -> Row {
    match (from, to) {
        (Some(from), Some(to)) => {
            let d = distance_meters(from, to);
            if d < 1000.0 {
                row(format_args!("{}:{:3.0}m", prefix, d))
            } else {
                row(format_args!("{}:{:3.1}km", prefix, d / 1000.0))
            }
        }
        _ => row(format_args!("{}: --.-m", prefix)),
    }
}

fn speed_row(speed_kmh: Option<f32>) -> Row {
    match speed_kmh.filter(|v| *v < SPEED_DISPLAY_LIMIT) {
        Some(v) => row(format_args!("Spd:{:4.1}km/h", v)),
        None => row(format_args!("Spd: -.-km/h")),
    }
}

fn battery_row(percent: u8) -> Row {
    row(format_args!("Batt:{:3}%", percent))
}

/// Text of every row `state.screen` shows for `data`.
pub fn compose(state: &ScreenState, data: &FrameData) -> Frame {
    let mut frame = Frame::new();
    let fix = &data.fix;
    let selected = |i: usize| state.menu_index == i;

    match state.screen {
        Screen::Status => {
            frame.push(row(format_args!(
                "Fix: {}",
                if fix.have_fix { "Yes" } else { "No" }
            )));
            frame.push(row(format_args!("Sats:{:3}", fix.total_in_view)));
            frame.push(battery_row(data.battery_percent));
            frame.push(match fix.hdop.filter(|_| fix.have_fix) {
                Some(hdop) => row(format_args!("Acc:{:4.1}m", hdop * data.hdop_to_meters)),
                None => row(format_args!("Acc: --.-m")),
            });
        }
        Screen::Navigation => {
            frame.push(direction_row(fix.position, data.home, fix.have_fix));
            frame.push(distance_row(format_args!("Home"), fix.position, data.home));
            frame.push(speed_row(data.speed_kmh));
            frame.push(battery_row(data.battery_percent));
        }
        Screen::WaypointNav(slot) => {
            let target = data
                .waypoints
                .get(slot)
                .filter(|wp| wp.is_set)
                .map(|wp| wp.position);
            frame.push(direction_row(fix.position, target, fix.have_fix && target.is_some()));
            frame.push(distance_row(format_args!("WP{}", slot + 1), fix.position, target));
            frame.push(speed_row(data.speed_kmh));
            frame.push(battery_row(data.battery_percent));
        }
        Screen::MainMenu => {
            frame.push(row(format_args!("MAIN MENU")));
            for (i, item) in MainItem::ALL.iter().enumerate() {
                frame.push(menu_row(item.label(), selected(i)));
            }
        }
        Screen::WaypointMenu => {
            frame.push(row(format_args!("WAYPOINTS")));
            for (i, wp) in data.waypoints.iter().enumerate() {
                let mut label = FmtBuf::<ROW_WIDTH>::new();
                let _ = if wp.is_set {
                    write!(label, "Nav WP{}", i + 1)
                } else {
                    write!(label, "Set WP{} X", i + 1)
                };
                frame.push(menu_row(label.as_str().unwrap_or_default(), selected(i)));
            }
            frame.push(menu_row("Back", selected(WAYPOINT_COUNT)));
        }
        Screen::SetWaypoint(slot) => {
            frame.push(row(format_args!("SET WP{}", slot + 1)));
            if fix.ready_to_mark() {
                frame.push(row(format_args!("GPS Ready!")));
                frame.push(row(format_args!("Press to save")));
            } else {
                frame.push(row(format_args!("Wait for GPS...")));
                frame.push(row(format_args!("Sats: {}", fix.total_in_view)));
            }
        }
        Screen::WaypointReset(slot) => {
            frame.push(row(format_args!("WAYPOINT {}", slot + 1)));
            let name = data.waypoints.get(slot).map_or("", Waypoint::name);
            frame.push(row(format_args!("{}", name)));
            for (i, item) in ResetItem::ALL.iter().enumerate() {
                frame.push(menu_row(item.label(), selected(i)));
            }
        }
        Screen::SystemInfo => {
            frame.push(row(format_args!("SYSTEM INFO")));
            frame.push(row(format_args!("FW: v{}", env!("CARGO_PKG_VERSION"))));
            frame.push(row(format_args!("Sats: {}", fix.total_in_view)));
            frame.push(row(format_args!("Batt: {}%", data.battery_percent)));
            frame.push(match fix.utc {
                Some(t) => row(format_args!(
                    "UTC: {:02}:{:02}:{:02}",
                    t.hour(),
                    t.minute(),
                    t.second()
                )),
                None => row(format_args!("UTC: --:--:--")),
            });
        }
        Screen::PowerMenu => {
            frame.push(row(format_args!("POWER MENU")));
            for (i, item) in PowerItem::ALL.iter().enumerate() {
                frame.push(menu_row(item.label(), selected(i)));
            }
        }
    }
    frame
}

/// Replaces the screen with a few lines of fixed text.
pub fn show_message<R: Renderer>(renderer: &mut R, lines: &[&str]) -> Result<(), R::Error> {
    renderer.clear_screen()?;
    for (i, line) in lines.iter().take(MAX_ROWS).enumerate() {
        renderer.write_row(0, i as i32 * ROW_HEIGHT, line)?;
    }
    renderer.flush()
}

fn kind(screen: Screen) -> usize {
    match screen {
        Screen::Status => 0,
        Screen::Navigation => 1,
        Screen::MainMenu => 2,
        Screen::WaypointMenu => 3,
        Screen::WaypointNav(_) => 4,
        Screen::SetWaypoint(_) => 5,
        Screen::WaypointReset(_) => 6,
        Screen::SystemInfo => 7,
        Screen::PowerMenu => 8,
    }
}

/// Remembers the last frame drawn for each kind of screen and only sends
/// rows whose text changed.
#[derive(Debug, Default)]
pub struct Painter {
    last: [Option<Frame>; SCREEN_KINDS],
}

impl Painter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws `state.screen` and consumes its redraw request. Returns the
    /// number of rows written.
    pub fn paint<R: Renderer>(
        &mut self,
        state: &mut ScreenState,
        data: &FrameData,
        renderer: &mut R,
    ) -> Result<usize, R::Error> {
        if !state.display_on {
            return Ok(0);
        }
        let frame = compose(state, data);
        let cache = &mut self.last[kind(state.screen)];

        let full = state.force_redraw || cache.is_none();
        if state.force_redraw {
            renderer.clear_screen()?;
        }

        let mut written = 0;
        for (i, text) in frame.iter().enumerate() {
            let unchanged = cache
                .as_ref()
                .and_then(|prev| prev.get(i))
                .is_some_and(|prev| prev == text);
            if full || !unchanged {
                renderer.write_row(0, i as i32 * ROW_HEIGHT, text.as_str().unwrap_or_default())?;
                written += 1;
            }
        }
        renderer.flush()?;

        *cache = Some(frame);
        state.force_redraw = false;
        Ok(written)
    }
}
