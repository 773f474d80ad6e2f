#![cfg_attr(not(test), no_std)]

use core::fmt::{self, Write};

#[cfg(all(target_os = "none", feature = "defmt"))]
use defmt_brtt as _; // global logger

#[cfg(all(target_os = "none", feature = "defmt"))]
use panic_probe as _;

use tinyvec::ArrayVec; // memory layout

#[macro_use]
mod fmt_shim;

pub mod battery;
pub mod config;
pub mod display;
pub mod fix;
pub mod nav;
pub mod nmea;
pub mod schedule;
pub mod tactile;
pub mod tracker;
pub mod ui;
pub mod waypoints;

pub use config::Config;
pub use tracker::{Hardware, Tracker};

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is invoked
#[cfg(all(target_os = "none", feature = "defmt"))]
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

#[cfg(all(target_os = "none", feature = "defmt"))]
static COUNT: core::sync::atomic::AtomicUsize = core::sync::atomic::AtomicUsize::new(0);
#[cfg(all(target_os = "none", feature = "defmt"))]
defmt::timestamp!("{=usize}", {
    use core::sync::atomic::Ordering;
    // NOTE(no-CAS) `timestamps` runs with interrupts disabled
    let n = COUNT.load(Ordering::Relaxed);
    COUNT.store(n + 1, Ordering::Relaxed);
    n
});

/// Fixed-capacity text buffer for `write!`. Output past `N` bytes is dropped.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct FmtBuf<const N: usize = 256>(pub ArrayVec<[u8; N]>);

impl<const N: usize> Write for FmtBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.0.try_push(b);
        }
        Ok(())
    }
}

impl<const N: usize> FmtBuf<N> {
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.0.as_slice()).ok()
    }

    pub fn new() -> Self {
        Self(Default::default())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Right-pads with spaces up to `width` (or capacity), so a shorter
    /// string fully overwrites a longer one drawn at the same spot.
    pub fn pad_to(&mut self, width: usize) {
        while self.0.len() < width.min(N) {
            self.0.push(b' ');
        }
    }
}

/// A geodetic point in decimal degrees, signed by hemisphere.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}
