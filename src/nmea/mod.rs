use chrono::NaiveTime;

use crate::Position;

pub mod line;
pub mod parser;

pub use line::{Line, LineAssembler, LINE_CAPACITY};
pub use parser::parse;

/// GNSS constellations reported through their own GSV talker.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constellation {
    Gps,
    Glonass,
    Beidou,
    Galileo,
    Qzss,
}

impl Constellation {
    pub const ALL: [Constellation; 5] = [
        Constellation::Gps,
        Constellation::Glonass,
        Constellation::Beidou,
        Constellation::Galileo,
        Constellation::Qzss,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Six-byte `$` + talker + `GSV` prefix announcing this constellation.
    pub const fn gsv_prefix(self) -> &'static [u8; 6] {
        match self {
            Constellation::Gps => b"$GPGSV",
            Constellation::Glonass => b"$GLGSV",
            Constellation::Beidou => b"$GBGSV",
            Constellation::Galileo => b"$GAGSV",
            Constellation::Qzss => b"$GQGSV",
        }
    }
}

/// What a single sentence contributes to the fix state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SentenceEffect {
    SatellitesInView {
        constellation: Constellation,
        count: u8,
    },
    FixReport {
        /// GGA fix quality, 0 = no fix
        quality: u8,
        hdop: Option<f32>,
        position: Option<Position>,
        utc: Option<NaiveTime>,
    },
    Unrecognized,
}
