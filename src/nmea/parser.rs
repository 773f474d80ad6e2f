use chrono::NaiveTime;

use super::{Constellation, SentenceEffect};
use crate::Position;

const GGA_PREFIX: &[u8; 6] = b"$GNGGA";

// Field indices are counted in delimiters after the `$GxXXX` talker field
const GSV_IN_VIEW: usize = 3;
const GGA_UTC: usize = 1;
const GGA_LAT: usize = 2;
const GGA_LAT_DIR: usize = 3;
const GGA_LON: usize = 4;
const GGA_LON_DIR: usize = 5;
const GGA_QUALITY: usize = 6;
const GGA_HDOP: usize = 8;

/// Classifies one complete line and extracts the fields the tracker uses.
/// Malformed fields turn into zero/`None`, never into an error.
pub fn parse(line: &[u8]) -> SentenceEffect {
    let Some(prefix) = line.get(..6) else {
        return SentenceEffect::Unrecognized;
    };

    if let Some(constellation) = Constellation::ALL
        .into_iter()
        .find(|c| prefix == &c.gsv_prefix()[..])
    {
        return SentenceEffect::SatellitesInView {
            constellation,
            count: satellites_in_view(line),
        };
    }

    if prefix == &GGA_PREFIX[..] {
        return SentenceEffect::FixReport {
            quality: fix_quality(line),
            hdop: hdop(line),
            position: position(line),
            utc: utc_time(line),
        };
    }

    SentenceEffect::Unrecognized
}

pub fn satellites_in_view(line: &[u8]) -> u8 {
    after_commas(line, GSV_IN_VIEW)
        .map(leading_int)
        .unwrap_or(0)
        .min(u8::MAX as u32) as u8
}

pub fn fix_quality(line: &[u8]) -> u8 {
    after_commas(line, GGA_QUALITY)
        .map(leading_int)
        .unwrap_or(0)
        .min(u8::MAX as u32) as u8
}

pub fn hdop(line: &[u8]) -> Option<f32> {
    let rest = after_commas(line, GGA_HDOP)?;
    let len = rest
        .iter()
        .take_while(|&&b| b.is_ascii_digit() || b == b'.')
        .count();
    if len == 0 {
        return None;
    }
    core::str::from_utf8(&rest[..len]).ok()?.parse().ok()
}

pub fn position(line: &[u8]) -> Option<Position> {
    if line.iter().filter(|&&b| is_delimiter(b)).count() < 6 {
        return None;
    }
    let lat = coordinate(field(line, GGA_LAT)?, 2, field(line, GGA_LAT_DIR)?, (b'N', b'S'))?;
    let lon = coordinate(field(line, GGA_LON)?, 3, field(line, GGA_LON_DIR)?, (b'E', b'W'))?;
    Some(Position::new(lat, lon)).filter(Position::is_valid)
}

pub fn utc_time(line: &[u8]) -> Option<NaiveTime> {
    let f = field(line, GGA_UTC)?;
    if f.len() < 6 || !f[..6].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let pair = |i: usize| u32::from(f[i] - b'0') * 10 + u32::from(f[i + 1] - b'0');
    NaiveTime::from_hms_opt(pair(0), pair(2), pair(4))
}

fn is_delimiter(b: u8) -> bool {
    b == b',' || b == b'*'
}

/// The `n`th field when splitting on both `,` and the checksum marker.
fn field(line: &[u8], n: usize) -> Option<&[u8]> {
    line.split(|&b| is_delimiter(b)).nth(n)
}

/// Everything after the `n`th comma, or `None` if there are fewer commas.
fn after_commas(line: &[u8], n: usize) -> Option<&[u8]> {
    let mut rest = line;
    for _ in 0..n {
        let at = rest.iter().position(|&b| b == b',')?;
        rest = &rest[at + 1..];
    }
    Some(rest)
}

// atoi-style: the leading run of digits, 0 if there is none
fn leading_int(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0u32, |acc, b| acc.saturating_mul(10).saturating_add(u32::from(b - b'0')))
}

// `DDMM.MMMM` / `DDDMM.MMMM` plus a hemisphere letter
fn coordinate(
    value: &[u8],
    degree_digits: usize,
    hemisphere: &[u8],
    (positive, negative): (u8, u8),
) -> Option<f64> {
    if value.len() <= degree_digits || !value[..degree_digits].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let degrees = value[..degree_digits]
        .iter()
        .fold(0.0, |acc, d| acc * 10.0 + f64::from(d - b'0'));
    let minutes: f64 = core::str::from_utf8(&value[degree_digits..])
        .ok()?
        .parse()
        .ok()?;
    let decimal = degrees + minutes / 60.0;

    match hemisphere.first() {
        Some(&h) if h == positive => Some(decimal),
        Some(&h) if h == negative => Some(-decimal),
        _ => None,
    }
}
