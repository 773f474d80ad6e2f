use chrono::NaiveTime;

use crate::nmea::{Constellation, SentenceEffect};
use crate::Position;

/// Current receiver state as seen through the NMEA stream.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct FixSnapshot {
    pub in_view: [u8; Constellation::ALL.len()],
    /// Always the sum of `in_view`
    pub total_in_view: u16,
    pub have_fix: bool,
    /// Last HDOP in `(0, 100)`; stale values are kept over unknown ones
    pub hdop: Option<f32>,
    pub position: Option<Position>,
    pub utc: Option<NaiveTime>,
}

impl FixSnapshot {
    pub fn in_view(&self, constellation: Constellation) -> u8 {
        self.in_view[constellation.index()]
    }

    pub fn has_valid_position(&self) -> bool {
        self.position.is_some()
    }

    /// A waypoint can only be captured from a live fix with coordinates.
    pub fn ready_to_mark(&self) -> bool {
        self.have_fix && self.position.is_some()
    }
}

#[derive(Debug, Default)]
pub struct FixState {
    snapshot: FixSnapshot,
    home: Option<Position>,
}

impl FixState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one parsed sentence into the state. Returns the home point on
    /// the call that establishes it.
    pub fn apply(&mut self, effect: SentenceEffect) -> Option<Position> {
        match effect {
            SentenceEffect::SatellitesInView {
                constellation,
                count,
            } => {
                self.snapshot.in_view[constellation.index()] = count;
                self.snapshot.total_in_view =
                    self.snapshot.in_view.iter().map(|&n| u16::from(n)).sum();
                None
            }
            SentenceEffect::FixReport {
                quality,
                hdop,
                position,
                utc,
            } => {
                self.snapshot.have_fix = quality > 0;
                if let Some(hdop) = hdop.filter(|h| *h > 0.0 && *h < 100.0) {
                    self.snapshot.hdop = Some(hdop);
                }
                if utc.is_some() {
                    self.snapshot.utc = utc;
                }
                let position = position?;
                self.snapshot.position = Some(position);

                if self.snapshot.have_fix && self.home.is_none() {
                    info!("home established at {} {}", position.lat, position.lon);
                    self.home = Some(position);
                    return self.home;
                }
                None
            }
            SentenceEffect::Unrecognized => None,
        }
    }

    pub fn snapshot(&self) -> FixSnapshot {
        self.snapshot
    }

    pub fn home(&self) -> Option<Position> {
        self.home
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::parse;

    fn apply_line(state: &mut FixState, line: &[u8]) -> Option<Position> {
        state.apply(parse(line))
    }

    #[test]
    fn total_tracks_sum_of_constellations() {
        let mut state = FixState::new();
        apply_line(&mut state, b"$GPGSV,3,1,08");
        apply_line(&mut state, b"$GLGSV,2,1,05");
        apply_line(&mut state, b"$GBGSV,1,1,03");
        assert_eq!(state.snapshot().total_in_view, 16);

        // A newer GPS report replaces, it does not accumulate
        apply_line(&mut state, b"$GPGSV,3,2,02");
        let s = state.snapshot();
        assert_eq!(s.in_view(Constellation::Gps), 2);
        assert_eq!(s.total_in_view, 10);
        assert_eq!(s.total_in_view, s.in_view.iter().map(|&n| n as u16).sum::<u16>());
    }

    #[test]
    fn fix_flag_follows_quality() {
        let mut state = FixState::new();
        for (line, fix) in [
            (&b"$GNGGA,,,,,,1,08,1.0"[..], true),
            (&b"$GNGGA,,,,,,0,00,1.0"[..], false),
            (&b"$GNGGA,,,,,,2,08,1.0"[..], true),
            (&b"$GNGGA,,,"[..], false),
        ] {
            apply_line(&mut state, line);
            assert_eq!(state.snapshot().have_fix, fix);
        }
    }

    #[test]
    fn hdop_keeps_last_good_value() {
        let mut state = FixState::new();
        assert_eq!(state.snapshot().hdop, None);
        apply_line(&mut state, b"$GNGGA,,,,,,1,08,1.5");
        assert_eq!(state.snapshot().hdop, Some(1.5));
        apply_line(&mut state, b"$GNGGA,,,,,,1,08,,");
        apply_line(&mut state, b"$GNGGA,,,,,,1,08,0.0");
        apply_line(&mut state, b"$GNGGA,,,,,,1,08,100.0");
        assert_eq!(state.snapshot().hdop, Some(1.5));
    }

    #[test]
    fn home_is_set_once() {
        let mut state = FixState::new();
        // Position without a fix does not count
        assert_eq!(
            apply_line(&mut state, b"$GNGGA,000000,4000.000,N,00500.000,E,0,03,5.0"),
            None
        );
        assert!(state.snapshot().has_valid_position());
        assert_eq!(state.home(), None);

        let first = apply_line(&mut state, b"$GNGGA,000001,4807.038,N,01131.000,E,1,08,0.9");
        assert!(first.is_some());
        assert_eq!(state.home(), first);

        let second = apply_line(&mut state, b"$GNGGA,000002,4900.000,N,01200.000,E,1,08,0.9");
        assert_eq!(second, None);
        assert_eq!(state.home(), first);
        assert_eq!(state.snapshot().position, Some(Position::new(49.0, 12.0)));
    }

    #[test]
    fn lost_fix_keeps_last_position() {
        let mut state = FixState::new();
        apply_line(&mut state, b"$GNGGA,000001,4807.038,N,01131.000,E,1,08,0.9");
        apply_line(&mut state, b"$GNGGA,000002,,,,,0,00,99.99");
        let s = state.snapshot();
        assert!(!s.have_fix);
        assert!(s.has_valid_position());
        assert!(!s.ready_to_mark());
    }
}
