use tinyvec::ArrayVec;

pub const LINE_CAPACITY: usize = 128;

/// One complete sentence, without its line terminator.
pub type Line = ArrayVec<[u8; LINE_CAPACITY]>;

/// Accumulates serial bytes into lines terminated by `\r` or `\n`.
#[derive(Default)]
pub struct LineAssembler {
    buf: Line,
    overflowed: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, byte: u8) -> Option<Line> {
        match byte {
            b'\r' | b'\n' => {
                let overflowed = core::mem::take(&mut self.overflowed);
                if self.buf.is_empty() {
                    None
                } else if overflowed {
                    // Never hand a truncated sentence to the parser
                    trace!("dropping overlong NMEA line");
                    self.buf.clear();
                    None
                } else {
                    Some(core::mem::take(&mut self.buf))
                }
            }
            _ => {
                if self.buf.try_push(byte).is_some() {
                    self.overflowed = true;
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(asm: &mut LineAssembler, bytes: &[u8]) -> Option<Line> {
        let mut out = None;
        for &b in bytes {
            if let Some(line) = asm.feed(b) {
                out = Some(line);
            }
        }
        out
    }

    #[test]
    fn completes_on_crlf_and_skips_blank_lines() {
        let mut asm = LineAssembler::new();
        let line = feed_all(&mut asm, b"$GPGSV,3,1,08\r").unwrap();
        assert_eq!(line.as_slice(), b"$GPGSV,3,1,08");
        // The trailing \n of the CRLF pair is an empty line
        assert_eq!(asm.feed(b'\n'), None);
        assert_eq!(asm.buf.len(), 0);
    }

    #[test]
    fn nothing_is_returned_mid_line() {
        let mut asm = LineAssembler::new();
        for &b in b"$GNGGA,1234" {
            assert_eq!(asm.feed(b), None);
        }
        assert_eq!(asm.buf.len(), 11);
    }

    #[test]
    fn overlong_line_is_discarded_and_next_line_survives() {
        let mut asm = LineAssembler::new();
        for _ in 0..LINE_CAPACITY + 20 {
            assert_eq!(asm.feed(b'A'), None);
        }
        assert_eq!(asm.buf.len(), LINE_CAPACITY);
        assert_eq!(asm.feed(b'\n'), None);
        assert_eq!(asm.buf.len(), 0);

        let line = feed_all(&mut asm, b"$GQGSV,1,1,02\n").unwrap();
        assert_eq!(line.as_slice(), b"$GQGSV,1,1,02");
    }

    #[test]
    fn line_of_exactly_capacity_is_kept() {
        let mut asm = LineAssembler::new();
        for _ in 0..LINE_CAPACITY {
            asm.feed(b'x');
        }
        let line = asm.feed(b'\r').unwrap();
        assert_eq!(line.len(), LINE_CAPACITY);
    }
}
