//! Byte image of the waypoint table in persistent storage.
//!
//! ```text
//! 0..4     magic, u32 LE
//! 4 + 20i  slot i: lat f64 LE, lon f64 LE, 4 reserved
//! 64 + i   slot i set flag (1 = set)
//! 67       reserved
//! ```

use bytemuck::{Pod, Zeroable};

use super::WAYPOINT_COUNT;
use crate::Position;

pub const MAGIC: u32 = 0x0000_A5B4;
pub const IMAGE_LEN: usize = core::mem::size_of::<StoreImage>();

const FLAG_SET: u8 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SlotImage {
    lat: [u8; 8],
    lon: [u8; 8],
    reserved: [u8; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct StoreImage {
    magic: [u8; 4],
    slots: [SlotImage; WAYPOINT_COUNT],
    set_flags: [u8; WAYPOINT_COUNT],
    reserved: u8,
}

const _: () = assert!(IMAGE_LEN == 68);

impl StoreImage {
    /// Valid magic and every slot unset.
    pub fn empty() -> Self {
        Self {
            magic: MAGIC.to_le_bytes(),
            ..Zeroable::zeroed()
        }
    }

    pub fn from_bytes(bytes: &[u8; IMAGE_LEN]) -> Self {
        bytemuck::pod_read_unaligned(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn has_magic(&self) -> bool {
        u32::from_le_bytes(self.magic) == MAGIC
    }

    /// The stored position of slot `i`, if it is marked set and usable.
    pub fn slot(&self, i: usize) -> Option<Position> {
        if *self.set_flags.get(i)? != FLAG_SET {
            return None;
        }
        let slot = &self.slots[i];
        Some(Position::new(
            f64::from_le_bytes(slot.lat),
            f64::from_le_bytes(slot.lon),
        ))
        .filter(Position::is_valid)
    }

    pub fn set_slot(&mut self, i: usize, position: Option<Position>) {
        let (Some(slot), Some(flag)) = (self.slots.get_mut(i), self.set_flags.get_mut(i)) else {
            return;
        };
        match position {
            Some(p) => {
                slot.lat = p.lat.to_le_bytes();
                slot.lon = p.lon.to_le_bytes();
                *flag = FLAG_SET;
            }
            None => {
                *slot = SlotImage::zeroed();
                *flag = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_offsets() {
        let mut image = StoreImage::empty();
        image.set_slot(1, Some(Position::new(1.5, -2.25)));
        let bytes = image.as_bytes();

        assert_eq!(bytes.len(), 68);
        assert_eq!(&bytes[0..4], &[0xB4, 0xA5, 0x00, 0x00]);
        assert_eq!(&bytes[24..32], &1.5f64.to_le_bytes());
        assert_eq!(&bytes[32..40], &(-2.25f64).to_le_bytes());
        assert_eq!(&bytes[64..68], &[0, 1, 0, 0]);
    }

    #[test]
    fn exact_f64_round_trip() {
        let p = Position::new(48.117_300_000_000_01, -179.999_999_999_999_9);
        let mut image = StoreImage::empty();
        image.set_slot(2, Some(p));

        let mut raw = [0u8; IMAGE_LEN];
        raw.copy_from_slice(image.as_bytes());
        let back = StoreImage::from_bytes(&raw);
        assert!(back.has_magic());
        assert_eq!(back.slot(2), Some(p));
        assert_eq!(back.slot(0), None);
    }

    #[test]
    fn odd_flag_or_bad_coordinates_read_as_unset() {
        let mut raw = [0u8; IMAGE_LEN];
        raw.copy_from_slice(StoreImage::empty().as_bytes());
        raw[64] = 0xFF;
        raw[65] = 1;
        raw[4 + 20..4 + 28].copy_from_slice(&f64::NAN.to_le_bytes());
        raw[66] = 1;
        raw[4 + 40..4 + 48].copy_from_slice(&91.0f64.to_le_bytes());

        let image = StoreImage::from_bytes(&raw);
        assert_eq!(image.slot(0), None);
        assert_eq!(image.slot(1), None);
        assert_eq!(image.slot(2), None);
    }

    #[test]
    fn clearing_zeroes_the_slot() {
        let mut image = StoreImage::empty();
        image.set_slot(0, Some(Position::new(10.0, 20.0)));
        image.set_slot(0, None);
        assert_eq!(image, StoreImage::empty());
    }
}
