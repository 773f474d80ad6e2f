use core::fmt::Write;

use tinyvec::ArrayVec;

use crate::{FmtBuf, Position};

pub mod layout;

use layout::{StoreImage, IMAGE_LEN};

pub const WAYPOINT_COUNT: usize = 3;
pub const NAME_CAPACITY: usize = 11;

/// Byte-addressed non-volatile memory holding the waypoint image.
pub trait Storage {
    type Error;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;
    /// Makes preceding writes durable.
    fn commit(&mut self) -> Result<(), Self::Error>;
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("waypoint index {0} out of range")]
    InvalidIndex(usize),
    #[error("persistent storage access failed")]
    Storage,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: Position,
    pub is_set: bool,
    name: ArrayVec<[u8; NAME_CAPACITY]>,
}

impl Waypoint {
    fn unset(index: usize) -> Self {
        let mut wp = Self::default();
        wp.rename(default_name(index).as_str().unwrap_or_default());
        wp
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name).unwrap_or_default()
    }

    // Cut on a char boundary so the name stays valid UTF-8
    fn rename(&mut self, name: &str) {
        let mut end = name.len().min(NAME_CAPACITY);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        self.name.clear();
        self.name.extend_from_slice(&name.as_bytes()[..end]);
    }
}

/// `WP1` .. `WP3`
pub fn default_name(index: usize) -> FmtBuf<NAME_CAPACITY> {
    let mut name = FmtBuf::new();
    let _ = write!(name, "WP{}", index + 1);
    name
}

/// Three user waypoints mirrored to storage on every change.
pub struct WaypointStore<S> {
    storage: S,
    waypoints: [Waypoint; WAYPOINT_COUNT],
}

impl<S: Storage> WaypointStore<S> {
    /// Reads the table back. An unreadable or foreign image is replaced by
    /// an empty one, which is written back straight away.
    pub fn load(mut storage: S) -> Self {
        let mut raw = [0u8; IMAGE_LEN];
        let image = match storage.read(0, &mut raw) {
            Ok(()) => Some(StoreImage::from_bytes(&raw)).filter(StoreImage::has_magic),
            Err(_) => {
                warn!("waypoint storage unreadable");
                None
            }
        };

        let mut store = Self {
            storage,
            waypoints: core::array::from_fn(Waypoint::unset),
        };

        match image {
            Some(image) => {
                for (i, wp) in store.waypoints.iter_mut().enumerate() {
                    if let Some(position) = image.slot(i) {
                        wp.position = position;
                        wp.is_set = true;
                    }
                }
                debug!("loaded {} waypoints", store.count_set());
            }
            None => {
                info!("initializing waypoint storage");
                if store.persist().is_err() {
                    error!("failed to write fresh waypoint image");
                }
            }
        }
        store
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn waypoints(&self) -> &[Waypoint; WAYPOINT_COUNT] {
        &self.waypoints
    }

    pub fn count_set(&self) -> usize {
        self.waypoints.iter().filter(|wp| wp.is_set).count()
    }

    pub fn set(&mut self, index: usize, position: Position, name: &str) -> Result<(), StoreError> {
        let wp = self
            .waypoints
            .get_mut(index)
            .ok_or(StoreError::InvalidIndex(index))?;
        wp.position = position;
        wp.is_set = true;
        wp.rename(name);
        self.persist()
    }

    pub fn clear(&mut self, index: usize) -> Result<(), StoreError> {
        let wp = self
            .waypoints
            .get_mut(index)
            .ok_or(StoreError::InvalidIndex(index))?;
        *wp = Waypoint::unset(index);
        self.persist()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn image(&self) -> StoreImage {
        let mut image = StoreImage::empty();
        for (i, wp) in self.waypoints.iter().enumerate() {
            image.set_slot(i, wp.is_set.then_some(wp.position));
        }
        image
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let image = self.image();
        self.storage
            .write(0, image.as_bytes())
            .and_then(|()| self.storage.commit())
            .map_err(|_| StoreError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct MemStorage {
        bytes: [u8; 128],
        commits: usize,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl MemStorage {
        fn blank() -> Self {
            Self {
                bytes: [0xFF; 128],
                commits: 0,
                fail_reads: false,
                fail_writes: false,
            }
        }
    }

    impl Storage for MemStorage {
        type Error = ();

        fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), ()> {
            if self.fail_reads {
                return Err(());
            }
            buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
            Ok(())
        }

        fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), ()> {
            if self.fail_writes {
                return Err(());
            }
            self.bytes[offset..offset + data.len()].copy_from_slice(data);
            Ok(())
        }

        fn commit(&mut self) -> Result<(), ()> {
            self.commits += 1;
            Ok(())
        }
    }

    #[test]
    fn blank_storage_is_initialized() {
        let store = WaypointStore::load(MemStorage::blank());
        assert_eq!(store.count_set(), 0);
        assert_eq!(store.get(0).unwrap().name(), "WP1");
        assert_eq!(store.get(2).unwrap().name(), "WP3");

        let storage = store.into_storage();
        assert_eq!(storage.commits, 1);
        assert_eq!(&storage.bytes[..4], &layout::MAGIC.to_le_bytes());
        assert!(storage.bytes[4..IMAGE_LEN].iter().all(|&b| b == 0));
    }

    #[test]
    fn survives_a_restart() {
        let p = Position::new(-33.856_784, 151.215_297_000_000_1);
        let mut store = WaypointStore::load(MemStorage::blank());
        store.set(1, p, "Opera").unwrap();
        assert_eq!(store.get(1).unwrap().name(), "Opera");

        let store = WaypointStore::load(store.into_storage());
        let wp = store.get(1).unwrap();
        assert!(wp.is_set);
        assert_eq!(wp.position, p);
        // Names are not persisted
        assert_eq!(wp.name(), "WP2");
        assert!(!store.get(0).unwrap().is_set);
        assert_eq!(store.storage().commits, 2);
    }

    #[test]
    fn clear_persists() {
        let mut store = WaypointStore::load(MemStorage::blank());
        store.set(0, Position::new(1.0, 2.0), "WP1").unwrap();
        store.clear(0).unwrap();
        let store = WaypointStore::load(store.into_storage());
        assert_eq!(store.count_set(), 0);
        assert_eq!(store.get(0).unwrap().position, Position::default());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut store = WaypointStore::load(MemStorage::blank());
        assert_eq!(
            store.set(3, Position::new(1.0, 2.0), "x"),
            Err(StoreError::InvalidIndex(3))
        );
        assert_eq!(store.clear(7), Err(StoreError::InvalidIndex(7)));
        assert!(store.get(3).is_none());
    }

    #[test]
    fn write_failure_is_reported_but_kept_in_memory() {
        let mut storage = MemStorage::blank();
        storage.fail_writes = true;
        let mut store = WaypointStore::load(storage);
        assert_eq!(
            store.set(0, Position::new(1.0, 2.0), "WP1"),
            Err(StoreError::Storage)
        );
        assert!(store.get(0).unwrap().is_set);
    }

    #[test]
    fn unreadable_storage_starts_empty() {
        let mut storage = MemStorage::blank();
        storage.fail_reads = true;
        let store = WaypointStore::load(storage);
        assert_eq!(store.count_set(), 0);
        assert_eq!(store.storage().commits, 1);
    }

    #[test]
    fn long_names_are_truncated() {
        let mut store = WaypointStore::load(MemStorage::blank());
        store.set(2, Position::new(0.0, 0.0), "Trailhead parking").unwrap();
        assert_eq!(store.get(2).unwrap().name(), "Trailhead p");
        store.set(2, Position::new(0.0, 0.0), "Höhenweg-Süd").unwrap();
        assert_eq!(store.get(2).unwrap().name(), "Höhenweg-S");
    }
}
