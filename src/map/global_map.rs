//! The shared, continuously growing dense map.
//!
//! The map is a single `PointCloud` value behind its own lock. Readers take an
//! `Arc` snapshot; writers hold the write lock for their whole read-modify-write
//! and publish through copy-on-write, so a snapshot never changes after it was
//! handed out and never shows a half-fused state.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::cloud::PointCloud;

/// Shared global map.
#[derive(Debug, Default)]
pub struct GlobalMap {
    cloud: RwLock<Arc<PointCloud>>,
}

impl GlobalMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current map. It does not follow later updates.
    pub fn snapshot(&self) -> Arc<PointCloud> {
        self.cloud.read().clone()
    }

    /// Number of points currently in the map.
    pub fn len(&self) -> usize {
        self.cloud.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.read().is_empty()
    }

    /// Take the write lock. It is held until the returned writer is dropped.
    pub fn write(&self) -> GlobalMapWriter<'_> {
        GlobalMapWriter {
            guard: self.cloud.write(),
        }
    }
}

/// Exclusive access to the global map.
pub struct GlobalMapWriter<'a> {
    guard: RwLockWriteGuard<'a, Arc<PointCloud>>,
}

impl GlobalMapWriter<'_> {
    pub fn current(&self) -> &PointCloud {
        &self.guard
    }

    /// Snapshot of the value as written so far.
    pub fn snapshot(&self) -> Arc<PointCloud> {
        Arc::clone(&*self.guard)
    }

    /// Mutable access. Clones the cloud first if a reader still holds a snapshot.
    pub fn cloud_mut(&mut self) -> &mut PointCloud {
        Arc::make_mut(&mut *self.guard)
    }

    /// Replace the whole map.
    pub fn replace(&mut self, cloud: PointCloud) {
        *self.guard = Arc::new(cloud);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ColorPoint;

    fn point(x: f32) -> ColorPoint {
        ColorPoint::new(x, 0.0, 1.0, [0; 3])
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let map = GlobalMap::new();
        map.write().cloud_mut().push(point(1.0));

        let before = map.snapshot();
        map.write().cloud_mut().push(point(2.0));

        assert_eq!(before.len(), 1);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_replace() {
        let map = GlobalMap::new();
        map.write().cloud_mut().push(point(1.0));

        map.write()
            .replace(PointCloud::from_points(vec![point(5.0), point(6.0), point(7.0)]));

        assert_eq!(map.snapshot().len(), 3);
        assert_eq!(map.snapshot().points[0], point(5.0));
    }

    #[test]
    fn test_concurrent_readers_see_whole_batches() {
        use std::thread;

        let map = Arc::new(GlobalMap::new());
        let writer = {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for batch in 0..200 {
                    let mut w = map.write();
                    let cloud = w.cloud_mut();
                    for _ in 0..10 {
                        cloud.push(point(batch as f32));
                    }
                }
            })
        };

        for _ in 0..500 {
            assert_eq!(map.snapshot().len() % 10, 0);
        }
        writer.join().unwrap();
        assert_eq!(map.len(), 2000);
    }
}
