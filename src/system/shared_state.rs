//! Shared state between producer threads, the fusion worker and map readers.
//!
//! The ingestion queue and the global map have independent locks, so producers
//! never wait on fusion. Counters are plain atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::map::GlobalMap;

use super::ingest_queue::IngestQueue;
use super::messages::MapUpdate;

/// Lifecycle of the fusion worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for or processing jobs.
    Running = 0,

    /// Shutdown requested; the remaining queue is being processed.
    Draining = 1,

    /// Queue empty; the final snapshot is being written.
    Finalizing = 2,

    /// Worker loop exited.
    Finished = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Running,
            1 => WorkerState::Draining,
            2 => WorkerState::Finalizing,
            _ => WorkerState::Finished,
        }
    }
}

/// Point-in-time counters for a mapping session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingStats {
    pub keyframes_received: usize,
    pub keyframes_fused: usize,
    pub loops_closed: usize,
    pub map_points: usize,
    pub state: WorkerState,
}

/// State shared by every handle of one mapping session.
pub struct SharedState {
    pub queue: IngestQueue,

    pub global_map: GlobalMap,

    worker_state: AtomicU8,

    /// Keyframes that passed decimation and were fused.
    keyframes_fused: AtomicUsize,

    /// Accepted loop rebuilds.
    loops_closed: AtomicUsize,

    subscribers: Mutex<Vec<Sender<MapUpdate>>>,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn worker_state(&self) -> WorkerState {
        WorkerState::from_u8(self.worker_state.load(Ordering::SeqCst))
    }

    pub fn set_worker_state(&self, state: WorkerState) {
        self.worker_state.store(state as u8, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.worker_state() == WorkerState::Finished
    }

    pub fn keyframes_fused(&self) -> usize {
        self.keyframes_fused.load(Ordering::SeqCst)
    }

    pub fn record_fused(&self) {
        self.keyframes_fused.fetch_add(1, Ordering::SeqCst);
    }

    pub fn loops_closed(&self) -> usize {
        self.loops_closed.load(Ordering::SeqCst)
    }

    /// Bump the loop count and return the new value.
    pub fn record_loop_closed(&self) -> usize {
        self.loops_closed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn stats(&self) -> MappingStats {
        MappingStats {
            keyframes_received: self.queue.keyframes_received(),
            keyframes_fused: self.keyframes_fused(),
            loops_closed: self.loops_closed(),
            map_points: self.global_map.len(),
            state: self.worker_state(),
        }
    }

    /// Register a new receiver of [`MapUpdate`]s.
    pub fn subscribe(&self) -> Receiver<MapUpdate> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Send `update` to every live subscriber, dropping the disconnected ones.
    pub fn publish(&self, update: MapUpdate) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(update.clone()).is_ok());
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            queue: IngestQueue::new(),
            global_map: GlobalMap::new(),
            worker_state: AtomicU8::new(WorkerState::Running as u8),
            keyframes_fused: AtomicUsize::new(0),
            loops_closed: AtomicUsize::new(0),
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::KeyFrameId;

    #[test]
    fn test_worker_state_roundtrip() {
        let shared = SharedState::new();
        assert_eq!(shared.worker_state(), WorkerState::Running);

        for state in [
            WorkerState::Draining,
            WorkerState::Finalizing,
            WorkerState::Finished,
        ] {
            shared.set_worker_state(state);
            assert_eq!(shared.worker_state(), state);
        }
        assert!(shared.is_finished());
    }

    #[test]
    fn test_publish_prunes_dropped_subscribers() {
        let shared = SharedState::new();
        let kept = shared.subscribe();
        drop(shared.subscribe());

        let update = MapUpdate::Fused {
            keyframe_id: KeyFrameId::new(0),
            map_points: 3,
        };
        shared.publish(update.clone());

        assert_eq!(kept.try_recv().unwrap(), update);
        assert_eq!(shared.subscribers.lock().len(), 1);
    }

    #[test]
    fn test_loop_count_increments_by_one() {
        let shared = SharedState::new();
        assert_eq!(shared.record_loop_closed(), 1);
        assert_eq!(shared.record_loop_closed(), 2);
        assert_eq!(shared.stats().loops_closed, 2);
    }
}
