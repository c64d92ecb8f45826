//! DenseMapper - the handle the tracker talks to.
//!
//! Owns the shared state and the fusion worker thread. Ingestion methods only
//! touch the queue lock and return immediately.

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use crossbeam_channel::Receiver;
use tracing::{info, warn};

use crate::cloud::PointCloud;
use crate::fusion::spawn_fusion_worker;
use crate::map::{ColorImage, DepthImage, KeyFrame, KeyFramePose};

use super::config::DenseMappingConfig;
use super::messages::MapUpdate;
use super::shared_state::{MappingStats, SharedState};

/// Dense mapping session with one background fusion thread.
pub struct DenseMapper {
    shared: Arc<SharedState>,

    /// Handle to the fusion thread, taken on shutdown.
    worker_handle: Option<JoinHandle<()>>,
}

impl DenseMapper {
    /// Create the shared state and start the fusion thread.
    pub fn new(config: DenseMappingConfig) -> Result<Self> {
        let shared = SharedState::new();
        let worker_handle = spawn_fusion_worker(config, Arc::clone(&shared))?;

        Ok(Self {
            shared,
            worker_handle: Some(worker_handle),
        })
    }

    /// Queue a keyframe with its images. `known_keyframes` is the tracker's current
    /// list of all keyframes and becomes the pose source for counter-triggered
    /// rebuilds.
    ///
    /// Returns false when the session is already shutting down.
    pub fn insert_keyframe(
        &self,
        keyframe: &KeyFrame,
        color: &ColorImage,
        depth: &DepthImage,
        known_keyframes: &[KeyFramePose],
    ) -> bool {
        let accepted = self
            .shared
            .queue
            .push_keyframe(keyframe, color, depth, known_keyframes);
        if !accepted {
            warn!("{} refused: dense mapping is shutting down", keyframe.id);
        }
        accepted
    }

    /// Queue a loop closure with the corrected poses of all known keyframes.
    ///
    /// The rebuild runs after every keyframe queued before this call.
    pub fn notify_loop_closure(&self, corrected: Vec<KeyFramePose>) -> bool {
        let accepted = self.shared.queue.push_loop_closure(Some(corrected));
        if !accepted {
            warn!("Loop closure refused: dense mapping is shutting down");
        }
        accepted
    }

    /// Arm the counter trigger: rebuild once when `loop_keyframe_id` keyframes
    /// have been fused, using the latest known-keyframe list.
    pub fn arm_loop_trigger(&self, loop_keyframe_id: usize) {
        self.shared.queue.arm_loop_trigger(loop_keyframe_id);
    }

    /// Ask the worker to drain the queue and finish. Does not wait.
    pub fn request_shutdown(&self) {
        self.shared.queue.request_shutdown();
    }

    /// True once the worker has drained the queue and written the final snapshot.
    pub fn is_finished(&self) -> bool {
        self.shared.is_finished()
    }

    /// Consistent snapshot of the current map.
    pub fn global_map(&self) -> Arc<PointCloud> {
        self.shared.global_map.snapshot()
    }

    pub fn subscribe(&self) -> Receiver<MapUpdate> {
        self.shared.subscribe()
    }

    pub fn stats(&self) -> MappingStats {
        self.shared.stats()
    }

    pub fn shared_state(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Request shutdown and wait for the worker to finish.
    pub fn shutdown(&mut self) {
        self.request_shutdown();

        if let Some(handle) = self.worker_handle.take() {
            if handle.join().is_err() {
                warn!("Dense mapping thread panicked");
            } else {
                let stats = self.stats();
                info!(
                    "Dense mapping joined: {} keyframes received, {} fused, {} loops, {} points",
                    stats.keyframes_received,
                    stats.keyframes_fused,
                    stats.loops_closed,
                    stats.map_points
                );
            }
        }
    }
}

impl Drop for DenseMapper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
