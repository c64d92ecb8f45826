//! Inter-thread message types.
//!
//! [`MappingJob`]s travel from producers to the fusion worker through the
//! ingestion queue; [`MapUpdate`]s travel from the worker to subscribers.

use crate::map::{ColorImage, DepthImage, KeyFrame, KeyFrameId, KeyFramePose};

/// A keyframe waiting to be fused, with its own copies of the images.
pub struct PendingKeyFrame {
    pub keyframe: KeyFrame,
    pub color: ColorImage,
    pub depth: DepthImage,
}

/// What caused a loop rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTrigger {
    /// Explicit event queued by the tracker.
    Explicit,

    /// Legacy trigger: the fused keyframe count reached the armed loop keyframe id.
    FusedCount(usize),
}

/// Request to re-register the map under corrected keyframe poses.
#[derive(Debug, Clone)]
pub struct LoopEvent {
    /// Current poses of all keyframes known to the tracker.
    pub keyframes: Vec<KeyFramePose>,

    pub trigger: LoopTrigger,
}

/// Unit of work for the fusion worker, processed strictly in FIFO order.
pub enum MappingJob {
    KeyFrame(Box<PendingKeyFrame>),
    LoopClosure(LoopEvent),
}

/// Notification sent to subscribers after the map changed (or a rebuild was refused).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapUpdate {
    /// A keyframe was fused into the map.
    Fused {
        keyframe_id: KeyFrameId,
        map_points: usize,
    },

    /// A loop rebuild replaced the map.
    LoopRebuilt { loop_count: usize, map_points: usize },

    /// A loop rebuild produced too few points and was discarded.
    LoopRejected { candidate_points: usize },
}
