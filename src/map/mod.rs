//! Map module - data the fusion stage keeps for a session.
//!
//! - [`KeyFrame`] / [`KeyFramePose`] - posed observations handed over by tracking
//! - [`FragmentLog`] - append-only store of per-keyframe fragments
//! - [`GlobalMap`] - the shared fused point cloud
//!
//! # Ownership
//!
//! Fragments are created by the fusion worker and live in its `FragmentLog` for the
//! whole session. The `GlobalMap` is shared with external readers and guarded by
//! its own lock, independent of the ingestion queue lock.

pub mod fragment_log;
pub mod global_map;
pub mod keyframe;
pub mod types;

pub use fragment_log::{FragmentLog, PointCloudFragment};
pub use global_map::{GlobalMap, GlobalMapWriter};
pub use keyframe::{CameraIntrinsics, ColorImage, DepthImage, KeyFrame, KeyFramePose};
pub use types::KeyFrameId;
