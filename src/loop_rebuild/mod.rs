//! Loop rebuild: re-register the dense map after the tracker corrected its poses.
//!
//! Fragments are kept in their keyframe's camera frame, so a rebuild is just a
//! re-transform of every stored fragment with the corrected `T_cw⁻¹` followed by
//! voxel downsampling.
//!
//! # Locking
//!
//! Unlike the fusion step, a rebuild holds the global map write lock from the first
//! fragment to the swap. Readers block for its duration and never see a map that
//! mixes pre- and post-correction poses.

pub mod rebuilder;

pub use rebuilder::{LoopRebuildConfig, LoopRebuilder, RebuildOutcome};
