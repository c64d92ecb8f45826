//! Fusion stage: keyframes in, fused global map out.
//!
//! - [`FragmentGenerator`] turns one RGB-D keyframe into colored points
//! - [`FusionWorker`] owns the background thread that fuses fragments and runs
//!   loop rebuilds in queue order

pub mod fragment;
pub mod fusion_worker;

pub use fragment::{FragmentConfig, FragmentGenerator, GeneratedFragment};
pub use fusion_worker::{FusionWorker, spawn_fusion_worker};
