//! Geometry utilities: SE3 transforms and export frame conventions.

pub mod frames;
pub mod se3;

pub use frames::SnapshotFrame;
pub use se3::SE3;
