//! File formats: PCD snapshots and TUM RGB-D sequences.

pub mod pcd;
pub mod tum;
