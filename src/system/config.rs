//! Session configuration, loadable from YAML.
//!
//! Every field has a default, so a YAML file only needs the values it changes:
//!
//! ```yaml
//! resolution: 0.02
//! decimation_modulus: 5
//! fragment:
//!   pixel_stride: 4
//!   max_depth: 6.0
//! snapshot_frame: flu
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cloud::OutlierFilterConfig;
use crate::fusion::FragmentConfig;
use crate::geometry::SnapshotFrame;
use crate::loop_rebuild::LoopRebuildConfig;

/// Configuration of one dense mapping session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DenseMappingConfig {
    /// Voxel leaf size in metres.
    pub resolution: f32,

    /// Only keyframes whose id is a multiple of this are fused.
    pub decimation_modulus: u64,

    pub fragment: FragmentConfig,

    /// Outlier removal applied to newly fused points against the whole map.
    pub map_outlier: OutlierFilterConfig,

    pub loop_rebuild: LoopRebuildConfig,

    /// Final snapshot written when the worker finishes.
    pub snapshot_path: PathBuf,

    /// Frame used for every snapshot file.
    pub snapshot_frame: SnapshotFrame,
}

impl Default for DenseMappingConfig {
    fn default() -> Self {
        Self {
            resolution: 0.01,
            decimation_modulus: 5,
            fragment: FragmentConfig::default(),
            map_outlier: OutlierFilterConfig::default(),
            loop_rebuild: LoopRebuildConfig::default(),
            snapshot_path: PathBuf::from("dense_map.pcd"),
            snapshot_frame: SnapshotFrame::World,
        }
    }
}

impl DenseMappingConfig {
    /// Default configuration with the given voxel resolution.
    pub fn with_resolution(resolution: f32) -> Self {
        Self {
            resolution,
            ..Self::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse dense mapping config")
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&contents).with_context(|| format!("Invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = DenseMappingConfig::default();

        assert_eq!(config.resolution, 0.01);
        assert_eq!(config.decimation_modulus, 5);
        assert_eq!(config.fragment.pixel_stride, 5);
        assert_eq!(config.map_outlier.mean_k, 50);
        assert_eq!(config.loop_rebuild.min_viable_points, 10_000);
        assert_eq!(config.snapshot_path, PathBuf::from("dense_map.pcd"));
        assert_eq!(
            config.loop_rebuild.snapshot_path,
            PathBuf::from("dense_map_loop.pcd")
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = DenseMappingConfig::from_yaml_str(
            "resolution: 0.05\nfragment:\n  max_depth: 4.0\nsnapshot_frame: flu\n",
        )
        .unwrap();

        assert_eq!(config.resolution, 0.05);
        assert_eq!(config.fragment.max_depth, 4.0);
        assert_eq!(config.fragment.min_depth, 0.3);
        assert_eq!(config.snapshot_frame, SnapshotFrame::Flu);
        assert_eq!(config.decimation_modulus, 5);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(DenseMappingConfig::from_yaml_str("resolution: [1, 2").is_err());
        assert!(DenseMappingConfig::from_yaml_str("resolution: fine").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "decimation_modulus: 1").unwrap();
        writeln!(file, "loop_rebuild:").unwrap();
        writeln!(file, "  min_viable_points: 10").unwrap();

        let config = DenseMappingConfig::from_yaml_file(file.path()).unwrap();

        assert_eq!(config.decimation_modulus, 1);
        assert_eq!(config.loop_rebuild.min_viable_points, 10);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(DenseMappingConfig::from_yaml_file("/nonexistent/dense.yaml").is_err());
    }
}
