//! TUM RGB-D benchmark sequences.
//!
//! Expected layout (as produced by the benchmark's `associate.py`):
//!
//! ```text
//! <root>/associations.txt   # "t_rgb rgb/<f>.png t_depth depth/<f>.png" per line
//! <root>/groundtruth.txt    # "t tx ty tz qx qy qz qw" per line (T_wc)
//! <root>/rgb/*.png
//! <root>/depth/*.png        # 16-bit, metres * depth_factor
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord, Trim};
use image::{ImageBuffer, Luma};
use nalgebra::Vector3;
use tracing::warn;

use crate::geometry::SE3;
use crate::map::{ColorImage, DepthImage};

/// Depth scale of the TUM benchmark PNGs (5000 units per metre).
pub const TUM_DEPTH_FACTOR: f32 = 5000.0;

#[derive(Debug, Clone)]
pub struct AssociationEntry {
    pub rgb_timestamp: f64,
    pub rgb_file: String,
    pub depth_timestamp: f64,
    pub depth_file: String,
}

#[derive(Debug, Clone)]
pub struct GroundTruthEntry {
    pub timestamp: f64,
    /// Camera to world (T_wc).
    pub pose_wc: SE3,
}

/// One loaded RGB-D frame.
pub struct RgbdFrame {
    pub timestamp: f64,
    pub color: ColorImage,
    pub depth: DepthImage,
}

#[derive(Debug)]
pub struct TumRgbdDataset {
    root: PathBuf,
    pub associations: Vec<AssociationEntry>,
    pub groundtruth: Vec<GroundTruthEntry>,
}

impl TumRgbdDataset {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let associations = load_associations(&root.join("associations.txt"))?;
        let groundtruth = load_groundtruth(&root.join("groundtruth.txt"))?;
        if groundtruth.is_empty() {
            bail!("{} contains no poses", root.join("groundtruth.txt").display());
        }

        Ok(Self {
            root,
            associations,
            groundtruth,
        })
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    /// Load the color/depth pair at `idx`.
    pub fn frame(&self, idx: usize) -> Result<RgbdFrame> {
        let entry = self
            .associations
            .get(idx)
            .with_context(|| format!("No frame at index {}", idx))?;

        let rgb_path = self.root.join(&entry.rgb_file);
        let depth_path = self.root.join(&entry.depth_file);

        let color = image::open(&rgb_path)
            .with_context(|| format!("Failed to read color image {:?}", rgb_path))?
            .to_rgb8();
        let raw_depth = image::open(&depth_path)
            .with_context(|| format!("Failed to read depth image {:?}", depth_path))?
            .into_luma16();

        Ok(RgbdFrame {
            timestamp: entry.rgb_timestamp,
            color,
            depth: depth_to_metres(&raw_depth, TUM_DEPTH_FACTOR),
        })
    }

    /// Ground-truth pose closest in time to `timestamp`.
    pub fn pose_at(&self, timestamp: f64) -> &SE3 {
        let idx = self
            .groundtruth
            .partition_point(|gt| gt.timestamp < timestamp);
        let best = match idx {
            0 => 0,
            i if i >= self.groundtruth.len() => self.groundtruth.len() - 1,
            i => {
                let before = timestamp - self.groundtruth[i - 1].timestamp;
                let after = self.groundtruth[i].timestamp - timestamp;
                if before <= after { i - 1 } else { i }
            }
        };
        &self.groundtruth[best].pose_wc
    }
}

/// Convert raw 16-bit depth into metres. Zero stays zero (no measurement).
pub fn depth_to_metres(raw: &ImageBuffer<Luma<u16>, Vec<u16>>, depth_factor: f32) -> DepthImage {
    let (w, h) = raw.dimensions();
    ImageBuffer::from_fn(w, h, |u, v| Luma([f32::from(raw.get_pixel(u, v)[0]) / depth_factor]))
}

fn space_separated_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b' ')
        .comment(Some(b'#'))
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

/// Non-empty fields of a record (tolerates repeated separators).
fn fields(rec: &StringRecord) -> Vec<&str> {
    rec.iter().filter(|f| !f.is_empty()).collect()
}

fn load_associations(path: &Path) -> Result<Vec<AssociationEntry>> {
    let mut rdr = space_separated_reader(path)?;

    let mut entries = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let f = fields(&rec);
        if f.len() < 4 {
            continue;
        }
        entries.push(AssociationEntry {
            rgb_timestamp: f[0].parse()?,
            rgb_file: f[1].to_string(),
            depth_timestamp: f[2].parse()?,
            depth_file: f[3].to_string(),
        });
    }
    Ok(entries)
}

fn load_groundtruth(path: &Path) -> Result<Vec<GroundTruthEntry>> {
    let mut rdr = space_separated_reader(path)?;

    let mut entries = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let f = fields(&rec);
        if f.len() < 8 {
            continue;
        }
        let timestamp: f64 = f[0].parse()?;
        let translation = Vector3::new(f[1].parse()?, f[2].parse()?, f[3].parse()?);
        // TUM stores the quaternion x-first.
        let qx: f64 = f[4].parse()?;
        let qy: f64 = f[5].parse()?;
        let qz: f64 = f[6].parse()?;
        let qw: f64 = f[7].parse()?;
        entries.push(GroundTruthEntry {
            timestamp,
            pose_wc: SE3::from_quaternion(qw, qx, qy, qz, translation),
        });
    }

    if !entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
        warn!("{} is not sorted by time; sorting", path.display());
        entries.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    }
    Ok(entries)
}
