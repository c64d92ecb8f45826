//! Point Cloud Data (PCD v0.7) snapshot files.
//!
//! Snapshots are written as binary PCD with fields `x y z rgb`, where `rgb` is the
//! usual packed `0x00RRGGBB` value stored in a 4-byte float slot. Reading accepts
//! ASCII and binary files whose fields are all 4 bytes wide and include `x y z`;
//! `rgb`/`rgba` is optional.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cloud::{ColorPoint, PointCloud};
use crate::geometry::SnapshotFrame;

const MAX_PREALLOCATED_POINTS: usize = 1 << 20;

fn pack_rgb(color: [u8; 3]) -> u32 {
    (u32::from(color[0]) << 16) | (u32::from(color[1]) << 8) | u32::from(color[2])
}

fn unpack_rgb(packed: u32) -> [u8; 3] {
    [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]
}

/// Write `cloud` to `path`, replacing any existing file.
pub fn save_pcd<P: AsRef<Path>>(path: P, cloud: &PointCloud) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    write!(
        writer,
        "# .PCD v0.7 - Point Cloud Data file format\n\
         VERSION 0.7\n\
         FIELDS x y z rgb\n\
         SIZE 4 4 4 4\n\
         TYPE F F F F\n\
         COUNT 1 1 1 1\n\
         WIDTH {n}\n\
         HEIGHT 1\n\
         VIEWPOINT 0 0 0 1 0 0 0\n\
         POINTS {n}\n\
         DATA binary\n",
        n = cloud.len()
    )?;

    for p in cloud.iter() {
        writer.write_all(&p.position.x.to_le_bytes())?;
        writer.write_all(&p.position.y.to_le_bytes())?;
        writer.write_all(&p.position.z.to_le_bytes())?;
        writer.write_all(&pack_rgb(p.color).to_le_bytes())?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write `cloud` expressed in `frame`.
///
/// The map is kept in world coordinates; for [`SnapshotFrame::Flu`] the points are
/// rotated on the way out and the stored map is left untouched.
pub fn save_snapshot<P: AsRef<Path>>(path: P, cloud: &PointCloud, frame: SnapshotFrame) -> Result<()> {
    match frame {
        SnapshotFrame::World => save_pcd(path, cloud),
        SnapshotFrame::Flu => save_pcd(path, &cloud.transformed(&frame.transform_from_world())),
    }
}

#[derive(Debug, PartialEq)]
enum DataFormat {
    Ascii,
    Binary,
}

/// Parsed header: field names, point count, data encoding.
#[derive(Debug)]
struct PcdHeader {
    fields: Vec<String>,
    points: usize,
    data: DataFormat,
}

impl PcdHeader {
    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

fn read_header<R: BufRead>(reader: &mut R) -> Result<PcdHeader> {
    let mut fields = Vec::new();
    let mut points = None;
    let mut width_height = (None, None);

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            bail!("PCD header ended before DATA line");
        }
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            continue;
        };
        let values: Vec<&str> = tokens.collect();
        match key.to_ascii_uppercase().as_str() {
            k if k.starts_with('#') => {}
            "FIELDS" => fields = values.iter().map(|s| s.to_string()).collect(),
            "SIZE" => {
                if values.iter().any(|s| *s != "4") {
                    bail!("Only 4-byte PCD fields are supported, got SIZE {:?}", values);
                }
            }
            "COUNT" => {
                if values.iter().any(|s| *s != "1") {
                    bail!("Only scalar PCD fields are supported, got COUNT {:?}", values);
                }
            }
            "WIDTH" => width_height.0 = values.first().map(|v| v.parse::<usize>()).transpose()?,
            "HEIGHT" => width_height.1 = values.first().map(|v| v.parse::<usize>()).transpose()?,
            "POINTS" => points = values.first().map(|v| v.parse::<usize>()).transpose()?,
            "DATA" => {
                let data = match values.first().copied() {
                    Some("ascii") => DataFormat::Ascii,
                    Some("binary") => DataFormat::Binary,
                    other => bail!("Unsupported PCD data encoding {:?}", other),
                };
                let points = match (points, width_height) {
                    (Some(n), _) => n,
                    (None, (Some(w), Some(h))) => match w.checked_mul(h) {
                        Some(n) => n,
                        None => bail!("PCD WIDTH {} x HEIGHT {} overflows", w, h),
                    },
                    _ => bail!("PCD header has neither POINTS nor WIDTH/HEIGHT"),
                };
                return Ok(PcdHeader {
                    fields,
                    points,
                    data,
                });
            }
            _ => {}
        }
    }
}

/// Read a point cloud written by [`save_pcd`] or any compatible tool.
pub fn load_pcd<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let header = read_header(&mut reader)
        .with_context(|| format!("Invalid PCD header in {}", path.display()))?;
    let (Some(ix), Some(iy), Some(iz)) = (
        header.field_index("x"),
        header.field_index("y"),
        header.field_index("z"),
    ) else {
        bail!("{} has no x/y/z fields", path.display());
    };
    let irgb = header
        .field_index("rgb")
        .or_else(|| header.field_index("rgba"));
    let stride = header.fields.len();

    // The header is untrusted; grow past this only as rows are actually read.
    let mut cloud = PointCloud::with_capacity(header.points.min(MAX_PREALLOCATED_POINTS));
    match header.data {
        DataFormat::Binary => {
            let mut record = vec![0u8; stride * 4];
            for _ in 0..header.points {
                reader
                    .read_exact(&mut record)
                    .with_context(|| format!("Truncated PCD data in {}", path.display()))?;
                let word = |i: usize| {
                    let mut b = [0u8; 4];
                    b.copy_from_slice(&record[i * 4..i * 4 + 4]);
                    b
                };
                let color = irgb
                    .map(|i| unpack_rgb(u32::from_le_bytes(word(i))))
                    .unwrap_or([255; 3]);
                cloud.push(ColorPoint::new(
                    f32::from_le_bytes(word(ix)),
                    f32::from_le_bytes(word(iy)),
                    f32::from_le_bytes(word(iz)),
                    color,
                ));
            }
        }
        DataFormat::Ascii => {
            for line in reader.lines().take(header.points) {
                let line = line?;
                let values: Vec<&str> = line.split_whitespace().collect();
                if values.len() < stride {
                    bail!("PCD row has {} values, expected {}", values.len(), stride);
                }
                let color = match irgb {
                    // ASCII rgb is usually the packed float printed as a float.
                    Some(i) => match values[i].parse::<u32>() {
                        Ok(packed) => unpack_rgb(packed),
                        Err(_) => unpack_rgb(values[i].parse::<f32>()?.to_bits()),
                    },
                    None => [255; 3],
                };
                cloud.push(ColorPoint::new(
                    values[ix].parse()?,
                    values[iy].parse()?,
                    values[iz].parse()?,
                    color,
                ));
            }
        }
    }

    if cloud.len() != header.points {
        bail!(
            "{} declares {} points but contains {}",
            path.display(),
            header.points,
            cloud.len()
        );
    }
    Ok(cloud)
}
