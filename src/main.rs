use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rust_dense_mapping::io::tum::TumRgbdDataset;
use rust_dense_mapping::map::{CameraIntrinsics, KeyFrame, KeyFrameId, KeyFramePose};
use rust_dense_mapping::system::{DenseMapper, DenseMappingConfig, MapUpdate};

/// Every n-th dataset frame is treated as a keyframe.
const KEYFRAME_INTERVAL: usize = 10;

/// TUM freiburg1 color camera.
const FR1_INTRINSICS: CameraIntrinsics = CameraIntrinsics {
    fx: 517.3,
    fy: 516.5,
    cx: 318.6,
    cy: 255.3,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let dataset_path = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "data/tum/rgbd_dataset_freiburg1_xyz".to_string());

    let config = match args.get(2) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            DenseMappingConfig::from_yaml_file(path)?
        }
        None => DenseMappingConfig::default(),
    };

    info!("Loading TUM RGB-D sequence from {}", dataset_path);
    let dataset = TumRgbdDataset::new(&dataset_path)?;
    info!(
        "Loaded {} frames, {} ground truth poses",
        dataset.len(),
        dataset.groundtruth.len()
    );

    let mut mapper = DenseMapper::new(config)?;
    let updates = mapper.subscribe();
    let mut known: Vec<KeyFramePose> = Vec::new();

    for (kf_idx, frame_idx) in (0..dataset.len()).step_by(KEYFRAME_INTERVAL).enumerate() {
        let frame = match dataset.frame(frame_idx) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping frame {}: {e:#}", frame_idx);
                continue;
            }
        };

        let pose_cw = dataset.pose_at(frame.timestamp).inverse();
        let keyframe = KeyFrame::new(KeyFrameId::new(kf_idx as u64), pose_cw, FR1_INTRINSICS);
        known.push(keyframe.to_pose());
        mapper.insert_keyframe(&keyframe, &frame.color, &frame.depth, &known);

        for update in updates.try_iter() {
            if let MapUpdate::Fused {
                keyframe_id,
                map_points,
            } = update
            {
                info!("{} fused, map has {} points", keyframe_id, map_points);
            }
        }
    }

    // Ground-truth poses need no correction; this exercises the rebuild path.
    mapper.notify_loop_closure(known);
    mapper.shutdown();

    let stats = mapper.stats();
    info!(
        "Done: {} keyframes, {} fused, {} loops closed, {} map points",
        stats.keyframes_received, stats.keyframes_fused, stats.loops_closed, stats.map_points
    );
    Ok(())
}
