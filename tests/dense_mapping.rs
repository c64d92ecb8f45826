//! End-to-end tests of a dense mapping session through the public `DenseMapper`.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use image::{Luma, Rgb};
use nalgebra::Vector3;
use tempfile::TempDir;

use rust_dense_mapping::geometry::SE3;
use rust_dense_mapping::io::pcd::load_pcd;
use rust_dense_mapping::map::{
    CameraIntrinsics, ColorImage, DepthImage, KeyFrame, KeyFrameId, KeyFramePose,
};
use rust_dense_mapping::system::{DenseMapper, DenseMappingConfig, MapUpdate, WorkerState};

fn session_config(dir: &TempDir) -> DenseMappingConfig {
    let mut config = DenseMappingConfig::with_resolution(0.01);
    config.snapshot_path = dir.path().join("dense_map.pcd");
    config.loop_rebuild.snapshot_path = dir.path().join("dense_map_loop.pcd");
    config.loop_rebuild.min_viable_points = 10;
    config
}

fn keyframe(id: u64, camera_x: f64) -> KeyFrame {
    KeyFrame::new(
        KeyFrameId::new(id),
        SE3::from_translation(Vector3::new(-camera_x, 0.0, 0.0)),
        CameraIntrinsics::new(50.0, 50.0, 20.0, 20.0),
    )
}

/// 40x40 frame with a uniform, valid depth.
fn frame(shade: u8) -> (ColorImage, DepthImage) {
    (
        ColorImage::from_pixel(40, 40, Rgb([shade, shade, shade])),
        DepthImage::from_pixel(40, 40, Luma([1.5])),
    )
}

fn wait_finished(mapper: &DenseMapper) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while !mapper.is_finished() {
        assert!(Instant::now() < deadline, "worker did not finish");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn only_decimated_keyframes_contribute() {
    let dir = TempDir::new().unwrap();
    let mapper = DenseMapper::new(session_config(&dir)).unwrap();
    let updates = mapper.subscribe();

    let mut known = Vec::new();
    for id in 0..10 {
        let kf = keyframe(id, 5.0 * id as f64);
        known.push(kf.to_pose());
        let (color, depth) = frame(10 * id as u8);
        assert!(mapper.insert_keyframe(&kf, &color, &depth, &known));
    }
    mapper.request_shutdown();
    wait_finished(&mapper);

    let fused: Vec<KeyFrameId> = updates
        .try_iter()
        .filter_map(|u| match u {
            MapUpdate::Fused { keyframe_id, .. } => Some(keyframe_id),
            _ => None,
        })
        .collect();
    assert_eq!(fused, vec![KeyFrameId::new(0), KeyFrameId::new(5)]);

    let map = mapper.global_map();
    assert!(map.iter().all(|p| p.color == [0; 3] || p.color == [50; 3]));
    assert!(map.iter().any(|p| p.color == [50; 3]));

    let stats = mapper.stats();
    assert_eq!(stats.keyframes_received, 10);
    assert_eq!(stats.keyframes_fused, 2);
    assert_eq!(stats.state, WorkerState::Finished);

    let saved = load_pcd(dir.path().join("dense_map.pcd")).unwrap();
    assert_eq!(saved.len(), map.len());
}

#[test]
fn shutdown_drains_queue() {
    let dir = TempDir::new().unwrap();
    let mut config = session_config(&dir);
    config.decimation_modulus = 1;
    let mut mapper = DenseMapper::new(config).unwrap();

    let (color, depth) = frame(100);
    for id in 0..20 {
        mapper.insert_keyframe(&keyframe(id, id as f64), &color, &depth, &[]);
    }
    mapper.shutdown();

    assert!(mapper.is_finished());
    assert_eq!(mapper.stats().keyframes_fused, 20);

    // Further input is refused.
    assert!(!mapper.insert_keyframe(&keyframe(20, 0.0), &color, &depth, &[]));
    assert!(!mapper.notify_loop_closure(Vec::new()));
    assert_eq!(mapper.stats().keyframes_received, 20);
}

#[test]
fn loop_closure_replaces_map_after_queued_keyframes() {
    let dir = TempDir::new().unwrap();
    let mut mapper = DenseMapper::new(session_config(&dir)).unwrap();
    let updates = mapper.subscribe();

    let (color, depth) = frame(200);
    let kf0 = keyframe(0, 0.0);
    let kf5 = keyframe(5, 20.0);
    mapper.insert_keyframe(&kf0, &color, &depth, &[kf0.to_pose()]);
    mapper.insert_keyframe(&kf5, &color, &depth, &[kf0.to_pose(), kf5.to_pose()]);

    // Drift correction: keyframe 5 was really 2 m from the origin, not 20 m.
    let corrected = vec![
        kf0.to_pose(),
        KeyFramePose::new(kf5.id, SE3::from_translation(Vector3::new(-2.0, 0.0, 0.0))),
    ];
    assert!(mapper.notify_loop_closure(corrected));
    mapper.shutdown();

    let received: Vec<MapUpdate> = updates.try_iter().collect();
    assert!(matches!(
        received.last(),
        Some(MapUpdate::LoopRebuilt { loop_count: 1, .. })
    ));

    let map = mapper.global_map();
    assert!(map.iter().all(|p| p.position.x < 5.0));
    assert!(map.iter().any(|p| p.position.x > 1.0));
    assert_eq!(mapper.stats().loops_closed, 1);
    assert!(dir.path().join("dense_map_loop.pcd").exists());
}

#[test]
fn concurrent_readers_never_see_partial_fusion() {
    let dir = TempDir::new().unwrap();
    let mut config = session_config(&dir);
    config.decimation_modulus = 1;
    let mut mapper = DenseMapper::new(config).unwrap();
    let updates = mapper.subscribe();
    let shared = Arc::clone(mapper.shared_state());

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut observed = Vec::new();
            while !done.load(Ordering::SeqCst) {
                observed.push(shared.global_map.snapshot().len());
            }
            observed
        })
    };

    let (color, depth) = frame(60);
    for id in 0..30 {
        mapper.insert_keyframe(&keyframe(id, 0.1 * id as f64), &color, &depth, &[]);
    }
    mapper.shutdown();
    done.store(true, Ordering::SeqCst);
    let observed = reader.join().unwrap();

    // Every size a reader can see is the empty map or one published after a fusion.
    let mut published: HashSet<usize> = updates
        .try_iter()
        .filter_map(|u| match u {
            MapUpdate::Fused { map_points, .. } => Some(map_points),
            _ => None,
        })
        .collect();
    published.insert(0);

    assert!(!observed.is_empty());
    for len in observed {
        assert!(published.contains(&len), "reader saw unpublished map size {}", len);
    }
    assert_eq!(mapper.stats().keyframes_fused, 30);
}

#[test]
fn legacy_counter_trigger_fires_once() {
    let dir = TempDir::new().unwrap();
    let mut mapper = DenseMapper::new(session_config(&dir)).unwrap();
    mapper.arm_loop_trigger(2);

    let (color, depth) = frame(30);
    let mut known = Vec::new();
    for id in [0, 5, 10, 15] {
        let kf = keyframe(id, id as f64);
        known.push(kf.to_pose());
        mapper.insert_keyframe(&kf, &color, &depth, &known);
    }
    mapper.shutdown();

    let stats = mapper.stats();
    assert_eq!(stats.keyframes_fused, 4);
    assert_eq!(stats.loops_closed, 1);
}
