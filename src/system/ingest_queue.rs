//! Ingestion queue between the tracker (producers) and the fusion worker.
//!
//! One mutex guards the pending jobs, the shutdown flag, the latest
//! known-keyframe snapshot and the legacy loop trigger. Producers hold it only to
//! push; image copies are made before locking. The worker suspends on a condition
//! variable while there is nothing to do.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::map::{ColorImage, DepthImage, KeyFrame, KeyFramePose};

use super::messages::{LoopEvent, LoopTrigger, MappingJob, PendingKeyFrame};

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<MappingJob>,

    /// Keyframe list passed with the most recent insertion.
    known_keyframes: Vec<KeyFramePose>,

    shutdown_requested: bool,

    /// Fused-keyframe count at which the legacy loop trigger fires.
    loop_trigger_at: Option<usize>,

    keyframes_received: usize,
}

/// Thread-safe FIFO of mapping jobs with drain-to-completion shutdown.
#[derive(Default)]
pub struct IngestQueue {
    state: Mutex<QueueState>,
    job_available: Condvar,
}

impl IngestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a keyframe with copies of its images and record `known_keyframes`
    /// as the latest snapshot for loop rebuilds.
    ///
    /// Returns false (and queues nothing) once shutdown was requested.
    pub fn push_keyframe(
        &self,
        keyframe: &KeyFrame,
        color: &ColorImage,
        depth: &DepthImage,
        known_keyframes: &[KeyFramePose],
    ) -> bool {
        let job = MappingJob::KeyFrame(Box::new(PendingKeyFrame {
            keyframe: keyframe.clone(),
            color: color.clone(),
            depth: depth.clone(),
        }));
        let known_keyframes = known_keyframes.to_vec();

        {
            let mut state = self.state.lock();
            if state.shutdown_requested {
                return false;
            }
            state.jobs.push_back(job);
            state.known_keyframes = known_keyframes;
            state.keyframes_received += 1;
        }
        self.job_available.notify_one();
        true
    }

    /// Queue an explicit loop-closure event behind everything already queued.
    ///
    /// With `None`, the most recent known-keyframe snapshot is used.
    pub fn push_loop_closure(&self, corrected: Option<Vec<KeyFramePose>>) -> bool {
        {
            let mut state = self.state.lock();
            if state.shutdown_requested {
                return false;
            }
            let keyframes = corrected.unwrap_or_else(|| state.known_keyframes.clone());
            state.jobs.push_back(MappingJob::LoopClosure(LoopEvent {
                keyframes,
                trigger: LoopTrigger::Explicit,
            }));
        }
        self.job_available.notify_one();
        true
    }

    /// Arm the legacy trigger: a rebuild fires once when the worker has fused
    /// exactly `fused_count` keyframes. Re-arming replaces the previous value.
    pub fn arm_loop_trigger(&self, fused_count: usize) {
        self.state.lock().loop_trigger_at = Some(fused_count);
        self.job_available.notify_one();
    }

    /// Ask the worker to finish. Jobs already queued are still processed.
    pub fn request_shutdown(&self) {
        self.state.lock().shutdown_requested = true;
        self.job_available.notify_all();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.state.lock().shutdown_requested
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().jobs.is_empty()
    }

    pub fn keyframes_received(&self) -> usize {
        self.state.lock().keyframes_received
    }

    /// Worker side: block until there is a job, or return None once shutdown was
    /// requested and the queue is empty.
    ///
    /// A matching legacy loop trigger takes precedence over the queue head.
    pub fn wait_next(&self, fused_count: usize) -> Option<MappingJob> {
        let mut state = self.state.lock();
        loop {
            if state.loop_trigger_at == Some(fused_count) {
                state.loop_trigger_at = None;
                return Some(MappingJob::LoopClosure(LoopEvent {
                    keyframes: state.known_keyframes.clone(),
                    trigger: LoopTrigger::FusedCount(fused_count),
                }));
            }
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.shutdown_requested {
                return None;
            }
            self.job_available.wait(&mut state);
        }
    }
}
