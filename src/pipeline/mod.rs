//! Hand-off of snapshots from the ingest thread to the renderer.
//!
//! One mutex-guarded state machine shared by three threads:
//!
//! * the producer takes the single build permit, builds a snapshot and
//!   appends it;
//! * the pacer posts one pacing token per refresh interval;
//! * the renderer waits for a token and a queued snapshot, renders it, and
//!   dropping the [`Frame`] hands the build permit back to the producer.
//!
//! At any time exactly one of these holds the permit: the pool, a producer
//! mid-build, the queue, or the renderer. Pause blocks the pacer and the
//! renderer without discarding queued snapshots. Cancellation wakes every
//! waiter and makes all blocking calls return `None`/`false`.

pub mod pacer;
pub mod renderer;

use std::collections::VecDeque;
use std::ops::Deref;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;

use crate::system::snapshot::Snapshot;

pub use pacer::run_pacer;
pub use renderer::{DisplaySink, run_renderer};

#[derive(Debug)]
struct PipelineState {
    build_permits: u8,
    building: bool,
    queue: VecDeque<(u64, Snapshot)>,
    in_flight: bool,
    appended: u64,
    rendered: u64,
    pacing_tokens: u8,
    bootstrapped: bool,
    paused: bool,
    cancelled: bool,
}

/// Counters observed under the pipeline lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineStats {
    pub build_permits: u8,
    pub building: bool,
    pub queued: usize,
    pub in_flight: bool,
    pub appended: u64,
    pub rendered: u64,
    pub pacing_tokens: u8,
    pub bootstrapped: bool,
    pub paused: bool,
    pub cancelled: bool,
}

impl PipelineStats {
    /// Every holder of the build permit, counted once.
    pub fn permit_holders(&self) -> usize {
        usize::from(self.build_permits)
            + usize::from(self.building)
            + self.queued
            + usize::from(self.in_flight)
    }
}

#[derive(Debug)]
pub struct Pipeline {
    state: Mutex<PipelineState>,
    changed: Condvar,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline {
            state: Mutex::new(PipelineState {
                build_permits: 1,
                building: false,
                queue: VecDeque::new(),
                in_flight: false,
                appended: 0,
                rendered: 0,
                pacing_tokens: 0,
                bootstrapped: false,
                paused: false,
                cancelled: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock()
    }

    fn notify(&self) {
        self.changed.notify_all();
    }

    /// Block until the build permit is free. `None` once cancelled.
    pub fn acquire_build_permit(&self) -> Option<BuildPermit<'_>> {
        let mut state = self.lock();
        while state.build_permits == 0 && !state.cancelled {
            self.changed.wait(&mut state);
        }
        if state.cancelled {
            return None;
        }
        state.build_permits -= 1;
        state.building = true;
        Some(BuildPermit { pipeline: self })
    }

    /// Non-blocking variant of [`Pipeline::acquire_build_permit`].
    pub fn try_acquire_build_permit(&self) -> Option<BuildPermit<'_>> {
        let mut state = self.lock();
        if state.cancelled || state.build_permits == 0 {
            return None;
        }
        state.build_permits -= 1;
        state.building = true;
        Some(BuildPermit { pipeline: self })
    }

    /// Block until the first snapshot has been appended. `false` when
    /// cancelled first.
    pub fn wait_bootstrap(&self) -> bool {
        let mut state = self.lock();
        while !state.bootstrapped && !state.cancelled {
            self.changed.wait(&mut state);
        }
        !state.cancelled
    }

    /// Block until a pacing token and a snapshot are available and the
    /// pipeline is not paused. `None` once cancelled.
    pub fn next_frame(&self) -> Option<Frame<'_>> {
        let mut state = self.lock();
        loop {
            if state.cancelled {
                return None;
            }
            if !state.paused
                && state.pacing_tokens > 0
                && let Some((index, snapshot)) = state.queue.pop_front()
            {
                state.pacing_tokens -= 1;
                state.in_flight = true;
                return Some(Frame {
                    pipeline: self,
                    index,
                    snapshot,
                });
            }
            self.changed.wait(&mut state);
        }
    }

    /// At most one token is banked; a renderer that fell behind does not
    /// get to burst.
    pub fn post_pacing_token(&self) {
        let mut state = self.lock();
        state.pacing_tokens = 1;
        drop(state);
        self.notify();
    }

    /// Sleep for `interval`, waking early on cancellation. Returns `false`
    /// when cancelled.
    pub fn sleep_interval(&self, interval: Duration) -> bool {
        // an interval past the clock's range waits for cancel only
        let deadline = Instant::now().checked_add(interval);
        let mut state = self.lock();
        while !state.cancelled {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
        !state.cancelled
    }

    /// Block while paused. Returns `false` when cancelled.
    pub fn wait_while_paused(&self) -> bool {
        let mut state = self.lock();
        while state.paused && !state.cancelled {
            self.changed.wait(&mut state);
        }
        !state.cancelled
    }

    pub fn pause(&self) {
        self.set_paused(true);
    }

    pub fn resume(&self) {
        self.set_paused(false);
    }

    /// Flip the pause state, returning the new one.
    pub fn toggle_pause(&self) -> bool {
        let mut state = self.lock();
        state.paused = !state.paused;
        let paused = state.paused;
        drop(state);
        self.notify();
        debug!(paused, "pipeline pause toggled");
        paused
    }

    fn set_paused(&self, paused: bool) {
        self.lock().paused = paused;
        self.notify();
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Stop every loop. Queued snapshots are discarded and their permit
    /// returned; a frame being rendered returns its permit when dropped.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if !state.cancelled {
            state.cancelled = true;
            let drained = state.queue.len();
            state.queue.clear();
            state.build_permits += u8::try_from(drained).unwrap_or(u8::MAX);
            debug!(drained, "pipeline cancelled");
        }
        drop(state);
        self.notify();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn stats(&self) -> PipelineStats {
        let state = self.lock();
        PipelineStats {
            build_permits: state.build_permits,
            building: state.building,
            queued: state.queue.len(),
            in_flight: state.in_flight,
            appended: state.appended,
            rendered: state.rendered,
            pacing_tokens: state.pacing_tokens,
            bootstrapped: state.bootstrapped,
            paused: state.paused,
            cancelled: state.cancelled,
        }
    }

    fn release_from_build(&self, state: &mut PipelineState) {
        assert!(state.building, "build permit released twice");
        state.building = false;
        state.build_permits += 1;
        assert!(state.build_permits == 1, "more than one build permit");
    }

    fn release_from_frame(&self) {
        let mut state = self.lock();
        assert!(state.in_flight, "build permit released twice");
        state.in_flight = false;
        state.rendered += 1;
        state.build_permits += 1;
        assert!(state.build_permits == 1, "more than one build permit");
        drop(state);
        self.notify();
    }
}

/// Right to build and append one snapshot. Dropped without appending, the
/// permit goes back to the pool.
#[derive(Debug)]
#[must_use = "dropping the permit without appending releases it"]
pub struct BuildPermit<'a> {
    pipeline: &'a Pipeline,
}

impl BuildPermit<'_> {
    /// Queue `snapshot` for rendering and return its append index. The
    /// permit travels with the snapshot.
    pub fn append(self, snapshot: Snapshot) -> u64 {
        let pipeline = self.pipeline;
        std::mem::forget(self);

        let mut state = pipeline.lock();
        assert!(state.building, "append without a build permit");
        state.building = false;
        let index = state.appended;
        state.appended += 1;
        if state.cancelled {
            state.build_permits += 1;
        } else {
            state.queue.push_back((index, snapshot));
            state.bootstrapped = true;
        }
        drop(state);
        pipeline.notify();
        index
    }
}

impl Drop for BuildPermit<'_> {
    fn drop(&mut self) {
        let mut state = self.pipeline.lock();
        self.pipeline.release_from_build(&mut state);
        drop(state);
        self.pipeline.notify();
    }
}

/// A snapshot taken off the queue. Dropping it hands the build permit back
/// to the producer.
#[derive(Debug)]
pub struct Frame<'a> {
    pipeline: &'a Pipeline,
    index: u64,
    snapshot: Snapshot,
}

impl Frame<'_> {
    pub fn index(&self) -> u64 {
        self.index
    }
}

impl Deref for Frame<'_> {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.pipeline.release_from_frame();
    }
}
