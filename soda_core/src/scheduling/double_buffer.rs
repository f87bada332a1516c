//! Front/back buffered sensor task
//!
//! The producer (render or physics tick) owns the *front* frame, the worker
//! pool owns the *back* frame. Submitting the front swaps the two roles and
//! triggers the pool. A frame is dropped rather than queued when the
//! previous one is still in flight, so at most one frame per sensor is ever
//! executing and the producer never waits for a worker.
//!
//! ```text
//! FrontWritable --lock_front--> FrontLocked --submit--> Swapped
//!       ^                                                  |
//!       |                                               worker
//!       |                                                  v
//!   BackDone <------------------ process --------- BackExecuting
//! ```

use super::task_manager::{AsyncTaskManager, PipelineJob};
use crate::error::{SodaError, SodaResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sensor-specific work executed on the back frame.
///
/// The processor is only ever touched by the worker that executes the
/// current back frame, so state that must survive across ticks (trackers,
/// round-robin counters) lives here rather than in the frames.
pub trait SensorProcessor: Send + 'static {
    /// Data the producer writes into the front buffer
    type Frame: Default + Send + 'static;

    /// Turn one captured frame into a reading and publish it
    fn process(&mut self, frame: &mut Self::Frame);

    /// Called once when the owning pipeline finishes
    fn on_finish(&mut self) {}
}

/// Hand-off state of a task pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing in flight; the producer may lock the front
    FrontWritable,
    /// The producer is writing the front frame
    FrontLocked,
    /// Front and back were swapped; a trigger is queued
    Swapped,
    /// A worker is processing the back frame
    BackExecuting,
    /// The last back frame finished; the front is writable again
    BackDone,
}

impl PipelineState {
    /// True when no frame is in flight
    pub fn is_idle(self) -> bool {
        matches!(self, PipelineState::FrontWritable | PipelineState::BackDone)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::FrontWritable => "FrontWritable",
            PipelineState::FrontLocked => "FrontLocked",
            PipelineState::Swapped => "Swapped",
            PipelineState::BackExecuting => "BackExecuting",
            PipelineState::BackDone => "BackDone",
        };
        write!(f, "{}", s)
    }
}

struct Control {
    state: PipelineState,
    /// Slot index currently acting as the front frame
    front: usize,
    finished: bool,
}

/// Double-buffered task driving one sensor's processor
pub struct DoubleBufferedTask<P: SensorProcessor> {
    name: String,
    slots: [Mutex<P::Frame>; 2],
    processor: Mutex<P>,
    control: Mutex<Control>,
    idle: Condvar,
    manager: Arc<AsyncTaskManager>,
    skipped: AtomicU64,
    processed: AtomicU64,
    skip_warn_every: u64,
}

impl<P: SensorProcessor> DoubleBufferedTask<P> {
    pub fn new(name: &str, processor: P, manager: Arc<AsyncTaskManager>) -> Arc<Self> {
        let skip_warn_every = manager.config().skip_warn_every.max(1);
        Arc::new(Self {
            name: name.to_string(),
            slots: [Mutex::new(P::Frame::default()), Mutex::new(P::Frame::default())],
            processor: Mutex::new(processor),
            control: Mutex::new(Control {
                state: PipelineState::FrontWritable,
                front: 0,
                finished: false,
            }),
            idle: Condvar::new(),
            manager,
            skipped: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            skip_warn_every,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock the front frame for writing.
    ///
    /// Returns `Ok(None)` and counts a skipped frame when the previous frame
    /// is still being processed. Fails once the pipeline is finished.
    pub fn lock_front(self: &Arc<Self>) -> SodaResult<Option<FrontGuard<'_, P>>> {
        let front = {
            let mut ctl = self.control.lock();
            if ctl.finished {
                return Err(SodaError::PipelineFinished(self.name.clone()));
            }
            let state = ctl.state;
            match state {
                PipelineState::FrontWritable | PipelineState::BackDone => {
                    ctl.state = PipelineState::FrontLocked;
                    ctl.front
                }
                PipelineState::FrontLocked => {
                    tracing::debug!("[{}] front already locked by the producer", self.name);
                    return Ok(None);
                }
                PipelineState::Swapped | PipelineState::BackExecuting => {
                    drop(ctl);
                    self.note_skipped();
                    return Ok(None);
                }
            }
        };

        Ok(Some(FrontGuard {
            task: self,
            frame: Some(self.slots[front].lock()),
        }))
    }

    /// Release the front frame, swap roles and trigger the worker pool
    pub fn unlock_front(self: &Arc<Self>, guard: FrontGuard<'_, P>) -> SodaResult<()> {
        guard.submit()
    }

    fn note_skipped(&self) {
        let n = self.skipped.fetch_add(1, Ordering::AcqRel) + 1;
        if n == 1 || n % self.skip_warn_every == 0 {
            tracing::warn!("[{}] Skipped one frame ({} skipped so far)", self.name, n);
        }
    }

    fn commit(self: &Arc<Self>) -> SodaResult<()> {
        {
            let mut ctl = self.control.lock();
            if ctl.finished {
                ctl.state = PipelineState::FrontWritable;
                self.idle.notify_all();
                return Err(SodaError::PipelineFinished(self.name.clone()));
            }
            ctl.front = 1 - ctl.front;
            ctl.state = PipelineState::Swapped;
        }

        let job: Arc<dyn PipelineJob> = self.clone();
        if let Err(e) = self.manager.enqueue(job) {
            let mut ctl = self.control.lock();
            ctl.state = PipelineState::BackDone;
            self.idle.notify_all();
            return Err(e);
        }
        Ok(())
    }

    fn abandon(&self) {
        let mut ctl = self.control.lock();
        if ctl.state == PipelineState::FrontLocked {
            ctl.state = PipelineState::FrontWritable;
            self.idle.notify_all();
        }
    }

    fn mark_done(&self) {
        let mut ctl = self.control.lock();
        ctl.state = PipelineState::BackDone;
        self.idle.notify_all();
    }

    /// Current hand-off state
    pub fn state(&self) -> PipelineState {
        self.control.lock().state
    }

    /// True when the last submitted frame has been fully processed
    pub fn is_done(&self) -> bool {
        self.state().is_idle()
    }

    pub fn is_finished(&self) -> bool {
        self.control.lock().finished
    }

    /// Frames dropped because the previous one was still in flight
    pub fn skipped_frames(&self) -> u64 {
        self.skipped.load(Ordering::Acquire)
    }

    /// Frames processed to completion
    pub fn processed_frames(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    /// Block until nothing is in flight or the timeout elapses
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ctl = self.control.lock();
        while !ctl.state.is_idle() && ctl.state != PipelineState::FrontLocked {
            if self.idle.wait_until(&mut ctl, deadline).timed_out() {
                return ctl.state.is_idle();
            }
        }
        ctl.state.is_idle()
    }

    /// Stop the pipeline.
    ///
    /// Blocks until a frame currently being processed completes, discards a
    /// frame that was queued but not started, and releases both buffers.
    /// Later calls to [`lock_front`](Self::lock_front) fail. Idempotent.
    pub fn finish(&self) {
        {
            let mut ctl = self.control.lock();
            if ctl.finished {
                return;
            }
            ctl.finished = true;
            while ctl.state == PipelineState::BackExecuting {
                self.idle.wait(&mut ctl);
            }
        }

        for slot in &self.slots {
            // A producer still holding the front keeps its buffer until it drops the guard
            if let Some(mut frame) = slot.try_lock() {
                *frame = P::Frame::default();
            }
        }
        self.processor.lock().on_finish();

        tracing::info!(
            "[{}] pipeline finished: {} processed, {} skipped",
            self.name,
            self.processed_frames(),
            self.skipped_frames()
        );
    }

    /// Run a closure with shared access to the processor.
    ///
    /// Blocks while a worker is processing; intended for inspection from
    /// tests and diagnostics, not for the per-tick path.
    pub fn with_processor<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.processor.lock())
    }
}

impl<P: SensorProcessor> PipelineJob for DoubleBufferedTask<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self) {
        let back = {
            let mut ctl = self.control.lock();
            if ctl.state != PipelineState::Swapped {
                return;
            }
            if ctl.finished {
                ctl.state = PipelineState::BackDone;
                self.idle.notify_all();
                return;
            }
            ctl.state = PipelineState::BackExecuting;
            1 - ctl.front
        };

        // Marks the task done even if the processor panics
        let _done = DoneGuard { task: self };
        let mut frame = self.slots[back].lock();
        let mut processor = self.processor.lock();
        processor.process(&mut frame);
        self.processed.fetch_add(1, Ordering::AcqRel);
    }
}

impl<P: SensorProcessor> fmt::Debug for DoubleBufferedTask<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoubleBufferedTask")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("processed", &self.processed_frames())
            .field("skipped", &self.skipped_frames())
            .finish()
    }
}

impl<P: SensorProcessor> Drop for DoubleBufferedTask<P> {
    fn drop(&mut self) {
        let finished = self.control.get_mut().finished;
        if !finished {
            tracing::debug!("[{}] dropped without finish()", self.name);
        }
    }
}

struct DoneGuard<'a, P: SensorProcessor> {
    task: &'a DoubleBufferedTask<P>,
}

impl<P: SensorProcessor> Drop for DoneGuard<'_, P> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("[{}] processor panicked; frame discarded", self.task.name);
        }
        self.task.mark_done();
    }
}

/// Write access to the front frame.
///
/// Call [`FrontGuard::submit`] to hand the frame to the workers. Dropping
/// the guard without submitting abandons the frame.
pub struct FrontGuard<'a, P: SensorProcessor> {
    task: &'a Arc<DoubleBufferedTask<P>>,
    frame: Option<MutexGuard<'a, P::Frame>>,
}

impl<'a, P: SensorProcessor> FrontGuard<'a, P> {
    /// Release the front frame, swap roles and trigger the worker pool
    pub fn submit(mut self) -> SodaResult<()> {
        // Release the slot before the swap makes it the back frame
        self.frame.take();
        self.task.commit()
    }
}

impl<P: SensorProcessor> Deref for FrontGuard<'_, P> {
    type Target = P::Frame;

    fn deref(&self) -> &P::Frame {
        self.frame
            .as_deref()
            .unwrap_or_else(|| unreachable!("front frame accessed after submit"))
    }
}

impl<P: SensorProcessor> DerefMut for FrontGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut P::Frame {
        self.frame
            .as_deref_mut()
            .unwrap_or_else(|| unreachable!("front frame accessed after submit"))
    }
}

impl<P: SensorProcessor> Drop for FrontGuard<'_, P> {
    fn drop(&mut self) {
        if self.frame.take().is_some() {
            self.task.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::PipelineConfig;
    use crossbeam::channel::{self, Receiver, Sender};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Frame {
        value: u32,
    }

    struct Recorder {
        seen: Arc<Mutex<Vec<u32>>>,
    }

    impl SensorProcessor for Recorder {
        type Frame = Frame;

        fn process(&mut self, frame: &mut Frame) {
            self.seen.lock().push(frame.value);
        }
    }

    /// Blocks inside `process` until the test sends a release token
    struct Gated {
        release: Receiver<()>,
        running: Arc<AtomicUsize>,
        max_running: Arc<AtomicUsize>,
    }

    impl SensorProcessor for Gated {
        type Frame = Frame;

        fn process(&mut self, _frame: &mut Frame) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            let _ = self.release.recv_timeout(Duration::from_secs(5));
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn gated(manager: Arc<AsyncTaskManager>) -> (Arc<DoubleBufferedTask<Gated>>, Sender<()>, Arc<AtomicUsize>) {
        let (tx, rx) = channel::unbounded();
        let max_running = Arc::new(AtomicUsize::new(0));
        let task = DoubleBufferedTask::new(
            "gated",
            Gated {
                release: rx,
                running: Arc::new(AtomicUsize::new(0)),
                max_running: max_running.clone(),
            },
            manager,
        );
        (task, tx, max_running)
    }

    fn submit(task: &Arc<DoubleBufferedTask<Recorder>>, value: u32) -> bool {
        match task.lock_front().unwrap() {
            Some(mut front) => {
                front.value = value;
                front.submit().unwrap();
                true
            }
            None => false,
        }
    }

    #[test]
    fn test_frames_processed_in_order() {
        let manager = AsyncTaskManager::start(PipelineConfig::default().with_threads(4)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let task = DoubleBufferedTask::new("recorder", Recorder { seen: seen.clone() }, manager);

        for i in 0..20 {
            assert!(task.wait_idle(Duration::from_secs(5)));
            assert!(submit(&task, i));
        }
        assert!(task.wait_idle(Duration::from_secs(5)));

        assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
        assert_eq!(task.processed_frames(), 20);
        assert_eq!(task.skipped_frames(), 0);
    }

    #[test]
    fn test_one_skip_per_overrun_tick() {
        let manager = AsyncTaskManager::start(PipelineConfig::default().with_threads(4)).unwrap();
        let (task, release, max_running) = gated(manager);

        let front = task.lock_front().unwrap().unwrap();
        front.submit().unwrap();

        // Producer keeps ticking while the worker is stuck
        for tick in 1..=5u64 {
            assert!(task.lock_front().unwrap().is_none());
            assert_eq!(task.skipped_frames(), tick);
        }

        release.send(()).unwrap();
        assert!(task.wait_idle(Duration::from_secs(5)));

        let front = task.lock_front().unwrap().unwrap();
        front.submit().unwrap();
        release.send(()).unwrap();
        assert!(task.wait_idle(Duration::from_secs(5)));

        assert_eq!(task.processed_frames(), 2);
        assert_eq!(task.skipped_frames(), 5);
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_abandoned_front_is_writable_again() {
        let manager = AsyncTaskManager::start(PipelineConfig::single_threaded()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let task = DoubleBufferedTask::new("recorder", Recorder { seen: seen.clone() }, manager);

        {
            let mut front = task.lock_front().unwrap().unwrap();
            front.value = 99;
            assert_eq!(task.state(), PipelineState::FrontLocked);
        }
        assert_eq!(task.state(), PipelineState::FrontWritable);
        assert!(submit(&task, 1));
        assert!(task.wait_idle(Duration::from_secs(5)));
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn test_finish_waits_for_running_frame() {
        let manager = AsyncTaskManager::start(PipelineConfig::single_threaded()).unwrap();
        let (task, release, _) = gated(manager);

        task.lock_front().unwrap().unwrap().submit().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while task.state() != PipelineState::BackExecuting && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(task.state(), PipelineState::BackExecuting);

        let finisher = {
            let task = task.clone();
            std::thread::spawn(move || task.finish())
        };
        std::thread::sleep(Duration::from_millis(20));
        assert!(!finisher.is_finished());

        release.send(()).unwrap();
        finisher.join().unwrap();

        assert!(task.is_finished());
        assert_eq!(task.processed_frames(), 1);
        assert!(matches!(task.lock_front(), Err(SodaError::PipelineFinished(_))));
        // idempotent
        task.finish();
    }

    #[test]
    fn test_submit_after_pool_stopped_reports_error() {
        let manager = AsyncTaskManager::start(PipelineConfig::single_threaded()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let task = DoubleBufferedTask::new("recorder", Recorder { seen }, manager.clone());
        manager.stop();

        let front = task.lock_front().unwrap().unwrap();
        assert!(matches!(front.submit(), Err(SodaError::PoolStopped)));
        assert!(task.is_done());
    }

    struct Exploding;

    impl SensorProcessor for Exploding {
        type Frame = Frame;

        fn process(&mut self, _frame: &mut Frame) {
            panic!("processor failure");
        }
    }

    #[test]
    fn test_panicking_processor_does_not_wedge() {
        let manager = AsyncTaskManager::start(PipelineConfig::single_threaded()).unwrap();
        let task = DoubleBufferedTask::new("exploding", Exploding, manager);
        task.lock_front().unwrap().unwrap().submit().unwrap();
        assert!(task.wait_idle(Duration::from_secs(5)));
        assert_eq!(task.processed_frames(), 0);
        task.finish();
    }
}
