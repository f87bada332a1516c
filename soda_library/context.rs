//! Explicit dependencies shared by every sensor
//!
//! A [`SensorPipelineContext`] bundles the worker pool, the transport sink,
//! the simulation clock and the runtime parameters. Sensors receive it at
//! construction; nothing in the pipeline reaches for a global.

use crate::camera::CameraConfig;
use crate::messages::SensorReading;
use crate::publish::SensorPublishAdapter;
use crate::radar::RadarConfig;
use crate::ultrasonic::UltrasonicHubConfig;
use soda_core::communication::Publisher;
use soda_core::core::{Clock, SensorHeader, SystemClock};
use soda_core::error::SodaResult;
use soda_core::params::RuntimeParams;
use soda_core::scheduling::{
    AsyncTaskManager, DoubleBufferedTask, PipelineConfig, SensorProcessor,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct SensorPipelineContext {
    manager: Arc<AsyncTaskManager>,
    publisher: SensorPublishAdapter,
    clock: Arc<dyn Clock>,
    params: RuntimeParams,
}

impl SensorPipelineContext {
    /// Wrap an already running worker pool
    pub fn new(
        manager: Arc<AsyncTaskManager>,
        publisher: Arc<dyn Publisher<SensorReading>>,
    ) -> Self {
        Self {
            manager,
            publisher: SensorPublishAdapter::new(publisher),
            clock: Arc::new(SystemClock::new()),
            params: RuntimeParams::new(),
        }
    }

    /// Start a worker pool configured from the `pipeline.*` parameters
    pub fn start(
        params: RuntimeParams,
        publisher: Arc<dyn Publisher<SensorReading>>,
    ) -> SodaResult<Self> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            worker_threads: params.get_usize("pipeline.worker_threads", defaults.worker_threads),
            thread_name_prefix: params
                .get_string("pipeline.thread_name_prefix", &defaults.thread_name_prefix),
            skip_warn_every: params.get_or("pipeline.skip_warn_every", defaults.skip_warn_every),
        };
        let manager = AsyncTaskManager::start(config)?;
        Ok(Self::new(manager, publisher).with_params(params))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_params(mut self, params: RuntimeParams) -> Self {
        self.params = params;
        self
    }

    pub fn manager(&self) -> &Arc<AsyncTaskManager> {
        &self.manager
    }

    pub fn publisher(&self) -> &SensorPublishAdapter {
        &self.publisher
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn params(&self) -> &RuntimeParams {
        &self.params
    }

    /// `base` with the `radar.*` parameters applied
    pub fn radar_config(&self, base: RadarConfig) -> RadarConfig {
        base.with_params(&self.params)
    }

    /// `base` with the `camera.*` parameters applied
    pub fn camera_config(&self, base: CameraConfig) -> CameraConfig {
        base.with_params(&self.params)
    }

    /// `base` with the `ultrasonic.*` parameters applied
    pub fn ultrasonic_config(&self, base: UltrasonicHubConfig) -> UltrasonicHubConfig {
        base.with_params(&self.params)
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Register a processor with the worker pool
    pub fn spawn<P: SensorProcessor>(&self, name: &str, processor: P) -> SensorHandle<P> {
        tracing::info!("Activating sensor '{}'", name);
        SensorHandle {
            name: name.to_string(),
            task: DoubleBufferedTask::new(name, processor, self.manager.clone()),
            clock: self.clock.clone(),
            next_index: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stop the worker pool. Sensors should be finished first.
    pub fn shutdown(&self) {
        self.manager.stop();
    }
}

/// Producer side of one activated sensor
pub struct SensorHandle<P: SensorProcessor> {
    name: String,
    task: Arc<DoubleBufferedTask<P>>,
    clock: Arc<dyn Clock>,
    next_index: Arc<AtomicU64>,
}

impl<P: SensorProcessor> Clone for SensorHandle<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            task: self.task.clone(),
            clock: self.clock.clone(),
            next_index: self.next_index.clone(),
        }
    }
}

impl<P: SensorProcessor> SensorHandle<P> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task(&self) -> &Arc<DoubleBufferedTask<P>> {
        &self.task
    }

    /// Frames accepted so far
    pub fn submitted_frames(&self) -> u64 {
        self.next_index.load(Ordering::Relaxed)
    }

    /// Write and submit one frame.
    ///
    /// `fill` receives the front frame and a header stamped with the clock
    /// time and the next frame index. Returns `Ok(false)` when the frame
    /// was dropped because the previous one is still in flight.
    pub fn submit_frame<F>(&self, fill: F) -> SodaResult<bool>
    where
        F: FnOnce(&mut P::Frame, SensorHeader),
    {
        let Some(mut front) = self.task.lock_front()? else {
            return Ok(false);
        };
        let header = SensorHeader::new(
            self.name.clone(),
            self.next_index.load(Ordering::Relaxed),
            self.clock.now(),
        );
        fill(&mut *front, header);
        front.submit()?;
        self.next_index.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Block until the in-flight frame, if any, is processed
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.task.wait_idle(timeout)
    }

    /// Deactivate: wait for the running frame and release buffers
    pub fn finish(&self) {
        self.task.finish();
        tracing::info!(
            "Sensor '{}' finished: {} processed, {} skipped",
            self.name,
            self.task.processed_frames(),
            self.task.skipped_frames()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soda_core::communication::NullPublisher;
    use soda_core::core::ManualClock;

    #[derive(Default)]
    struct Frame {
        header: SensorHeader,
    }

    #[derive(Default)]
    struct Stamps {
        seen: Arc<parking_lot::Mutex<Vec<SensorHeader>>>,
    }

    impl SensorProcessor for Stamps {
        type Frame = Frame;

        fn process(&mut self, frame: &mut Frame) {
            self.seen.lock().push(frame.header.clone());
        }
    }

    #[test]
    fn test_sensor_configs_follow_params() {
        let params = RuntimeParams::new();
        params.set("pipeline.worker_threads", 1).unwrap();
        params.set("radar.objects_max_num", 12).unwrap();
        params.set("camera.max_depth_distance", 80.0).unwrap();
        params.set("ultrasonic.echos_max_num", 2).unwrap();
        let ctx = SensorPipelineContext::start(params, Arc::new(NullPublisher)).unwrap();

        assert_eq!(ctx.radar_config(RadarConfig::default()).objects_max_num, 12);
        assert_eq!(ctx.camera_config(CameraConfig::default()).max_depth_distance, 80.0);
        assert_eq!(ctx.ultrasonic_config(UltrasonicHubConfig::default()).echos_max_num, 2);
        ctx.shutdown();
    }

    #[test]
    fn test_headers_are_stamped() {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1)));
        let params = RuntimeParams::new();
        params.set("pipeline.worker_threads", 1).unwrap();
        let ctx = SensorPipelineContext::start(params, Arc::new(NullPublisher))
            .unwrap()
            .with_clock(clock.clone());
        assert_eq!(ctx.manager().num_workers(), 1);

        let stamps = Stamps::default();
        let seen = stamps.seen.clone();
        let sensor = ctx.spawn("stamps", stamps);

        for _ in 0..3 {
            assert!(sensor.submit_frame(|f, h| f.header = h).unwrap());
            assert!(sensor.wait_idle(Duration::from_secs(5)));
            clock.advance(Duration::from_millis(50));
        }
        sensor.finish();
        ctx.shutdown();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].frame_index, 2);
        assert_eq!(seen[2].sensor, "stamps");
        assert_eq!(seen[1].timestamp, Duration::from_millis(1050));
        assert_eq!(sensor.submitted_frames(), 3);
        assert!(sensor.submit_frame(|_, _| {}).is_err());
    }
}
