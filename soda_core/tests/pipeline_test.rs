// Pool, double-buffered tasks and publishers working together
use soda_core::communication::{ChannelPublisher, Publisher};
use soda_core::error::SodaError;
use soda_core::params::RuntimeParams;
use soda_core::scheduling::{AsyncTaskManager, DoubleBufferedTask, PipelineConfig, SensorProcessor};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Frame {
    samples: Vec<u32>,
}

/// Sums each frame and publishes the total
struct Summer {
    out: Arc<dyn Publisher<(String, u32)>>,
    name: String,
}

impl SensorProcessor for Summer {
    type Frame = Frame;

    fn process(&mut self, frame: &mut Frame) {
        let total = frame.samples.iter().sum();
        self.out.try_send((self.name.clone(), total));
    }
}

#[test]
fn test_sensors_share_one_pool() {
    let pool = AsyncTaskManager::start(PipelineConfig::default().with_threads(2)).unwrap();
    let (tx, rx) = ChannelPublisher::unbounded("totals");
    let out: Arc<dyn Publisher<(String, u32)>> = Arc::new(tx);

    let sensors: Vec<_> = ["lidar", "radar", "camera"]
        .iter()
        .map(|name| {
            DoubleBufferedTask::new(
                name,
                Summer {
                    out: out.clone(),
                    name: name.to_string(),
                },
                pool.clone(),
            )
        })
        .collect();

    for tick in 0..10u32 {
        for sensor in &sensors {
            assert!(sensor.wait_idle(Duration::from_secs(5)));
            let mut front = sensor.lock_front().unwrap().expect("idle sensor accepts a frame");
            front.samples.clear();
            front.samples.extend([tick, tick, 1]);
            front.submit().unwrap();
        }
    }
    for sensor in &sensors {
        assert!(sensor.wait_idle(Duration::from_secs(5)));
        sensor.finish();
        assert_eq!(sensor.processed_frames(), 10);
        assert_eq!(sensor.skipped_frames(), 0);
    }
    pool.stop();

    let totals: Vec<(String, u32)> = rx.try_iter().collect();
    assert_eq!(totals.len(), 30);
    let radar: Vec<u32> = totals
        .iter()
        .filter(|(name, _)| name == "radar")
        .map(|(_, t)| *t)
        .collect();
    assert_eq!(radar, (0..10).map(|t| 2 * t + 1).collect::<Vec<_>>());
    assert_eq!(pool.executed_jobs(), 30);
}

#[test]
fn test_pool_config_from_params_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.yaml");
    std::fs::write(
        &path,
        "pipeline:\n  worker_threads: 3\n  thread_name_prefix: sim\n  skip_warn_every: 10\n",
    )
    .unwrap();

    let params = RuntimeParams::from_file(&path).unwrap();
    let config: PipelineConfig = params.require("pipeline").unwrap();
    assert_eq!(config.worker_threads, 3);
    assert_eq!(config.thread_name_prefix, "sim");

    let pool = AsyncTaskManager::start(config).unwrap();
    assert_eq!(pool.num_workers(), 3);
    pool.stop();
    assert!(!pool.is_running());
}

#[test]
fn test_finished_pipeline_rejects_frames() {
    let pool = AsyncTaskManager::start(PipelineConfig::single_threaded()).unwrap();
    let (tx, _rx) = ChannelPublisher::unbounded("totals");
    let task = DoubleBufferedTask::new(
        "late",
        Summer {
            out: Arc::new(tx),
            name: "late".into(),
        },
        pool.clone(),
    );
    task.finish();
    assert!(matches!(task.lock_front(), Err(SodaError::PipelineFinished(_))));
    pool.stop();
}
