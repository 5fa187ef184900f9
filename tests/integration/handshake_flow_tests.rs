//! Full-session scenarios over in-process channels with a scripted engine.
//!
//! The test harness plays the Controller: it writes the filename notice and
//! trigger tokens, and reads the ready signal, while the driver runs the
//! Analyzer side end to end.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use scope_intercom::channel::memory::MemoryChannel;
use scope_intercom::channel::MessageChannel;
use scope_intercom::driver::review::AutoReviewGate;
use scope_intercom::driver::{Phase, SessionDriver};
use scope_intercom::engine::{
    AnalysisEngine, EngineFactory, InitSummary, RescoreSummary, StreamSummary,
};
use scope_intercom::session::SessionConfig;
use scope_intercom::{protocol, AppError, GlobalConfig, Result};

/// Shared call log so tests can assert which engine phases ran, in order.
type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, entry: impl Into<String>) {
    log.lock().expect("call log lock").push(entry.into());
}

fn logged(log: &CallLog) -> Vec<String> {
    log.lock().expect("call log lock").clone()
}

struct ScriptedEngine {
    log: CallLog,
    components: u32,
    fail_initialize: bool,
    fail_stream: bool,
}

impl AnalysisEngine for ScriptedEngine {
    fn initialize(&mut self) -> Pin<Box<dyn Future<Output = Result<InitSummary>> + Send + '_>> {
        Box::pin(async move {
            record(&self.log, "initialize");
            if self.fail_initialize {
                return Err(AppError::Engine("no components found".into()));
            }
            Ok(InitSummary {
                components: self.components,
            })
        })
    }

    fn rescore(
        &mut self,
        threshold: f64,
    ) -> Pin<Box<dyn Future<Output = Result<RescoreSummary>> + Send + '_>> {
        Box::pin(async move {
            record(&self.log, format!("rescore:{threshold}"));
            Ok(RescoreSummary {
                accepted: self.components,
                rejected: 0,
            })
        })
    }

    fn fit_online(&mut self) -> Pin<Box<dyn Future<Output = Result<StreamSummary>> + Send + '_>> {
        Box::pin(async move {
            record(&self.log, "stream");
            if self.fail_stream {
                return Err(AppError::Engine("frame decode failed mid-run".into()));
            }
            Ok(StreamSummary {
                frames_processed: 12_000,
                components: self.components,
            })
        })
    }
}

struct ScriptedFactory {
    log: CallLog,
    fail_initialize: bool,
    fail_stream: bool,
}

impl EngineFactory for ScriptedFactory {
    fn construct<'a>(
        &'a self,
        config: &'a SessionConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn AnalysisEngine>>> + Send + 'a>> {
        Box::pin(async move {
            record(
                &self.log,
                format!("construct:{}", config.movie_path().display()),
            );
            Ok(Box::new(ScriptedEngine {
                log: Arc::clone(&self.log),
                components: 1,
                fail_initialize: self.fail_initialize,
                fail_stream: self.fail_stream,
            }) as Box<dyn AnalysisEngine>)
        })
    }
}

fn test_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
results_dir = "/data/results"

[worker]
command = "unused-by-tests"

[params]
fr = 40.0
decay_time = 0.45
"#,
    )
    .expect("test config parses")
}

/// Build a driver wired to in-process channels and a scripted engine.
///
/// Returns the Controller's two channel ends, the engine call log, and the
/// driver itself.
fn harness(
    fail_initialize: bool,
    fail_stream: bool,
    review: AutoReviewGate,
) -> (MemoryChannel, MemoryChannel, CallLog, SessionDriver) {
    let (analyzer_rx, controller_tx) = MemoryChannel::pair();
    let (analyzer_tx, controller_rx) = MemoryChannel::pair();
    let log: CallLog = CallLog::default();

    let driver = SessionDriver::new(
        &test_config(),
        Box::new(analyzer_rx),
        Box::new(analyzer_tx),
        Arc::new(ScriptedFactory {
            log: Arc::clone(&log),
            fail_initialize,
            fail_stream,
        }),
        Box::new(review),
    );

    (controller_tx, controller_rx, log, driver)
}

#[tokio::test]
async fn full_session_reaches_done() {
    let (to_analyzer, from_analyzer, log, mut driver) =
        harness(false, false, AutoReviewGate::new(None));

    let driver_task = tokio::spawn(async move {
        let result = driver.run().await;
        (result, driver.phase())
    });

    to_analyzer.send_line("run42").await.expect("filename");
    to_analyzer
        .send_line(protocol::START_INIT_PROCESS)
        .await
        .expect("init trigger");

    let ready = from_analyzer.recv_line().await.expect("ready signal");
    assert_eq!(ready, protocol::START_STREAM_ACQUISITION);

    to_analyzer
        .send_line(protocol::START_STREAM_ANALYSIS)
        .await
        .expect("stream trigger");

    let (result, phase) = driver_task.await.expect("driver task");
    let summary = result.expect("session succeeds");
    assert_eq!(summary.frames_processed, 12_000);
    assert_eq!(summary.components, 1);
    assert_eq!(phase, Phase::Done);

    // Classifier enabled by default, so the review pass re-scores once at
    // the configured near-zero threshold before the ready signal goes out.
    assert_eq!(
        logged(&log),
        vec![
            "construct:/data/results/run42/run42_MMStack_Default.ome.tif".to_owned(),
            "initialize".to_owned(),
            "rescore:0.00001".to_owned(),
            "stream".to_owned(),
        ]
    );
}

#[tokio::test]
async fn wrong_init_trigger_terminates_without_initializing() {
    let (to_analyzer, _from_analyzer, log, mut driver) =
        harness(false, false, AutoReviewGate::new(None));

    let driver_task = tokio::spawn(async move {
        let result = driver.run().await;
        (result, driver.phase())
    });

    to_analyzer.send_line("run42").await.expect("filename");
    to_analyzer.send_line("wrongToken").await.expect("send");

    let (result, phase) = driver_task.await.expect("driver task");
    let err = result.expect_err("violation is fatal");
    assert!(matches!(err, AppError::Protocol(_)), "got: {err}");
    assert_eq!(phase, Phase::Configured);

    let calls = logged(&log);
    assert!(
        !calls.iter().any(|c| c == "initialize"),
        "initialization must not run after a violation: {calls:?}"
    );
}

#[tokio::test]
async fn case_mismatched_trigger_is_rejected() {
    let (to_analyzer, _from_analyzer, log, mut driver) =
        harness(false, false, AutoReviewGate::new(None));

    let driver_task = tokio::spawn(async move { driver.run().await });

    to_analyzer.send_line("run42").await.expect("filename");
    to_analyzer.send_line("startinitprocess").await.expect("send");

    let err = driver_task
        .await
        .expect("driver task")
        .expect_err("case mismatch is fatal");
    assert!(matches!(err, AppError::Protocol(_)), "got: {err}");
    assert!(!logged(&log).iter().any(|c| c == "initialize"));
}

#[tokio::test]
async fn driver_blocks_until_the_controller_writes() {
    let (_to_analyzer, _from_analyzer, log, mut driver) =
        harness(false, false, AutoReviewGate::new(None));

    let mut driver_task = tokio::spawn(async move { driver.run().await });

    let waited =
        tokio::time::timeout(std::time::Duration::from_millis(100), &mut driver_task).await;
    assert!(waited.is_err(), "driver must stay blocked on the filename");
    assert!(logged(&log).is_empty(), "no engine phase may run early");

    driver_task.abort();
}

#[tokio::test]
async fn revised_review_threshold_rescored_before_streaming() {
    let (to_analyzer, from_analyzer, log, mut driver) =
        harness(false, false, AutoReviewGate::new(Some(0.2)));

    let driver_task = tokio::spawn(async move { driver.run().await });

    to_analyzer.send_line("run42").await.expect("filename");
    to_analyzer
        .send_line(protocol::START_INIT_PROCESS)
        .await
        .expect("init trigger");
    let _ready = from_analyzer.recv_line().await.expect("ready signal");
    to_analyzer
        .send_line(protocol::START_STREAM_ANALYSIS)
        .await
        .expect("stream trigger");

    driver_task
        .await
        .expect("driver task")
        .expect("session succeeds");

    let calls = logged(&log);
    assert!(calls.iter().any(|c| c == "rescore:0.00001"));
    assert!(calls.iter().any(|c| c == "rescore:0.2"));
}

#[tokio::test]
async fn initialization_failure_is_fatal() {
    let (to_analyzer, _from_analyzer, _log, mut driver) =
        harness(true, false, AutoReviewGate::new(None));

    let driver_task = tokio::spawn(async move {
        let result = driver.run().await;
        (result, driver.phase())
    });

    to_analyzer.send_line("run42").await.expect("filename");
    to_analyzer
        .send_line(protocol::START_INIT_PROCESS)
        .await
        .expect("init trigger");

    let (result, phase) = driver_task.await.expect("driver task");
    let err = result.expect_err("init failure is fatal");
    assert!(matches!(err, AppError::Init(_)), "got: {err}");
    assert_eq!(phase, Phase::Configured);
}

#[tokio::test]
async fn streaming_failure_is_fatal() {
    let (to_analyzer, from_analyzer, _log, mut driver) =
        harness(false, true, AutoReviewGate::new(None));

    let driver_task = tokio::spawn(async move {
        let result = driver.run().await;
        (result, driver.phase())
    });

    to_analyzer.send_line("run42").await.expect("filename");
    to_analyzer
        .send_line(protocol::START_INIT_PROCESS)
        .await
        .expect("init trigger");
    let _ready = from_analyzer.recv_line().await.expect("ready signal");
    to_analyzer
        .send_line(protocol::START_STREAM_ANALYSIS)
        .await
        .expect("stream trigger");

    let (result, phase) = driver_task.await.expect("driver task");
    let err = result.expect_err("stream failure is fatal");
    assert!(matches!(err, AppError::Streaming(_)), "got: {err}");
    assert_eq!(phase, Phase::Streaming);
}

#[tokio::test]
async fn traversal_session_id_aborts_before_configuration() {
    let (to_analyzer, _from_analyzer, log, mut driver) =
        harness(false, false, AutoReviewGate::new(None));

    let driver_task = tokio::spawn(async move { driver.run().await });

    to_analyzer.send_line("../escape").await.expect("send");

    let err = driver_task
        .await
        .expect("driver task")
        .expect_err("traversal id is fatal");
    assert!(matches!(err, AppError::Protocol(_)), "got: {err}");
    assert!(logged(&log).is_empty(), "engine must never be constructed");
}
