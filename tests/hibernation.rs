// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use dpu_hibernation::camera::CameraActivity;
use dpu_hibernation::event_log::HibernationEvent;
use dpu_hibernation::pipeline::DisplayLink;
use dpu_hibernation::pipeline::DisplayPipeline;
use dpu_hibernation::pipeline::PipelineState;
use dpu_hibernation::pipeline::RuntimePower;
use dpu_hibernation::pipeline::Writeback;
use dpu_hibernation::CameraOperationConfig;
use dpu_hibernation::Error;
use dpu_hibernation::ExitStatus;
use dpu_hibernation::Hibernation;
use dpu_hibernation::HibernationConfig;
use dpu_hibernation::HibernationState;
use sync::Mutex;

const ENTER_SEQUENCE: [&str; 5] = [
    "writeback_enter",
    "pipeline_enter",
    "enter_ulps",
    "release_bandwidth",
    "put_sync",
];

const EXIT_SEQUENCE: [&str; 4] = ["get_sync", "exit_ulps", "pipeline_exit", "writeback_exit"];

type CallLog = Arc<Mutex<Vec<&'static str>>>;

// Lets a test hold the entry worker inside `put_sync`.
struct Gate {
    entered: Sender<()>,
    release: Mutex<Receiver<()>>,
}

struct MockPower {
    calls: CallLog,
    // The driver holds one reference while the pipeline is on.
    refs: AtomicI32,
    gate: Mutex<Option<Gate>>,
}

impl RuntimePower for MockPower {
    fn get_sync(&self) -> anyhow::Result<()> {
        self.calls.lock().push("get_sync");
        self.refs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn put_sync(&self) -> anyhow::Result<()> {
        self.calls.lock().push("put_sync");
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.entered.send(()).unwrap();
            gate.release.lock().recv().unwrap();
        }
        self.refs.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.refs.load(Ordering::SeqCst) > 0
    }
}

struct MockWriteback {
    calls: CallLog,
    fail: AtomicBool,
}

impl Writeback for MockWriteback {
    fn enter_hibernation(&self) -> anyhow::Result<()> {
        self.calls.lock().push("writeback_enter");
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("writeback busy"));
        }
        Ok(())
    }

    fn exit_hibernation(&self) -> anyhow::Result<()> {
        self.calls.lock().push("writeback_exit");
        Ok(())
    }
}

struct MockLink {
    calls: CallLog,
}

impl DisplayLink for MockLink {
    fn enter_ulps(&self) -> anyhow::Result<()> {
        self.calls.lock().push("enter_ulps");
        Ok(())
    }

    fn exit_ulps(&self) -> anyhow::Result<()> {
        self.calls.lock().push("exit_ulps");
        Ok(())
    }
}

struct MockPipeline {
    calls: CallLog,
    fps: AtomicU32,
    state: Mutex<PipelineState>,
    fail_enter: AtomicBool,
    writeback: Option<Arc<MockWriteback>>,
    link: Option<Arc<MockLink>>,
    power: MockPower,
}

impl MockPipeline {
    fn new(fps: u32) -> Arc<MockPipeline> {
        MockPipeline::build(fps, true)
    }

    fn without_outputs(fps: u32) -> Arc<MockPipeline> {
        MockPipeline::build(fps, false)
    }

    fn build(fps: u32, outputs: bool) -> Arc<MockPipeline> {
        let calls: CallLog = Default::default();
        Arc::new(MockPipeline {
            calls: calls.clone(),
            fps: AtomicU32::new(fps),
            state: Mutex::new(PipelineState::On),
            fail_enter: AtomicBool::new(false),
            writeback: outputs.then(|| {
                Arc::new(MockWriteback {
                    calls: calls.clone(),
                    fail: AtomicBool::new(false),
                })
            }),
            link: outputs.then(|| {
                Arc::new(MockLink {
                    calls: calls.clone(),
                })
            }),
            power: MockPower {
                calls,
                refs: AtomicI32::new(1),
                gate: Mutex::new(None),
            },
        })
    }

    fn take_calls(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.calls.lock())
    }

    fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock() = state;
    }

    fn refs(&self) -> i32 {
        self.power.refs.load(Ordering::SeqCst)
    }

    // Returns the channel signalled when `put_sync` is reached and the one that releases it.
    fn install_gate(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.power.gate.lock() = Some(Gate {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        });
        (entered_rx, release_tx)
    }
}

impl DisplayPipeline for MockPipeline {
    fn id(&self) -> u32 {
        0
    }

    fn fps(&self) -> u32 {
        self.fps.load(Ordering::SeqCst)
    }

    fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    fn enter_hibernation(&self) -> anyhow::Result<()> {
        self.calls.lock().push("pipeline_enter");
        if self.fail_enter.load(Ordering::SeqCst) {
            return Err(anyhow!("scan-out still busy"));
        }
        self.set_state(PipelineState::Hibernation);
        Ok(())
    }

    fn exit_hibernation(&self) -> anyhow::Result<()> {
        self.calls.lock().push("pipeline_exit");
        self.set_state(PipelineState::On);
        Ok(())
    }

    fn writeback(&self) -> Option<Arc<dyn Writeback>> {
        self.writeback
            .clone()
            .map(|writeback| writeback as Arc<dyn Writeback>)
    }

    fn display_link(&self) -> Option<Arc<dyn DisplayLink>> {
        self.link.clone().map(|link| link as Arc<dyn DisplayLink>)
    }

    fn release_bandwidth(&self) {
        self.calls.lock().push("release_bandwidth");
    }

    fn runtime_power(&self) -> &dyn RuntimePower {
        &self.power
    }
}

struct MockCamera(Arc<AtomicBool>);

impl CameraActivity for MockCamera {
    fn is_operating(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn enabled() -> HibernationConfig {
    HibernationConfig {
        hibernation: true,
        camera_operation: None,
    }
}

fn setup(pipeline: &Arc<MockPipeline>) -> Hibernation {
    let _ = base::syslog::test_only_ensure_inited();
    let pipeline: Arc<dyn DisplayPipeline> = pipeline.clone();
    Hibernation::register(&pipeline, &enabled()).expect("hibernation not registered")
}

// Runs `n` entry checks one after another.
fn run_checks(hibernation: &Hibernation, n: usize) {
    for _ in 0..n {
        assert!(hibernation.queue_entry());
        hibernation.wait_entry_idle();
    }
}

#[test]
fn disabled_config_registers_nothing() {
    let pipeline: Arc<dyn DisplayPipeline> = MockPipeline::new(60);
    assert!(Hibernation::register(&pipeline, &HibernationConfig::default()).is_none());
    assert!(
        Hibernation::register_with_camera(&pipeline, &HibernationConfig::default(), None)
            .is_none()
    );
}

#[test]
fn misaligned_camera_register_registers_nothing() {
    let _ = base::syslog::test_only_ensure_inited();
    let pipeline: Arc<dyn DisplayPipeline> = MockPipeline::new(60);
    let config = HibernationConfig {
        hibernation: true,
        camera_operation: Some(CameraOperationConfig { reg: 0x1a30_0002 }),
    };
    assert!(Hibernation::register(&pipeline, &config).is_none());
}

#[test]
fn enters_after_countdown() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);
    assert_eq!(hibernation.trigger_count(), 3);

    run_checks(&hibernation, 2);
    assert_eq!(hibernation.state(), HibernationState::Active);
    assert!(pipeline.take_calls().is_empty());

    run_checks(&hibernation, 1);
    assert_eq!(hibernation.state(), HibernationState::Hibernating);
    assert_eq!(pipeline.state(), PipelineState::Hibernation);
    assert_eq!(pipeline.take_calls(), ENTER_SEQUENCE);
    assert_eq!(pipeline.refs(), 0);
    assert_eq!(hibernation.block_count(), 0);
    assert_eq!(
        hibernation.events().events(),
        vec![
            HibernationEvent::EnterHibernationIn,
            HibernationEvent::EnterHibernationOut,
        ]
    );

    // The latch does not fire again while hibernating.
    run_checks(&hibernation, 3);
    assert!(pipeline.take_calls().is_empty());
}

#[test]
fn exit_restores_in_reverse_order() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);
    run_checks(&hibernation, 3);
    pipeline.take_calls();

    assert_eq!(hibernation.exit().unwrap(), ExitStatus::Woken);
    assert_eq!(pipeline.take_calls(), EXIT_SEQUENCE);
    assert_eq!(hibernation.state(), HibernationState::Active);
    assert_eq!(pipeline.state(), PipelineState::On);
    assert_eq!(pipeline.refs(), 1);
    assert_eq!(hibernation.block_count(), 0);
    assert_eq!(hibernation.trigger_count(), 3);
    assert_eq!(
        hibernation.events().events(),
        vec![
            HibernationEvent::EnterHibernationIn,
            HibernationEvent::EnterHibernationOut,
            HibernationEvent::ExitHibernationIn,
            HibernationEvent::ExitHibernationOut,
        ]
    );
}

#[test]
fn exit_while_active_only_rearms() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);
    run_checks(&hibernation, 2);
    assert_eq!(hibernation.trigger_count(), 1);

    assert_eq!(hibernation.exit().unwrap(), ExitStatus::AlreadyActive);
    assert_eq!(hibernation.trigger_count(), 3);
    assert!(pipeline.take_calls().is_empty());
    assert!(hibernation.events().events().is_empty());
    assert_eq!(hibernation.block_count(), 0);
}

#[test]
fn blocked_checks_consume_countdown() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);

    hibernation.block();
    run_checks(&hibernation, 4);
    assert_eq!(hibernation.trigger_count(), -1);
    assert_eq!(hibernation.state(), HibernationState::Active);

    // The countdown already fired while blocked; unblocking alone does not enter.
    hibernation.unblock();
    run_checks(&hibernation, 5);
    assert_eq!(hibernation.state(), HibernationState::Active);
    assert!(pipeline.take_calls().is_empty());

    // An exit re-arms it.
    assert_eq!(hibernation.exit().unwrap(), ExitStatus::AlreadyActive);
    run_checks(&hibernation, 3);
    assert_eq!(hibernation.state(), HibernationState::Hibernating);
    assert_eq!(pipeline.take_calls(), ENTER_SEQUENCE);
}

#[test]
fn guard_vetoes_entry() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);

    let guard = hibernation.blocker().hold();
    run_checks(&hibernation, 3);
    assert_eq!(hibernation.state(), HibernationState::Active);
    drop(guard);
    assert_eq!(hibernation.block_count(), 0);
}

#[test]
fn camera_activity_vetoes_entry() {
    let _ = base::syslog::test_only_ensure_inited();
    let pipeline = MockPipeline::new(60);
    let operating = Arc::new(AtomicBool::new(true));
    let dyn_pipeline: Arc<dyn DisplayPipeline> = pipeline.clone();
    let hibernation = Hibernation::register_with_camera(
        &dyn_pipeline,
        &enabled(),
        Some(Box::new(MockCamera(operating.clone()))),
    )
    .unwrap();

    run_checks(&hibernation, 3);
    assert_eq!(hibernation.state(), HibernationState::Active);
    assert!(pipeline.take_calls().is_empty());
    assert_eq!(hibernation.trigger_count(), 0);

    operating.store(false, Ordering::SeqCst);
    assert_eq!(hibernation.exit().unwrap(), ExitStatus::AlreadyActive);
    run_checks(&hibernation, 3);
    assert_eq!(hibernation.state(), HibernationState::Hibernating);
}

#[test]
fn repeated_cycles_balance_power_references() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);

    for _ in 0..5 {
        run_checks(&hibernation, 3);
        assert_eq!(hibernation.state(), HibernationState::Hibernating);
        assert_eq!(pipeline.refs(), 0);
        assert_eq!(hibernation.exit().unwrap(), ExitStatus::Woken);
        assert_eq!(pipeline.refs(), 1);
    }

    assert_eq!(pipeline.count("put_sync"), 5);
    assert_eq!(pipeline.count("get_sync"), 5);
    assert_eq!(hibernation.events().events().len(), 20);
}

#[test]
fn block_and_ensure_active_wakes_and_keeps_block() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);
    run_checks(&hibernation, 3);
    pipeline.take_calls();

    assert!(!hibernation.block_and_ensure_active());
    assert_eq!(hibernation.state(), HibernationState::Active);
    assert_eq!(pipeline.take_calls(), EXIT_SEQUENCE);
    assert_eq!(hibernation.block_count(), 1);

    run_checks(&hibernation, 3);
    assert_eq!(hibernation.state(), HibernationState::Active);

    hibernation.unblock();
    assert_eq!(hibernation.block_count(), 0);
}

#[test]
fn exit_waits_for_running_entry() {
    // 10Hz needs a single check.
    let pipeline = MockPipeline::new(10);
    let hibernation = Arc::new(setup(&pipeline));
    let (entered, release) = pipeline.install_gate();

    assert!(hibernation.queue_entry());
    entered.recv().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let exiter = {
        let hibernation = hibernation.clone();
        let done = done.clone();
        thread::spawn(move || {
            let status = hibernation.exit().unwrap();
            done.store(true, Ordering::SeqCst);
            status
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::SeqCst));

    release.send(()).unwrap();
    assert_eq!(exiter.join().unwrap(), ExitStatus::Woken);

    let mut expected = ENTER_SEQUENCE.to_vec();
    expected.extend_from_slice(&EXIT_SEQUENCE);
    assert_eq!(pipeline.take_calls(), expected);
    assert_eq!(hibernation.state(), HibernationState::Active);
    assert_eq!(pipeline.refs(), 1);
}

#[test]
fn block_and_ensure_active_waits_for_running_entry() {
    let pipeline = MockPipeline::new(10);
    let hibernation = Arc::new(setup(&pipeline));
    let (entered, release) = pipeline.install_gate();

    assert!(hibernation.queue_entry());
    entered.recv().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let waker = {
        let hibernation = hibernation.clone();
        let done = done.clone();
        thread::spawn(move || {
            let failed = hibernation.block_and_ensure_active();
            done.store(true, Ordering::SeqCst);
            failed
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::SeqCst));

    release.send(()).unwrap();
    assert!(!waker.join().unwrap());
    assert_eq!(hibernation.state(), HibernationState::Active);
    assert_eq!(pipeline.state(), PipelineState::On);
    assert_eq!(pipeline.refs(), 1);
    assert_eq!(hibernation.block_count(), 1);

    // Still blocked: a fired countdown is ignored until the caller unblocks.
    run_checks(&hibernation, 1);
    assert_eq!(hibernation.state(), HibernationState::Active);
    hibernation.unblock();
}

#[test]
fn concurrent_wakeups_exit_once() {
    const CALLERS: usize = 8;

    let pipeline = MockPipeline::new(60);
    let hibernation = Arc::new(setup(&pipeline));
    run_checks(&hibernation, 3);
    pipeline.take_calls();

    let barrier = Arc::new(Barrier::new(CALLERS));
    let callers: Vec<_> = (0..CALLERS)
        .map(|_| {
            let hibernation = hibernation.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                hibernation.block_and_ensure_active()
            })
        })
        .collect();
    for caller in callers {
        assert!(!caller.join().unwrap());
    }

    assert_eq!(pipeline.take_calls(), EXIT_SEQUENCE);
    assert_eq!(hibernation.block_count(), CALLERS as u32);
    for _ in 0..CALLERS {
        hibernation.unblock();
    }
    assert_eq!(hibernation.block_count(), 0);
}

#[test]
fn dropped_pipeline_is_unavailable() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);
    drop(pipeline);

    assert!(matches!(
        hibernation.exit(),
        Err(Error::PipelineUnavailable)
    ));
    assert_eq!(hibernation.block_count(), 0);

    assert!(hibernation.block_and_ensure_active());
    assert_eq!(hibernation.block_count(), 1);
    hibernation.unblock();

    // Entry checks still run but have nothing to act on.
    run_checks(&hibernation, 3);
    assert_eq!(hibernation.state(), HibernationState::Active);
}

#[test]
fn pipeline_off_is_left_alone() {
    let pipeline = MockPipeline::new(60);
    pipeline.set_state(PipelineState::Off);
    let hibernation = setup(&pipeline);

    run_checks(&hibernation, 3);
    assert_eq!(hibernation.state(), HibernationState::Active);
    assert!(pipeline.take_calls().is_empty());
    assert!(hibernation.events().events().is_empty());

    assert_eq!(hibernation.exit().unwrap(), ExitStatus::AlreadyActive);
    assert!(pipeline.take_calls().is_empty());
}

#[test]
fn missing_outputs_are_skipped() {
    let pipeline = MockPipeline::without_outputs(60);
    let hibernation = setup(&pipeline);

    run_checks(&hibernation, 3);
    assert_eq!(
        pipeline.take_calls(),
        ["pipeline_enter", "release_bandwidth", "put_sync"]
    );

    assert_eq!(hibernation.exit().unwrap(), ExitStatus::Woken);
    assert_eq!(pipeline.take_calls(), ["get_sync", "pipeline_exit"]);
}

#[test]
fn failed_step_does_not_stop_sequence() {
    let pipeline = MockPipeline::new(60);
    pipeline
        .writeback
        .as_ref()
        .unwrap()
        .fail
        .store(true, Ordering::SeqCst);
    let hibernation = setup(&pipeline);

    run_checks(&hibernation, 3);
    assert_eq!(pipeline.take_calls(), ENTER_SEQUENCE);
    assert_eq!(hibernation.state(), HibernationState::Hibernating);

    assert_eq!(hibernation.exit().unwrap(), ExitStatus::Woken);
    assert_eq!(pipeline.take_calls(), EXIT_SEQUENCE);
}

#[test]
fn failed_pipeline_entry_stays_active() {
    let pipeline = MockPipeline::new(60);
    pipeline.fail_enter.store(true, Ordering::SeqCst);
    let hibernation = setup(&pipeline);

    run_checks(&hibernation, 3);
    assert_eq!(pipeline.take_calls(), ENTER_SEQUENCE);
    assert_eq!(pipeline.state(), PipelineState::On);
    assert_eq!(hibernation.state(), HibernationState::Active);

    // Nothing is held from the failed entry, so there is nothing to wake.
    assert_eq!(hibernation.exit().unwrap(), ExitStatus::AlreadyActive);
    assert_eq!(hibernation.state(), HibernationState::Active);
    assert!(pipeline.take_calls().is_empty());
}

#[test]
fn countdown_follows_refresh_rate_at_exit() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);
    run_checks(&hibernation, 3);

    pipeline.fps.store(120, Ordering::SeqCst);
    assert_eq!(hibernation.exit().unwrap(), ExitStatus::Woken);
    assert_eq!(hibernation.trigger_count(), 6);

    run_checks(&hibernation, 5);
    assert_eq!(hibernation.state(), HibernationState::Active);
    run_checks(&hibernation, 1);
    assert_eq!(hibernation.state(), HibernationState::Hibernating);
}

#[test]
fn no_mode_uses_default_refresh_rate() {
    let pipeline = MockPipeline::new(0);
    let hibernation = setup(&pipeline);
    assert_eq!(hibernation.trigger_count(), 3);
}

#[test]
fn destroy_stops_worker() {
    let pipeline = MockPipeline::new(60);
    let hibernation = setup(&pipeline);
    run_checks(&hibernation, 1);
    hibernation.queue_entry();
    hibernation.destroy();

    assert!(pipeline.take_calls().is_empty());
    assert_eq!(pipeline.state(), PipelineState::On);
}
