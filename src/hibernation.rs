// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The display hibernation state machine.

use std::sync::Arc;
use std::sync::Once;
use std::sync::Weak;

use base::debug;
use base::error;
use base::info;
use base::WorkQueue;
use dpu_tracing::trace_event_begin;
use dpu_tracing::trace_event_end;
use dpu_tracing::trace_simple_print;
use sync::Mutex;

use crate::block::BlockGuard;
use crate::block::HibernationBlocker;
use crate::camera::CameraActivity;
use crate::camera::CameraOperationRegister;
use crate::config::HibernationConfig;
use crate::event_log::EventLog;
use crate::event_log::HibernationEvent;
use crate::pipeline::DisplayLink;
use crate::pipeline::DisplayPipeline;
use crate::pipeline::PipelineState;
use crate::pipeline::Writeback;
use crate::trigger::TriggerCounter;
use crate::Error;
use crate::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HibernationState {
    Active,
    Hibernating,
}

/// Successful outcomes of [`Hibernation::exit`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// The pipeline was hibernating and is active again.
    Woken,
    /// The pipeline was not hibernating; no subsystem was called.
    AlreadyActive,
}

// State owned by the transition lock.
struct Transition {
    state: HibernationState,
    // Captured on entry, released on exit. Only populated while hibernating.
    writeback: Option<Arc<dyn Writeback>>,
    display_link: Option<Arc<dyn DisplayLink>>,
}

impl Transition {
    fn new() -> Transition {
        Transition {
            state: HibernationState::Active,
            writeback: None,
            display_link: None,
        }
    }

    fn verify(&self, id: u32, pipeline_state: PipelineState) {
        if self.state == HibernationState::Active {
            debug_assert!(
                self.writeback.is_none() && self.display_link.is_none(),
                "hibernation handles held while active"
            );
        }
        let pipeline_hibernating = pipeline_state == PipelineState::Hibernation;
        if pipeline_hibernating != (self.state == HibernationState::Hibernating) {
            error!(
                "display {}: hibernation state {:?} disagrees with pipeline state {:?}",
                id, self.state, pipeline_state
            );
        }
    }

    // Follows the pipeline after a sequence, since a failed step may leave it where it was.
    // Handles are only kept while the pipeline is actually hibernating.
    fn settle(&mut self, pipeline_state: PipelineState) {
        if pipeline_state == PipelineState::Hibernation {
            self.state = HibernationState::Hibernating;
        } else {
            self.state = HibernationState::Active;
            self.writeback = None;
            self.display_link = None;
        }
    }
}

// Everything the entry worker shares with callers.
struct HibernationCore {
    id: u32,
    pipeline: Weak<dyn DisplayPipeline>,
    blocker: HibernationBlocker,
    trigger: TriggerCounter,
    camera: Option<Box<dyn CameraActivity>>,
    transition: Mutex<Transition>,
    events: EventLog,
}

impl HibernationCore {
    fn is_camera_operating(&self) -> bool {
        self.camera
            .as_ref()
            .map_or(false, |camera| camera.is_operating())
    }

    // Runs on the worker without the transition lock. Every condition is evaluated so the
    // countdown advances even when entry is vetoed.
    fn check(&self) -> bool {
        let blocked = self.blocker.is_blocked();
        let camera_operating = self.is_camera_operating();
        let triggered = self.trigger.tick();

        debug!(
            "display {}: hibernation check blocked={} camera={} triggered={}",
            self.id, blocked, camera_operating, triggered
        );

        !blocked && !camera_operating && triggered
    }

    fn enter(&self) {
        let Some(pipeline) = self.pipeline.upgrade() else {
            return;
        };

        trace_event_begin!("hibernation_enter");
        {
            let mut transition = self.transition.lock();
            let _block = self.blocker.hold();

            let state = pipeline.state();
            transition.verify(self.id, state);
            if state == PipelineState::On {
                self.enter_locked(&mut transition, pipeline.as_ref());
            }
        }
        trace_event_end!();

        debug!(
            "display {}: DPU power {} after hibernation entry",
            self.id,
            on_off_str(pipeline.runtime_power().is_active())
        );
    }

    fn enter_locked(&self, transition: &mut Transition, pipeline: &dyn DisplayPipeline) {
        self.events
            .record(self.id, HibernationEvent::EnterHibernationIn);

        transition.writeback = pipeline.writeback();
        if let Some(writeback) = &transition.writeback {
            self.report("writeback hibernation entry", writeback.enter_hibernation());
        }

        self.report("pipeline hibernation entry", pipeline.enter_hibernation());

        transition.display_link = pipeline.display_link();
        if let Some(link) = &transition.display_link {
            self.report("display link ULPS entry", link.enter_ulps());
        }

        pipeline.release_bandwidth();
        self.report("runtime power release", pipeline.runtime_power().put_sync());

        transition.settle(pipeline.state());
        if transition.state != HibernationState::Hibernating {
            error!("display {}: pipeline did not enter hibernation", self.id);
        }
        self.events
            .record(self.id, HibernationEvent::EnterHibernationOut);
    }

    fn exit_locked(&self, transition: &mut Transition, pipeline: &dyn DisplayPipeline) {
        self.events
            .record(self.id, HibernationEvent::ExitHibernationIn);

        self.report("runtime power acquisition", pipeline.runtime_power().get_sync());

        if let Some(link) = transition.display_link.take() {
            self.report("display link ULPS exit", link.exit_ulps());
        }

        self.report("pipeline hibernation exit", pipeline.exit_hibernation());

        if let Some(writeback) = transition.writeback.take() {
            self.report("writeback hibernation exit", writeback.exit_hibernation());
        }

        transition.settle(pipeline.state());
        if transition.state != HibernationState::Active {
            error!("display {}: pipeline did not leave hibernation", self.id);
        }
        self.events
            .record(self.id, HibernationEvent::ExitHibernationOut);
    }

    // Sequence steps are not rolled back; a failing step is logged and the sequence continues.
    fn report(&self, step: &str, result: anyhow::Result<()>) {
        if let Err(e) = result {
            error!("display {}: {} failed: {:#}", self.id, step, e);
        }
    }
}

/// Hibernation controller of one display pipeline.
///
/// Created by [`Hibernation::register`] when the pipeline is registered and torn down with
/// [`Hibernation::destroy`] before the pipeline goes away.
pub struct Hibernation {
    entry_work: WorkQueue,
    core: Arc<HibernationCore>,
}

impl Hibernation {
    /// Creates the controller for `pipeline` if `config` enables hibernation.
    ///
    /// Maps the configured camera operation register. Returns `None` when hibernation is not
    /// supported or the controller cannot be set up.
    pub fn register(
        pipeline: &Arc<dyn DisplayPipeline>,
        config: &HibernationConfig,
    ) -> Option<Hibernation> {
        if !config.hibernation {
            info!("display hibernation is not supported");
            return None;
        }

        let camera: Option<Box<dyn CameraActivity>> = match config.camera_operation {
            None => {
                info!("camera operation register is not needed");
                None
            }
            Some(camera_config) => match CameraOperationRegister::map(camera_config.reg) {
                Ok(register) => Some(Box::new(register)),
                Err(source) => {
                    error!(
                        "{}",
                        Error::MapCameraRegister {
                            addr: camera_config.reg,
                            source,
                        }
                    );
                    return None;
                }
            },
        };

        Hibernation::start(pipeline, camera)
    }

    /// Like [`register`](Self::register), with a caller provided camera activity source in place
    /// of the configured register.
    pub fn register_with_camera(
        pipeline: &Arc<dyn DisplayPipeline>,
        config: &HibernationConfig,
        camera: Option<Box<dyn CameraActivity>>,
    ) -> Option<Hibernation> {
        if !config.hibernation {
            info!("display hibernation is not supported");
            return None;
        }
        Hibernation::start(pipeline, camera)
    }

    fn start(
        pipeline: &Arc<dyn DisplayPipeline>,
        camera: Option<Box<dyn CameraActivity>>,
    ) -> Option<Hibernation> {
        static TRACING_INIT: Once = Once::new();
        TRACING_INIT.call_once(dpu_tracing::init);

        match Hibernation::new(pipeline, camera) {
            Ok(hibernation) => {
                info!("display {}: hibernation is supported", hibernation.core.id);
                Some(hibernation)
            }
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    fn new(
        pipeline: &Arc<dyn DisplayPipeline>,
        camera: Option<Box<dyn CameraActivity>>,
    ) -> Result<Hibernation> {
        let id = pipeline.id();
        let core = Arc::new(HibernationCore {
            id,
            pipeline: Arc::downgrade(pipeline),
            blocker: HibernationBlocker::new(),
            trigger: TriggerCounter::new(pipeline.fps()),
            camera,
            transition: Mutex::new(Transition::new()),
            events: EventLog::default(),
        });

        let worker_core = core.clone();
        let entry_work = WorkQueue::start(format!("dpu{}_hibernation", id), move || {
            debug!(
                "display {}: hibernation handler is called (trig_cnt: {})",
                worker_core.id,
                worker_core.trigger.get()
            );
            if worker_core.check() {
                worker_core.enter();
            }
        })
        .map_err(Error::SpawnWorker)?;

        Ok(Hibernation { entry_work, core })
    }

    /// Stops the entry worker and releases the camera operation register.
    pub fn destroy(self) {
        let Hibernation { entry_work, core } = self;
        entry_work.stop();
        if core.camera.is_some() {
            info!("display {}: releasing camera operation register", core.id);
        }
    }

    /// Queues an entry attempt on the worker. Does nothing if one is already queued.
    ///
    /// Called by the pipeline's idle detection, typically once per frame done.
    pub fn queue_entry(&self) -> bool {
        self.entry_work.queue()
    }

    /// Waits until no entry attempt is queued or running.
    pub fn wait_entry_idle(&self) {
        self.entry_work.flush();
    }

    /// Forbids hibernation entry until the matching [`unblock`](Self::unblock).
    pub fn block(&self) {
        self.core.blocker.block();
    }

    pub fn unblock(&self) {
        self.core.blocker.unblock();
    }

    /// Forbids hibernation entry until the returned guard is dropped.
    pub fn hold(&self) -> BlockGuard {
        self.core.blocker.hold()
    }

    /// A handle to the veto counter that can be passed to other subsystems.
    pub fn blocker(&self) -> HibernationBlocker {
        self.core.blocker.clone()
    }

    /// Blocks hibernation and makes sure the display is awake.
    ///
    /// The block stays in place after returning and must be released with
    /// [`unblock`](Self::unblock). Returns `true` if the display could not be brought back to
    /// active.
    pub fn block_and_ensure_active(&self) -> bool {
        self.core.blocker.block();
        self.exit().is_err()
    }

    /// Wakes the display up if it is hibernating.
    ///
    /// A queued entry attempt is dropped and one that is already running is waited for, so this
    /// may sleep. It must not be called from the entry worker. The entry countdown is re-armed
    /// from the current refresh rate even when the display is already active.
    pub fn exit(&self) -> Result<ExitStatus> {
        let core = &*self.core;
        let pipeline = core.pipeline.upgrade().ok_or(Error::PipelineUnavailable)?;

        let _block = core.blocker.hold();

        // Only sleeps if the entry worker is executing right now.
        self.entry_work.cancel_sync();

        let mut transition = core.transition.lock();

        core.trigger.reset(pipeline.fps());

        let state = pipeline.state();
        transition.verify(core.id, state);
        if state != PipelineState::Hibernation {
            transition.settle(state);
            return Ok(ExitStatus::AlreadyActive);
        }

        trace_event_begin!("hibernation_exit");
        core.exit_locked(&mut transition, pipeline.as_ref());
        trace_event_end!();
        trace_simple_print!("dpu{} hibernation exit", core.id);

        drop(transition);
        debug!(
            "display {}: DPU power {} after hibernation exit",
            core.id,
            on_off_str(pipeline.runtime_power().is_active())
        );

        Ok(ExitStatus::Woken)
    }

    /// Current state. Waits for an enter or exit sequence in progress.
    pub fn state(&self) -> HibernationState {
        self.core.transition.lock().state
    }

    pub fn block_count(&self) -> u32 {
        self.core.blocker.count()
    }

    /// Remaining entry checks before entry is attempted.
    pub fn trigger_count(&self) -> i32 {
        self.core.trigger.get()
    }

    pub fn events(&self) -> &EventLog {
        &self.core.events
    }
}

fn on_off_str(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
