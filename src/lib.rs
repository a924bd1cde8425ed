// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Display hibernation control.
//!
//! An idle display pipeline can be put into hibernation: scan-out and the display link are powered
//! down while the logical configuration is kept. [`Hibernation`] decides when entry is attempted,
//! lets any caller veto it, and sequences the writeback path, the display link and the runtime
//! power domain on entry and exit.
//!
//! Entry is only ever attempted from a dedicated worker thread, queued by the pipeline's idle
//! detection through [`Hibernation::queue_entry`]. Exit is synchronous and may be requested from
//! any thread with [`Hibernation::exit`].

mod block;
pub mod camera;
mod config;
pub mod event_log;
mod hibernation;
pub mod pipeline;
mod trigger;

use std::io;
use std::path::PathBuf;

use remain::sorted;
use thiserror::Error;

pub use crate::block::BlockGuard;
pub use crate::block::HibernationBlocker;
pub use crate::config::CameraOperationConfig;
pub use crate::config::HibernationConfig;
pub use crate::hibernation::ExitStatus;
pub use crate::hibernation::Hibernation;
pub use crate::hibernation::HibernationState;
pub use crate::trigger::entry_count;
pub use crate::trigger::TriggerCounter;
pub use crate::trigger::HIBERNATION_ENTRY_DEFAULT_FPS;
pub use crate::trigger::HIBERNATION_ENTRY_MIN_ENTRY_CNT;
pub use crate::trigger::HIBERNATION_ENTRY_MIN_TIME_MS;

#[sorted]
#[derive(Error, Debug)]
pub enum Error {
    /// The camera operation register from the configuration could not be mapped.
    #[error("failed to map camera operation register at {addr:#x}: {source}")]
    MapCameraRegister { addr: u64, source: base::MmioError },
    #[error("failed to parse hibernation config: {0}")]
    ParseConfig(serde_json::Error),
    /// The display pipeline was torn down before the controller.
    #[error("display pipeline is not available")]
    PipelineUnavailable,
    #[error("failed to read hibernation config {}: {source}", path.display())]
    ReadConfig { path: PathBuf, source: io::Error },
    #[error("failed to spawn hibernation worker: {0}")]
    SpawnWorker(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
