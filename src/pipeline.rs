// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interfaces of the display hardware sequenced by the hibernation controller.
//!
//! Implementations are provided by the display driver. Every hook is synchronous: it returns once
//! the hardware has acknowledged the change. Failures are reported back so they can be logged, but
//! the controller does not roll back a partially applied sequence.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

/// Power state of a display pipeline as tracked by its driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Off,
    On,
    Hibernation,
}

/// The display pipeline (display controller plus its outputs) owning one display.
pub trait DisplayPipeline: Send + Sync {
    /// Index used in logs and the event log.
    fn id(&self) -> u32;

    /// Current refresh rate, or 0 when no mode is active.
    fn fps(&self) -> u32;

    fn state(&self) -> PipelineState;

    /// Saves scan-out state and moves the pipeline from `On` to `Hibernation` atomically.
    fn enter_hibernation(&self) -> anyhow::Result<()>;

    /// Restores scan-out state and moves the pipeline from `Hibernation` to `On` atomically.
    fn exit_hibernation(&self) -> anyhow::Result<()>;

    /// The writeback path attached to the pipeline, if any.
    fn writeback(&self) -> Option<Arc<dyn Writeback>>;

    /// The serial display link (DSI) driving the panel, if any.
    fn display_link(&self) -> Option<Arc<dyn DisplayLink>>;

    /// Drops the bandwidth and clock votes held for the pipeline.
    fn release_bandwidth(&self);

    fn runtime_power(&self) -> &dyn RuntimePower;
}

pub trait Writeback: Send + Sync {
    fn enter_hibernation(&self) -> anyhow::Result<()>;
    fn exit_hibernation(&self) -> anyhow::Result<()>;
}

pub trait DisplayLink: Send + Sync {
    /// Puts the link lanes into ultra-low-power state.
    fn enter_ulps(&self) -> anyhow::Result<()>;
    fn exit_ulps(&self) -> anyhow::Result<()>;
}

/// Reference-counted runtime power domain of the display hardware.
pub trait RuntimePower: Send + Sync {
    /// Takes a reference, powering the domain up before returning if needed.
    fn get_sync(&self) -> anyhow::Result<()>;

    /// Drops a reference, powering the domain down before returning if it was the last one.
    fn put_sync(&self) -> anyhow::Result<()>;

    fn is_active(&self) -> bool;
}
