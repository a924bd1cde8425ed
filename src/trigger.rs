// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Countdown that paces hibernation entry attempts by frame cadence.

use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

/// Refresh rate assumed when the pipeline has no active mode.
pub const HIBERNATION_ENTRY_DEFAULT_FPS: u32 = 60;
/// Idle time the display must accumulate before entry is attempted.
pub const HIBERNATION_ENTRY_MIN_TIME_MS: u32 = 50;
pub const HIBERNATION_ENTRY_MIN_ENTRY_CNT: i32 = 1;

const MSEC_PER_SEC: u64 = 1000;

/// Number of entry checks that must elapse at `fps` before entry is attempted.
pub fn entry_count(fps: u32) -> i32 {
    let fps = if fps == 0 {
        HIBERNATION_ENTRY_DEFAULT_FPS
    } else {
        fps
    };
    let count = (u64::from(fps) * u64::from(HIBERNATION_ENTRY_MIN_TIME_MS)).div_ceil(MSEC_PER_SEC);
    i32::try_from(count)
        .unwrap_or(i32::MAX)
        .max(HIBERNATION_ENTRY_MIN_ENTRY_CNT)
}

/// A countdown latch re-armed from the pipeline's refresh rate.
///
/// `tick()` reports true only on the decrement that reaches zero. Later ticks keep counting into
/// negative values and never fire again until `reset()`.
#[derive(Debug)]
pub struct TriggerCounter {
    count: AtomicI32,
}

impl TriggerCounter {
    pub fn new(fps: u32) -> TriggerCounter {
        TriggerCounter {
            count: AtomicI32::new(entry_count(fps)),
        }
    }

    /// Re-arms the countdown for `fps` and returns the new count.
    pub fn reset(&self, fps: u32) -> i32 {
        let count = entry_count(fps);
        self.count.store(count, Ordering::SeqCst);
        count
    }

    /// Consumes one count. Returns true when this call brought the countdown to zero.
    pub fn tick(&self) -> bool {
        self.count.fetch_sub(1, Ordering::SeqCst) == 1
    }

    pub fn get(&self) -> i32 {
        self.count.load(Ordering::SeqCst)
    }
}
