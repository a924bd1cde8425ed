// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use base::warn;

/// Counting veto on hibernation transitions.
///
/// Clones share one counter, so the blocker can be handed to every collaborator that needs to
/// keep the display awake. Entry is only attempted while the count is zero. Each `block()` must be
/// paired with exactly one `unblock()`; prefer [`hold()`](Self::hold) which pairs them
/// automatically.
#[derive(Clone, Debug, Default)]
pub struct HibernationBlocker {
    count: Arc<AtomicU32>,
}

impl HibernationBlocker {
    pub fn new() -> HibernationBlocker {
        Default::default()
    }

    pub fn block(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Releases one `block()`. An unpaired call is logged and leaves the count at zero.
    pub fn unblock(&self) {
        let released = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });
        if released.is_err() {
            warn!("hibernation unblock without a matching block");
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.count() != 0
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Blocks until the returned guard is dropped.
    pub fn hold(&self) -> BlockGuard {
        self.block();
        BlockGuard(self.clone())
    }
}

/// RAII form of [`HibernationBlocker::block`].
#[must_use = "hibernation is unblocked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct BlockGuard(HibernationBlocker);

impl Drop for BlockGuard {
    fn drop(&mut self) {
        self.0.unblock();
    }
}
