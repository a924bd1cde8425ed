// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Lock types for the display hibernation stack that panic on poison.
//!
//! Release builds use `panic = "abort"`, so a panic while a lock is held already takes the whole
//! process down and poisoning is never observed. These wrappers let callers write `.lock()`
//! instead of sprinkling `.lock().unwrap()` over code that otherwise forbids `unwrap`.

mod condvar;
mod mutex;

pub use crate::condvar::Condvar;
pub use crate::mutex::Mutex;
