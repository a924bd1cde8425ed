// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! System support shared by the display hibernation crates: logging, the background work queue
//! and read-only MMIO register mappings.

mod mmio;
pub mod syslog;
mod work_queue;

pub use log::debug;
pub use log::error;
pub use log::info;
pub use log::trace;
pub use log::warn;
pub use mmio::pagesize;
pub use mmio::MmioError;
pub use mmio::MmioRegion;
pub use mmio::MmioResult;
pub use work_queue::WorkQueue;
