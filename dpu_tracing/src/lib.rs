// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Begin/end trace markers for display power sequences.
//!
//! Without features every macro compiles to nothing. With `trace_marker` the markers are written
//! to tracefs in the systrace format (`B|pid|name` / `E|pid`) so they show up as slices next to
//! the kernel's display events.

cfg_if::cfg_if! {
    if #[cfg(feature = "trace_marker")] {
        /// tracefs `trace_marker` backend.
        pub mod trace_marker;
        use trace_marker as platform;

        pub use trace_marker::*;
    } else {
        /// A backend that discards every marker.
        pub mod noop;
        use noop as platform;
    }
}

pub use platform::init;
