// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use base::error;
use base::info;
use once_cell::sync::OnceCell;
use sync::Mutex;

const TRACE_MARKER_PATHS: [&str; 2] = [
    "/sys/kernel/tracing/trace_marker",
    "/sys/kernel/debug/tracing/trace_marker",
];

static TRACE_MARKER_FILE: OnceCell<Mutex<File>> = OnceCell::new();

/// Opens a slice named `$name` on the calling thread.
#[macro_export]
macro_rules! trace_event_begin {
    ($name:expr) => {
        $crate::trace_begin($name)
    };
}

/// Closes the innermost open slice on the calling thread.
#[macro_export]
macro_rules! trace_event_end {
    () => {
        $crate::trace_end()
    };
}

/// Prints a single non-scoped message without creating a slice.
#[macro_export]
macro_rules! trace_simple_print {
    ($($t:tt)*) => {{
        $crate::trace_simple_print(std::format!($($t)*));
    }}
}

fn begin_marker(pid: u32, name: &str) -> String {
    format!("B|{}|{}", pid, name)
}

fn end_marker(pid: u32) -> String {
    format!("E|{}", pid)
}

fn write_marker(marker: &str) {
    // The trace_marker file rejects writes while tracing is off; that is not an error.
    if let Some(file) = TRACE_MARKER_FILE.get() {
        file.lock().write_all(marker.as_bytes()).ok();
    }
}

pub fn trace_begin(name: &str) {
    write_marker(&begin_marker(std::process::id(), name));
}

pub fn trace_end() {
    write_marker(&end_marker(std::process::id()));
}

pub fn trace_simple_print(message: String) {
    write_marker(&message);
}

/// Opens the tracefs trace_marker file.
///
/// Tracing silently stays disabled if tracefs is not mounted or not writable.
pub fn init() {
    let Some(path) = TRACE_MARKER_PATHS
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
    else {
        error!("Could not find trace_marker location. Tracing will not work.");
        return;
    };

    let file = match OpenOptions::new().write(true).open(path) {
        Ok(f) => f,
        Err(e) => {
            error!(
                "Failed opening {}: {}. Tracing will not work.",
                path.display(),
                e
            );
            return;
        }
    };

    if TRACE_MARKER_FILE.set(Mutex::new(file)).is_err() {
        info!("trace_marker already initialized");
    }
}
