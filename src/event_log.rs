// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Bounded history of hibernation sequence markers, kept for post-mortem debugging.

use std::collections::VecDeque;

use base::trace;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use sync::Mutex;

/// Number of records retained per display.
pub const EVENT_LOG_CAPACITY: usize = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum HibernationEvent {
    EnterHibernationIn,
    EnterHibernationOut,
    ExitHibernationIn,
    ExitHibernationOut,
}

#[derive(Clone, Debug, Serialize)]
pub struct EventRecord {
    pub time: DateTime<Utc>,
    pub pipeline_id: u32,
    pub event: HibernationEvent,
}

#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    records: Mutex<VecDeque<EventRecord>>,
}

impl EventLog {
    /// Creates a log retaining the newest `capacity` records (at least one).
    pub fn new(capacity: usize) -> EventLog {
        let capacity = capacity.max(1);
        EventLog {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, pipeline_id: u32, event: HibernationEvent) {
        trace!("display {}: {:?}", pipeline_id, event);
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(EventRecord {
            time: Utc::now(),
            pipeline_id,
            event,
        });
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Retained event kinds, oldest first.
    pub fn events(&self) -> Vec<HibernationEvent> {
        self.records.lock().iter().map(|r| r.event).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records())
    }
}

impl Default for EventLog {
    fn default() -> Self {
        EventLog::new(EVENT_LOG_CAPACITY)
    }
}
