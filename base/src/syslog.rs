// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Process-wide logger for the `log` facade.
//!
//! Filtering uses `env_logger`'s directive syntax (`"info,dpu_hibernation=debug"`). Records that
//! pass the filter are echoed to stderr and, optionally, to a caller supplied pipe.
//!
//! # Examples
//!
//! ```
//! use base::syslog;
//! use base::syslog::LogConfig;
//!
//! if let Err(e) = syslog::init_with(LogConfig::default()) {
//!     eprintln!("failed to initialize logging: {}", e);
//!     return;
//! }
//! base::warn!("this is your {} warning", "final");
//! ```

use std::fmt;
use std::fmt::Display;
use std::io;
use std::io::Write;
use std::sync::Once;

use env_logger::fmt::Formatter;
use log::Log;
use log::Metadata;
use log::Record;
use remain::sorted;
use thiserror::Error as ThisError;

/// Severity attached to each emitted line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Priority {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Priority::*;

        let string = match self {
            Emergency => "EMERGENCY",
            Alert => "ALERT",
            Critical => "CRITICAL",
            Error => "ERROR",
            Warning => "WARNING",
            Notice => "NOTICE",
            Info => "INFO",
            Debug => "DEBUG",
        };

        write!(f, "{}", string)
    }
}

impl From<log::Level> for Priority {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Priority::Error,
            log::Level::Warn => Priority::Warning,
            log::Level::Info => Priority::Info,
            log::Level::Debug | log::Level::Trace => Priority::Debug,
        }
    }
}

/// Errors returned by [`init_with`].
#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    /// Another logger owns the `log` facade.
    #[error("a global logger is already installed: {0}")]
    LoggerAlreadySet(log::SetLoggerError),
}

/// Signature of a custom line formatter for the pipe output.
pub type PipeFormatter = fn(&mut Formatter, &Record<'_>) -> io::Result<()>;

/// Logger configuration.
pub struct LogConfig {
    /// `env_logger` filter directives.
    pub filter: &'static str,
    /// Name printed in front of every line.
    pub proc_name: String,
    /// Echo to stderr.
    pub stderr: bool,
    /// Prefix lines with a wall-clock timestamp.
    pub timestamps: bool,
    /// Additional sink.
    pub pipe: Option<Box<dyn Write + Send>>,
    /// Overrides the default line format for `pipe`.
    pub pipe_formatter: Option<PipeFormatter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "info",
            proc_name: String::from("dpu_hibernation"),
            stderr: true,
            timestamps: false,
            pipe: None,
            pipe_formatter: None,
        }
    }
}

/// Filter plus the set of sinks records are fanned out to.
pub struct State {
    filter: env_logger::filter::Filter,
    sinks: Vec<env_logger::Logger>,
}

impl Default for State {
    fn default() -> Self {
        State::new(LogConfig::default())
    }
}

impl State {
    pub fn new(cfg: LogConfig) -> State {
        let filter = env_logger::filter::Builder::new()
            .parse(cfg.filter)
            .build();

        let mut sinks = Vec::new();
        if cfg.stderr {
            let mut builder = sink_builder(&cfg.proc_name, cfg.timestamps);
            builder.target(env_logger::Target::Stderr);
            sinks.push(builder.build());
        }
        if let Some(pipe) = cfg.pipe {
            let mut builder = sink_builder(&cfg.proc_name, cfg.timestamps);
            if let Some(formatter) = cfg.pipe_formatter {
                builder.format(formatter);
            }
            builder.target(env_logger::Target::Pipe(pipe));
            sinks.push(builder.build());
        }

        State { filter, sinks }
    }

    /// Most verbose level any directive lets through.
    pub fn max_level(&self) -> log::LevelFilter {
        self.filter.filter()
    }
}

impl Log for State {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.filter.matches(record) {
            return;
        }
        for sink in &self.sinks {
            sink.log(record);
        }
    }

    fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }
}

macro_rules! CHRONO_TIMESTAMP_FIXED_FMT {
    () => {
        "%F %T%.9f"
    };
}

fn sink_builder(proc_name: &str, timestamps: bool) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    // Filtering happens in `State`.
    builder.filter_level(log::LevelFilter::Trace);
    let proc_name = proc_name.to_owned();
    builder.format(move |buf, record| format_record(buf, record, &proc_name, timestamps));
    // https://github.com/env-logger-rs/env_logger/issues/208
    builder.is_test(true);
    builder
}

/// Writes `[time ]name[pid]: [PRI:file:line] message`.
pub fn format_record<W: Write>(
    buf: &mut W,
    record: &Record<'_>,
    proc_name: &str,
    timestamps: bool,
) -> io::Result<()> {
    if timestamps {
        write!(
            buf,
            "{} ",
            chrono::Utc::now().format(CHRONO_TIMESTAMP_FIXED_FMT!())
        )?;
    }
    write!(buf, "{}[{}]: ", proc_name, std::process::id())?;
    let pri: Priority = record.level().into();
    match (record.file(), record.line()) {
        (Some(file), Some(line)) => write!(buf, "[{}:{}:{}] ", pri, file, line)?,
        (Some(file), None) => write!(buf, "[{}:{}] ", pri, file)?,
        _ => write!(buf, "[{}] ", pri)?,
    }
    writeln!(buf, "{}", record.args())
}

/// Installs the process-wide logger. Fails if any logger is already installed.
pub fn init_with(cfg: LogConfig) -> Result<(), Error> {
    let state = State::new(cfg);
    let max_level = state.max_level();
    log::set_boxed_logger(Box::new(state)).map_err(Error::LoggerAlreadySet)?;
    log::set_max_level(max_level);
    Ok(())
}

/// Installs a default logger once for tests; later calls are no-ops.
pub fn test_only_ensure_inited() -> Result<(), Error> {
    static TEST_INIT: Once = Once::new();
    let mut result = Ok(());
    TEST_INIT.call_once(|| {
        result = init_with(LogConfig {
            filter: "debug",
            ..Default::default()
        });
    });
    result
}
