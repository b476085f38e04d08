//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Structured log events and the sinks that record them.
//!
//! Every line a vendor tool prints becomes a [LogEvent] once translated, and the
//! orchestrator reports its own progress with the same type. A [Logger] fans each
//! event out to its sinks: the console honors the requested verbosity while the
//! run's log file keeps everything.

use crate::error::PldError;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Checks if an event at this level must fail the run.
    pub fn is_fatal(&self) -> bool {
        self >= &Self::Error
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Interprets a command-line verbosity level.
    ///
    /// `NONE` keeps only the errors, just like `ERROR`.
    pub fn from_verbosity(s: &str) -> Result<Self, PldError> {
        match s.to_ascii_uppercase().as_ref() {
            "NONE" => Ok(Self::Error),
            _ => Self::from_str(s).map_err(|_| PldError::BadVerbosity(s.to_string())),
        }
    }
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_ref() {
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "WARNING" => Self::Warning,
            "ERROR" => Self::Error,
            "CRITICAL" => Self::Critical,
            _ => return Err(()),
        })
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who produced the event.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Origin {
    Tool,
    Orchestrator,
}

#[derive(Debug, PartialEq, Clone)]
pub struct LogEvent {
    severity: Severity,
    parameter: Option<String>,
    message: String,
    origin: Origin,
}

impl LogEvent {
    /// Creates an event raised by the orchestrator itself.
    pub fn new(severity: Severity, message: &str) -> Self {
        Self {
            severity,
            parameter: None,
            message: message.to_string(),
            origin: Origin::Orchestrator,
        }
    }

    /// Creates an event read from a vendor tool's output.
    pub fn tool(severity: Severity, message: &str) -> Self {
        Self {
            origin: Origin::Tool,
            ..Self::new(severity, message)
        }
    }

    /// Wraps a line no translator could make sense of.
    pub fn passthrough(line: &str) -> Self {
        Self::tool(Severity::Debug, line)
    }

    pub fn parameter(mut self, p: Option<&str>) -> Self {
        self.parameter = p.filter(|s| s.is_empty() == false).map(|s| s.to_string());
        self
    }

    pub fn origin(mut self, o: Origin) -> Self {
        self.origin = o;
        self
    }

    pub fn get_severity(&self) -> Severity {
        self.severity
    }

    pub fn get_parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    pub fn get_message(&self) -> &str {
        &self.message
    }

    pub fn get_origin(&self) -> Origin {
        self.origin
    }

    /// Renders the event for a plain-text log file.
    pub fn to_plain(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        match &self.parameter {
            Some(p) => format!(
                "{}.{:03} - {} - ({}) - {}",
                now.as_secs(),
                now.subsec_millis(),
                self.severity,
                p,
                self.message
            ),
            None => format!(
                "{}.{:03} - {} - {}",
                now.as_secs(),
                now.subsec_millis(),
                self.severity,
                self.message
            ),
        }
    }
}

/// A destination for log events.
pub trait Sink {
    fn record(&mut self, event: &LogEvent);

    fn flush(&mut self) {}
}

/// Prints events at or above `level` to the terminal.
pub struct ConsoleSink {
    level: Severity,
}

impl ConsoleSink {
    pub fn new(level: Severity) -> Self {
        Self { level }
    }

    fn render(event: &LogEvent) -> String {
        let level = match event.severity {
            Severity::Debug | Severity::Info => event.severity.as_str().green(),
            Severity::Warning => event.severity.as_str().yellow(),
            Severity::Error | Severity::Critical => event.severity.as_str().red(),
        };
        match &event.parameter {
            Some(p) => format!("[{}][{}] {}", level, p.bright_blue(), event.message),
            None => format!("[{}] {}", level, event.message),
        }
    }
}

impl Sink for ConsoleSink {
    fn record(&mut self, event: &LogEvent) {
        if event.severity < self.level {
            return;
        }
        match event.severity >= Severity::Warning {
            true => eprintln!("{}", Self::render(event)),
            false => println!("{}", Self::render(event)),
        }
    }
}

/// Writes every event at or above `level` into a text file.
pub struct FileSink {
    writer: BufWriter<File>,
    level: Severity,
}

impl FileSink {
    /// Creates (or truncates) the log file at `path`, creating missing parent directories.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            level: Severity::Debug,
        })
    }

    pub fn level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }
}

impl Sink for FileSink {
    fn record(&mut self, event: &LogEvent) {
        if event.severity < self.level {
            return;
        }
        // a log file that cannot be written to must not take the build down with it
        let _ = writeln!(self.writer, "{}", event.to_plain());
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Fans events out to a list of sinks. One logger lives for one run.
pub struct Logger {
    sinks: Vec<Box<dyn Sink>>,
}

impl Logger {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn sink(mut self, s: Box<dyn Sink>) -> Self {
        self.sinks.push(s);
        self
    }

    pub fn log(&mut self, event: &LogEvent) {
        self.sinks.iter_mut().for_each(|s| s.record(event));
    }

    pub fn debug(&mut self, msg: &str) {
        self.log(&LogEvent::new(Severity::Debug, msg))
    }

    pub fn info(&mut self, msg: &str) {
        self.log(&LogEvent::new(Severity::Info, msg))
    }

    pub fn warning(&mut self, msg: &str) {
        self.log(&LogEvent::new(Severity::Warning, msg))
    }

    pub fn flush(&mut self) {
        self.sinks.iter_mut().for_each(|s| s.flush());
    }
}

#[cfg(test)]
pub mod capture {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Keeps every recorded event in memory for inspection by tests.
    #[derive(Clone, Default)]
    pub struct Capture(Rc<RefCell<Vec<LogEvent>>>);

    impl Capture {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<LogEvent> {
            self.0.borrow().clone()
        }

        pub fn contains(&self, severity: Severity, text: &str) -> bool {
            self.0
                .borrow()
                .iter()
                .any(|e| e.get_severity() == severity && e.get_message().contains(text))
        }
    }

    impl Sink for Capture {
        fn record(&mut self, event: &LogEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }
}
