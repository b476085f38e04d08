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

//! State shared by every stage of a single run.

use crate::core::cache::{BuildCache, LoadStatus};
use crate::core::log::{FileSink, LogEvent, Logger, Sink};
use crate::core::platform::Platform;
use crate::core::process::{self, IgnoreList, Invocation, ProcessTable, Report, Running};
use crate::core::settings::Settings;
use crate::core::stamps::Timestamps;
use crate::error::{LastError, PldError};
use crate::util::environment::{EnvVar, Environment, PLDUDE_DEVICE, PLDUDE_PLATFORM, PLDUDE_ROOT, PLDUDE_TOP};
use crate::util::filesystem;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

pub const GEN_DIR: &str = "gen";
pub const LOG_DIR: &str = "logs";

/// Owns the logger, the caches and the process table for one invocation.
///
/// Adapters receive the session mutably while a stage runs; the orchestrator gets
/// it back to finish the run through [Session::conclude].
pub struct Session {
    root: PathBuf,
    logger: Logger,
    processes: ProcessTable,
    cache: BuildCache,
    stamps: Timestamps,
    settings: Settings,
    ignore: IgnoreList,
    env: Environment,
}

impl Session {
    /// Starts a session for the project at `root`, loading both caches from its
    /// generated tree.
    pub fn new(root: &Path, logger: Logger, settings: Settings, processes: ProcessTable) -> Self {
        let gen = root.join(GEN_DIR);
        let (cache, status) = BuildCache::load(&gen);
        let (stamps, stamp_status) = Timestamps::load(&gen);
        let env = Environment::new()
            .from_settings(&settings)
            .add(EnvVar::with(PLDUDE_ROOT, &filesystem::into_std_str(root.to_path_buf())));
        let mut session = Self {
            root: root.to_path_buf(),
            logger,
            processes,
            cache,
            stamps,
            settings,
            ignore: IgnoreList::new(),
            env,
        };
        if let LoadStatus::Corrupt(e) = status {
            session.logger.warning(&format!(
                "ignoring unreadable cache {:?}: {}",
                session.cache.get_path(),
                e
            ));
        }
        if let LoadStatus::Corrupt(e) = stamp_status {
            session.logger.warning(&format!(
                "ignoring unreadable timestamps {:?}: {}",
                session.stamps.get_path(),
                e
            ));
        }
        session
    }

    /// Sets the patterns hiding non-fatal tool messages.
    pub fn set_ignore(&mut self, list: IgnoreList) {
        self.ignore = list;
    }

    /// Records the resolved platform and design in the environment given to tools.
    pub fn bind(&mut self, platform: &str, part: &str, top: &str) {
        self.env = std::mem::take(&mut self.env)
            .overwrite(EnvVar::with(PLDUDE_PLATFORM, platform))
            .overwrite(EnvVar::with(PLDUDE_DEVICE, part))
            .overwrite(EnvVar::with(PLDUDE_TOP, top));
    }

    pub fn gen_dir(&self) -> PathBuf {
        self.root.join(GEN_DIR)
    }

    pub fn logger(&mut self) -> &mut Logger {
        &mut self.logger
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut BuildCache {
        &mut self.cache
    }

    pub fn stamps(&self) -> &Timestamps {
        &self.stamps
    }

    pub fn stamps_mut(&mut self) -> &mut Timestamps {
        &mut self.stamps
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn is_interrupted(&self) -> bool {
        self.processes.is_interrupted()
    }

    /// Returns `gen/<platform>/<sub>`, creating it if needed.
    pub fn directory(&self, platform: &str, sub: &str) -> Result<PathBuf, PldError> {
        let dir = self.gen_dir().join(platform).join(sub);
        std::fs::create_dir_all(&dir).map_err(|e| PldError::WriteFailed(dir.clone(), e.into()))?;
        Ok(dir)
    }

    /// Writes the adapter's script templates into its resource directory.
    pub fn materialize(&self, platform: &dyn Platform) -> Result<PathBuf, PldError> {
        let dir = self.directory(platform.name(), "resources")?;
        for (name, contents) in platform.resources() {
            let dest = dir.join(name);
            if std::fs::read_to_string(&dest).ok().as_deref() == Some(*contents) {
                continue;
            }
            std::fs::write(&dest, contents)
                .map_err(|e| PldError::WriteFailed(dest.clone(), e.into()))?;
        }
        Ok(dir)
    }

    /// Finds the program to execute for `command`, preferring the platform's
    /// configured `bin` directory.
    pub fn locate(&self, platform: &str, command: &str) -> PathBuf {
        match self.settings.get_platform(platform).and_then(|p| p.get_bin()) {
            Some(bin) => bin.join(command),
            None => PathBuf::from(command),
        }
    }

    fn spawn(&mut self, platform: &str, inv: &Invocation) -> Result<Running, PldError> {
        if let Some(msg) = inv.get_message() {
            self.logger.info(msg);
        }
        self.logger.debug(&format!("running {}", inv));
        let program = self.locate(platform, inv.get_command());
        let (handle, output) = self
            .processes
            .spawn(&program, inv, &self.env)
            .map_err(|e| PldError::SpawnFailed(inv.get_name(), e.into()))?;
        Ok(Running::new(handle, Some(output), inv.artifact_name()))
    }

    fn open_artifact(&mut self, platform: &str, name: &str) -> Option<FileSink> {
        let path = self.root.join(LOG_DIR).join(platform).join(name);
        match FileSink::create(&path) {
            Ok(sink) => Some(sink),
            Err(e) => {
                self.logger.warning(&format!(
                    "cannot write log file {:?}: {}",
                    path,
                    LastError::from(e)
                ));
                None
            }
        }
    }

    /// Runs `inv` on behalf of `platform`.
    ///
    /// A blocking invocation has its output translated and logged, then must exit
    /// cleanly without reporting errors. A detached invocation is returned while still
    /// running.
    pub fn run(&mut self, platform: &dyn Platform, inv: Invocation) -> Result<Running, PldError> {
        let running = self.spawn(platform.name(), &inv)?;
        match inv.is_blocking() {
            true => self.communicate(platform, running),
            false => Ok(running),
        }
    }

    /// Sends `text` to the standard input of an interactive process.
    pub fn write(&mut self, running: &Running, text: &str) -> Result<(), PldError> {
        self.logger
            .debug(&format!("{} <- {}", running.get_handle().get_name(), text.trim_end()));
        self.processes
            .write(running.get_handle(), text.as_bytes())
            .map_err(|e| PldError::System(e.into()))
    }

    /// Closes the input of `running`, translates its remaining output and waits for
    /// it to exit.
    pub fn communicate(
        &mut self,
        platform: &dyn Platform,
        mut running: Running,
    ) -> Result<Running, PldError> {
        let handle = running.get_handle().clone();
        self.processes.close_input(&handle);
        let mut artifact = self.open_artifact(platform.name(), running.get_artifact());
        let report = match running.take_output() {
            Some(output) => process::drain(
                output.lines(),
                platform,
                &self.ignore,
                &mut self.logger,
                artifact.as_mut().map(|a| a as &mut dyn Sink),
            ),
            None => Report::default(),
        };
        let status = self.processes.wait(&handle)?;
        self.check(handle.get_name(), status, &report)?;
        Ok(running)
    }

    /// Runs `inv` to completion and returns its raw output lines.
    ///
    /// Returns `None` if the program could not be found.
    pub fn capture(
        &mut self,
        platform: &str,
        inv: Invocation,
    ) -> Result<Option<Vec<String>>, PldError> {
        match self.spawn(platform, &inv) {
            Ok(running) => self.collect(running).map(Some),
            Err(PldError::SpawnFailed(name, e)) => {
                self.logger
                    .debug(&format!("{} is unavailable: {}", name, e));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Closes the input of `running` and gathers its output lines untranslated.
    pub fn collect(&mut self, mut running: Running) -> Result<Vec<String>, PldError> {
        let handle = running.get_handle().clone();
        self.processes.close_input(&handle);
        let lines: Vec<String> = match running.take_output() {
            Some(output) => output.lines().collect(),
            None => Vec::new(),
        };
        for l in &lines {
            self.logger.log(&LogEvent::passthrough(l));
        }
        let status = self.processes.wait(&handle)?;
        self.check(handle.get_name(), status, &Report::default())?;
        Ok(lines)
    }

    /// Stops a detached process and stops reading its output.
    pub fn terminate(&mut self, mut running: Running) {
        self.logger
            .debug(&format!("terminating {}", running.get_handle().get_name()));
        self.processes.terminate(running.get_handle());
        if let Some(output) = running.take_output() {
            output.discard();
        }
    }

    fn check(
        &self,
        name: &str,
        status: Option<ExitStatus>,
        report: &Report,
    ) -> Result<(), PldError> {
        if self.is_interrupted() == true {
            return Err(PldError::Interrupted);
        }
        if report.is_fatal() == true {
            return Err(PldError::ToolReported(name.to_string(), report.fatal));
        }
        match status {
            Some(s) if s.success() == false => match s.code() {
                Some(c) => Err(PldError::ChildProcErrorCode(name.to_string(), c)),
                None => Err(PldError::ChildProcTerminated(name.to_string())),
            },
            _ => Ok(()),
        }
    }

    /// Forgets every cache change made during this run.
    pub fn discard(&mut self) {
        self.cache.discard();
        self.stamps.discard();
    }

    /// Writes both caches to disk if they changed.
    pub fn flush(&mut self) -> Result<(), PldError> {
        self.cache.flush()?;
        let path = self.stamps.get_path().clone();
        self.stamps
            .flush()
            .map_err(|e| PldError::WriteFailed(path, e.into()))
    }

    /// Finishes the run with its `result` and returns the process exit code.
    ///
    /// The outcome is logged at its own severity, leftover processes are stopped, and
    /// the caches are flushed on every path.
    pub fn conclude(mut self, result: Result<(), PldError>) -> i32 {
        let mut code = match &result {
            Ok(()) => 0,
            Err(e) => {
                self.logger.log(&LogEvent::new(e.level(), &e.to_string()));
                e.code().value()
            }
        };
        let killed = self.processes.terminate_all();
        if killed > 0 {
            self.logger
                .debug(&format!("terminated {} leftover process(es)", killed));
        }
        if let Err(e) = self.flush() {
            self.logger.log(&LogEvent::new(e.level(), &e.to_string()));
            if code == 0 {
                code = e.code().value();
            }
        }
        self.logger.flush();
        code
    }
}

#[cfg(test)]
pub fn testing(root: &Path) -> (Session, crate::core::log::capture::Capture) {
    let cap = crate::core::log::capture::Capture::new();
    let logger = Logger::new().sink(Box::new(cap.clone()));
    (
        Session::new(root, logger, Settings::new(), ProcessTable::new()),
        cap,
    )
}
