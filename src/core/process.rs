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

//! Launches vendor tool processes and turns their output into log events.
//!
//! Every child is registered in a [ProcessTable] for the lifetime of the run so an
//! interrupt can sweep over the table and stop whatever is still running.

use crate::core::log::{LogEvent, Logger, Sink};
use crate::util::environment::Environment;
use regex::Regex;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Converts one line of a vendor tool's output into a log event.
///
/// Implementations must be total: a line that does not follow the tool's
/// conventions becomes a [LogEvent::passthrough] instead of being dropped.
pub trait Translate {
    fn translate(&self, line: &str) -> LogEvent;
}

/// A request to run an external command.
#[derive(Debug, PartialEq, Clone)]
pub struct Invocation {
    command: String,
    args: Vec<String>,
    cwd: PathBuf,
    blocking: bool,
    interactive: bool,
    label: Option<String>,
    message: Option<String>,
}

impl Invocation {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            args: Vec::new(),
            cwd: PathBuf::from("."),
            blocking: true,
            interactive: false,
            label: None,
            message: None,
        }
    }

    pub fn arg(mut self, a: &str) -> Self {
        self.args.push(a.to_string());
        self
    }

    pub fn args<T: AsRef<str>>(mut self, list: &[T]) -> Self {
        self.args
            .extend(list.iter().map(|a| a.as_ref().to_string()));
        self
    }

    pub fn cwd(mut self, p: &Path) -> Self {
        self.cwd = p.to_path_buf();
        self
    }

    /// Returns right after spawning instead of draining the output.
    pub fn detached(mut self) -> Self {
        self.blocking = false;
        self
    }

    /// Opens a pipe to the process's standard input.
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Names the run in the per-invocation log artifact.
    pub fn label(mut self, s: &str) -> Self {
        self.label = Some(s.to_string());
        self
    }

    /// Sets the progress message logged when the process starts.
    pub fn message(mut self, s: &str) -> Self {
        self.message = Some(s.to_string());
        self
    }

    pub fn get_command(&self) -> &str {
        &self.command
    }

    pub fn get_args(&self) -> &Vec<String> {
        &self.args
    }

    pub fn get_cwd(&self) -> &PathBuf {
        &self.cwd
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn get_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The command's file stem, used to name processes in messages and log files.
    pub fn get_name(&self) -> String {
        Path::new(&self.command)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.command.clone())
    }

    /// The file name of this run's log artifact.
    pub fn artifact_name(&self) -> String {
        match &self.label {
            Some(l) => format!("{}-{}.log", l, self.get_name()),
            None => format!("{}.log", self.get_name()),
        }
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            self.command,
            self.args
                .iter()
                .fold(String::new(), |x, y| x + " \"" + y + "\"")
        )
    }
}

/// Identifies a process registered in a [ProcessTable].
#[derive(Debug, PartialEq, Clone)]
pub struct ProcessHandle {
    id: u64,
    name: String,
}

impl ProcessHandle {
    pub fn get_name(&self) -> &str {
        &self.name
    }
}

struct Tracked {
    id: u64,
    child: Child,
    stdin: Option<ChildStdin>,
}

/// Every process spawned during one run.
///
/// Clones share the same table so an interrupt handler on another thread can
/// terminate the children while the main thread is blocked on one of them.
#[derive(Clone, Default)]
pub struct ProcessTable {
    procs: Arc<Mutex<Vec<Tracked>>>,
    interrupted: Arc<AtomicBool>,
    /// Source of run-local ids; operating system pids may be reused.
    next_id: Arc<AtomicU64>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Tracked>> {
        // a panic while holding the lock does not invalidate the children
        self.procs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawns `program` as described by `inv` and starts tracking it.
    ///
    /// Standard output and standard error are both piped and merged into the
    /// returned [Output].
    pub fn spawn(
        &self,
        program: &Path,
        inv: &Invocation,
        env: &Environment,
    ) -> std::io::Result<(ProcessHandle, Output)> {
        let mut child = Command::new(program)
            .args(inv.get_args())
            .current_dir(inv.get_cwd())
            .envs(env.into_map())
            .stdin(match inv.interactive {
                true => Stdio::piped(),
                false => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let output = Output::merge(child.stdout.take(), child.stderr.take());
        let handle = ProcessHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: inv.get_name(),
        };
        let stdin = child.stdin.take();
        self.lock().push(Tracked {
            id: handle.id,
            child,
            stdin,
        });
        Ok((handle, output))
    }

    /// Writes `bytes` to the standard input of an interactive process.
    pub fn write(&self, handle: &ProcessHandle, bytes: &[u8]) -> std::io::Result<()> {
        let mut procs = self.lock();
        match procs
            .iter_mut()
            .find(|p| p.id == handle.id)
            .and_then(|p| p.stdin.as_mut())
        {
            Some(stdin) => stdin.write_all(bytes),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("{} is not accepting input", handle.name),
            )),
        }
    }

    /// Closes the standard input of the process so it can run to completion.
    pub fn close_input(&self, handle: &ProcessHandle) {
        if let Some(p) = self.lock().iter_mut().find(|p| p.id == handle.id) {
            p.stdin = None;
        }
    }

    /// Waits for the process to exit.
    ///
    /// The table is only locked between polls so an interrupt is never blocked
    /// behind a long-running child.
    pub fn wait(&self, handle: &ProcessHandle) -> std::io::Result<Option<ExitStatus>> {
        loop {
            {
                let mut procs = self.lock();
                let proc = match procs.iter_mut().find(|p| p.id == handle.id) {
                    Some(p) => p,
                    None => return Ok(None),
                };
                if let Some(status) = proc.child.try_wait()? {
                    return Ok(Some(status));
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Requests termination of a single process if it is still running.
    pub fn terminate(&self, handle: &ProcessHandle) {
        if let Some(p) = self.lock().iter_mut().find(|p| p.id == handle.id) {
            p.stdin = None;
            if let Ok(None) = p.child.try_wait() {
                let _ = p.child.kill();
            }
        }
    }

    /// Requests termination of every process that has not exited yet.
    ///
    /// Returns the number of processes that were signaled.
    pub fn terminate_all(&self) -> usize {
        self.lock()
            .iter_mut()
            .filter_map(|p| match p.child.try_wait() {
                Ok(None) => p.child.kill().ok(),
                _ => None,
            })
            .count()
    }

    /// Marks the run as interrupted and stops all running children.
    pub fn interrupt(&self) -> usize {
        self.interrupted.store(true, Ordering::SeqCst);
        self.terminate_all()
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

/// The merged standard output and standard error of a child process.
pub struct Output {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Output {
    fn merge<A, B>(stdout: Option<A>, stderr: Option<B>) -> Self
    where
        A: Read + Send + 'static,
        B: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        if let Some(s) = stdout {
            Self::forward(s, tx.clone());
        }
        if let Some(s) = stderr {
            Self::forward(s, tx.clone());
        }
        Self { rx }
    }

    fn forward<R: Read + Send + 'static>(stream: R, tx: mpsc::Sender<Vec<u8>>) {
        std::thread::spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut line = Vec::new();
            // stops at the end of the stream or once the receiver is gone
            while let Ok(n) = reader.read_until(b'\n', &mut line) {
                if n == 0 || tx.send(std::mem::take(&mut line)).is_err() {
                    break;
                }
            }
        });
    }

    /// Keeps reading the streams in the background without looking at them so the
    /// child never blocks on a full pipe.
    pub fn discard(self) {
        let rx = self.rx;
        std::thread::spawn(move || rx.into_iter().for_each(drop));
    }

    /// Iterates over lines until both streams reach their end.
    pub fn lines(self) -> impl Iterator<Item = String> {
        self.rx.into_iter().map(|raw| {
            String::from_utf8_lossy(&raw)
                .trim_end_matches(&['\r', '\n'][..])
                .to_string()
        })
    }
}

/// A spawned process together with its pending output.
pub struct Running {
    handle: ProcessHandle,
    output: Option<Output>,
    artifact: String,
}

impl Running {
    pub fn new(handle: ProcessHandle, output: Option<Output>, artifact: String) -> Self {
        Self {
            handle,
            output,
            artifact,
        }
    }

    pub fn get_handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// Takes the output stream, leaving nothing behind for a second reader.
    pub fn take_output(&mut self) -> Option<Output> {
        self.output.take()
    }

    pub fn get_artifact(&self) -> &str {
        &self.artifact
    }
}

/// Regular expressions matched against the parameter of non-fatal tool events.
#[derive(Debug, Default)]
pub struct IgnoreList(Vec<Regex>);

impl IgnoreList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Anchors each pattern at the start of the parameter.
    pub fn from_patterns<T: AsRef<str>>(patterns: &[T]) -> Result<Self, (String, regex::Error)> {
        patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("^(?:{})", p.as_ref()))
                    .map_err(|e| (p.as_ref().to_string(), e))
            })
            .collect::<Result<Vec<Regex>, _>>()
            .map(Self)
    }

    /// Checks if `event` should be hidden from the console and the run log.
    ///
    /// Errors and critical events are never suppressed.
    pub fn suppresses(&self, event: &LogEvent) -> bool {
        if event.get_severity().is_fatal() == true {
            return false;
        }
        match event.get_parameter() {
            Some(p) => self.0.iter().any(|r| r.is_match(p)),
            None => false,
        }
    }
}

/// Summary of one drained output stream.
#[derive(Debug, PartialEq, Default)]
pub struct Report {
    pub lines: usize,
    pub fatal: usize,
    pub suppressed: usize,
}

impl Report {
    pub fn is_fatal(&self) -> bool {
        self.fatal > 0
    }
}

/// Translates every line of `lines` and delivers the events to the sinks.
///
/// The stream is always read to its end; a fatal event is only counted so that the
/// remaining lines are still logged.
pub fn drain<T: Translate + ?Sized>(
    lines: impl Iterator<Item = String>,
    translator: &T,
    ignore: &IgnoreList,
    logger: &mut Logger,
    mut artifact: Option<&mut dyn Sink>,
) -> Report {
    let mut report = Report::default();
    for line in lines {
        report.lines += 1;
        let event = translator.translate(&line);
        if let Some(a) = artifact.as_mut() {
            a.record(&event);
        }
        if event.get_severity().is_fatal() == true {
            report.fatal += 1;
        }
        if ignore.suppresses(&event) == true {
            report.suppressed += 1;
            continue;
        }
        logger.log(&event);
    }
    if let Some(a) = artifact.as_mut() {
        a.flush();
    }
    report
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::log::capture::Capture;
    use crate::core::log::Severity;

    /// Reads `LEVEL: [param] message` lines.
    struct Simple;

    impl Translate for Simple {
        fn translate(&self, line: &str) -> LogEvent {
            let re = Regex::new(r"^(INFO|WARNING|ERROR): \[(.*?)\] (.*)$").unwrap();
            match re.captures(line) {
                Some(c) => LogEvent::tool(c[1].parse().unwrap(), &c[3])
                    .parameter(c.get(2).map(|m| m.as_str())),
                None => LogEvent::passthrough(line),
            }
        }
    }

    fn lines(text: &str) -> impl Iterator<Item = String> + '_ {
        text.lines().map(|l| l.to_string())
    }

    #[test]
    fn drain_keeps_reading_after_fatal() {
        let cap = Capture::new();
        let mut logger = Logger::new().sink(Box::new(cap.clone()));
        let out = "\
INFO: [Synth 8-1] starting
ERROR: [Synth 8-2] undeclared signal
garbage ~~ line
WARNING: [Place 30-1] slack
";
        let report = drain(lines(out), &Simple, &IgnoreList::new(), &mut logger, None);
        assert_eq!(report.lines, 4);
        assert_eq!(report.fatal, 1);
        assert_eq!(cap.events().len(), 4);
        assert!(cap.contains(Severity::Debug, "garbage ~~ line"));
        assert!(cap.contains(Severity::Warning, "slack"));
    }

    #[test]
    fn blank_lines_are_kept() {
        let cap = Capture::new();
        let artifact = Capture::new();
        let mut logger = Logger::new().sink(Box::new(cap.clone()));
        let mut a = artifact.clone();
        let out = vec![String::from("a"), String::new(), String::from("   ")];
        let report = drain(out.into_iter(), &Simple, &IgnoreList::new(), &mut logger, Some(&mut a));
        assert_eq!(report.lines, 3);
        assert_eq!(report.fatal, 0);
        assert_eq!(cap.events().len(), 3);
        assert_eq!(artifact.events().len(), 3);
        assert!(cap.events().iter().all(|e| e.get_severity() == Severity::Debug));
    }

    #[test]
    fn ignore_list_never_hides_errors() {
        let cap = Capture::new();
        let artifact = Capture::new();
        let mut logger = Logger::new().sink(Box::new(cap.clone()));
        let ignore = IgnoreList::from_patterns(&["Synth 8-.*"]).unwrap();
        let out = "\
WARNING: [Synth 8-7129] port unused
ERROR: [Synth 8-439] module not found
WARNING: [Place 30-12] kept
";
        let mut a = artifact.clone();
        let report = drain(lines(out), &Simple, &ignore, &mut logger, Some(&mut a));
        assert_eq!(report.suppressed, 1);
        assert_eq!(report.fatal, 1);
        assert_eq!(cap.events().len(), 2);
        assert!(cap.contains(Severity::Error, "module not found"));
        // the artifact still keeps the suppressed line
        assert_eq!(artifact.events().len(), 3);
    }

    #[test]
    fn ignore_patterns_anchor_at_start() {
        let ignore = IgnoreList::from_patterns(&["8-7129"]).unwrap();
        let e = LogEvent::tool(Severity::Warning, "x").parameter(Some("Synth 8-7129"));
        assert_eq!(ignore.suppresses(&e), false);
        assert!(IgnoreList::from_patterns(&["(unclosed"]).is_err());
    }

    #[test]
    fn invocation_names() {
        let inv = Invocation::new("/opt/Xilinx/bin/vivado.bat")
            .args(&["-mode", "batch"])
            .label("comp");
        assert_eq!(inv.get_name(), "vivado");
        assert_eq!(inv.artifact_name(), "comp-vivado.log");
        assert_eq!(Invocation::new("quartus_map").artifact_name(), "quartus_map.log");
        assert_eq!(inv.is_blocking(), true);
        assert_eq!(inv.detached().is_blocking(), false);
    }

    #[cfg(unix)]
    #[test]
    fn spawn_merges_streams() {
        let table = ProcessTable::new();
        let inv = Invocation::new("sh")
            .arg("-c")
            .arg("echo one; echo two 1>&2; echo three");
        let (handle, output) = table
            .spawn(Path::new("sh"), &inv, &Environment::new())
            .unwrap();
        let mut got: Vec<String> = output.lines().collect();
        got.sort();
        assert_eq!(got, vec!["one", "three", "two"]);
        let status = table.wait(&handle).unwrap().unwrap();
        assert!(status.success());
        assert_eq!(table.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn handles_are_unique_per_run() {
        let table = ProcessTable::new();
        let inv = Invocation::new("sh").arg("-c").arg("exit 4");
        let (first, out) = table
            .spawn(Path::new("sh"), &inv, &Environment::new())
            .unwrap();
        out.discard();
        assert_eq!(table.wait(&first).unwrap().unwrap().code(), Some(4));
        let inv = Invocation::new("cat").interactive().detached();
        let (second, out) = table
            .spawn(Path::new("cat"), &inv, &Environment::new())
            .unwrap();
        assert_ne!(first, second);
        // the exited child never answers for the new one
        table.write(&second, b"ok\n").unwrap();
        assert!(table.write(&first, b"ok\n").is_err());
        table.close_input(&second);
        assert_eq!(out.lines().collect::<Vec<String>>(), vec!["ok"]);
        assert!(table.wait(&second).unwrap().unwrap().success());
        assert_eq!(table.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn interrupt_stops_running_children() {
        let table = ProcessTable::new();
        let inv = Invocation::new("sleep").arg("30").detached();
        let (handle, _output) = table
            .spawn(Path::new("sleep"), &inv, &Environment::new())
            .unwrap();
        assert_eq!(table.interrupt(), 1);
        assert!(table.is_interrupted());
        let status = table.wait(&handle).unwrap().unwrap();
        assert_eq!(status.success(), false);
        // already exited children are left alone
        assert_eq!(table.terminate_all(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn interactive_input() {
        let table = ProcessTable::new();
        let inv = Invocation::new("cat").interactive().detached();
        let (handle, output) = table
            .spawn(Path::new("cat"), &inv, &Environment::new())
            .unwrap();
        table.write(&handle, b"open_hw\n").unwrap();
        table.close_input(&handle);
        let got: Vec<String> = output.lines().collect();
        assert_eq!(got, vec!["open_hw"]);
        assert!(table.wait(&handle).unwrap().unwrap().success());
    }
}
