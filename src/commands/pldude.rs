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

use crate::commands::helps::pldude;
use crate::core::log::{ConsoleSink, FileSink, LogEvent, Logger, Severity};
use crate::core::orchestrator::{Orchestrator, Request};
use crate::core::platform::{Platform, Registry};
use crate::core::process::ProcessTable;
use crate::core::resolver::ToolHint;
use crate::core::session::{Session, LOG_DIR};
use crate::core::settings::Settings;
use crate::error::PldError;
use crate::util::filesystem;
use colored::Colorize;
use std::path::PathBuf;

use cliproc::{cli, proc, stage::*};
use cliproc::{Arg, Cli, Command, Help};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the per-run log file kept under the log directory.
pub const RUN_LOG: &str = "pldude.log";

#[derive(Debug, PartialEq)]
pub struct Pldude {
    compile: bool,
    program: bool,
    simulate: Option<String>,
    clean: bool,
    platform: Option<ToolHint>,
    verbosity: Option<String>,
    list: bool,
    version: bool,
}

impl Command for Pldude {
    fn interpret<'c>(cli: &'c mut Cli<Memory>) -> cli::Result<Self> {
        cli.help(Help::with(pldude::HELP))?;
        Ok(Pldude {
            // Flags
            compile: cli.check(Arg::flag("compile").switch('c'))?,
            program: cli.check(Arg::flag("program").switch('p'))?,
            clean: cli.check(Arg::flag("clean").switch('x'))?,
            list: cli.check(Arg::flag("list"))?,
            version: cli.check(Arg::flag("version"))?,
            // Options
            simulate: cli.get(Arg::option("simulate").switch('s').value("module"))?,
            platform: cli.get(Arg::option("platform").switch('l').value("name"))?,
            verbosity: cli.get(Arg::option("verbosity").switch('v').value("level"))?,
        })
    }

    fn execute(self) -> proc::Result {
        // prioritize version information
        if self.version == true {
            println!("pldude {}", VERSION);
            return Ok(());
        }
        let code = self.run();
        if code != 0 {
            std::process::exit(code);
        }
        Ok(())
    }
}

impl Pldude {
    /// Reports an error that occurred before a session could be created.
    fn fail(e: PldError) -> i32 {
        let mut logger = Logger::new().sink(Box::new(ConsoleSink::new(Severity::Info)));
        logger.log(&LogEvent::new(e.level(), &e.to_string()));
        logger.flush();
        e.code().value()
    }

    /// Picks the console level: the command line wins over the user settings.
    fn console_level(&self, settings: &Settings) -> Result<Severity, PldError> {
        match self
            .verbosity
            .as_deref()
            .or_else(|| settings.get_verbosity())
        {
            Some(v) => Severity::from_verbosity(v),
            None => Ok(Severity::Info),
        }
    }

    fn run(self) -> i32 {
        let settings = match Settings::from_home() {
            Ok(s) => s,
            Err(e) => return Self::fail(e),
        };
        let level = match self.console_level(&settings) {
            Ok(l) => l,
            Err(e) => return Self::fail(e),
        };
        let registry = match Registry::discover() {
            Ok(r) => r,
            Err(e) => return Self::fail(e),
        };
        // display platform list and exit
        if self.list == true {
            println!("{}", Self::list_platforms(&registry, &settings));
            return 0;
        }
        let root = match std::env::current_dir() {
            Ok(r) => r,
            Err(e) => return Self::fail(e.into()),
        };

        let log_path = root.join(LOG_DIR).join(RUN_LOG);
        let mut logger = Logger::new().sink(Box::new(ConsoleSink::new(level)));
        let log_file = match FileSink::create(&log_path) {
            Ok(sink) => {
                logger = logger.sink(Box::new(sink));
                None
            }
            Err(e) => Some(e),
        };

        let processes = ProcessTable::new();
        let handler = {
            let processes = processes.clone();
            ctrlc::set_handler(move || {
                processes.interrupt();
            })
        };

        let mut session = Session::new(&root, logger, settings, processes);
        if let Some(e) = log_file {
            session
                .logger()
                .warning(&format!("failed to create log file {:?}: {}", log_path, e));
        }
        if let Err(e) = handler {
            session
                .logger()
                .warning(&format!("failed to install interrupt handler: {}", e));
        }
        session.logger().debug(&format!("pldude {}", VERSION));

        let request = Request::new()
            .compile(self.compile)
            .program(self.program)
            .simulate(self.simulate)
            .clean(self.clean)
            .tool(self.platform.unwrap_or_default());
        let result = Orchestrator::load(&registry, &root, request).and_then(|mut o| o.run(&mut session));
        session.conclude(result)
    }

    /// Checks where the vendor tool of `platform` would be launched from.
    fn locate_tool(platform: &dyn Platform, settings: &Settings) -> Option<PathBuf> {
        match settings.get_platform(platform.name()).and_then(|p| p.get_bin()) {
            Some(bin) => Some(bin.join(platform.executable())).filter(|p| p.is_file()),
            None => filesystem::find_on_path(platform.executable()),
        }
    }

    fn list_platforms(registry: &Registry, settings: &Settings) -> String {
        let mut table = format!("{:<12}{:<12}{}\n", "Platform", "Tool", "Status");
        table.push_str(&format!("{:<12}{:<12}{}\n", "---------", "---------", "------"));
        registry.iter().for_each(|p| {
            let status = match Self::locate_tool(p, settings) {
                Some(path) => format!("{} ({})", "found".green(), filesystem::into_std_str(path)),
                None => format!("{}", "missing".yellow()),
            };
            table.push_str(&format!("{:<12}{:<12}{}\n", p.name(), p.executable(), status));
        });
        table
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn command(verbosity: Option<&str>) -> Pldude {
        Pldude {
            compile: false,
            program: false,
            simulate: None,
            clean: false,
            platform: None,
            verbosity: verbosity.map(|s| s.to_string()),
            list: false,
            version: false,
        }
    }

    #[test]
    fn verbosity_priority() {
        let settings: Settings = "verbosity = \"debug\"".parse().unwrap();
        assert_eq!(command(None).console_level(&settings), Ok(Severity::Debug));
        assert_eq!(
            command(Some("warning")).console_level(&settings),
            Ok(Severity::Warning)
        );
        assert_eq!(
            command(Some("none")).console_level(&Settings::new()),
            Ok(Severity::Error)
        );
        assert_eq!(command(None).console_level(&Settings::new()), Ok(Severity::Info));
    }

    #[test]
    fn bad_verbosity_exit_code() {
        let e = command(Some("LOUD"))
            .console_level(&Settings::new())
            .unwrap_err();
        assert_eq!(e.code().value(), 5);
    }

    #[test]
    fn platform_table() {
        let registry = Registry::discover().unwrap();
        let table = Pldude::list_platforms(&registry, &Settings::new());
        let rows: Vec<&str> = table.lines().collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[2].starts_with("Xilinx7"));
        assert!(rows[3].starts_with("Altera"));
    }
}
