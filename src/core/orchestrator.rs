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

//! The run state machine tying resolution, staleness and the adapter stages together.

use crate::core::pins::{PinConfig, PIN_FILE};
use crate::core::platform::{Design, Platform, Registry};
use crate::core::project::{ProjectConfig, PROJECT_FILE};
use crate::core::resolver::{self, ToolHint};
use crate::core::session::Session;
use crate::core::source::{self, SourceFile};
use crate::error::PldError;
use std::path::{Path, PathBuf};

/// The stages a user asked for.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Request {
    compile: bool,
    program: bool,
    simulate: Option<String>,
    clean: bool,
    tool: ToolHint,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(mut self, b: bool) -> Self {
        self.compile = b;
        self
    }

    pub fn program(mut self, b: bool) -> Self {
        self.program = b;
        self
    }

    pub fn simulate(mut self, module: Option<String>) -> Self {
        self.simulate = module;
        self
    }

    pub fn clean(mut self, b: bool) -> Self {
        self.clean = b;
        self
    }

    pub fn tool(mut self, hint: ToolHint) -> Self {
        self.tool = hint;
        self
    }

    /// Checks if the run only removes the generated tree.
    fn is_clean_only(&self) -> bool {
        self.clean == true
            && self.compile == false
            && self.program == false
            && self.simulate.is_none()
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Stage {
    Idle,
    Resolving,
    Simulating,
    Compiling,
    Programming,
    Cleaning,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Simulating => "simulating",
            Self::Compiling => "compiling",
            Self::Programming => "programming",
            Self::Cleaning => "cleaning",
            Self::Done => "done",
        };
        write!(f, "{}", s)
    }
}

pub struct Orchestrator<'a> {
    registry: &'a Registry,
    project: ProjectConfig,
    pins: PinConfig,
    request: Request,
    stage: Stage,
}

fn transition(stage: &mut Stage, next: Stage, session: &mut Session) {
    session
        .logger()
        .debug(&format!("stage: {} -> {}", stage, next));
    *stage = next;
}

/// Stops the run if an interrupt arrived while the last stage was running.
fn checkpoint(session: &Session) -> Result<(), PldError> {
    match session.is_interrupted() {
        true => Err(PldError::Interrupted),
        false => Ok(()),
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a Registry, project: ProjectConfig, pins: PinConfig, request: Request) -> Self {
        Self {
            registry,
            project,
            pins,
            request,
            stage: Stage::Idle,
        }
    }

    /// Reads the project and pin files from `root`.
    pub fn load(registry: &'a Registry, root: &Path, request: Request) -> Result<Self, PldError> {
        let project = ProjectConfig::load(root)?;
        let pins = PinConfig::load(root)?;
        Ok(Self::new(registry, project, pins, request))
    }

    pub fn get_stage(&self) -> Stage {
        self.stage
    }

    fn config_paths(&self) -> Vec<PathBuf> {
        let root = self.project.get_root();
        vec![root.join(PROJECT_FILE), root.join(PIN_FILE)]
    }

    /// Removes the generated tree.
    ///
    /// Both outcomes are reported through the error channel with a success code.
    fn clean(&mut self, session: &mut Session) -> Result<(), PldError> {
        transition(&mut self.stage, Stage::Cleaning, session);
        let gen = session.gen_dir();
        if gen.exists() == false {
            return Err(PldError::NothingToClean);
        }
        std::fs::remove_dir_all(&gen).map_err(|e| PldError::CleanFailed(gen.clone(), e.into()))?;
        session.discard();
        Err(PldError::Cleaned(gen))
    }

    /// Runs the compile stage and marks its inputs as fresh.
    fn compile(
        platform: &dyn Platform,
        session: &mut Session,
        design: &Design,
        inputs: &[PathBuf],
    ) -> Result<(), PldError> {
        platform.compile(session, design)?;
        checkpoint(session)?;
        let path = session.stamps().get_path().clone();
        session
            .stamps_mut()
            .record(inputs)
            .map_err(|e| PldError::WriteFailed(path, e.into()))
    }

    /// Drives every requested stage in order.
    pub fn run(&mut self, session: &mut Session) -> Result<(), PldError> {
        session.set_ignore(self.project.ignore_list()?);

        // repeated cleans never need a vendor tool
        if self.request.is_clean_only() == true {
            return self.clean(session);
        }

        transition(&mut self.stage, Stage::Resolving, session);
        let binding = resolver::resolve(
            self.registry,
            self.project.get_device(),
            &self.request.tool,
            session,
        )?;
        let platform = binding.get_platform();
        let part = binding.get_part().to_string();
        session.bind(platform.name(), &part, self.project.get_top());

        let mut dirs = vec![self.project.get_src().clone()];
        if let Some(p) = self.project.get_platform_src() {
            dirs.push(p.join(platform.name()));
        }
        let files = source::collect(&dirs, self.project.get_mode());
        session
            .logger()
            .debug(&format!("found {} source file(s)", files.len()));

        let configs = self.config_paths();
        let paths: Vec<PathBuf> = files.iter().map(|f: &SourceFile| f.get_path().clone()).collect();
        let stale = session.stamps().is_stale(&paths, &configs);
        let inputs: Vec<PathBuf> = paths.into_iter().chain(configs.into_iter()).collect();

        let design = Design {
            project: &self.project,
            pins: &self.pins,
            files: &files,
            part: &part,
        };

        let mut compiled = false;
        if let Some(module) = &self.request.simulate {
            if self.request.compile == true || self.request.program == true {
                session
                    .logger()
                    .warning("ignoring compile and program flags: simulation was requested");
            }
            transition(&mut self.stage, Stage::Simulating, session);
            platform.simulate(session, &design, module)?;
            checkpoint(session)?;
        } else {
            if self.request.compile == true {
                match stale {
                    true => {
                        transition(&mut self.stage, Stage::Compiling, session);
                        Self::compile(platform, session, &design, &inputs)?;
                        compiled = true;
                    }
                    false => session
                        .logger()
                        .warning("skipping synthesis: no changes detected"),
                }
            }
            if self.request.program == true {
                if compiled == false && platform.bitstream(session).exists() == false {
                    session
                        .logger()
                        .info("no bitstream found; compiling the design first");
                    transition(&mut self.stage, Stage::Compiling, session);
                    Self::compile(platform, session, &design, &inputs)?;
                }
                transition(&mut self.stage, Stage::Programming, session);
                platform.program(session, &design)?;
                checkpoint(session)?;
            }
        }

        if self.request.clean == true {
            match self.request.compile {
                true => session
                    .logger()
                    .warning("skipping clean: keeping the files generated by this run"),
                false => return self.clean(session),
            }
        }
        transition(&mut self.stage, Stage::Done, session);
        Ok(())
    }
}
