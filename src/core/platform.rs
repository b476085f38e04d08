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

//! The capability set every vendor adapter provides, and the registry holding them.

use crate::core::pins::PinConfig;
use crate::core::platforms;
use crate::core::process::Translate;
use crate::core::project::ProjectConfig;
use crate::core::session::Session;
use crate::core::source::SourceFile;
use crate::error::PldError;
use crate::util::strcmp;
use std::path::PathBuf;

/// Everything an adapter needs to build the design for its bound part.
pub struct Design<'a> {
    pub project: &'a ProjectConfig,
    pub pins: &'a PinConfig,
    pub files: &'a [SourceFile],
    pub part: &'a str,
}

/// A vendor toolchain.
///
/// Adapters are stateless: anything they learn during a run goes through the
/// [Session], which also owns the processes they start.
pub trait Platform: Translate {
    /// The unique name used for directories, pin sections and `--platform`.
    fn name(&self) -> &'static str;

    /// The primary executable, used to report whether the toolchain is installed.
    fn executable(&self) -> &'static str;

    /// Script templates as `(file name, contents)` pairs, written into the
    /// adapter's resource directory before they are used.
    fn resources(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Lists every part the toolchain supports.
    ///
    /// Returns `None` when the vendor tool is not installed on this machine.
    fn query_parts(&self, session: &mut Session) -> Result<Option<Vec<String>>, PldError>;

    fn compile(&self, session: &mut Session, design: &Design) -> Result<(), PldError>;

    fn program(&self, session: &mut Session, design: &Design) -> Result<(), PldError>;

    fn simulate(&self, session: &mut Session, design: &Design, module: &str)
        -> Result<(), PldError>;

    /// The file the compile stage leaves behind for programming.
    fn bitstream(&self, session: &Session) -> PathBuf;
}

/// The ordered set of adapters known to this build.
///
/// Order matters: resolution tries adapters first to last and keeps the first match.
pub struct Registry {
    platforms: Vec<Box<dyn Platform>>,
}

impl Registry {
    /// Creates the registry of every adapter shipped with pldude.
    pub fn discover() -> Result<Self, PldError> {
        Self::with(platforms::installed())
    }

    /// Creates a registry from `platforms`, keeping their order.
    ///
    /// Errors if two adapters share a name (ignoring case).
    pub fn with(platforms: Vec<Box<dyn Platform>>) -> Result<Self, PldError> {
        for (i, p) in platforms.iter().enumerate() {
            if platforms[..i]
                .iter()
                .any(|q| strcmp::cmp_ascii_ignore_case(q.name(), p.name()))
            {
                return Err(PldError::DuplicatePlatform(p.name().to_string()));
            }
        }
        Ok(Self { platforms })
    }

    /// Finds the adapter called `name`, ignoring case.
    pub fn find(&self, name: &str) -> Option<&dyn Platform> {
        self.platforms
            .iter()
            .find(|p| strcmp::cmp_ascii_ignore_case(p.name(), name))
            .map(|p| p.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Platform> {
        self.platforms.iter().map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.platforms.iter().map(|p| p.name().to_string()).collect()
    }
}

#[cfg(test)]
pub mod fake {
    //! An adapter whose catalog and stage outcomes are set by the test.

    use super::*;
    use crate::core::log::{LogEvent, Severity};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    pub struct Calls(Rc<RefCell<Vec<String>>>);

    impl Calls {
        pub fn push(&self, s: &str) {
            self.0.borrow_mut().push(s.to_string());
        }

        pub fn get(&self) -> Vec<String> {
            self.0.borrow().clone()
        }

        pub fn count(&self, s: &str) -> usize {
            self.0.borrow().iter().filter(|c| c.as_str() == s).count()
        }
    }

    pub struct Fake {
        pub name: &'static str,
        pub parts: Option<Vec<String>>,
        pub calls: Calls,
        /// Writes the bitstream when compiling.
        pub produces: bool,
        /// Fails the compile stage with a tool error.
        pub fails: bool,
    }

    impl Fake {
        pub fn new(name: &'static str, parts: &[&str]) -> Self {
            Self {
                name,
                parts: Some(parts.iter().map(|s| s.to_string()).collect()),
                calls: Calls::default(),
                produces: true,
                fails: false,
            }
        }

        /// An adapter whose vendor tool is not installed.
        pub fn absent(name: &'static str) -> Self {
            Self {
                parts: None,
                ..Self::new(name, &[])
            }
        }

        pub fn calls(mut self, c: &Calls) -> Self {
            self.calls = c.clone();
            self
        }
    }

    impl Translate for Fake {
        fn translate(&self, line: &str) -> LogEvent {
            match line.split_once(": ") {
                Some(("ERROR", msg)) => LogEvent::tool(Severity::Error, msg),
                _ => LogEvent::passthrough(line),
            }
        }
    }

    impl Platform for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        fn executable(&self) -> &'static str {
            "fake"
        }

        fn query_parts(&self, _: &mut Session) -> Result<Option<Vec<String>>, PldError> {
            self.calls.push(&format!("{}:query", self.name));
            Ok(self.parts.clone())
        }

        fn compile(&self, session: &mut Session, _: &Design) -> Result<(), PldError> {
            self.calls.push("compile");
            if self.fails == true {
                return Err(PldError::ToolReported(String::from("fake"), 1));
            }
            if self.produces == true {
                let bit = self.bitstream(session);
                std::fs::create_dir_all(bit.parent().unwrap())?;
                std::fs::write(bit, "bits")?;
            }
            Ok(())
        }

        fn program(&self, _: &mut Session, _: &Design) -> Result<(), PldError> {
            self.calls.push("program");
            Ok(())
        }

        fn simulate(&self, _: &mut Session, _: &Design, module: &str) -> Result<(), PldError> {
            self.calls.push(&format!("simulate:{}", module));
            Ok(())
        }

        fn bitstream(&self, session: &Session) -> PathBuf {
            session
                .gen_dir()
                .join(self.name)
                .join("compile")
                .join("bitfile")
                .join("project.bit")
        }
    }
}
