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

use crate::core::log::Severity;
use std::{fmt::Display, path::PathBuf};

/// Numeric process exit status reported for every outcome of a run.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorCode {
    Success = 0,
    FileError = 1,
    ToolError = 2,
    ProjectParam = 3,
    Platform = 4,
    Verbosity = 5,
    PinConfig = 6,
    System = 7,
    FileMode = 8,
}

impl ErrorCode {
    pub fn value(&self) -> i32 {
        *self as i32
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum PldError {
    #[error("nothing to clean")]
    NothingToClean,
    #[error("cleaned generated files at {0:?}")]
    Cleaned(PathBuf),
    #[error("user termination")]
    Interrupted,
    #[error("no hardware targets found")]
    NoTargets,
    #[error("could not open {0:?}: {1}")]
    FileUnreadable(PathBuf, LastError),
    #[error("failed to parse {0:?}: {1}")]
    FileMalformed(PathBuf, LastError),
    #[error("missing project parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),
    #[error("ignore pattern {0:?} is not a valid regular expression: {1}")]
    BadIgnorePattern(String, LastError),
    #[error("unknown file type: {0}")]
    UnknownMode(String),
    #[error("verbosity expected to be: (DEBUG | INFO | WARNING | ERROR | CRITICAL | NONE), got {0:?}")]
    BadVerbosity(String),
    #[error("device {0:?} was not found in any tools{1}")]
    PlatformNotFound(String, Hint),
    #[error("device {0:?} was not found in tool {1:?}")]
    DeviceNotInTool(String, String),
    #[error("tool {0:?} invalid, acceptable values: {}", .1.join(", "))]
    UnknownTool(String, Vec<String>),
    #[error("part {0:?} could not be found (did you mean {1:?}?)")]
    DidYouMean(String, String),
    #[error("duplicate platform {0:?}")]
    DuplicatePlatform(String),
    #[error("platform {0:?} does not support {1}")]
    Unsupported(String, String),
    #[error("pin configuration does not exist for {0}")]
    MissingPinSection(String),
    #[error("must specify both 'pkg' and 'iostd' in pinprj.yml for {}", .0.join(", "))]
    IncompletePins(Vec<String>),
    #[error("{0} reported {1} error(s)")]
    ToolReported(String, usize),
    #[error("{0} exited with error code: {1}")]
    ChildProcErrorCode(String, i32),
    #[error("{0} terminated by signal")]
    ChildProcTerminated(String),
    #[error("failed to execute {0}: {1}")]
    SpawnFailed(String, LastError),
    #[error("failed to write {0:?}: {1}")]
    WriteFailed(PathBuf, LastError),
    #[error("failed to clean {0:?}: {1}")]
    CleanFailed(PathBuf, LastError),
    #[error("{0}")]
    System(LastError),
}

impl PldError {
    /// Maps the error to the exit status handed back to the operating system.
    pub fn code(&self) -> ErrorCode {
        use PldError::*;
        match self {
            NothingToClean | Cleaned(_) | Interrupted | NoTargets => ErrorCode::Success,
            FileUnreadable(..) | FileMalformed(..) => ErrorCode::FileError,
            ToolReported(..) | ChildProcErrorCode(..) | ChildProcTerminated(_) => {
                ErrorCode::ToolError
            }
            MissingParameters(_) | BadIgnorePattern(..) => ErrorCode::ProjectParam,
            UnknownMode(_) => ErrorCode::FileMode,
            BadVerbosity(_) => ErrorCode::Verbosity,
            PlatformNotFound(..)
            | DeviceNotInTool(..)
            | UnknownTool(..)
            | DidYouMean(..)
            | DuplicatePlatform(_)
            | Unsupported(..) => ErrorCode::Platform,
            MissingPinSection(_) | IncompletePins(_) => ErrorCode::PinConfig,
            SpawnFailed(..) | WriteFailed(..) | CleanFailed(..) | System(_) => ErrorCode::System,
        }
    }

    /// The severity the top-level handler logs this outcome at.
    pub fn level(&self) -> Severity {
        use PldError::*;
        match self {
            NothingToClean | Cleaned(_) => Severity::Info,
            Interrupted | NoTargets => Severity::Warning,
            ToolReported(..) | ChildProcErrorCode(..) | ChildProcTerminated(_) => Severity::Error,
            _ => Severity::Critical,
        }
    }
}

impl From<std::io::Error> for PldError {
    fn from(value: std::io::Error) -> Self {
        Self::System(LastError(value.to_string()))
    }
}

#[derive(Debug, PartialEq)]
pub struct LastError(pub String);

impl Display for LastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", lowerize(self.0.to_string()))
    }
}

impl<T: std::error::Error> From<T> for LastError {
    fn from(value: T) -> Self {
        Self(value.to_string())
    }
}

/// Lowercases the first letter of `s` unless its first word is an acronym.
pub fn lowerize(s: String) -> String {
    let first_word = match s.split_whitespace().next() {
        Some(w) => w,
        None => return s,
    };
    // retain punctuation if the first word is all-caps and longer than 1 character
    if first_word.len() > 1 && first_word.chars().any(|c| c.is_ascii_lowercase()) == false {
        s
    } else {
        s.char_indices()
            .map(|(i, c)| if i == 0 { c.to_ascii_lowercase() } else { c })
            .collect()
    }
}

#[derive(Debug, PartialEq)]
pub enum Hint {
    PlatformList,
}

impl Display for Hint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlatformList => write!(
                f,
                "; use `pldude --list` to see the registered platforms and their tools"
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowerize_keeps_acronyms() {
        assert_eq!(lowerize(String::from("No such file")), "no such file");
        assert_eq!(lowerize(String::from("IO failure")), "IO failure");
        assert_eq!(lowerize(String::new()), "");
    }

    #[test]
    fn outcomes_share_the_error_channel() {
        assert_eq!(PldError::NothingToClean.code().value(), 0);
        assert_eq!(PldError::NothingToClean.level(), Severity::Info);
        assert_eq!(PldError::Interrupted.code(), ErrorCode::Success);
        assert_eq!(
            PldError::ToolReported(String::from("vivado"), 1).code().value(),
            2
        );
        assert_eq!(
            PldError::DidYouMean(String::from("a"), String::from("b")).code(),
            ErrorCode::Platform
        );
        assert_eq!(
            PldError::MissingParameters(vec![String::from("top")]).to_string(),
            "missing project parameters: top"
        );
    }
}
