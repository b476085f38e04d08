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

//! The project file `pldprj.yml`.

use crate::core::process::IgnoreList;
use crate::error::{LastError, PldError};
use crate::util::filesystem;
use serde_derive::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const PROJECT_FILE: &str = "pldprj.yml";

const REQUIRED_PARAMS: [&str; 2] = ["device", "top"];

/// Which source languages are part of the design.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Mode {
    Vhdl,
    Verilog,
    Mixed,
}

impl FromStr for Mode {
    type Err = PldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_ref() {
            "VHDL" => Ok(Self::Vhdl),
            "VERILOG" => Ok(Self::Verilog),
            "MIXED" => Ok(Self::Mixed),
            _ => Err(PldError::UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawProject {
    device: Option<String>,
    top: Option<String>,
    filetype: Option<String>,
    src: Option<PathBuf>,
    platform_src: Option<PathBuf>,
    vhdl2008: Option<bool>,
    ignore: Option<Vec<String>>,
    remote: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ProjectConfig {
    root: PathBuf,
    device: String,
    top: String,
    mode: Mode,
    src: PathBuf,
    platform_src: Option<PathBuf>,
    vhdl2008: bool,
    ignore: Vec<String>,
    remote: Option<String>,
}

impl ProjectConfig {
    /// Reads `pldprj.yml` from the project `root`.
    pub fn load(root: &Path) -> Result<Self, PldError> {
        let path = root.join(PROJECT_FILE);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| PldError::FileUnreadable(path.clone(), LastError::from(e)))?;
        Self::parse(&text, root).map_err(|e| match e {
            PldError::FileMalformed(_, err) => PldError::FileMalformed(path, err),
            _ => e,
        })
    }

    /// Builds the configuration from the document `text`, resolving relative
    /// directories against `root`.
    pub fn parse(text: &str, root: &Path) -> Result<Self, PldError> {
        let raw: RawProject = serde_yaml::from_str::<Option<RawProject>>(text)
            .map_err(|e| PldError::FileMalformed(PathBuf::from(PROJECT_FILE), e.into()))?
            .unwrap_or_default();

        let missing: Vec<String> = REQUIRED_PARAMS
            .iter()
            .zip([&raw.device, &raw.top])
            .filter(|(_, v)| v.as_ref().filter(|s| s.trim().is_empty() == false).is_none())
            .map(|(k, _)| k.to_string())
            .collect();
        let (device, top) = match (raw.device, raw.top) {
            (Some(d), Some(t)) if missing.is_empty() => (d, t),
            _ => return Err(PldError::MissingParameters(missing)),
        };

        Ok(Self {
            root: root.to_path_buf(),
            device: device.trim().to_string(),
            top: top.trim().to_string(),
            mode: match raw.filetype {
                Some(m) => Mode::from_str(&m)?,
                None => Mode::Mixed,
            },
            src: filesystem::resolve_rel_path(
                root,
                &raw.src.unwrap_or_else(|| PathBuf::from("./src")),
            ),
            platform_src: raw
                .platform_src
                .map(|p| filesystem::resolve_rel_path(root, &p)),
            vhdl2008: raw.vhdl2008.unwrap_or(false),
            ignore: raw.ignore.unwrap_or_default(),
            // "DEFAULT" defers to the settings or the adapter's own default
            remote: raw.remote.filter(|r| r.eq_ignore_ascii_case("DEFAULT") == false),
        })
    }

    pub fn get_root(&self) -> &PathBuf {
        &self.root
    }

    pub fn get_device(&self) -> &str {
        &self.device
    }

    pub fn get_top(&self) -> &str {
        &self.top
    }

    pub fn get_mode(&self) -> Mode {
        self.mode
    }

    pub fn get_src(&self) -> &PathBuf {
        &self.src
    }

    pub fn get_platform_src(&self) -> Option<&PathBuf> {
        self.platform_src.as_ref()
    }

    pub fn is_vhdl2008(&self) -> bool {
        self.vhdl2008
    }

    pub fn get_remote(&self) -> Option<&str> {
        self.remote.as_deref()
    }

    /// Compiles the `ignore` patterns.
    pub fn ignore_list(&self) -> Result<IgnoreList, PldError> {
        IgnoreList::from_patterns(&self.ignore)
            .map_err(|(pat, e)| PldError::BadIgnorePattern(pat, e.into()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PROJECT: &str = r#"
device: XC7A35TCSG324-1
top: blinky
filetype: vhdl
src: ./rtl
platform_src: ./boards
vhdl2008: true
ignore:
  - "Synth 8-7129"
remote: DEFAULT
"#;

    #[test]
    fn parse_full_project() {
        let root = PathBuf::from("/work/blinky");
        let prj = ProjectConfig::parse(PROJECT, &root).unwrap();
        assert_eq!(prj.get_device(), "XC7A35TCSG324-1");
        assert_eq!(prj.get_top(), "blinky");
        assert_eq!(prj.get_mode(), Mode::Vhdl);
        assert_eq!(prj.get_src(), &PathBuf::from("/work/blinky/rtl"));
        assert_eq!(
            prj.get_platform_src(),
            Some(&PathBuf::from("/work/blinky/boards"))
        );
        assert_eq!(prj.is_vhdl2008(), true);
        assert_eq!(prj.get_remote(), None);
        assert!(prj.ignore_list().is_ok());
    }

    #[test]
    fn defaults() {
        let prj = ProjectConfig::parse("device: 5CEFA2F23C8\ntop: top\n", Path::new("/p")).unwrap();
        assert_eq!(prj.get_mode(), Mode::Mixed);
        assert_eq!(prj.get_src(), &PathBuf::from("/p/src"));
        assert_eq!(prj.get_platform_src(), None);
        assert_eq!(prj.is_vhdl2008(), false);
    }

    #[test]
    fn missing_parameters() {
        assert_eq!(
            ProjectConfig::parse("", Path::new("/p")),
            Err(PldError::MissingParameters(vec![
                String::from("device"),
                String::from("top")
            ]))
        );
        assert_eq!(
            ProjectConfig::parse("device: xc7a35t\n", Path::new("/p")),
            Err(PldError::MissingParameters(vec![String::from("top")]))
        );
    }

    #[test]
    fn bad_mode_and_patterns() {
        assert_eq!(
            ProjectConfig::parse("device: a\ntop: b\nfiletype: spice\n", Path::new("/p")),
            Err(PldError::UnknownMode(String::from("spice")))
        );
        let prj = ProjectConfig::parse("device: a\ntop: b\nignore: ['(oops']\n", Path::new("/p"))
            .unwrap();
        assert!(matches!(
            prj.ignore_list(),
            Err(PldError::BadIgnorePattern(p, _)) if p == "(oops"
        ));
    }

    #[test]
    fn unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ProjectConfig::load(dir.path()),
            Err(PldError::FileUnreadable(..))
        ));
    }
}
