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

//! User-wide settings read from `config.toml` in the pldude home directory.

use crate::error::{LastError, PldError};
use crate::util::environment::PLDUDE_HOME;
use crate::util::strcmp;
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const SETTINGS_FILE: &str = "config.toml";

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformSettings {
    bin: Option<PathBuf>,
    remote: Option<String>,
}

impl PlatformSettings {
    /// Directory holding the vendor tool executables.
    pub fn get_bin(&self) -> Option<&PathBuf> {
        self.bin.as_ref()
    }

    pub fn get_remote(&self) -> Option<&str> {
        self.remote.as_deref()
    }
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    verbosity: Option<String>,
    #[serde(default)]
    platform: BTreeMap<String, PlatformSettings>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

impl FromStr for Settings {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locates the pldude home directory: `$PLDUDE_HOME` if set, else `~/.pldude`.
    pub fn home() -> Option<PathBuf> {
        match std::env::var_os(PLDUDE_HOME) {
            Some(p) if p.is_empty() == false => Some(PathBuf::from(p)),
            _ => home::home_dir().map(|h| h.join(".pldude")),
        }
    }

    /// Reads `config.toml` from `dir`. A missing file yields the defaults.
    pub fn load(dir: &Path) -> Result<Self, PldError> {
        let path = dir.join(SETTINGS_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(PldError::FileUnreadable(path, LastError::from(e))),
        };
        Self::from_str(&text).map_err(|e| PldError::FileMalformed(path, LastError::from(e)))
    }

    /// Reads the settings from the home directory, if one can be found.
    pub fn from_home() -> Result<Self, PldError> {
        match Self::home() {
            Some(dir) => Self::load(&dir),
            None => Ok(Self::new()),
        }
    }

    pub fn get_verbosity(&self) -> Option<&str> {
        self.verbosity.as_deref()
    }

    /// Finds the table for the platform `name`, ignoring case.
    pub fn get_platform(&self, name: &str) -> Option<&PlatformSettings> {
        self.platform
            .iter()
            .find(|(k, _)| strcmp::cmp_ascii_ignore_case(k, name))
            .map(|(_, v)| v)
    }

    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::environment::Environment;

    const CONFIG: &str = r#"
verbosity = "warning"

[platform.xilinx7]
bin = "/opt/Xilinx/Vivado/2023.2/bin"
remote = "lab-pc:3121"

[env]
board = "arty"
"#;

    #[test]
    fn parse_settings() {
        let s = Settings::from_str(CONFIG).unwrap();
        assert_eq!(s.get_verbosity(), Some("warning"));
        let xil = s.get_platform("Xilinx7").unwrap();
        assert_eq!(xil.get_bin(), Some(&PathBuf::from("/opt/Xilinx/Vivado/2023.2/bin")));
        assert_eq!(xil.get_remote(), Some("lab-pc:3121"));
        assert_eq!(s.get_platform("Altera"), None);

        let env = Environment::new().from_settings(&s);
        assert_eq!(env.get("PLDUDE_ENV_BOARD").unwrap().get_value(), "arty");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::from_str("colour = true").is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load(dir.path()), Ok(Settings::new()));
        std::fs::write(dir.path().join(SETTINGS_FILE), "verbosity = ").unwrap();
        assert!(matches!(
            Settings::load(dir.path()),
            Err(PldError::FileMalformed(..))
        ));
    }
}
