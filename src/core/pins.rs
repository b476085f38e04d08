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

//! The pin file `pinprj.yml`: package pin assignments per platform.

use crate::error::{LastError, PldError};
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const PIN_FILE: &str = "pinprj.yml";

#[derive(Debug, PartialEq, Deserialize)]
#[serde(untagged)]
enum Pin {
    Bare(String),
    Record {
        pkg: Option<String>,
        iostd: Option<String>,
    },
}

/// One top-level port bound to a package pin.
#[derive(Debug, PartialEq, Clone)]
pub struct PinAssignment {
    port: String,
    pkg: String,
    iostd: String,
}

impl PinAssignment {
    /// Formats the assignment as a script argument: `IO;<port>;<pkg>;<iostd>`.
    pub fn to_arg(&self) -> String {
        format!("IO;{};{};{}", self.port, self.pkg, self.iostd)
    }
}

#[derive(Debug, PartialEq, Default)]
pub struct PinConfig(BTreeMap<String, BTreeMap<String, Pin>>);

impl PinConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(root: &Path) -> Result<Self, PldError> {
        let path = root.join(PIN_FILE);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| PldError::FileUnreadable(path.clone(), LastError::from(e)))?;
        Self::parse(&text).map_err(|e| PldError::FileMalformed(path, e.into()))
    }

    /// Parses a pin document. An empty document has no sections.
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        Ok(Self(
            serde_yaml::from_str::<Option<BTreeMap<String, Option<BTreeMap<String, Pin>>>>>(text)?
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.unwrap_or_default()))
                .collect(),
        ))
    }

    /// Collects the assignments listed for `platform`.
    ///
    /// Bare pins take `default_iostd`. Returns `None` if the file has no section for
    /// the platform, and an error naming every port whose record lacks a `pkg` or
    /// `iostd`.
    pub fn assignments(
        &self,
        platform: &str,
        default_iostd: &str,
    ) -> Result<Option<Vec<PinAssignment>>, PldError> {
        let section = match self.0.get(platform) {
            Some(s) => s,
            None => return Ok(None),
        };
        let mut incomplete = Vec::new();
        let pins: Vec<PinAssignment> = section
            .iter()
            .filter_map(|(port, pin)| match pin {
                Pin::Bare(pkg) => Some(PinAssignment {
                    port: port.clone(),
                    pkg: pkg.clone(),
                    iostd: default_iostd.to_string(),
                }),
                Pin::Record {
                    pkg: Some(pkg),
                    iostd: Some(iostd),
                } => Some(PinAssignment {
                    port: port.clone(),
                    pkg: pkg.clone(),
                    iostd: iostd.clone(),
                }),
                Pin::Record { .. } => {
                    incomplete.push(port.clone());
                    None
                }
            })
            .collect();
        match incomplete.is_empty() {
            true => Ok(Some(pins)),
            false => Err(PldError::IncompletePins(incomplete)),
        }
    }

    /// Same as [PinConfig::assignments] but a missing section is an error.
    pub fn require(&self, platform: &str, default_iostd: &str) -> Result<Vec<PinAssignment>, PldError> {
        self.assignments(platform, default_iostd)?
            .ok_or_else(|| PldError::MissingPinSection(platform.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PINS: &str = r#"
Xilinx7:
  clk: E3
  led:
    pkg: H17
    iostd: LVCMOS18
Altera:
"#;

    #[test]
    fn bare_and_record_pins() {
        let pins = PinConfig::parse(PINS).unwrap();
        let xil = pins.require("Xilinx7", "LVCMOS33").unwrap();
        assert_eq!(xil.len(), 2);
        assert_eq!(xil[0].to_arg(), "IO;clk;E3;LVCMOS33");
        assert_eq!(xil[1].to_arg(), "IO;led;H17;LVCMOS18");
        // a listed but empty section is present
        assert_eq!(pins.require("Altera", "LVCMOS"), Ok(vec![]));
    }

    #[test]
    fn missing_section() {
        let pins = PinConfig::parse("").unwrap();
        assert_eq!(pins.assignments("Xilinx7", "LVCMOS33"), Ok(None));
        assert_eq!(
            pins.require("Altera", "LVCMOS"),
            Err(PldError::MissingPinSection(String::from("Altera")))
        );
    }

    #[test]
    fn incomplete_records() {
        let pins = PinConfig::parse("Altera:\n  sw:\n    pkg: PIN_C10\n  key:\n    iostd: LVTTL\n").unwrap();
        assert_eq!(
            pins.require("Altera", "LVCMOS"),
            Err(PldError::IncompletePins(vec![
                String::from("key"),
                String::from("sw")
            ]))
        );
    }
}
