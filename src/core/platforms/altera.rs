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

//! Intel (Altera) devices driven through Quartus.

use super::marked;
use crate::core::log::{LogEvent, Severity};
use crate::core::platform::{Design, Platform};
use crate::core::process::{Invocation, Translate};
use crate::core::session::Session;
use crate::error::PldError;
use crate::util::filesystem;
use regex::Regex;
use std::path::PathBuf;

const NAME: &str = "Altera";

const DEFAULT_IOSTD: &str = "LVCMOS";

pub struct Altera {
    line: Regex,
}

impl Altera {
    pub fn new() -> Self {
        Self {
            line: Regex::new(r"^(Info|(?:Critical )?Warning|Error|Critical):? (?:\((.*?)\): )?(.*)$")
                .unwrap(),
        }
    }

    /// Quartus tools are launched by their plain names on every host.
    fn quartus(command: &str) -> Invocation {
        Invocation::new(command)
    }
}

impl Translate for Altera {
    fn translate(&self, line: &str) -> LogEvent {
        let caps = match self.line.captures(line) {
            Some(c) => c,
            None => return LogEvent::passthrough(line),
        };
        let message = caps.get(3).map_or("", |m| m.as_str()).trim();
        let severity = match &caps[1] {
            // banner lines are the only tool info worth showing by default
            "Info" if message.starts_with("*****") => Severity::Info,
            "Info" => Severity::Debug,
            "Warning" | "Critical Warning" => Severity::Warning,
            "Error" => Severity::Error,
            _ => Severity::Critical,
        };
        LogEvent::tool(severity, message).parameter(caps.get(2).map(|m| m.as_str()))
    }
}

impl Platform for Altera {
    fn name(&self) -> &'static str {
        NAME
    }

    fn executable(&self) -> &'static str {
        "quartus_sh"
    }

    fn resources(&self) -> &'static [(&'static str, &'static str)] {
        &[("parts.tcl", resources::PARTS), ("qsf.tcl", resources::PROJECT)]
    }

    fn query_parts(&self, session: &mut Session) -> Result<Option<Vec<String>>, PldError> {
        let resources = session.materialize(self)?;
        let dir = session.directory(NAME, "query")?;
        let inv = Self::quartus("quartus_sh")
            .arg("-t")
            .arg(&filesystem::into_std_str(resources.join("parts.tcl")))
            .cwd(&dir)
            .message("querying quartus for supported parts...");
        Ok(session.capture(NAME, inv)?.map(|lines| marked(&lines)))
    }

    fn compile(&self, session: &mut Session, design: &Design) -> Result<(), PldError> {
        let pins = design.pins.require(NAME, DEFAULT_IOSTD)?;
        let resources = session.materialize(self)?;
        let dir = session.directory(NAME, "compile")?;
        let bitfile_dir = session.directory(NAME, "compile/bitfile")?;

        let steps = [
            (
                Self::quartus("quartus_sh")
                    .arg("-t")
                    .arg(&filesystem::into_std_str(resources.join("qsf.tcl")))
                    .arg(design.part)
                    .arg(design.project.get_top())
                    .args(&design.files.iter().map(|f| f.to_arg()).collect::<Vec<String>>())
                    .args(&pins.iter().map(|p| p.to_arg()).collect::<Vec<String>>()),
                "creating quartus project...",
            ),
            (
                Self::quartus("quartus_map").arg("project"),
                "executing synthesis...",
            ),
            (
                Self::quartus("quartus_fit").arg("project"),
                "executing fitter...",
            ),
            (
                Self::quartus("quartus_asm").arg("project"),
                "executing assembler...",
            ),
        ];
        for (inv, msg) in steps {
            session.run(self, inv.cwd(&dir).label("comp").message(msg))?;
        }

        let sof = dir.join("project.sof");
        let dest = bitfile_dir.join("project.sof");
        if dest.exists() == true {
            std::fs::remove_file(&dest).map_err(|e| PldError::WriteFailed(dest.clone(), e.into()))?;
        }
        std::fs::rename(&sof, &dest).map_err(|e| PldError::WriteFailed(dest, e.into()))?;
        Ok(())
    }

    fn program(&self, session: &mut Session, _: &Design) -> Result<(), PldError> {
        let dir = session.directory(NAME, "compile/bitfile")?;
        session.run(
            self,
            Self::quartus("quartus_pgm")
                .args(&["-m", "JTAG", "-o", "p;./project.sof"])
                .cwd(&dir)
                .label("prog")
                .message("executing programmer..."),
        )?;
        Ok(())
    }

    fn simulate(&self, _: &mut Session, _: &Design, _: &str) -> Result<(), PldError> {
        Err(PldError::Unsupported(NAME.to_string(), String::from("simulation")))
    }

    fn bitstream(&self, session: &Session) -> PathBuf {
        session
            .gen_dir()
            .join(NAME)
            .join("compile")
            .join("bitfile")
            .join("project.sof")
    }
}

mod resources {
    pub const PARTS: &str = r#"load_package device
puts "PLDUDE:BEGIN"
foreach family [get_family_list] {
    foreach part [get_part_list -family $family] {
        puts $part
    }
}
puts "PLDUDE:END"
"#;

    pub const PROJECT: &str = r#"load_package flow
set part [lindex $quartus(args) 0]
set top [lindex $quartus(args) 1]

project_new project -overwrite
set_global_assignment -name DEVICE $part
set_global_assignment -name TOP_LEVEL_ENTITY $top
foreach arg [lrange $quartus(args) 2 end] {
    set fields [split $arg ";"]
    switch -- [lindex $fields 0] {
        FILE {
            if {[lindex $fields 1] eq "VHDL"} {
                set_global_assignment -name VHDL_FILE [lindex $fields 2]
            } else {
                set_global_assignment -name VERILOG_FILE [lindex $fields 2]
            }
        }
        IO {
            set_location_assignment [lindex $fields 2] -to [lindex $fields 1]
            set_instance_assignment -name IO_STANDARD [lindex $fields 3] -to [lindex $fields 1]
        }
    }
}
project_close
"#;
}
