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

//! Xilinx 7-series devices driven through Vivado.

use super::{launcher, marked};
use crate::core::log::{LogEvent, Origin, Severity};
use crate::core::platform::{Design, Platform};
use crate::core::process::{Invocation, Translate};
use crate::core::session::Session;
use crate::core::source::Kind;
use crate::error::PldError;
use crate::util::filesystem;
use crate::util::prompt;
use regex::Regex;
use std::path::{Path, PathBuf};

const NAME: &str = "Xilinx7";

const DEFAULT_IOSTD: &str = "LVCMOS33";

const DEFAULT_REMOTE: &str = "localhost:3121";

pub struct Xilinx7 {
    line: Regex,
}

impl Xilinx7 {
    pub fn new() -> Self {
        Self {
            line: Regex::new(
                r"^(PLDUDE|INFO|WARNING|CRITICAL WARNING|ERROR|CRITICAL): (?:\[(.*?)\] )?(.*)$",
            )
            .unwrap(),
        }
    }

    /// The hardware server URL: the project's, then the user's, then the local default.
    fn remote(&self, session: &Session, design: &Design) -> String {
        design
            .project
            .get_remote()
            .or_else(|| session.settings().get_platform(NAME).and_then(|p| p.get_remote()))
            .unwrap_or(DEFAULT_REMOTE)
            .to_string()
    }

    fn vivado_tcl(dir: &Path) -> Invocation {
        Invocation::new(&launcher("vivado"))
            .args(&["-mode", "tcl", "-nojournal", "-nolog"])
            .cwd(dir)
            .interactive()
            .detached()
    }

    /// Asks the hardware server which JTAG targets and devices are connected and
    /// lets the user choose one of each.
    fn select_target(
        &self,
        session: &mut Session,
        dir: &Path,
        resources: &Path,
        remote: &str,
    ) -> Result<(String, String), PldError> {
        let scan = session.run(
            self,
            Self::vivado_tcl(dir).message("getting list of JTAG devices..."),
        )?;
        session.write(
            &scan,
            &format!(
                "open_hw\nconnect_hw_server -url {}\nsource {{{}}}\nexit\n",
                remote,
                filesystem::into_std_str(resources.join("scan_for_devices.tcl"))
            ),
        )?;
        // an interrupt during the scan surfaces here before the user is asked anything
        let lines = session.collect(scan)?;
        let processes = session.processes().clone();
        let (target, device) = choose(parse_targets(&marked(&lines)), || {
            processes.is_interrupted()
        })?;
        session
            .logger()
            .info(&format!("selecting device {} on target {}", device, target));
        Ok((target, device))
    }

    fn flash(
        &self,
        session: &mut Session,
        design: &Design,
        dir: &Path,
    ) -> Result<(), PldError> {
        let resources = session.materialize(self)?;
        let remote = self.remote(session, design);
        let (target, device) = self.select_target(session, dir, &resources, &remote)?;
        let bitfile = filesystem::into_std_str(self.bitstream(session));

        let prog = session.run(
            self,
            Self::vivado_tcl(dir)
                .label("prog")
                .message("programming device..."),
        )?;
        session.write(
            &prog,
            &format!(
                "open_hw\n\
                connect_hw_server -url {remote}\n\
                current_hw_target {target}\n\
                open_hw_target\n\
                current_hw_device [get_hw_devices {device}]\n\
                set_property PROGRAM.FILE {{{bitfile}}} [current_hw_device]\n\
                program_hw_devices [current_hw_device]\n\
                close_hw_target\n\
                exit\n"
            ),
        )?;
        session.communicate(self, prog)?;
        Ok(())
    }
}

/// A JTAG chain and the devices found on it.
#[derive(Debug, PartialEq)]
struct Target {
    name: String,
    devices: Vec<String>,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.devices.join(" "))
    }
}

/// Lets the user pick one target and one of its devices.
///
/// Stops with [PldError::Interrupted] as soon as `stop` reports true.
fn choose(mut targets: Vec<Target>, stop: impl Fn() -> bool) -> Result<(String, String), PldError> {
    if targets.is_empty() == true {
        return Err(PldError::NoTargets);
    }
    let t = prompt::select("Select a target", &targets, &stop)?.ok_or(PldError::Interrupted)?;
    let mut target = targets.swap_remove(t);
    if target.devices.is_empty() == true {
        return Err(PldError::NoTargets);
    }
    let d = prompt::select("Select a device", &target.devices, &stop)?
        .ok_or(PldError::Interrupted)?;
    Ok((target.name, target.devices.swap_remove(d)))
}

/// Reads `<target> <device>...` lines printed by the scan script.
fn parse_targets(lines: &[String]) -> Vec<Target> {
    lines
        .iter()
        .filter_map(|l| {
            let mut words = l.split_whitespace();
            Some(Target {
                name: words.next()?.to_string(),
                devices: words.map(|w| w.to_string()).collect(),
            })
        })
        .collect()
}

impl Translate for Xilinx7 {
    fn translate(&self, line: &str) -> LogEvent {
        let caps = match self.line.captures(line) {
            Some(c) => c,
            None => return LogEvent::passthrough(line),
        };
        let message = caps.get(3).map_or("", |m| m.as_str()).trim();
        let (severity, origin) = match &caps[1] {
            "PLDUDE" => (Severity::Info, Origin::Orchestrator),
            "INFO" => (Severity::Debug, Origin::Tool),
            "WARNING" | "CRITICAL WARNING" => (Severity::Warning, Origin::Tool),
            "ERROR" => (Severity::Error, Origin::Tool),
            _ => (Severity::Critical, Origin::Tool),
        };
        LogEvent::tool(severity, message)
            .parameter(caps.get(2).map(|m| m.as_str()))
            .origin(origin)
    }
}

impl Platform for Xilinx7 {
    fn name(&self) -> &'static str {
        NAME
    }

    fn executable(&self) -> &'static str {
        "vivado"
    }

    fn resources(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("parts.tcl", resources::PARTS),
            ("comp.tcl", resources::COMPILE),
            ("scan_for_devices.tcl", resources::SCAN),
        ]
    }

    fn query_parts(&self, session: &mut Session) -> Result<Option<Vec<String>>, PldError> {
        let resources = session.materialize(self)?;
        let dir = session.directory(NAME, "query")?;
        let inv = Invocation::new(&launcher("vivado"))
            .args(&["-mode", "batch", "-nojournal", "-nolog", "-notrace", "-source"])
            .arg(&filesystem::into_std_str(resources.join("parts.tcl")))
            .cwd(&dir)
            .message("querying vivado for supported parts...");
        Ok(session.capture(NAME, inv)?.map(|lines| marked(&lines)))
    }

    fn compile(&self, session: &mut Session, design: &Design) -> Result<(), PldError> {
        let resources = session.materialize(self)?;
        let dir = session.directory(NAME, "compile")?;
        session.directory(NAME, "compile/bitfile")?;
        let pins = design
            .pins
            .assignments(NAME, DEFAULT_IOSTD)?
            .unwrap_or_default();

        let inv = Invocation::new(&launcher("vivado"))
            .args(&["-mode", "batch", "-source"])
            .arg(&filesystem::into_std_str(resources.join("comp.tcl")))
            .arg("-tclargs")
            .arg(design.part)
            .arg(design.project.get_top())
            .arg(&design.project.is_vhdl2008().to_string())
            .args(&design.files.iter().map(|f| f.to_arg()).collect::<Vec<String>>())
            .args(&pins.iter().map(|p| p.to_arg()).collect::<Vec<String>>())
            .cwd(&dir)
            .label("comp")
            .message("executing vivado run...");
        session.run(self, inv)?;
        Ok(())
    }

    fn program(&self, session: &mut Session, design: &Design) -> Result<(), PldError> {
        let dir = session.directory(NAME, "program")?;
        let server = session.run(
            self,
            Invocation::new(&launcher("hw_server"))
                .cwd(&dir)
                .detached()
                .message("starting JTAG hardware server..."),
        )?;
        let result = self.flash(session, design, &dir);
        session.terminate(server);
        result
    }

    fn simulate(&self, session: &mut Session, design: &Design, module: &str) -> Result<(), PldError> {
        let dir = session.directory(NAME, "simulation")?;
        session.logger().info("writing simulation project file...");
        let prj: String = design
            .files
            .iter()
            .map(|f| {
                let lang = match (f.get_kind(), design.project.is_vhdl2008()) {
                    (Kind::Vhdl, true) => "vhdl2008",
                    (Kind::Vhdl, false) => "vhdl",
                    (Kind::Verilog, _) => "verilog",
                };
                format!(
                    "{} work {}\n",
                    lang,
                    filesystem::into_std_str(f.get_path().clone())
                )
            })
            .collect();
        let prj_path = dir.join("sim.prj");
        std::fs::write(&prj_path, prj).map_err(|e| PldError::WriteFailed(prj_path, e.into()))?;

        let batch = dir.join("bat.tcl");
        if batch.exists() == false {
            session.logger().info("writing tcl batch file...");
            std::fs::write(&batch, resources::WAVE)
                .map_err(|e| PldError::WriteFailed(batch.clone(), e.into()))?;
        }

        session.run(
            self,
            Invocation::new(&launcher("xelab"))
                .args(&["-prj", "./sim.prj", "-debug", "typical", "-s", "sim.out"])
                .arg(&format!("work.{}", module))
                .cwd(&dir)
                .label("sim")
                .message("executing xelab..."),
        )?;
        session.run(
            self,
            Invocation::new(&launcher("xsim"))
                .args(&["sim.out", "-gui", "-tclbatch", "./bat.tcl"])
                .cwd(&dir)
                .label("sim")
                .message("executing xsim..."),
        )?;
        Ok(())
    }

    fn bitstream(&self, session: &Session) -> PathBuf {
        session
            .gen_dir()
            .join(NAME)
            .join("compile")
            .join("bitfile")
            .join("project.bit")
    }
}

mod resources {
    pub const PARTS: &str = r#"puts "PLDUDE:BEGIN"
foreach part [get_parts] {
    puts $part
}
puts "PLDUDE:END"
"#;

    pub const COMPILE: &str = r#"set part [lindex $argv 0]
set top [lindex $argv 1]
set vhdl2008 [lindex $argv 2]

puts "PLDUDE: Reading design sources..."
set xdc [open ./pins.xdc w]
puts $xdc "set_property CFGBVS VCCO \[current_design\];"
puts $xdc "set_property CONFIG_VOLTAGE 3.3 \[current_design\];"
foreach arg [lrange $argv 3 end] {
    set fields [split $arg ";"]
    switch -- [lindex $fields 0] {
        FILE {
            set path [lindex $fields 2]
            if {[lindex $fields 1] eq "VHDL"} {
                if {[string is true $vhdl2008]} {
                    read_vhdl -vhdl2008 $path
                } else {
                    read_vhdl $path
                }
            } else {
                read_verilog $path
            }
        }
        IO {
            puts $xdc "set_property -dict { PACKAGE_PIN [lindex $fields 2] IOSTANDARD [lindex $fields 3] } \[get_ports { [lindex $fields 1] }\];"
        }
    }
}
close $xdc
read_xdc ./pins.xdc

puts "PLDUDE: Executing synthesis..."
synth_design -top $top -part $part
write_checkpoint -force ./post_synth.dcp

puts "PLDUDE: Executing place and route..."
opt_design
place_design
route_design
write_checkpoint -force ./post_par.dcp

puts "PLDUDE: Generating bitstream..."
write_bitstream -force ./bitfile/project.bit
"#;

    pub const SCAN: &str = r#"puts "PLDUDE:BEGIN"
foreach target [get_hw_targets] {
    current_hw_target $target
    open_hw_target
    puts "$target [get_hw_devices]"
    close_hw_target
}
puts "PLDUDE:END"
"#;

    pub const WAVE: &str =
        "create_wave_config; add_wave /; set_property needs_save false [current_wave_config]\n";
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn translate_vivado_lines() {
        let x = Xilinx7::new();
        let e = x.translate("INFO: [Synth 8-638] synthesizing module 'blinky'");
        assert_eq!(e.get_severity(), Severity::Debug);
        assert_eq!(e.get_parameter(), Some("Synth 8-638"));
        assert_eq!(e.get_message(), "synthesizing module 'blinky'");

        let e = x.translate("CRITICAL WARNING: [Constraints 18-952] no nets matched 'led'");
        assert_eq!(e.get_severity(), Severity::Warning);
        assert_eq!(e.get_parameter(), Some("Constraints 18-952"));

        let e = x.translate("ERROR: [Synth 8-439] module 'fifo' not found");
        assert_eq!(e.get_severity(), Severity::Error);

        let e = x.translate("CRITICAL: [Common 17-69] command failed");
        assert_eq!(e.get_severity(), Severity::Critical);

        let e = x.translate("WARNING: unused sequential element");
        assert_eq!(e.get_severity(), Severity::Warning);
        assert_eq!(e.get_parameter(), None);
    }

    #[test]
    fn script_progress_is_orchestrator_info() {
        let e = Xilinx7::new().translate("PLDUDE: Executing synthesis...");
        assert_eq!(e.get_severity(), Severity::Info);
        assert_eq!(e.get_origin(), Origin::Orchestrator);
        assert_eq!(e.get_message(), "Executing synthesis...");
    }

    #[test]
    fn garbage_passes_through() {
        let x = Xilinx7::new();
        for line in ["****** Vivado v2023.2 (64-bit)", "", "ERROR:no space", "\u{fffd}\u{fffd}"] {
            let e = x.translate(line);
            assert_eq!(e.get_severity(), Severity::Debug);
            assert_eq!(e.get_parameter(), None);
            assert_eq!(e.get_message(), line);
        }
    }

    #[test]
    fn scanned_targets() {
        let lines = vec![
            String::from("localhost:3121/xilinx_tcf/Digilent/210319A8A1B3 xc7a35t_0"),
            String::from("localhost:3121/xilinx_tcf/Digilent/210299B0B8F1 xc7z020_1 arm_dap_0"),
        ];
        let targets = parse_targets(&lines);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].devices, vec!["xc7z020_1", "arm_dap_0"]);
        assert_eq!(
            targets[0].to_string(),
            "localhost:3121/xilinx_tcf/Digilent/210319A8A1B3 (xc7a35t_0)"
        );
    }

    #[test]
    fn interrupted_selection() {
        let targets = parse_targets(&[
            String::from("localhost:3121/xilinx_tcf/Digilent/A xc7a35t_0"),
            String::from("localhost:3121/xilinx_tcf/Digilent/B xc7z020_1 arm_dap_0"),
        ]);
        assert_eq!(choose(targets, || true), Err(PldError::Interrupted));
        assert_eq!(choose(Vec::new(), || false), Err(PldError::NoTargets));
        // a single target with a single device needs no input
        let single = parse_targets(&[String::from("localhost:3121/xilinx_tcf/A xc7a35t_0")]);
        assert_eq!(
            choose(single, || false),
            Ok((
                String::from("localhost:3121/xilinx_tcf/A"),
                String::from("xc7a35t_0")
            ))
        );
    }

    #[test]
    fn bitstream_location() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = crate::core::session::testing(dir.path());
        assert!(Xilinx7::new()
            .bitstream(&session)
            .ends_with("gen/Xilinx7/compile/bitfile/project.bit"));
    }
}
