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

//! Finds the HDL source files of a project.

use crate::core::project::Mode;
use crate::util::filesystem;
use crate::util::strcmp;
use glob::Pattern;
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Kind {
    Vhdl,
    Verilog,
}

impl Kind {
    /// Classifies `file` by its extension (`.vhd`/`.vhdl` or `.v`).
    pub fn detect(file: &Path) -> Option<Self> {
        let ext = file.extension()?.to_str()?;
        if strcmp::cmp_ascii_ignore_case(ext, "vhd") || strcmp::cmp_ascii_ignore_case(ext, "vhdl") {
            Some(Self::Vhdl)
        } else if strcmp::cmp_ascii_ignore_case(ext, "v") {
            Some(Self::Verilog)
        } else {
            None
        }
    }

    fn is_kept_by(&self, mode: Mode) -> bool {
        match mode {
            Mode::Mixed => true,
            Mode::Vhdl => self == &Self::Vhdl,
            Mode::Verilog => self == &Self::Verilog,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vhdl => write!(f, "VHDL"),
            Self::Verilog => write!(f, "VERILOG"),
        }
    }
}

/// A design file. Two files are the same file when their absolute paths match.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct SourceFile {
    path: PathBuf,
    kind: Kind,
}

impl SourceFile {
    pub fn new(path: PathBuf, kind: Kind) -> Self {
        Self { path, kind }
    }

    pub fn get_path(&self) -> &PathBuf {
        &self.path
    }

    pub fn get_kind(&self) -> Kind {
        self.kind
    }

    /// Formats the file as a script argument: `FILE;<KIND>;<path>`.
    pub fn to_arg(&self) -> String {
        format!(
            "FILE;{};{}",
            self.kind,
            filesystem::into_std_str(self.path.clone())
        )
    }
}

/// Walks every directory in `dirs` and keeps the files `mode` allows.
///
/// Missing directories contribute nothing. The result is sorted by path with
/// duplicates removed.
pub fn collect(dirs: &[PathBuf], mode: Mode) -> Vec<SourceFile> {
    let mut files: Vec<SourceFile> = dirs
        .iter()
        .filter(|d| d.is_dir())
        .filter_map(|d| {
            let pattern = format!("{}/**/*", Pattern::escape(&d.display().to_string()));
            glob::glob(&pattern).ok()
        })
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .filter_map(|p| {
            let kind = Kind::detect(&p)?;
            match kind.is_kept_by(mode) {
                true => Some(SourceFile::new(std::fs::canonicalize(&p).unwrap_or(p), kind)),
                false => None,
            }
        })
        .collect();
    files.sort();
    files.dedup_by(|a, b| a.path == b.path);
    files
}

#[cfg(test)]
mod test {
    use super::*;

    fn layout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("lib")).unwrap();
        std::fs::create_dir_all(dir.path().join("boards").join("Xilinx7")).unwrap();
        std::fs::write(src.join("top.vhd"), "").unwrap();
        std::fs::write(src.join("lib").join("fifo.VHDL"), "").unwrap();
        std::fs::write(src.join("lib").join("uart.v"), "").unwrap();
        std::fs::write(src.join("README.md"), "").unwrap();
        std::fs::write(src.join("tb.sv"), "").unwrap();
        std::fs::write(dir.path().join("boards").join("Xilinx7").join("clk.v"), "").unwrap();
        dir
    }

    fn names(files: &[SourceFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.get_path().file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn detect_kinds() {
        assert_eq!(Kind::detect(Path::new("a.vhd")), Some(Kind::Vhdl));
        assert_eq!(Kind::detect(Path::new("a.VhDl")), Some(Kind::Vhdl));
        assert_eq!(Kind::detect(Path::new("a.v")), Some(Kind::Verilog));
        assert_eq!(Kind::detect(Path::new("a.sv")), None);
        assert_eq!(Kind::detect(Path::new("Makefile")), None);
    }

    #[test]
    fn mixed_mode_keeps_both() {
        let dir = layout();
        let files = collect(&[dir.path().join("src")], Mode::Mixed);
        assert_eq!(names(&files).len(), 3);
        assert!(files.iter().all(|f| f.get_path().is_absolute()));
    }

    #[test]
    fn mode_filters_languages() {
        let dir = layout();
        let vhdl = collect(&[dir.path().join("src")], Mode::Vhdl);
        assert!(vhdl.iter().all(|f| f.get_kind() == Kind::Vhdl));
        assert_eq!(vhdl.len(), 2);
        let verilog = collect(&[dir.path().join("src")], Mode::Verilog);
        assert_eq!(names(&verilog), vec!["uart.v"]);
    }

    #[test]
    fn platform_dir_and_duplicates() {
        let dir = layout();
        let src = dir.path().join("src");
        let files = collect(
            &[
                src.clone(),
                src.clone(),
                dir.path().join("boards").join("Xilinx7"),
                dir.path().join("missing"),
            ],
            Mode::Verilog,
        );
        let mut got = names(&files);
        got.sort();
        assert_eq!(got, vec!["clk.v", "uart.v"]);
    }

    #[test]
    fn file_argument() {
        let f = SourceFile::new(PathBuf::from("/work/src/top.vhd"), Kind::Vhdl);
        assert_eq!(f.to_arg(), "FILE;VHDL;/work/src/top.vhd");
    }
}
