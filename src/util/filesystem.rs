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

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Converts the path into a string with forward slashes as separators.
///
/// Vendor tcl interpreters treat backslashes as escapes, so every path handed to
/// a script goes through here.
pub fn into_std_str(p: PathBuf) -> String {
    p.display().to_string().replace('\\', "/")
}

/// Resolves a relative path `p` against `root` and drops any `.` and `..` components.
///
/// Absolute paths are only cleaned. The filesystem is never consulted, so the path
/// does not need to exist.
pub fn resolve_rel_path(root: &Path, p: &Path) -> PathBuf {
    let joined = match p.is_relative() {
        true => root.join(p),
        false => p.to_path_buf(),
    };
    let mut result = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => (),
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Writes `contents` to `dest` by persisting a temporary file from the same directory.
///
/// Readers observe either the previous contents or the new contents, never a torn file.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match dest.parent() {
        Some(d) if d.as_os_str().is_empty() == false => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Reads the modification time of `path` in whole seconds since the unix epoch.
pub fn mtime_secs(path: &Path) -> std::io::Result<i64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    })
}

/// Searches the directories of `PATH` for an executable named `name`.
///
/// On Windows the `.exe` and `.bat` variants are also tried.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let candidates: Vec<String> = match cfg!(target_os = "windows") {
        true => vec![
            name.to_string(),
            format!("{}.exe", name),
            format!("{}.bat", name),
        ],
        false => vec![name.to_string()],
    };
    std::env::split_paths(&std::env::var_os("PATH")?).find_map(|dir| {
        candidates
            .iter()
            .map(|c| dir.join(c))
            .find(|p| p.is_file())
    })
}
