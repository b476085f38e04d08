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

//! Modification times recorded after the last completed compile.

use crate::core::cache::LoadStatus;
use crate::error::LastError;
use crate::util::filesystem;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const STAMP_FILE: &str = "timestamp.yml";

#[derive(Debug, PartialEq)]
pub struct Timestamps {
    path: PathBuf,
    /// `None` when there was no usable document on disk.
    stamps: Option<BTreeMap<String, i64>>,
    dirty: bool,
}

impl Timestamps {
    /// Reads the timestamp document stored in `gen_dir`. A document that cannot be
    /// parsed is treated the same as a missing one.
    pub fn load(gen_dir: &Path) -> (Self, LoadStatus) {
        let path = gen_dir.join(STAMP_FILE);
        let (stamps, status) = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_yaml::from_str::<Option<BTreeMap<String, i64>>>(&text) {
                Ok(m) => (Some(m.unwrap_or_default()), LoadStatus::Loaded),
                Err(e) => (None, LoadStatus::Corrupt(LastError::from(e).to_string())),
            },
            Err(_) => (None, LoadStatus::Missing),
        };
        (
            Self {
                path,
                stamps,
                dirty: false,
            },
            status,
        )
    }

    fn key(p: &Path) -> String {
        filesystem::into_std_str(p.to_path_buf())
    }

    /// Checks if any of `files` or `configs` changed since they were last recorded.
    ///
    /// A path is changed when its current modification time differs from the recorded
    /// one, when it was never recorded, or when it can no longer be read. Without a
    /// document every input counts as changed.
    pub fn is_stale(&self, files: &[PathBuf], configs: &[PathBuf]) -> bool {
        let stamps = match &self.stamps {
            Some(s) => s,
            None => return true,
        };
        files.iter().chain(configs.iter()).any(|p| {
            match (filesystem::mtime_secs(p), stamps.get(&Self::key(p))) {
                (Ok(now), Some(then)) => now != *then,
                _ => true,
            }
        })
    }

    /// Stores the current modification time of every path in `paths`.
    pub fn record(&mut self, paths: &[PathBuf]) -> std::io::Result<()> {
        let stamps = self.stamps.get_or_insert_with(BTreeMap::new);
        for p in paths {
            stamps.insert(Self::key(p), filesystem::mtime_secs(p)?);
        }
        self.dirty = true;
        Ok(())
    }

    /// Writes the document if a compile was recorded during this run.
    pub fn flush(&mut self) -> std::io::Result<()> {
        if self.dirty == false {
            return Ok(());
        }
        let text = serde_yaml::to_string(&self.stamps.clone().unwrap_or_default())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        filesystem::write_atomic(&self.path, text.as_bytes())?;
        self.dirty = false;
        Ok(())
    }

    /// Drops everything recorded during this run.
    pub fn discard(&mut self) {
        self.dirty = false;
    }

    pub fn get_path(&self) -> &PathBuf {
        &self.path
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn touch(p: &Path, secs_ahead: u64) {
        let f = File::options().write(true).open(p).unwrap();
        f.set_modified(SystemTime::now() + Duration::from_secs(secs_ahead))
            .unwrap();
    }

    struct Project {
        _dir: tempfile::TempDir,
        gen: PathBuf,
        files: Vec<PathBuf>,
        configs: Vec<PathBuf>,
    }

    fn project() -> Project {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let files = vec![root.join("top.vhd"), root.join("counter.v")];
        let configs = vec![root.join("pldprj.yml"), root.join("pinprj.yml")];
        for p in files.iter().chain(configs.iter()) {
            std::fs::write(p, "").unwrap();
        }
        Project {
            _dir: dir,
            gen: root.join("gen"),
            files,
            configs,
        }
    }

    fn all(p: &Project) -> Vec<PathBuf> {
        p.files.iter().chain(p.configs.iter()).cloned().collect()
    }

    #[test]
    fn missing_document_is_stale() {
        let p = project();
        let (stamps, status) = Timestamps::load(&p.gen);
        assert_eq!(status, LoadStatus::Missing);
        assert_eq!(stamps.is_stale(&p.files, &p.configs), true);
        assert_eq!(stamps.is_stale(&[], &[]), true);
    }

    #[test]
    fn unchanged_inputs_are_fresh() {
        let p = project();
        let (mut stamps, _) = Timestamps::load(&p.gen);
        stamps.record(&all(&p)).unwrap();
        stamps.flush().unwrap();

        let (stamps, _) = Timestamps::load(&p.gen);
        assert_eq!(stamps.is_stale(&p.files, &p.configs), false);
        // asking twice gives the same answer
        assert_eq!(stamps.is_stale(&p.files, &p.configs), false);
    }

    #[test]
    fn touching_any_input_is_stale() {
        for i in 0..4 {
            let p = project();
            let (mut stamps, _) = Timestamps::load(&p.gen);
            stamps.record(&all(&p)).unwrap();
            stamps.flush().unwrap();

            touch(&all(&p)[i], 10);
            let (stamps, _) = Timestamps::load(&p.gen);
            assert_eq!(stamps.is_stale(&p.files, &p.configs), true);
        }
    }

    #[test]
    fn untracked_file_is_stale() {
        let p = project();
        let (mut stamps, _) = Timestamps::load(&p.gen);
        stamps.record(&p.configs).unwrap();
        assert_eq!(stamps.is_stale(&[], &p.configs), false);
        assert_eq!(stamps.is_stale(&p.files, &p.configs), true);
    }

    #[test]
    fn corrupt_document_is_missing() {
        let p = project();
        std::fs::create_dir_all(&p.gen).unwrap();
        std::fs::write(p.gen.join(STAMP_FILE), "- [unbalanced").unwrap();
        let (stamps, status) = Timestamps::load(&p.gen);
        assert!(matches!(status, LoadStatus::Corrupt(_)));
        assert_eq!(stamps.is_stale(&p.files, &p.configs), true);
    }

    #[test]
    fn discarded_record_is_not_written() {
        let p = project();
        let (mut stamps, _) = Timestamps::load(&p.gen);
        stamps.record(&all(&p)).unwrap();
        stamps.discard();
        stamps.flush().unwrap();
        assert_eq!(stamps.get_path().exists(), false);
    }
}
