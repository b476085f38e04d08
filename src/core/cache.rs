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

//! The platform data cache: arbitrary JSON values stored per adapter.

use crate::error::{LastError, PldError};
use crate::util::filesystem;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CACHE_FILE: &str = "cache.json";

type Scope = BTreeMap<String, Value>;

#[derive(Debug, PartialEq)]
pub struct BuildCache {
    path: PathBuf,
    data: BTreeMap<String, Scope>,
    dirty: bool,
}

/// How the cache document was found on disk.
#[derive(Debug, PartialEq)]
pub enum LoadStatus {
    Loaded,
    Missing,
    Corrupt(String),
}

impl BuildCache {
    /// Reads the cache stored in `gen_dir`.
    ///
    /// An absent or unparsable document yields an empty cache; the status tells the
    /// caller which case occurred so it can be reported.
    pub fn load(gen_dir: &Path) -> (Self, LoadStatus) {
        let path = gen_dir.join(CACHE_FILE);
        let (data, status) = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, Scope>>(&text) {
                Ok(d) => (d, LoadStatus::Loaded),
                Err(e) => (
                    BTreeMap::new(),
                    LoadStatus::Corrupt(LastError::from(e).to_string()),
                ),
            },
            Err(_) => (BTreeMap::new(), LoadStatus::Missing),
        };
        (
            Self {
                path,
                data,
                dirty: false,
            },
            status,
        )
    }

    pub fn get(&self, scope: &str, key: &str) -> Option<&Value> {
        self.data.get(scope)?.get(key)
    }

    /// Deserializes the value under `scope`/`key`, returning `None` if it is missing
    /// or does not have the requested shape.
    pub fn get_as<T: DeserializeOwned>(&self, scope: &str, key: &str) -> Option<T> {
        serde_json::from_value(self.get(scope, key)?.clone()).ok()
    }

    pub fn put<T: Serialize>(&mut self, scope: &str, key: &str, value: &T) -> Result<(), PldError> {
        let value = serde_json::to_value(value).map_err(|e| PldError::System(e.into()))?;
        self.data
            .entry(scope.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    /// Writes the whole document atomically. Nothing is written if the cache was
    /// never modified during the run.
    pub fn flush(&mut self) -> Result<(), PldError> {
        if self.dirty == false {
            return Ok(());
        }
        let text = serde_json::to_string_pretty(&self.data)
            .map_err(|e| PldError::WriteFailed(self.path.clone(), e.into()))?;
        filesystem::write_atomic(&self.path, text.as_bytes())
            .map_err(|e| PldError::WriteFailed(self.path.clone(), e.into()))?;
        self.dirty = false;
        Ok(())
    }

    /// Forgets every pending change so a later flush leaves the disk untouched.
    pub fn discard(&mut self) {
        self.data.clear();
        self.dirty = false;
    }

    pub fn get_path(&self) -> &PathBuf {
        &self.path
    }
}
