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

use crate::core::settings::Settings;
use std::collections::btree_set::BTreeSet;
use std::collections::btree_set::Iter;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Eq, Clone)]
pub struct EnvVar {
    key: String,
    value: String,
}

impl PartialEq for EnvVar {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Ord for EnvVar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl PartialOrd for EnvVar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for EnvVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // only hash by the key name
        self.key.hash(state);
    }
}

impl EnvVar {
    pub fn with(key: &str, value: &str) -> Self {
        Self::new().key(key).value(value)
    }

    pub fn new() -> Self {
        Self {
            key: String::new(),
            value: String::new(),
        }
    }

    /// Sets the environment key.
    pub fn key(mut self, s: &str) -> Self {
        // normalize the key name upon entry
        self.key = s.to_ascii_uppercase().replace('-', "_");
        self
    }

    /// Sets the environment value.
    pub fn value(mut self, s: &str) -> Self {
        self.value = s.to_owned();
        self
    }

    pub fn get_key(&self) -> &str {
        &self.key
    }

    pub fn get_value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=\"{}\"", self.key, self.value)
    }
}

impl std::fmt::Display for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// The set of variables handed to every vendor tool process.
#[derive(Debug, Clone, Default)]
pub struct Environment(BTreeSet<EnvVar>);

impl Environment {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, var: EnvVar) -> bool {
        self.0.insert(var)
    }

    pub fn add(mut self, var: EnvVar) -> Self {
        self.0.insert(var);
        self
    }

    /// Replaces any existing variable sharing the key of `var`.
    pub fn overwrite(mut self, var: EnvVar) -> Self {
        self.0.replace(var);
        self
    }

    /// Collects the user's `[env]` table, prefixing each key with `PLDUDE_ENV_`.
    pub fn from_settings(mut self, settings: &Settings) -> Self {
        settings.get_env().iter().for_each(|(key, val)| {
            self.insert(
                EnvVar::new()
                    .key(&format!("{}{}", PLDUDE_ENV_PREFIX, key))
                    .value(val),
            );
        });
        self
    }

    pub fn iter(&self) -> Iter<'_, EnvVar> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&EnvVar> {
        self.0.get(&EnvVar::new().key(key))
    }

    pub fn into_map(&self) -> HashMap<&String, &String> {
        self.0.iter().map(|v| (&v.key, &v.value)).collect()
    }
}

pub const PLDUDE_HOME: &str = "PLDUDE_HOME";
pub const PLDUDE_ROOT: &str = "PLDUDE_ROOT";
pub const PLDUDE_PLATFORM: &str = "PLDUDE_PLATFORM";
pub const PLDUDE_DEVICE: &str = "PLDUDE_DEVICE";
pub const PLDUDE_TOP: &str = "PLDUDE_TOP";

pub const PLDUDE_ENV_PREFIX: &str = "PLDUDE_ENV_";

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keys_normalize() {
        let var = EnvVar::with("pldude-device", "xc7a35tcsg324-1");
        assert_eq!(var.get_key(), "PLDUDE_DEVICE");
        assert_eq!(var.to_string(), "PLDUDE_DEVICE=xc7a35tcsg324-1");
    }

    #[test]
    fn overwrite_replaces_value() {
        let env = Environment::new()
            .add(EnvVar::with(PLDUDE_TOP, "blinky"))
            .add(EnvVar::with(PLDUDE_TOP, "ignored"));
        assert_eq!(env.get(PLDUDE_TOP).unwrap().get_value(), "blinky");
        let env = env.overwrite(EnvVar::with(PLDUDE_TOP, "counter"));
        assert_eq!(env.get(PLDUDE_TOP).unwrap().get_value(), "counter");
        assert_eq!(env.iter().count(), 1);
    }
}
