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

//! Binds the configured device to exactly one platform adapter.

use crate::core::platform::{Platform, Registry};
use crate::core::session::Session;
use crate::error::{Hint, PldError};
use crate::util::seqalin;
use crate::util::strcmp;
use std::str::FromStr;

/// Cache key holding a platform's part catalog.
pub const PART_KEY: &str = "PartVerify";

/// Minimum similarity for a catalog entry to be suggested as the intended part.
pub const FUZZY_CUTOFF: f32 = 0.6;

/// Which adapters resolution may consider.
#[derive(Debug, PartialEq, Clone)]
pub enum ToolHint {
    Auto,
    Named(String),
}

impl FromStr for ToolHint {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match strcmp::cmp_ascii_ignore_case(s, "AUTO") {
            true => Self::Auto,
            false => Self::Named(s.to_string()),
        })
    }
}

impl Default for ToolHint {
    fn default() -> Self {
        Self::Auto
    }
}

/// The adapter selected for this run and the part as its catalog spells it.
pub struct Binding<'a> {
    platform: &'a dyn Platform,
    part: String,
}

impl<'a> Binding<'a> {
    pub fn get_platform(&self) -> &'a dyn Platform {
        self.platform
    }

    pub fn get_part(&self) -> &str {
        &self.part
    }
}

/// Looks up `device` in a part `catalog`.
///
/// Returns the matching catalog entry, or `None` if nothing in the catalog comes
/// close. A near miss is treated as a typo and reported with a suggestion.
pub fn check_part(device: &str, catalog: &[String]) -> Result<Option<String>, PldError> {
    let target = strcmp::normalize_part(device);
    if let Some(part) = catalog
        .iter()
        .find(|p| strcmp::normalize_part(p) == target)
    {
        return Ok(Some(part.clone()));
    }
    let normalized: Vec<String> = catalog.iter().map(|p| strcmp::normalize_part(p)).collect();
    match seqalin::sel_closest_str(&target, &normalized, FUZZY_CUTOFF) {
        Some(near) => Err(PldError::DidYouMean(target, near.to_string())),
        None => Ok(None),
    }
}

/// Reads the platform's catalog from the cache, querying the vendor tool on a miss.
///
/// A freshly queried catalog is cached unless it came back empty.
fn catalog(platform: &dyn Platform, session: &mut Session) -> Result<Option<Vec<String>>, PldError> {
    if let Some(parts) = session
        .cache()
        .get_as::<Vec<String>>(platform.name(), PART_KEY)
        .filter(|p| p.is_empty() == false)
    {
        session
            .logger()
            .debug(&format!("using cached part list for {}", platform.name()));
        return Ok(Some(parts));
    }
    let parts = platform.query_parts(session)?;
    if let Some(p) = parts.as_ref().filter(|p| p.is_empty() == false) {
        session.cache_mut().put(platform.name(), PART_KEY, p)?;
    }
    Ok(parts)
}

/// Finds the adapter whose catalog lists `device`.
///
/// Adapters are tried in registry order and the first match wins. Adapters whose
/// vendor tool is missing are skipped.
pub fn resolve<'a>(
    registry: &'a Registry,
    device: &str,
    hint: &ToolHint,
    session: &mut Session,
) -> Result<Binding<'a>, PldError> {
    let candidates: Vec<&dyn Platform> = match hint {
        ToolHint::Auto => registry.iter().collect(),
        ToolHint::Named(name) => match registry.find(name) {
            Some(p) => vec![p],
            None => return Err(PldError::UnknownTool(name.clone(), registry.names())),
        },
    };
    for platform in candidates {
        session
            .logger()
            .debug(&format!("checking {} for device {}", platform.name(), device));
        let parts = match catalog(platform, session)? {
            Some(p) => p,
            None => {
                session
                    .logger()
                    .debug(&format!("{} is not installed", platform.name()));
                continue;
            }
        };
        if let Some(part) = check_part(device, &parts)? {
            session
                .logger()
                .info(&format!("using platform {} for part {}", platform.name(), part));
            return Ok(Binding { platform, part });
        }
    }
    let device = strcmp::normalize_part(device);
    Err(match hint {
        ToolHint::Auto => PldError::PlatformNotFound(device, Hint::PlatformList),
        ToolHint::Named(name) => PldError::DeviceNotInTool(device, name.clone()),
    })
}
