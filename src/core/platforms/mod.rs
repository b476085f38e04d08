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

//! The vendor adapters shipped with pldude.

pub mod altera;
pub mod xilinx7;

use crate::core::platform::Platform;

/// Every adapter in resolution order.
pub fn installed() -> Vec<Box<dyn Platform>> {
    vec![Box::new(xilinx7::Xilinx7::new()), Box::new(altera::Altera::new())]
}

const BEGIN_MARKER: &str = "PLDUDE:BEGIN";
const END_MARKER: &str = "PLDUDE:END";

/// Extracts the lines a resource script printed between its begin and end markers.
///
/// Interactive shells may prefix output with a prompt, so markers only need to end
/// the line.
pub fn marked(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|l| l.trim())
        .skip_while(|l| l.ends_with(BEGIN_MARKER) == false)
        .skip(1)
        .take_while(|l| l.ends_with(END_MARKER) == false)
        .filter(|l| l.is_empty() == false)
        .map(|l| l.to_string())
        .collect()
}

/// Appends the batch-file extension vendors use for their launchers on Windows.
pub fn launcher(command: &str) -> String {
    match cfg!(target_os = "windows") {
        true => format!("{}.bat", command),
        false => command.to_string(),
    }
}
