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

/// Compares to string references `s0` and `s1` with only ascii case conversion.
///
/// Returns `true` if they are deemed equivalent without regarding ascii case sensivity.
pub fn cmp_ascii_ignore_case(s0: &str, s1: &str) -> bool {
    if s0.len() != s1.len() {
        return false;
    }
    s0.chars()
        .zip(s1.chars())
        .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
}

/// Normalizes a device part string for catalog lookups.
///
/// Vendor catalogs disagree on case, so parts are always compared in lowercase
/// with surrounding whitespace removed.
pub fn normalize_part(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_works() {
        assert_eq!(cmp_ascii_ignore_case("XILINX7", "xilinx7"), true);
        assert_eq!(cmp_ascii_ignore_case("Altera", "ALTERA"), true);

        // negative case: different lengths
        assert_eq!(cmp_ascii_ignore_case("Altera2", "altera"), false);

        // negative case: different letter order
        assert_eq!(cmp_ascii_ignore_case("cba", "abc"), false);

        // only ascii letters are folded
        assert_eq!(cmp_ascii_ignore_case("À", "à"), false);
    }

    #[test]
    fn parts_normalize() {
        assert_eq!(normalize_part(" XC7A35TCSG324-1\r\n"), "xc7a35tcsg324-1");
        assert_eq!(normalize_part("5CEFA2F23C8"), "5cefa2f23c8");
    }
}
