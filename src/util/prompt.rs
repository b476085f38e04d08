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

use std::io;
use std::io::{BufRead, Error, Write};

/// Lists `options` under the heading `s` and waits for the user to pick one by index.
///
/// A list with a single option is selected without asking. Returns `None` once
/// `stop` reports true, which is checked before prompting and after every line.
pub fn select<T: std::fmt::Display>(
    s: &str,
    options: &[T],
    stop: impl Fn() -> bool,
) -> Result<Option<usize>, Error> {
    if stop() == true {
        return Ok(None);
    }
    if options.len() <= 1 {
        return Ok(Some(0));
    }
    println!("{}:", s);
    options
        .iter()
        .enumerate()
        .for_each(|(i, o)| println!("    [{}]: {}", i, o));
    check_for_index(&mut io::stdin().lock(), options.len(), stop)
}

/// Infinitely loops until a valid index below `len` is entered or `stop` is true.
///
/// Reaching the end of the input is an error instead of an endless loop.
fn check_for_index(
    input: &mut impl BufRead,
    len: usize,
    stop: impl Fn() -> bool,
) -> Result<Option<usize>, Error> {
    let mut buffer: String = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let n = input.read_line(&mut buffer)?;
        if stop() == true {
            break Ok(None);
        }
        if n == 0 {
            break Err(Error::new(
                io::ErrorKind::UnexpectedEof,
                "no selection was entered",
            ));
        }
        match buffer.trim().parse::<usize>() {
            Ok(i) if i < len => break Ok(Some(i)),
            _ => buffer.clear(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;

    fn never() -> bool {
        false
    }

    #[test]
    fn example_input_to_output() {
        let r = check_for_index(&mut "1\n".as_bytes(), 2, never).unwrap();
        assert_eq!(r, Some(1));
        let r = check_for_index(&mut "0\n".as_bytes(), 2, never).unwrap();
        assert_eq!(r, Some(0));
        // out of range and garbage entries are asked again
        let r = check_for_index(&mut "7\nabc\n2\n".as_bytes(), 3, never).unwrap();
        assert_eq!(r, Some(2));
    }

    #[test]
    fn windows_style() {
        let r = check_for_index(&mut "1\r\n".as_bytes(), 2, never).unwrap();
        assert_eq!(r, Some(1));
    }

    #[test]
    fn exhausted_input() {
        assert!(check_for_index(&mut "9\n".as_bytes(), 2, never).is_err());
    }

    #[test]
    fn single_option_needs_no_input() {
        assert_eq!(
            select("Select a target", &["localhost:3121/xilinx_tcf"], never).unwrap(),
            Some(0)
        );
    }

    #[test]
    fn stop_before_prompting() {
        assert_eq!(select("Select a target", &["a", "b"], || true).unwrap(), None);
    }

    #[test]
    fn stop_while_waiting() {
        // the flag is raised while the user is typing an invalid entry
        let lines = Cell::new(0);
        let stop = || {
            lines.set(lines.get() + 1);
            lines.get() >= 2
        };
        let r = check_for_index(&mut "\nabc\n1\n".as_bytes(), 2, stop).unwrap();
        assert_eq!(r, None);
        assert_eq!(lines.get(), 2);
    }
}
