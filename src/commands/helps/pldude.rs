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

pub const HELP: &str = r#"Build, program, and simulate HDL projects with vendor toolchains.

Usage:
    pldude [options]

Options:
    --compile, -c           synthesize the design when sources changed
    --program, -p           program the device with the latest bitstream
    --simulate, -s <module> simulate the given module (excludes -c and -p)
    --clean, -x             remove the generated files
    --platform, -l <name>   select the vendor tool (default: AUTO)
    --verbosity, -v <level> console level: DEBUG, INFO, WARNING, ERROR, CRITICAL, NONE
    --list                  view the registered platforms and exit
    --version               print the version and exit
    --help, -h              print this help and exit

The project is read from 'pldprj.yml' and 'pinprj.yml' in the current directory.
"#;
