//! Console helper for the interactive binaries
//!
//! Thin blocking wrappers over stdin/stdout. The protocol core only calls
//! these; it never implements terminal I/O itself. Call from a blocking
//! context (the binaries use `spawn_blocking`).

use std::io::{self, BufRead, Write};

/// Print one line to stdout
pub fn write_line(text: &str) {
    println!("{}", text);
    let _ = io::stdout().flush();
}

/// Read one line from stdin, retrying locally on read errors
pub fn read_line() -> String {
    loop {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => return line.trim_end_matches(['\r', '\n']).to_string(),
            Err(_) => {
                write_line("Could not read input. Please try again.");
            }
        }
    }
}

/// Read a port number from stdin, retrying locally on malformed input
pub fn read_integer() -> u16 {
    loop {
        match read_line().trim().parse() {
            Ok(value) => return value,
            Err(_) => {
                write_line("That is not a valid number. Please try again.");
            }
        }
    }
}
