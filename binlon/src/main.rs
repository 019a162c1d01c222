//! LON command-line tool for parsing and checking LON documents.
//!
//! Usage: lon [OPTIONS] [FILE]
//!
//! Options:
//!   --check            Check if the document is valid (exit 0 if valid, 1 if invalid)
//!   -h, --help         Print help
//!   -V, --version      Print version
//!
//! Reads from FILE, or from stdin when FILE is omitted or given as "-".
//! Without --check, prints the parsed value tree to stdout.

use liblon::parse_with_filename;
use std::fs;
use std::io::{self, Read};
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut check_only = false;
    let mut input_path: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-V" | "--version" => {
                println!("lon {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--check" => {
                check_only = true;
            }
            "-" => {
                // Explicit stdin; input_path stays None.
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                process::exit(1);
            }
            arg => {
                if input_path.is_some() {
                    eprintln!("Error: Multiple input files not supported");
                    process::exit(1);
                }
                input_path = Some(arg);
            }
        }
        i += 1;
    }

    let (content, filename) = match input_path {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (content, Some(path)),
            Err(e) => {
                eprintln!("Error: Failed to read {}: {}", path, e);
                process::exit(1);
            }
        },
        None => {
            let mut content = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut content) {
                eprintln!("Error: Failed to read stdin: {}", e);
                process::exit(1);
            }
            (content, None)
        }
    };

    match parse_with_filename(&content, filename) {
        Ok(value) => {
            if !check_only {
                println!("{:?}", value);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn print_help() {
    println!("Usage: lon [OPTIONS] [FILE]");
    println!();
    println!("Parse a LON (Lax Object Notation) document.");
    println!();
    println!("Options:");
    println!("  --check            Check validity only (exit 0 if valid, 1 if invalid)");
    println!("  -h, --help         Print help");
    println!("  -V, --version      Print version");
    println!();
    println!("Reads from FILE, or from stdin when FILE is omitted or \"-\".");
}
