//! nomenctl - naming-system projection database CLI tool
//!
//! A developer-friendly command-line interface for inspecting the read
//! model maintained by the tailer.

use nomen::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
