//! Version command implementation.

use crate::style::banner::print_version_banner;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    print_version_banner(VERSION);
    println!("  Target: {}", std::env::consts::ARCH);
    println!("  OS:     {}", std::env::consts::OS);
}
