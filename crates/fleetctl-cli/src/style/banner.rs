//! ASCII art banner for fleetctl.

use super::colors::SemanticStyle;

const BANNER: &str = r"
  ⬡ F L E E T C T L
";

/// Prints the full banner with styling.
pub fn print_banner() {
    println!("{}", BANNER.info());
    println!("  {}", "Declarative machine lifecycle controller".muted());
    println!();
}

/// Prints a mini banner for use in subcommands.
pub fn print_mini_banner() {
    print!("{} {}", "⬡".info(), "fleetctl".header());
}

/// Prints the version banner.
pub fn print_version_banner(version: &str) {
    println!();
    println!(
        "  {} {} {}",
        "⬡".info(),
        "fleetctl".header(),
        format!("v{version}").muted()
    );
    println!("  {}", "Declarative machine lifecycle controller".muted());
    println!();
}
