//! Terminal output helpers shared by the stagecraft commands.
//!
//! Commands print a banner when they start and status lines as they go;
//! everything else goes through tracing.

use colored::Colorize;

/// Banner printed at the start of a command, sized to its title.
pub fn print_header(title: &str) {
    let width = title.len() + 4;
    println!();
    println!("{}", format!("╔{}╗", "═".repeat(width)).bright_blue());
    println!("{}", format!("║  {}  ║", title).bright_blue());
    println!("{}", format!("╚{}╝", "═".repeat(width)).bright_blue());
    println!();
}

pub fn print_success(message: &str) {
    println!("{} {}", "OK".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "ERROR".red().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", ">>".cyan(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "Warning:".yellow().bold(), message);
}
