// Terminal UI utilities
// Stable, line-oriented output: the render layer for every command.

use colored::Colorize;

pub fn print_header(title: &str) {
    println!();
    println!(
        "{}",
        "╔════════════════════════════════════════════════════════════╗".bright_blue()
    );
    println!("{}", format!("║  {:<58}║", title).bright_blue());
    println!(
        "{}",
        "╚════════════════════════════════════════════════════════════╝".bright_blue()
    );
    println!();
}

pub fn print_success(message: &str) {
    println!("{}", message.bright_green().bold());
}

pub fn print_error(message: &str) {
    eprintln!("{}", format!("error: {}", message).bright_red());
}

pub fn print_info(message: &str) {
    println!("{}", message.bright_cyan());
}

/// One aligned status line, e.g. `   OK    web-1`.
pub fn print_status_line(ok: bool, subject: &str, detail: Option<&str>) {
    let marker = if ok {
        "OK  ".green().bold()
    } else {
        "FAIL".red().bold()
    };
    match detail {
        Some(detail) => println!("   {} {} ({})", marker, subject, detail.dimmed()),
        None => println!("   {} {}", marker, subject),
    }
}
