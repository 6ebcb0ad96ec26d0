use colored::Colorize;
use kojikit::ChangeReport;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print the change log of one resource under its own section
pub fn resource_report(title: &str, report: &ChangeReport) {
    section(title);
    if report.is_empty() {
        dim("no changes");
        return;
    }
    for line in &report.log {
        println!("  {} {}", "→".cyan(), line);
    }
}

/// One-line summary of a run
pub fn summary_line(changed: usize, total: usize, check: bool) -> String {
    let noun = if total == 1 { "resource" } else { "resources" };
    if check {
        format!("{changed} of {total} {noun} would change (check mode, nothing sent)")
    } else {
        format!("{changed} of {total} {noun} changed")
    }
}

// ============================================================================
// Tests
// ============================================================================
