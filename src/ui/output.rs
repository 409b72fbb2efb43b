use crate::ui::{theme, Icons, Severity};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::TYPE, text.style(theme().header));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info),
        label.style(theme().dim),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header));
}

/// Rendered type, styled for inline use
pub fn type_name(text: &str) -> String {
    text.style(theme().type_name).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim), value);
}

/// One diagnostic line, styled by severity
pub fn diagnostic(severity: Severity, message: &str) {
    let icon = match severity {
        Severity::Fatal => Icons::CROSS,
        Severity::Degraded | Severity::Ambiguous => Icons::WARN,
    };
    eprintln!("{} {}", icon, message.style(theme().severity(severity)));
}
