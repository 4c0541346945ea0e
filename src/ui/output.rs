use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn timing(elapsed: &str) {
    println!("{} {}", Icons::CLOCK.style(theme().dim.clone()), elapsed);
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// One line of an indented tree, e.g. a subclass under its parent
pub fn tree_line(depth: usize, label: &str, note: &str) {
    let branch = if depth == 0 { String::new() } else { format!("{}└─ ", "   ".repeat(depth - 1)) };
    if note.is_empty() {
        println!("{}{}", branch.style(theme().muted.clone()), label);
    } else {
        println!("{}{} {}", branch.style(theme().muted.clone()), label, note.style(theme().dim.clone()));
    }
}

/// A method or class name, highlighted
pub fn symbol(name: &str) -> String {
    name.style(theme().symbol.clone()).to_string()
}

/// An edge between two symbols with a trailing note (kind, weight)
pub fn edge_line(from: &str, to: &str, note: &str) {
    println!(
        "  {} {} {} {}",
        symbol(from),
        Icons::RIGHT.style(theme().muted.clone()),
        symbol(to),
        note.style(theme().dim.clone())
    );
}

/// A flagged risk such as a hotspot or a cycle
pub fn risk(icon: &str, text: &str) {
    println!("  {} {}", icon, text.style(theme().risk.clone()));
}
