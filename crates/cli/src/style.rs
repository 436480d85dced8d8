//! Terminal styling helpers.

use console::Style;

use svnvcs_core::ChangeType;

/// Green check mark followed by `msg`.
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Red cross followed by `msg`.
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// One-letter marker for a change type, coloured like `svn status`.
pub fn change_marker(change: ChangeType) -> String {
    let (letter, style) = match change {
        ChangeType::Add => ("A", Style::new().green()),
        ChangeType::Delete => ("D", Style::new().red()),
        ChangeType::Modify => ("M", Style::new().yellow()),
        ChangeType::Unknown => ("?", Style::new().dim()),
    };
    style.apply_to(letter).to_string()
}

/// Colour the `+`/`-` lines of a unified diff.
pub fn unified_diff(text: &str) -> String {
    let added = Style::new().green();
    let removed = Style::new().red();
    let meta = Style::new().bold();
    text.lines()
        .map(|line| {
            if line.starts_with("+++") || line.starts_with("---") || line.starts_with("Index:") {
                meta.apply_to(line).to_string()
            } else if line.starts_with('+') {
                added.apply_to(line).to_string()
            } else if line.starts_with('-') {
                removed.apply_to(line).to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
