//! Terminal output

use colored::Colorize;
use docshift::migration::{
    MigrationDirection, MigrationError, MigrationReporter, MigrationState, MigrationStatus,
};
use std::time::Duration;

/// Prints per-migration progress to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    pub quiet: bool,
}

impl ConsoleReporter {
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

fn verb(direction: MigrationDirection) -> &'static str {
    match direction {
        MigrationDirection::Up => "Applying",
        MigrationDirection::Down => "Undoing",
    }
}

impl MigrationReporter for ConsoleReporter {
    fn started(&self, class_name: &str, direction: MigrationDirection) {
        if !self.quiet {
            println!("  {} {} {}", "…".dimmed(), verb(direction), class_name);
        }
    }

    fn succeeded(&self, class_name: &str, direction: MigrationDirection, elapsed: Duration) {
        if !self.quiet {
            println!(
                "  {} Migration {} {} {}",
                "✓".green(),
                class_name,
                direction,
                format!("({} ms)", elapsed.as_millis()).dimmed()
            );
        }
    }

    fn failed(&self, class_name: &str, direction: MigrationDirection, error: &MigrationError) {
        eprintln!(
            "  {} Migration {} {} failed: {}",
            "✗".red(),
            class_name,
            direction,
            error
        );
    }

    fn nothing_to_do(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", "⚠".yellow(), message);
        }
    }

    fn finished(&self, direction: MigrationDirection, count: usize) {
        if self.quiet {
            return;
        }
        match (direction, count) {
            (MigrationDirection::Up, 0) => println!("{}", "✅ No migrations to apply".green()),
            (MigrationDirection::Up, n) => {
                println!("{}", format!("✅ Successfully applied {n} migration(s)").green());
            }
            (MigrationDirection::Down, n) => {
                println!("{}", format!("✅ Successfully undid {n} migration(s)").green());
            }
        }
    }
}

/// Render a status table
#[must_use]
pub fn format_status(status: &MigrationStatus) -> String {
    let mut out = String::from("\n📊 Migration Status\n\n");

    if status.entries.is_empty() {
        out.push_str("  No migrations found\n");
    }

    let width = status
        .entries
        .iter()
        .map(|e| e.class_name.len())
        .max()
        .unwrap_or(0);

    for entry in &status.entries {
        let file = entry
            .file
            .file_name()
            .map_or_else(|| entry.file.display().to_string(), |n| n.to_string_lossy().into_owned());
        let state = match &entry.state {
            MigrationState::Applied { applied_at } => format!(
                "{} ({})",
                "applied".green(),
                applied_at.format("%Y-%m-%d %H:%M:%S")
            ),
            MigrationState::Pending => "pending".yellow().to_string(),
        };
        out.push_str(&format!(
            "  {:<width$}  {}  {}\n",
            entry.class_name,
            state,
            file.dimmed(),
            width = width
        ));
    }

    if !status.orphaned.is_empty() {
        out.push_str(&format!(
            "\n{} Applied migrations missing from the migrations directory ({}):\n",
            "⚠".yellow(),
            status.orphaned.len()
        ));
        for record in &status.orphaned {
            out.push_str(&format!("  {} ({})\n", record.class_name, record.file.display()));
        }
    }

    out.push_str(&format!(
        "\n📈 Summary: {} applied, {} pending\n",
        status.applied_count(),
        status.pending_count()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshift::migration::StatusEntry;
    use std::path::PathBuf;

    #[test]
    fn test_format_status_lists_entries() {
        colored::control::set_override(false);
        let status = MigrationStatus {
            entries: vec![StatusEntry {
                file: PathBuf::from("/m/001_a.rs"),
                class_name: "A".into(),
                state: MigrationState::Pending,
            }],
            orphaned: Vec::new(),
        };
        let out = format_status(&status);
        assert!(out.contains("A  pending  001_a.rs"));
        assert!(out.contains("0 applied, 1 pending"));
    }
}
