// Output formatting and styling

use cfgdeck_history::{CheckpointView, HistoryEntry, HistoryStats};
use colored::{ColoredString, Colorize};

/// Leading marker of a one-line status message
#[derive(Debug, Clone, Copy)]
enum Status {
    Done,
    Failed,
    Caution,
    Note,
}

impl Status {
    fn symbol(self) -> &'static str {
        match self {
            Status::Done => "✓",
            Status::Failed => "✗",
            Status::Caution => "⚠",
            Status::Note => "ℹ",
        }
    }

    fn paint(self) -> ColoredString {
        let symbol = self.symbol();
        match self {
            Status::Done => symbol.green().bold(),
            Status::Failed => symbol.red().bold(),
            Status::Caution => symbol.yellow(),
            Status::Note => symbol.blue(),
        }
    }
}

/// Terminal styling for command output; colors only when stdout is a tty
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl OutputStyle {
    /// Plain output, used for tests and pipes
    pub fn plain() -> Self {
        Self { use_colors: false }
    }

    fn status(&self, status: Status, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", status.paint(), msg)
        } else {
            format!("{} {}", status.symbol(), msg)
        }
    }

    fn emphasis(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.use_colors {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn success(&self, msg: &str) -> String {
        self.status(Status::Done, msg)
    }

    pub fn error(&self, msg: &str) -> String {
        self.status(Status::Failed, msg)
    }

    pub fn warning(&self, msg: &str) -> String {
        self.status(Status::Caution, msg)
    }

    pub fn info(&self, msg: &str) -> String {
        self.status(Status::Note, msg)
    }

    /// Highlight a dot path, value or id
    pub fn code(&self, code: &str) -> String {
        self.emphasis(code, |s| s.cyan())
    }

    /// Title underlined with a rule of the same width
    pub fn section(&self, title: &str) -> String {
        format!(
            "{}\n{}",
            self.emphasis(title, |s| s.bold().underline()),
            "─".repeat(title.chars().count())
        )
    }

    /// Indented `key: value` line
    pub fn key_value(&self, key: &str, value: &str) -> String {
        format!("  {}: {}", self.emphasis(key, |s| s.bold()), value)
    }

    /// One line of the history log.
    ///
    /// `→` marks the current entry, `·` an undone one.
    pub fn history_entry(&self, entry: &HistoryEntry) -> String {
        let marker = if entry.is_current {
            "→"
        } else if entry.is_undone {
            "·"
        } else {
            " "
        };
        let time = entry.record.timestamp.format("%Y-%m-%d %H:%M:%S");
        let kind = format!("{:<10}", entry.record.kind().as_str());
        let line = format!(
            "{} {:>4}  {}  {}  {}",
            marker, entry.index, time, kind, entry.record.description
        );

        if !self.use_colors {
            line
        } else if entry.is_current {
            line.bold().to_string()
        } else if entry.is_undone {
            line.dimmed().to_string()
        } else {
            line
        }
    }

    /// One line of the checkpoint listing
    pub fn checkpoint(&self, checkpoint: &CheckpointView) -> String {
        let marker = if checkpoint.is_current { "→" } else { " " };
        format!(
            "{} {}  #{:<4} {}",
            marker,
            self.code(&checkpoint.checkpoint_id),
            checkpoint.index,
            checkpoint.description
        )
    }

    /// Multi-line history summary
    pub fn stats(&self, stats: &HistoryStats) -> String {
        let mut lines = vec![
            self.section("History"),
            self.key_value("entries", &stats.total_entries.to_string()),
            self.key_value("current index", &stats.current_index.to_string()),
            self.key_value("can undo", &stats.can_undo.to_string()),
            self.key_value("can redo", &stats.can_redo.to_string()),
            self.key_value("checkpoints", &stats.checkpoint_count.to_string()),
        ];
        for (kind, count) in &stats.kind_breakdown {
            lines.push(self.key_value(&format!("{}", kind), &count.to_string()));
        }
        lines.join("\n")
    }
}

/// Print an error to stderr
pub fn print_error(msg: &str) {
    let style = OutputStyle::default();
    eprintln!("{}", style.error(msg));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgdeck_history::{ChangeKind, ConfigChange, HistoryManager};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_output_style_without_colors() {
        let style = OutputStyle::plain();
        assert_eq!(style.success("test"), "✓ test");
        assert_eq!(style.error("test"), "✗ test");
        assert_eq!(style.warning("test"), "⚠ test");
        assert_eq!(style.info("test"), "ℹ test");
    }

    #[test]
    fn test_section_and_key_value_plain() {
        let style = OutputStyle::plain();
        assert_eq!(style.section("Stats"), "Stats\n─────");
        assert_eq!(style.key_value("entries", "3"), "  entries: 3");
        assert_eq!(style.code("hero.hp"), "hero.hp");
    }

    #[test]
    fn test_colored_status_keeps_message() {
        let style = OutputStyle { use_colors: true };
        let line = style.success("saved");
        assert!(line.contains("✓"));
        assert!(line.ends_with("saved"));
    }

    #[test]
    fn test_history_entry_markers() {
        let mut history = HistoryManager::in_memory();
        history.observe(ConfigChange::add("a", json!(1)));
        history.observe(ConfigChange::add("b", json!(2)));
        let mut noop = |_: &cfgdeck_history::ApplyInstruction,
                        _: cfgdeck_history::ApplyDirection|
         -> Result<(), cfgdeck_history::ApplyError> { Ok(()) };
        history.undo(&mut noop).unwrap();

        let style = OutputStyle::plain();
        let lines: Vec<String> = history
            .get_history(10, 0)
            .iter()
            .map(|e| style.history_entry(e))
            .collect();
        assert!(lines[0].starts_with("→"));
        assert!(lines[0].contains("Added a"));
        assert!(lines[1].starts_with("·"));
    }

    #[test]
    fn test_stats_lists_kinds() {
        let mut kind_breakdown = BTreeMap::new();
        kind_breakdown.insert(ChangeKind::Modify, 3);
        let stats = HistoryStats {
            total_entries: 3,
            current_index: 2,
            can_undo: true,
            can_redo: false,
            checkpoint_count: 0,
            kind_breakdown,
        };
        let out = OutputStyle::plain().stats(&stats);
        assert!(out.contains("entries: 3"));
        assert!(out.contains("Modify: 3"));
    }
}
