//! Terminal color stages

use super::Format;
use crate::core::levels::LevelRegistry;
use crate::core::record::Record;
use std::sync::Arc;

/// Paints the level (and optionally the message or the whole output) with
/// the colors configured in a [`LevelRegistry`].
///
/// The raw `level` is never touched, so filtering keeps working on colored
/// records; only `level_display` changes.
#[derive(Debug, Clone)]
pub struct Colorize {
    levels: Arc<LevelRegistry>,
    level: bool,
    message: bool,
    all: bool,
}

impl Default for Colorize {
    fn default() -> Self {
        Self {
            levels: Arc::new(LevelRegistry::npm()),
            level: true,
            message: false,
            all: false,
        }
    }
}

impl Colorize {
    #[must_use]
    pub fn with_levels(mut self, levels: LevelRegistry) -> Self {
        self.levels = Arc::new(levels);
        self
    }

    #[must_use]
    pub fn level(mut self, level: bool) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn message(mut self, message: bool) -> Self {
        self.message = message;
        self
    }

    /// Color the level, the message and any rendered output.
    #[must_use]
    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }
}

impl Format for Colorize {
    fn transform(&self, mut record: Record) -> Option<Record> {
        let level = record.level.clone();
        if self.level || self.all {
            let shown = record.display_level().to_string();
            record.level_display = Some(self.levels.colorize(&level, &shown));
        }
        if self.message || self.all {
            record.message = self.levels.colorize(&level, &record.message);
        }
        if self.all {
            if let Some(output) = record.output.take() {
                record.output = Some(self.levels.colorize(&level, &output));
            }
        }
        Some(record)
    }

    fn name(&self) -> &str {
        "colorize"
    }
}

/// Removes ANSI escape sequences left by an earlier colorize stage.
#[derive(Debug, Clone, Copy)]
pub struct Uncolorize {
    level: bool,
    message: bool,
    output: bool,
}

impl Default for Uncolorize {
    fn default() -> Self {
        Self {
            level: true,
            message: true,
            output: true,
        }
    }
}

impl Uncolorize {
    #[must_use]
    pub fn level(mut self, level: bool) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn message(mut self, message: bool) -> Self {
        self.message = message;
        self
    }

    #[must_use]
    pub fn output(mut self, output: bool) -> Self {
        self.output = output;
        self
    }
}

impl Format for Uncolorize {
    fn transform(&self, mut record: Record) -> Option<Record> {
        if self.level {
            record.level_display = record.level_display.as_deref().map(strip_ansi);
        }
        if self.message {
            record.message = strip_ansi(&record.message);
        }
        if self.output {
            record.output = record.output.as_deref().map(strip_ansi);
        }
        Some(record)
    }

    fn name(&self) -> &str {
        "uncolorize"
    }
}

/// Strip `ESC [ ... <letter>` sequences.
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for terminator in chars.by_ref() {
                if terminator.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Pads the message so messages line up after levels of different width.
#[derive(Debug, Clone)]
pub struct PadLevels {
    levels: Arc<LevelRegistry>,
}

impl Default for PadLevels {
    fn default() -> Self {
        Self {
            levels: Arc::new(LevelRegistry::npm()),
        }
    }
}

impl PadLevels {
    #[must_use]
    pub fn with_levels(mut self, levels: LevelRegistry) -> Self {
        self.levels = Arc::new(levels);
        self
    }

    fn padding(&self, level: &str) -> String {
        let width = self.levels.max_name_len() + 1;
        " ".repeat(width.saturating_sub(level.len()))
    }
}

impl Format for PadLevels {
    fn transform(&self, mut record: Record) -> Option<Record> {
        let padding = self.padding(&record.level);
        record.message = format!("{}{}", padding, record.message);
        Some(record)
    }

    fn name(&self) -> &str {
        "pad_levels"
    }
}

/// Colorized, padded `level:message` output for interactive terminals.
#[derive(Debug, Clone, Default)]
pub struct Cli {
    colorize: Colorize,
    pad: PadLevels,
}

impl Cli {
    #[must_use]
    pub fn with_levels(self, levels: LevelRegistry) -> Self {
        Self {
            colorize: self.colorize.with_levels(levels.clone()),
            pad: self.pad.with_levels(levels),
        }
    }
}

impl Format for Cli {
    fn transform(&self, record: Record) -> Option<Record> {
        let mut record = self.pad.transform(self.colorize.transform(record)?)?;
        record.output = Some(format!("{}:{}", record.display_level(), record.message));
        Some(record)
    }

    fn name(&self) -> &str {
        "cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_keeps_raw_level() {
        colored::control::set_override(true);
        let record = Colorize::default()
            .transform(Record::new("error", "failed"))
            .unwrap();
        assert_eq!(record.level, "error");
        let shown = record.level_display.unwrap();
        assert!(shown.contains("\u{1b}["));
        assert_eq!(strip_ansi(&shown), "error");
        assert_eq!(record.message, "failed");
    }

    #[test]
    fn test_colorize_all_then_uncolorize() {
        colored::control::set_override(true);
        let mut record = Record::new("warn", "careful");
        record.output = Some("warn: careful".to_string());

        let colored = Colorize::default().all(true).transform(record).unwrap();
        assert!(colored.message.contains("\u{1b}["));
        assert!(colored.output.as_deref().unwrap().contains("\u{1b}["));

        let plain = Uncolorize::default().transform(colored).unwrap();
        assert_eq!(plain.message, "careful");
        assert_eq!(plain.display_level(), "warn");
        assert_eq!(plain.output.as_deref(), Some("warn: careful"));
    }

    #[test]
    fn test_uncolored_level_unchanged() {
        let levels = LevelRegistry::new([("low", 0u32), ("high", 1)]).unwrap();
        let record = Colorize::default()
            .with_levels(levels)
            .transform(Record::new("low", "m"))
            .unwrap();
        assert_eq!(record.display_level(), "low");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\u{1b}[1;31mred\u{1b}[0m plain"), "red plain");
        assert_eq!(strip_ansi("no codes"), "no codes");
    }

    #[test]
    fn test_pad_levels() {
        let record = PadLevels::default()
            .transform(Record::new("info", "m"))
            .unwrap();
        // longest npm level is "verbose" (7), plus one separator
        assert_eq!(record.message, "    m");
    }

    #[test]
    fn test_cli_output() {
        let record = Cli::default().transform(Record::new("error", "down")).unwrap();
        let output = strip_ansi(record.output.as_deref().unwrap());
        assert_eq!(output, "error:   down");
    }
}
