//! Named severity scales
//!
//! A [`LevelRegistry`] maps level names to integer ranks where a lower rank is
//! more severe (`error` = 0 in every preset). Admission into a transport is
//! decided purely by relative rank: a record passes a threshold when its rank
//! is lower than or equal to the threshold's rank.

use super::error::{LoggerError, Result};
use colored::{Color, ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// npm-style scale, the default.
pub const NPM_LEVELS: &[(&str, u32, &str)] = &[
    ("error", 0, "red"),
    ("warn", 1, "yellow"),
    ("info", 2, "green"),
    ("http", 3, "green"),
    ("verbose", 4, "cyan"),
    ("debug", 5, "blue"),
    ("silly", 6, "magenta"),
];

/// CLI-style scale.
pub const CLI_LEVELS: &[(&str, u32, &str)] = &[
    ("error", 0, "red"),
    ("warn", 1, "yellow"),
    ("help", 2, "cyan"),
    ("data", 3, "grey"),
    ("info", 4, "green"),
    ("debug", 5, "blue"),
    ("prompt", 6, "grey"),
    ("verbose", 7, "cyan"),
    ("input", 8, "grey"),
    ("silly", 9, "magenta"),
];

/// RFC 5424 syslog scale.
pub const SYSLOG_LEVELS: &[(&str, u32, &str)] = &[
    ("emerg", 0, "red"),
    ("alert", 1, "yellow"),
    ("crit", 2, "red"),
    ("error", 3, "red"),
    ("warning", 4, "red"),
    ("notice", 5, "yellow"),
    ("info", 6, "green"),
    ("debug", 7, "blue"),
];

/// Color specification for a level: one token string or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    One(String),
    Many(Vec<String>),
}

impl ColorSpec {
    fn tokens(&self) -> Vec<String> {
        match self {
            ColorSpec::One(s) => s.split_whitespace().map(str::to_string).collect(),
            ColorSpec::Many(list) => list
                .iter()
                .flat_map(|s| s.split_whitespace())
                .map(str::to_string)
                .collect(),
        }
    }
}

impl From<&str> for ColorSpec {
    fn from(s: &str) -> Self {
        ColorSpec::One(s.to_string())
    }
}

impl From<Vec<&str>> for ColorSpec {
    fn from(list: Vec<&str>) -> Self {
        ColorSpec::Many(list.into_iter().map(str::to_string).collect())
    }
}

/// Serialized shape of a registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelConfig {
    pub levels: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub colors: BTreeMap<String, ColorSpec>,
}

/// Ordered, named severity scale with optional colors.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::LevelRegistry;
///
/// let levels = LevelRegistry::npm();
/// assert!(levels.admits("error", "info"));
/// assert!(!levels.admits("debug", "info"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LevelConfig", into = "LevelConfig")]
pub struct LevelRegistry {
    ranks: HashMap<String, u32>,
    colors: HashMap<String, ColorSpec>,
}

impl LevelRegistry {
    /// Build a registry from `(name, rank)` pairs.
    ///
    /// Fails when the set is empty or two names share a rank.
    pub fn new<I, S>(levels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut ranks = HashMap::new();
        let mut seen: HashMap<u32, String> = HashMap::new();

        for (name, rank) in levels {
            let name = name.into();
            if name.is_empty() {
                return Err(LoggerError::config("LevelRegistry", "level names must not be empty"));
            }
            if let Some(other) = seen.insert(rank, name.clone()) {
                return Err(LoggerError::config(
                    "LevelRegistry",
                    format!("levels '{}' and '{}' share rank {}", other, name, rank),
                ));
            }
            ranks.insert(name, rank);
        }

        if ranks.is_empty() {
            return Err(LoggerError::config("LevelRegistry", "at least one level is required"));
        }

        Ok(Self {
            ranks,
            colors: HashMap::new(),
        })
    }

    fn preset(table: &[(&str, u32, &str)]) -> Self {
        Self {
            ranks: table
                .iter()
                .map(|(name, rank, _)| (name.to_string(), *rank))
                .collect(),
            colors: table
                .iter()
                .map(|(name, _, color)| (name.to_string(), ColorSpec::from(*color)))
                .collect(),
        }
    }

    pub fn npm() -> Self {
        Self::preset(NPM_LEVELS)
    }

    pub fn cli() -> Self {
        Self::preset(CLI_LEVELS)
    }

    pub fn syslog() -> Self {
        Self::preset(SYSLOG_LEVELS)
    }

    /// Attach or replace colors. Entries for unknown levels are ignored.
    #[must_use]
    pub fn with_colors<I, S, C>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<ColorSpec>,
    {
        for (name, spec) in colors {
            let name = name.into();
            if self.ranks.contains_key(&name) {
                self.colors.insert(name, spec.into());
            }
        }
        self
    }

    #[inline]
    pub fn rank(&self, level: &str) -> Option<u32> {
        self.ranks.get(level).copied()
    }

    #[inline]
    pub fn contains(&self, level: &str) -> bool {
        self.ranks.contains_key(level)
    }

    pub fn validate(&self, level: &str) -> Result<u32> {
        self.rank(level)
            .ok_or_else(|| LoggerError::unknown_level(level))
    }

    /// Order two levels by rank; `Less` means `a` is more severe.
    pub fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        Ok(self.validate(a)?.cmp(&self.validate(b)?))
    }

    /// Whether a record at `level` passes a `threshold`.
    ///
    /// Unknown names never pass.
    pub fn admits(&self, level: &str, threshold: &str) -> bool {
        match (self.rank(level), self.rank(threshold)) {
            (Some(level), Some(threshold)) => level <= threshold,
            _ => false,
        }
    }

    /// Level names, most severe first.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<(&String, &u32)> = self.ranks.iter().collect();
        names.sort_by_key(|(_, rank)| **rank);
        names.into_iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn most_severe(&self) -> &str {
        self.ranks
            .iter()
            .min_by_key(|(_, rank)| **rank)
            .map(|(name, _)| name.as_str())
            .unwrap_or_default()
    }

    /// Length of the longest level name, used for padding.
    pub fn max_name_len(&self) -> usize {
        self.ranks.keys().map(String::len).max().unwrap_or(0)
    }

    /// Resolve the logger-wide threshold.
    ///
    /// A configured name wins when it exists; otherwise `info` if present;
    /// otherwise the lower median of the scale ordered by rank.
    pub fn default_level(&self, configured: Option<&str>) -> String {
        if let Some(level) = configured.filter(|l| self.contains(l)) {
            return level.to_string();
        }
        if self.contains("info") {
            return "info".to_string();
        }
        let names = self.names();
        names[(names.len() - 1) / 2].clone()
    }

    pub fn color_of(&self, level: &str) -> Option<&ColorSpec> {
        self.colors.get(level)
    }

    /// Wrap `text` in the color configured for `level`.
    ///
    /// Levels without a color return the text unchanged.
    pub fn colorize(&self, level: &str, text: &str) -> String {
        match self.colors.get(level) {
            Some(spec) => paint(text, spec).to_string(),
            None => text.to_string(),
        }
    }
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::npm()
    }
}

impl TryFrom<LevelConfig> for LevelRegistry {
    type Error = LoggerError;

    fn try_from(config: LevelConfig) -> Result<Self> {
        Ok(Self::new(config.levels)?.with_colors(config.colors))
    }
}

impl From<LevelRegistry> for LevelConfig {
    fn from(registry: LevelRegistry) -> Self {
        LevelConfig {
            levels: registry.ranks.into_iter().collect(),
            colors: registry.colors.into_iter().collect(),
        }
    }
}

fn paint(text: &str, spec: &ColorSpec) -> ColoredString {
    let mut painted = text.normal();
    let tokens = spec.tokens();
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        let lower = token.to_lowercase();
        painted = match lower.as_str() {
            "bold" => painted.bold(),
            "dim" => painted.dimmed(),
            "italic" => painted.italic(),
            "underline" => painted.underline(),
            "inverse" => painted.reversed(),
            "hidden" => painted.hidden(),
            "strikethrough" => painted.strikethrough(),
            "bright" => match iter.next().and_then(|next| parse_color(next, true)) {
                Some(color) => painted.color(color),
                None => painted,
            },
            other => {
                if let Some(bg) = other.strip_suffix("bg") {
                    match parse_color(bg, false) {
                        Some(color) => painted.on_color(color),
                        None => painted,
                    }
                } else {
                    match parse_color(other, false) {
                        Some(color) => painted.color(color),
                        None => painted,
                    }
                }
            }
        };
    }

    painted
}

fn parse_color(name: &str, bright: bool) -> Option<Color> {
    let color = match (name.to_lowercase().as_str(), bright) {
        ("black", false) => Color::Black,
        ("red", false) => Color::Red,
        ("green", false) => Color::Green,
        ("yellow", false) => Color::Yellow,
        ("blue", false) => Color::Blue,
        ("magenta", false) => Color::Magenta,
        ("cyan", false) => Color::Cyan,
        ("white", false) => Color::White,
        ("grey" | "gray", _) => Color::BrightBlack,
        ("black", true) => Color::BrightBlack,
        ("red", true) => Color::BrightRed,
        ("green", true) => Color::BrightGreen,
        ("yellow", true) => Color::BrightYellow,
        ("blue", true) => Color::BrightBlue,
        ("magenta", true) => Color::BrightMagenta,
        ("cyan", true) => Color::BrightCyan,
        ("white", true) => Color::BrightWhite,
        _ => return None,
    };
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LevelRegistry::npm().len(), 7);
        assert_eq!(LevelRegistry::cli().len(), 10);
        assert_eq!(LevelRegistry::syslog().len(), 8);
        assert_eq!(LevelRegistry::syslog().most_severe(), "emerg");
        assert_eq!(LevelRegistry::npm().names()[0], "error");
    }

    #[test]
    fn test_duplicate_rank_rejected() {
        let result = LevelRegistry::new([("a", 0), ("b", 0)]);
        assert!(matches!(
            result,
            Err(LoggerError::InvalidConfiguration { .. })
        ));
        assert!(LevelRegistry::new(Vec::<(&str, u32)>::new()).is_err());
    }

    #[test]
    fn test_non_contiguous_ranks() {
        let levels = LevelRegistry::new([("fatal", 10), ("note", 40), ("chatter", 90)]).unwrap();
        assert!(levels.admits("fatal", "note"));
        assert!(levels.admits("note", "note"));
        assert!(!levels.admits("chatter", "note"));
        assert_eq!(levels.compare("fatal", "chatter").unwrap(), Ordering::Less);
    }

    #[test]
    fn test_validate_unknown() {
        let levels = LevelRegistry::npm();
        assert_eq!(levels.validate("warn").unwrap(), 1);
        assert!(matches!(
            levels.validate("loud"),
            Err(LoggerError::UnknownLevel { .. })
        ));
        assert!(!levels.admits("loud", "info"));
        assert!(!levels.admits("info", "loud"));
    }

    #[test]
    fn test_default_level() {
        let npm = LevelRegistry::npm();
        assert_eq!(npm.default_level(None), "info");
        assert_eq!(npm.default_level(Some("debug")), "debug");
        assert_eq!(npm.default_level(Some("nope")), "info");

        let custom = LevelRegistry::new([("a", 0), ("b", 1), ("c", 2), ("d", 3)]).unwrap();
        assert_eq!(custom.default_level(None), "b");
    }

    #[test]
    fn test_colorize_without_color_is_identity() {
        let levels = LevelRegistry::new([("plain", 0)]).unwrap();
        assert_eq!(levels.colorize("plain", "text"), "text");
        assert_eq!(levels.colorize("missing", "text"), "text");
    }

    #[test]
    fn test_colorize_with_color() {
        colored::control::set_override(true);
        let levels = LevelRegistry::npm().with_colors([("info", vec!["bold", "blue"])]);
        let painted = levels.colorize("info", "info");
        assert!(painted.contains("\u{1b}["));
        assert!(painted.contains("info"));
    }

    #[test]
    fn test_serde_roundtrip_shape() {
        let json = r#"{"levels":{"bad":0,"good":1},"colors":{"bad":"red"}}"#;
        let levels: LevelRegistry = serde_json::from_str(json).unwrap();
        assert_eq!(levels.rank("good"), Some(1));
        assert!(levels.color_of("bad").is_some());

        let duplicate = r#"{"levels":{"bad":0,"good":0}}"#;
        assert!(serde_json::from_str::<LevelRegistry>(duplicate).is_err());
    }
}
