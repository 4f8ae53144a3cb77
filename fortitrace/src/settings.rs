//! Tunables loaded from TOML.
//!
//! The built-in file `defaults/settings.toml` is embedded at compile time. A
//! user file passed with `--config` is layered field-by-field over the
//! built-in values: any key it omits keeps its default.

use std::fs;
use std::path::Path;

use conftree_core::{ReadStrategy, ReaderOptions, DEFAULT_DEPTH_LIMIT};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Default hop budget for path traces.
pub const DEFAULT_MAX_HOPS: usize = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub parser: ParserSettings,
    pub trace: TraceSettings,
    pub exclusions: Exclusions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    pub depth_limit: usize,
    pub strategy: ReadStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    pub max_hops: usize,
}

/// Names never reported as unused.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Exclusions {
    pub addresses: Vec<String>,
    pub services: Vec<String>,
    pub interface_prefixes: Vec<String>,
}

/// Errors returned when loading a settings file.
#[derive(Debug, Error)]
pub enum SettingsLoadError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            depth_limit: DEFAULT_DEPTH_LIMIT,
            strategy: ReadStrategy::Auto,
        }
    }
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

impl Default for Exclusions {
    fn default() -> Self {
        Self {
            addresses: strings(&["all", "any", "none"]),
            services: strings(&[
                "ALL", "ANY", "ALL_TCP", "ALL_UDP", "ALL_ICMP", "PING", "HTTP", "HTTPS", "SSH",
                "TELNET", "FTP", "DNS", "SMTP", "POP3", "IMAP", "SNMP", "SYSLOG", "NTP",
            ]),
            interface_prefixes: strings(&[
                "ssl.",
                "loopback",
                "ipsec",
                "tunnel",
                "vlan",
                "fortilink",
                "npu",
                "naf.",
                "l2t.",
            ]),
        }
    }
}

impl Settings {
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            strategy: self.parser.strategy,
            depth_limit: self.parser.depth_limit,
        }
    }
}

impl Exclusions {
    pub fn excludes_address(&self, name: &str) -> bool {
        self.addresses.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub fn excludes_service(&self, name: &str) -> bool {
        self.services.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    pub fn excludes_interface(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.interface_prefixes
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_ascii_lowercase()))
    }
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_settings(&raw, path.display().to_string())
}

/// Settings from the embedded defaults file.
pub fn default_settings() -> Settings {
    let embedded = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/defaults/settings.toml"
    ));
    parse_settings(embedded, "embedded settings".to_string()).unwrap_or_default()
}

/// Settings plus a label for where they came from.
///
/// A user file that cannot be loaded is reported and the embedded defaults
/// are used instead.
pub fn load_settings_with_source(path: Option<&Path>) -> (Settings, String) {
    if let Some(path) = path {
        match load_settings(path) {
            Ok(settings) => return (settings, format!("file:{}", path.display())),
            Err(err) => warn!("{err}; using built-in settings"),
        }
    }
    (default_settings(), "embedded".to_string())
}

fn parse_settings(raw: &str, path: String) -> Result<Settings, SettingsLoadError> {
    toml::from_str(raw).map_err(|source| SettingsLoadError::Parse { path, source })
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn embedded_settings_match_hard_coded_defaults() {
        assert_eq!(default_settings(), Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[trace]\nmax_hops = 5\n[parser]\nstrategy = \"iterative\"\n")
            .expect("write");

        let settings = load_settings(&path).expect("settings");
        assert_eq!(settings.trace.max_hops, 5);
        assert_eq!(settings.parser.strategy, ReadStrategy::Iterative);
        assert_eq!(settings.parser.depth_limit, DEFAULT_DEPTH_LIMIT);
        assert!(settings.exclusions.excludes_address("ALL"));
    }

    #[test]
    fn broken_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[trace\nmax_hops = ").expect("write");
        assert!(matches!(
            load_settings(&path),
            Err(SettingsLoadError::Parse { .. })
        ));
    }

    #[test]
    fn unreadable_file_falls_back_to_embedded() {
        let (settings, source) =
            load_settings_with_source(Some(Path::new("/nonexistent/settings.toml")));
        assert_eq!(source, "embedded");
        assert_eq!(settings.trace.max_hops, DEFAULT_MAX_HOPS);
    }

    #[test]
    fn interface_prefixes_match_case_insensitively() {
        let exclusions = Exclusions::default();
        assert!(exclusions.excludes_interface("SSL.root"));
        assert!(exclusions.excludes_interface("loopback1"));
        assert!(!exclusions.excludes_interface("port1"));
    }
}
