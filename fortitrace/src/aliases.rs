use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// A section that was renamed in some firmware release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectionAlias {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
struct AliasFile {
    #[serde(default)]
    alias: Vec<SectionAlias>,
}

/// Errors returned when loading alias files.
#[derive(Debug, Error)]
pub enum AliasLoadError {
    #[error("failed to read aliases file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse aliases file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Load section aliases from a TOML file.
pub fn load_section_aliases(path: &Path) -> Result<Vec<SectionAlias>, AliasLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| AliasLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_aliases(&raw, path.display().to_string())
}

/// Built-in aliases.
pub fn default_section_aliases() -> Vec<SectionAlias> {
    let embedded = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/defaults/section_aliases.toml"
    ));
    match parse_aliases(embedded, "embedded aliases".to_string()) {
        Ok(aliases) if !aliases.is_empty() => aliases,
        _ => fallback_section_aliases(),
    }
}

fn parse_aliases(raw: &str, path: String) -> Result<Vec<SectionAlias>, AliasLoadError> {
    let parsed: AliasFile =
        toml::from_str(raw).map_err(|source| AliasLoadError::Parse { path, source })?;
    Ok(parsed.alias)
}

fn fallback_section_aliases() -> Vec<SectionAlias> {
    [
        ("system virtual-wan-link", "system sdwan", "renamed in 6.4"),
        (
            "vpn ipsec phase1",
            "vpn ipsec phase1-interface",
            "policy-based tunnels share the interface-mode handler",
        ),
        (
            "vpn ipsec phase2",
            "vpn ipsec phase2-interface",
            "policy-based selectors share the interface-mode handler",
        ),
        (
            "switch vlan",
            "system interface",
            "switch-mode VLANs are read as interfaces",
        ),
        (
            "log fortianalyzer setting",
            "system fortianalyzer",
            "FortiAnalyzer logging moved under system in older releases",
        ),
        (
            "log fortisandbox setting",
            "system fortisandbox",
            "FortiSandbox connector moved under system in older releases",
        ),
    ]
    .into_iter()
    .map(|(from, to, note)| SectionAlias {
        from: from.to_string(),
        to: to.to_string(),
        note: note.to_string(),
    })
    .collect()
}
