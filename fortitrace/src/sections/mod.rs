//! Section dispatch.
//!
//! Each typed handler registers itself with [`inventory::submit!`] under the
//! section name it understands. [`SectionRegistry`] collects those once,
//! normalises their names, layers the alias table on top and falls back to
//! [`generic::GenericSection`] for anything unclaimed.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::OnceLock;

use conftree_core::{normalize_section_name, BlockBody, Cursor, Entry, Fields};
use ipnetwork::Ipv4Network;
use thiserror::Error;

use crate::aliases::{default_section_aliases, SectionAlias};
use crate::model::net::parse_network;
use crate::model::ConfigModel;

pub mod firewall;
pub mod generic;
pub mod routing;
pub mod system;
pub mod vpn;

/// A handler failure; the parser skips the block and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("section `{section}` should hold {expected} but holds {found}")]
    UnexpectedShape {
        section: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("section `{section}` entry `{entry}` is missing `{field}`")]
    MissingField {
        section: String,
        entry: String,
        field: &'static str,
    },
}

/// What a handler may touch while storing one block.
pub struct HandlerContext<'m, 'c, 'a> {
    pub model: &'m mut ConfigModel,
    pub cursor: &'c mut Cursor<'a>,
    /// Normalised section name.
    pub section: String,
    /// Section name as written.
    pub raw_name: String,
    /// 1-based line of the `config` header.
    pub line: usize,
}

impl HandlerContext<'_, '_, '_> {
    /// Record a value-level problem against the block header.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = format!("{}: {}", self.section, message.into());
        self.cursor.warn(self.line, message);
    }

    /// Entries of a list block.
    pub fn entries(&self, body: BlockBody) -> Result<Vec<Entry>, HandlerError> {
        match body {
            BlockBody::Entries(entries) => Ok(entries),
            BlockBody::Settings(fields) if fields.is_empty() => Ok(Vec::new()),
            BlockBody::Settings(_) => Err(HandlerError::UnexpectedShape {
                section: self.section.clone(),
                expected: "entries",
                found: "settings",
            }),
        }
    }

    /// Fields of a settings block.
    pub fn settings(&self, body: BlockBody) -> Result<Fields, HandlerError> {
        match body {
            BlockBody::Settings(fields) => Ok(fields),
            BlockBody::Entries(entries) if entries.is_empty() => Ok(Fields::new()),
            BlockBody::Entries(_) => Err(HandlerError::UnexpectedShape {
                section: self.section.clone(),
                expected: "settings",
                found: "entries",
            }),
        }
    }

    pub fn missing(&self, entry: &str, field: &'static str) -> HandlerError {
        HandlerError::MissingField {
            section: self.section.clone(),
            entry: entry.to_string(),
            field,
        }
    }

    /// `key` as a network; `0.0.0.0/0` and malformed values give `None`.
    pub fn network(&mut self, fields: &Fields, entry: &str, key: &str) -> Option<Ipv4Network> {
        let raw = fields.get_str(key)?;
        match parse_network(raw) {
            Some(net) if net.ip().is_unspecified() && net.prefix() == 0 => None,
            Some(net) => Some(net),
            None => {
                self.warn(format!("`{entry}`: invalid {key} `{raw}`"));
                None
            }
        }
    }

    /// `key` as an address; `0.0.0.0` and malformed values give `None`.
    pub fn ipv4(&mut self, fields: &Fields, entry: &str, key: &str) -> Option<Ipv4Addr> {
        let raw = fields.get_str(key)?;
        match raw.parse::<Ipv4Addr>() {
            Ok(ip) if ip.is_unspecified() => None,
            Ok(ip) => Some(ip),
            Err(_) => {
                self.warn(format!("`{entry}`: invalid {key} `{raw}`"));
                None
            }
        }
    }

    /// `key` parsed with [`FromStr`], warning on bad input.
    pub fn number<T: FromStr>(&mut self, fields: &Fields, entry: &str, key: &str) -> Option<T> {
        let raw = fields.get_str(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.warn(format!("`{entry}`: invalid {key} `{raw}`"));
                None
            }
        }
    }
}

/// Stores one parsed block into the model.
pub trait SectionHandler: Sync {
    fn apply(&self, body: BlockBody, ctx: &mut HandlerContext<'_, '_, '_>)
        -> Result<(), HandlerError>;
}

/// Static registration of a typed handler.
pub struct SectionRegistration {
    /// Section name as FortiOS writes it, e.g. `firewall service custom`.
    pub section: &'static str,
    pub handler: &'static dyn SectionHandler,
}

inventory::collect!(SectionRegistration);

/// The handler chosen for one section header.
pub struct Dispatch {
    /// Normalised name after alias resolution.
    pub canonical: String,
    pub handler: &'static dyn SectionHandler,
    /// `false` when the generic handler was chosen.
    pub typed: bool,
}

/// Normalised section name to handler, plus the alias table.
pub struct SectionRegistry {
    handlers: HashMap<String, &'static dyn SectionHandler>,
    aliases: BTreeMap<String, String>,
}

impl SectionRegistry {
    pub fn new(aliases: &[SectionAlias]) -> Self {
        let handlers = inventory::iter::<SectionRegistration>
            .into_iter()
            .map(|reg| (normalize_section_name(reg.section), reg.handler))
            .collect();
        let aliases = aliases
            .iter()
            .map(|a| (normalize_section_name(&a.from), normalize_section_name(&a.to)))
            .collect();
        Self { handlers, aliases }
    }

    /// Registry with the built-in aliases, built on first use.
    pub fn builtin() -> &'static SectionRegistry {
        static REGISTRY: OnceLock<SectionRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| SectionRegistry::new(&default_section_aliases()))
    }

    /// Normalised name of `raw` after alias resolution.
    pub fn canonical(&self, raw: &str) -> String {
        let name = normalize_section_name(raw);
        self.aliases.get(&name).cloned().unwrap_or(name)
    }

    pub fn dispatch(&self, raw: &str) -> Dispatch {
        let canonical = self.canonical(raw);
        match self.handlers.get(&canonical) {
            Some(handler) => Dispatch {
                canonical,
                handler: *handler,
                typed: true,
            },
            None => Dispatch {
                canonical,
                handler: &generic::GenericSection,
                typed: false,
            },
        }
    }

    /// Normalised names with a typed handler, sorted.
    pub fn typed_sections(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
