//! Top-level walk over an export.
//!
//! The walk tracks which scope is active (`config vdom` / `edit <name>` /
//! `next` / `end`, and `config global` / `end`), hands every section block to
//! the reader and then to its handler, and skips blocks that fail either step.

use conftree_core::{
    classify, parse_version_banner, read_block, skip_block, Cursor, Line, ParseWarning,
    ReaderOptions, SkipOutcome,
};
use tracing::{debug, warn};

use crate::model::{ConfigModel, Configuration};
use crate::sections::{HandlerContext, SectionRegistry};

/// Which model sections are written into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Root,
    /// Inside `config vdom`, between VDOM entries.
    VdomList,
    Vdom(String),
    Global,
}

/// Parser position plus active scope.
pub struct ParserState<'a> {
    pub cursor: Cursor<'a>,
    pub scope: Scope,
}

/// Parses exports with a given registry and reader configuration.
pub struct Parser<'r> {
    registry: &'r SectionRegistry,
    reader: ReaderOptions,
}

/// Parse with the built-in registry and default reader options.
pub fn parse(text: &str) -> (Configuration, Vec<ParseWarning>) {
    Parser::new(SectionRegistry::builtin()).parse(text)
}

impl<'r> Parser<'r> {
    pub fn new(registry: &'r SectionRegistry) -> Self {
        Self {
            registry,
            reader: ReaderOptions::default(),
        }
    }

    pub fn with_reader(mut self, reader: ReaderOptions) -> Self {
        self.reader = reader;
        self
    }

    pub fn parse(&self, text: &str) -> (Configuration, Vec<ParseWarning>) {
        let cursor = Cursor::new(text);
        self.run(ParserState {
            cursor,
            scope: Scope::Root,
        })
    }

    pub fn parse_lines(&self, lines: Vec<&str>) -> (Configuration, Vec<ParseWarning>) {
        self.run(ParserState {
            cursor: Cursor::from_lines(lines),
            scope: Scope::Root,
        })
    }

    fn run(&self, mut state: ParserState<'_>) -> (Configuration, Vec<ParseWarning>) {
        let mut config = Configuration::default();

        while let Some((line_no, raw)) = state.cursor.advance() {
            match classify(raw) {
                Line::Blank | Line::Comment(_) => {}
                Line::VersionBanner(banner) => match parse_version_banner(banner) {
                    Some(version) => {
                        debug!(%version, "firmware banner");
                        config.version = Some(version);
                    }
                    None => state
                        .cursor
                        .warn(line_no, format!("unrecognised version banner `{banner}`")),
                },
                Line::Vdom => state.scope = Scope::VdomList,
                Line::Global => state.scope = Scope::Global,
                Line::Edit(name) if state.scope == Scope::VdomList => {
                    config.vdoms.entry(name.clone()).or_default();
                    state.scope = Scope::Vdom(name);
                }
                Line::Next if matches!(state.scope, Scope::Vdom(_)) => {
                    state.scope = Scope::VdomList;
                }
                Line::End if state.scope != Scope::Root => state.scope = Scope::Root,
                Line::Config(section) => {
                    self.read_section(&mut state, &mut config, section, line_no);
                }
                _ => state.cursor.warn(
                    line_no,
                    format!("unexpected `{}` outside any section", raw.trim()),
                ),
            }
        }

        if state.scope != Scope::Root {
            debug!(scope = ?state.scope, "input ended inside a scope");
        }
        (config, state.cursor.into_warnings())
    }

    fn read_section(
        &self,
        state: &mut ParserState<'_>,
        config: &mut Configuration,
        section: &str,
        line_no: usize,
    ) {
        let header = line_no - 1;
        let dispatch = self.registry.dispatch(section);

        let body = match read_block(&mut state.cursor, &dispatch.canonical, &self.reader) {
            Ok(body) => body,
            Err(err) => {
                state
                    .cursor
                    .warn(line_no, format!("skipping `config {section}`: {err}"));
                recover(state, header);
                return;
            }
        };

        let mut ctx = HandlerContext {
            model: scope_model(config, &state.scope),
            cursor: &mut state.cursor,
            section: dispatch.canonical.clone(),
            raw_name: section.trim().to_string(),
            line: line_no,
        };
        if let Err(err) = dispatch.handler.apply(body, &mut ctx) {
            warn!(section = %dispatch.canonical, "handler failed: {err}");
            state
                .cursor
                .warn(line_no, format!("skipping `config {section}`: {err}"));
            recover(state, header);
        }
    }
}

fn scope_model<'c>(config: &'c mut Configuration, scope: &Scope) -> &'c mut ConfigModel {
    match scope {
        Scope::Root | Scope::VdomList => &mut config.root,
        Scope::Global => &mut config.global,
        Scope::Vdom(name) => config.vdoms.entry(name.clone()).or_default(),
    }
}

fn recover(state: &mut ParserState<'_>, header: usize) {
    match skip_block(&mut state.cursor, header) {
        SkipOutcome::Closed | SkipOutcome::HandedBack => {}
        SkipOutcome::Exhausted => {
            let line = header + 1;
            state
                .cursor
                .warn(line, "input ended while skipping a malformed block");
        }
    }
}
