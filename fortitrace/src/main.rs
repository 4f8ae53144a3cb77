use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use conftree_core::{normalize_section_name, read_source, DiffOptions, DiffResult, ParseWarning};
use fortitrace::aliases::{default_section_aliases, load_section_aliases, SectionAlias};
use fortitrace::compare::compare;
use fortitrace::model::Configuration;
use fortitrace::parse::Parser as ConfigParser;
use fortitrace::parse_report::build_parse_report;
use fortitrace::report::{render_diff_summary, render_diff_text, render_expanded, render_parse};
use fortitrace::sections::SectionRegistry;
use fortitrace::settings::{load_settings_with_source, Settings};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod analyze_cmd;
mod audit_cmd;
mod cli;
mod trace_cmd;

use cli::{Cli, Command, DiffArgs, ExpandArgs, GlobalArgs, OutputFormat, ParseArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    let session = Session::from_args(&cli.global);

    match cli.command {
        Command::Parse(args) => run_parse(&session, args),
        Command::Analyze(args) => analyze_cmd::run_analyze(&session, args),
        Command::Audit(args) => audit_cmd::run_audit(&session, args),
        Command::Expand(args) => run_expand(&session, args),
        Command::Trace(args) => trace_cmd::run_trace(&session, args),
        Command::Diff(args) => run_diff(&session, args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Settings and section registry shared by every subcommand.
pub struct Session {
    pub settings: Settings,
    registry: SectionRegistry,
}

impl Session {
    fn from_args(global: &GlobalArgs) -> Self {
        let (settings, source) = load_settings_with_source(global.config.as_deref());
        debug!(%source, "settings loaded");
        let registry = SectionRegistry::new(&resolve_aliases(global.aliases_file.as_deref()));
        Self { settings, registry }
    }

    /// Read and parse one export.
    pub fn load(&self, path: &Path) -> Result<(Configuration, Vec<ParseWarning>)> {
        let text =
            read_source(path).with_context(|| format!("failed to read {}", path.display()))?;
        let parser = ConfigParser::new(&self.registry).with_reader(self.settings.reader_options());
        Ok(parser.parse(&text))
    }
}

fn resolve_aliases(path: Option<&Path>) -> Vec<SectionAlias> {
    let mut aliases = default_section_aliases();
    let Some(path) = path else {
        return aliases;
    };
    match load_section_aliases(path) {
        Ok(extra) => aliases.extend(extra),
        Err(err) => warn!("{err}; using built-in aliases only"),
    }
    aliases
}

fn run_parse(session: &Session, args: ParseArgs) -> Result<()> {
    let (config, warnings) = session.load(&args.file)?;
    let report = build_parse_report(&args.file.display().to_string(), &config, warnings);
    match args.format {
        OutputFormat::Text => println!("{}", render_parse(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn run_expand(session: &Session, args: ExpandArgs) -> Result<()> {
    let (config, _) = session.load(&args.file)?;
    let model = config.view(args.vdom.as_deref())?;
    let policies: Vec<_> = match &args.policy {
        Some(id) => {
            let policy = model
                .policy(id)
                .with_context(|| format!("policy '{id}' not found"))?;
            vec![model.expand_policy(policy)]
        }
        None => model.policies.iter().map(|p| model.expand_policy(p)).collect(),
    };
    match args.format {
        OutputFormat::Text => println!("{}", render_expanded(&policies)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&policies)?),
    }
    Ok(())
}

fn run_diff(session: &Session, args: DiffArgs) -> Result<()> {
    let (left, _) = session.load(&args.file1)?;
    let (right, _) = session.load(&args.file2)?;

    let opts = DiffOptions {
        ignore_fields: args.ignore.iter().cloned().collect::<BTreeSet<_>>(),
    };
    let mut result = compare(&left, &right, &opts).with_context(|| {
        format!(
            "cannot compare {} with {}",
            args.file1.display(),
            args.file2.display()
        )
    })?;
    if let Some(section) = &args.section {
        result = filter_section(result, section);
        if result.is_empty() {
            debug!(%section, "no changed section matches the filter");
        }
    }

    if args.summary {
        println!("{}", render_diff_summary(&result));
        return Ok(());
    }
    match args.format {
        OutputFormat::Text => {
            if result.is_empty() {
                println!("no differences");
            } else {
                println!("{}", render_diff_text(&result));
                println!();
                println!("{}", render_diff_summary(&result));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(())
}

/// Keep sections whose name contains `section`, compared in normalised form.
fn filter_section(result: DiffResult, section: &str) -> DiffResult {
    let needle = normalize_section_name(section);
    result
        .into_iter()
        .filter(|(name, _)| name.contains(&needle))
        .collect()
}
