use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "fortitrace")]
#[command(about = "Analyze, trace and diff FortiGate CLI configuration exports")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Settings file overriding the built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Extra section aliases (TOML, `[[alias]] from/to`).
    #[arg(long, global = true)]
    pub aliases_file: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Parse an export and list what was found.
    Parse(ParseArgs),
    /// Report used and unused objects, group depths and cycles.
    Analyze(AnalyzeArgs),
    /// Check references and group structure; fails on errors.
    Audit(AuditArgs),
    /// Show policies with addresses and services expanded.
    Expand(ExpandArgs),
    /// Simulate one flow through the device.
    Trace(TraceArgs),
    /// Compare two exports section by section.
    Diff(DiffArgs),
}

#[derive(Parser, Debug)]
pub struct ParseArgs {
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    pub file: PathBuf,
    /// VDOM to analyze (defaults to `root` in VDOM mode).
    #[arg(long)]
    pub vdom: Option<String>,
    /// Also list used objects and reference counts.
    #[arg(long)]
    pub details: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct AuditArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub vdom: Option<String>,
    /// Fail on warnings too.
    #[arg(long)]
    pub strict: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ExpandArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub vdom: Option<String>,
    /// Only this policy id.
    #[arg(long)]
    pub policy: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct TraceArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub src: String,
    #[arg(long)]
    pub dst: String,
    /// Destination port (required for tcp, udp and sctp).
    #[arg(long)]
    pub port: Option<String>,
    #[arg(long)]
    pub sport: Option<String>,
    /// Protocol name or number.
    #[arg(long, default_value = "tcp")]
    pub protocol: String,
    /// ICMP `type[/code]`.
    #[arg(long)]
    pub icmp: Option<String>,
    /// Hop budget (defaults to the settings file value).
    #[arg(long)]
    pub max_hops: Option<usize>,
    #[arg(long)]
    pub vdom: Option<String>,
    /// Exit with an error unless the flow is delivered.
    #[arg(long)]
    pub expect_delivered: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    pub file1: PathBuf,
    pub file2: PathBuf,
    /// Only sections whose name contains this text.
    #[arg(long)]
    pub section: Option<String>,
    /// Field names to leave out of modifications.
    #[arg(long)]
    pub ignore: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(long)]
    pub summary: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
