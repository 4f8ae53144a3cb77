use anyhow::{Context, Result};
use fortitrace::analyze::analyze_with;
use fortitrace::report::render_usage;

use crate::cli::{AnalyzeArgs, OutputFormat};
use crate::Session;

pub fn run_analyze(session: &Session, args: AnalyzeArgs) -> Result<()> {
    let (config, _) = session.load(&args.file)?;
    let model = config
        .view(args.vdom.as_deref())
        .with_context(|| format!("cannot analyze {}", args.file.display()))?;
    let usage = analyze_with(&model, &session.settings.exclusions);
    let scope = args.vdom.as_deref().unwrap_or("root");

    match args.format {
        OutputFormat::Text => println!("{}", render_usage(scope, &usage, args.details)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&usage)?),
    }
    Ok(())
}
