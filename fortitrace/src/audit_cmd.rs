use anyhow::{bail, Context, Result};
use fortitrace::analyze::analyze_with;
use fortitrace::audit::build_audit_report;
use fortitrace::report::render_audit;

use crate::cli::{AuditArgs, OutputFormat};
use crate::Session;

pub fn run_audit(session: &Session, args: AuditArgs) -> Result<()> {
    let (config, _) = session.load(&args.file)?;
    let model = config
        .view(args.vdom.as_deref())
        .with_context(|| format!("cannot audit {}", args.file.display()))?;
    let usage = analyze_with(&model, &session.settings.exclusions);
    let scope = args.vdom.as_deref().unwrap_or("root");
    let report = build_audit_report(scope, &model, &usage);

    match args.format {
        OutputFormat::Text => println!("{}", render_audit(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.errors > 0 {
        bail!("audit failed: {} errors", report.errors);
    }
    if args.strict && report.warnings > 0 {
        bail!("audit failed in strict mode: {} warnings", report.warnings);
    }
    Ok(())
}
