use anyhow::{bail, Context, Result};
use fortitrace::report::render_trace;
use fortitrace::trace::{trace, TraceRequest};
use tracing::info;

use crate::cli::{OutputFormat, TraceArgs};
use crate::Session;

pub fn run_trace(session: &Session, args: TraceArgs) -> Result<()> {
    let request = build_request(session, &args)?;
    let (config, _) = session.load(&args.file)?;
    let model = config
        .view(args.vdom.as_deref())
        .with_context(|| format!("cannot trace in {}", args.file.display()))?;

    info!(flow = %request.flow, max_hops = request.max_hops, "tracing");
    let result = trace(&model, &request);

    match args.format {
        OutputFormat::Text => println!("{}", render_trace(&result)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if args.expect_delivered && !result.status.is_delivered() {
        bail!("trace did not deliver the flow: {}", result.status);
    }
    Ok(())
}

fn build_request(session: &Session, args: &TraceArgs) -> Result<TraceRequest> {
    let mut request =
        TraceRequest::parse(&args.src, &args.dst, &args.protocol, args.port.as_deref())?;
    if let Some(sport) = &args.sport {
        request = request.with_source_port(sport)?;
    }
    if let Some(icmp) = &args.icmp {
        request = request.with_icmp(icmp)?;
    }
    let max_hops = args.max_hops.unwrap_or(session.settings.trace.max_hops);
    Ok(request.with_max_hops(max_hops)?)
}
