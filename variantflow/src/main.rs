//! variantflow binary entry point.

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use variantflow::cli::Args;
use variantflow::context::PipelineContext;
use variantflow::pipeline::{seed_raw_calls, variant_calling_graph};
use variantflow::report::{probe_versions, write_summary};
use variantflow::resources::{resolve_bundle, ResourceTables};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("starting variantflow");
    if !args.validate() {
        error!("please fix the invocation");
        std::process::exit(1);
    }

    let tables = match &args.config {
        Some(path) => match ResourceTables::load(path) {
            Ok(tables) => tables,
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
        None => ResourceTables::default(),
    };

    let bundle = match resolve_bundle(&tables, &args.genome, args.kit.as_deref(), &args.overrides())
    {
        Ok(bundle) => bundle,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let mut ctx = PipelineContext::new(bundle, &args.out_dir)
        .with_tools(tables.tools.clone())
        .with_keep_intermediates(args.keep_intermediates);
    if let Some(cores) = args.cores {
        ctx = ctx.with_cores(cores);
    }
    let ctx = Arc::new(ctx);

    let graph = variant_calling_graph().context("building the variant-calling graph")?;

    let reads = args.run_keys();
    seed_raw_calls(&ctx, &reads).context("seeding raw call files")?;
    let key_count = reads.len();
    let keys = reads.into_iter().map(|(key, _)| key).collect();

    info!(
        cores = ctx.total_cores(),
        out_dir = %ctx.out_dir().display(),
        "running {} stages over {key_count} keys",
        graph.stage_count(),
    );
    let result = graph.execute(ctx.clone(), keys).await;

    let versions = probe_versions(ctx.out_dir());
    let summary = write_summary(&ctx, graph.execution_order(), &result, &versions)
        .context("writing the run summary")?;
    info!(report = %summary.report.display(), "summary written");

    for key_result in &result.keys {
        if let Some(e) = &key_result.error {
            error!(key = %key_result.key, "failed: {e}");
        } else {
            info!(key = %key_result.key, "completed in {:.1} ms", key_result.duration_ms);
        }
    }

    if !result.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
