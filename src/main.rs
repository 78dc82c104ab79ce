use anyhow::{Context, bail};
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use facade_atlas::config::{CliArgs, PipelineConfig};
use facade_atlas::pipeline::Pipeline;

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // RUST_LOG wins over --verbose.
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("facade_atlas={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config: PipelineConfig = args.into();

    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure rayon thread pool")?;
    }

    let result = Pipeline::run(&config).map_err(|e| {
        error!(%e, "Pipeline failed");
        anyhow::anyhow!(e)
    });
    let result = result.context("facade-atlas pipeline failed")?;

    if config.dry_run {
        return Ok(());
    }

    println!(
        "Done: {} buildings built, {} skipped in {:.2}s -> {}",
        result.built,
        result.skipped,
        result.duration.as_secs_f64(),
        config.output.display()
    );

    if result.built == 0 && result.skipped > 0 {
        warn!("No building produced an atlas");
        bail!("all {} buildings were skipped", result.skipped);
    }
    Ok(())
}
