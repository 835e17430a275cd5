use phenoplot::config::RunConfig;
use phenoplot::pipelines::{run_immune_comparison, run_signature_composition};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = RunConfig::resolve()?;
    info!("Writing outputs to {}", cfg.output_dir.display());
    cfg.write_json()?;

    let composition = run_signature_composition(&cfg)?;
    info!("Composition chart: {}", composition.display());

    let report = run_immune_comparison(&cfg)?;
    for c in &report.comparisons {
        info!(
            "{:<12} {:>9} vs {:<9} p.adj = {:.2e} {}",
            c.partition.as_deref().unwrap_or("all"),
            c.group_a,
            c.group_b,
            c.adjusted_p,
            c.significance_label
        );
    }

    Ok(())
}
