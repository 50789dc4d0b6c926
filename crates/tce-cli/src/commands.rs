//! `run`, `plan` and `status`.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tce_catalog::Catalog;
use tce_core::{CandidateTable, HarvestConfig, TicId};
use tce_harvest::{HarvestPlan, Harvester, PlanOptions, RunSummary};
use tce_mast::{LightCurveArchive, MastClient};

use crate::cli::{PlanArgs, RunArgs};

/// Runs a full harvest against MAST, stopping cleanly on Ctrl-C.
pub async fn run(mut config: HarvestConfig, args: &RunArgs) -> Result<RunSummary> {
    args.apply(&mut config);
    let client = MastClient::new(&config.mast).context("cannot create MAST client")?;
    let summary = run_with(config, Arc::new(client), shutdown_signal()).await?;
    println!("{summary}");
    Ok(summary)
}

/// Runs a harvest with an explicit archive and shutdown future.
pub async fn run_with<F>(
    config: HarvestConfig,
    archive: Arc<dyn LightCurveArchive>,
    shutdown: F,
) -> Result<RunSummary>
where
    F: Future,
{
    config.validate()?;

    if let Some(limit) = config.harvest.limit {
        tracing::info!("Running in test mode with {limit} rows");
    }
    tracing::info!(csv = %config.input.csv_path.display(), "Starting processing");

    let table = load_table(&config)?;
    let plan = HarvestPlan::from_table(&table, &PlanOptions::from_config(&config))?;

    let summary = Harvester::new(archive, config)
        .run(&table, plan, shutdown)
        .await
        .context("harvest failed")?;
    Ok(summary)
}

/// Prints the tasks a run would perform.
pub fn plan(mut config: HarvestConfig, args: &PlanArgs, out: &mut impl Write) -> Result<HarvestPlan> {
    args.source.apply(&mut config);
    let table = load_table(&config)?;
    let plan = HarvestPlan::from_table(&table, &PlanOptions::from_config(&config))?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, plan.tasks())?;
        writeln!(out)?;
    } else {
        for task in plan.tasks() {
            writeln!(out, "{task}")?;
        }
        writeln!(
            out,
            "{} task(s) planned from {} row(s){}",
            plan.len(),
            table.len(),
            if plan.is_truncated() {
                format!(" ({} available before the limit)", plan.available())
            } else {
                String::new()
            }
        )?;
    }
    Ok(plan)
}

/// Prints catalog statistics, or one target's light curves.
pub async fn status(
    config: &HarvestConfig,
    tic: Option<u64>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let path = &config.catalog.database;
    if !path.exists() {
        bail!("no catalog at {}; run `tce run` first", path.display());
    }
    let catalog = Catalog::open(path).await?;

    match tic {
        Some(tic) => {
            let records = catalog.light_curves_for(TicId::new(tic)).await?;
            if json {
                serde_json::to_writer_pretty(&mut *out, &records)?;
                writeln!(out)?;
            } else if records.is_empty() {
                writeln!(out, "No light curves for {}", TicId::new(tic))?;
            } else {
                for record in &records {
                    writeln!(out, "{}\t{}\t{}", record.tic, record.sector, record.path.display())?;
                }
            }
        }
        None => {
            let stats = catalog.stats().await?;
            if json {
                serde_json::to_writer_pretty(&mut *out, &stats)?;
                writeln!(out)?;
            } else {
                writeln!(out, "Catalog:      {}", path.display())?;
                writeln!(out, "Light curves: {}", stats.light_curves)?;
                writeln!(out, "Targets:      {}", stats.targets)?;
                writeln!(out, "Sectors:      {}", stats.sectors)?;
                writeln!(out, "TOI rows:     {}", stats.tois)?;
            }
        }
    }

    catalog.close().await;
    Ok(())
}

fn load_table(config: &HarvestConfig) -> Result<CandidateTable> {
    CandidateTable::read(&config.input.csv_path).with_context(|| {
        format!(
            "cannot load candidate catalogue {}",
            config.input.csv_path.display()
        )
    })
}

/// Resolves on Ctrl-C. If the handler cannot be installed the run simply
/// cannot be interrupted.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
