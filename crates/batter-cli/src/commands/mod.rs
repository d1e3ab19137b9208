//! CLI command implementations.

pub mod render;
pub mod run;

use anyhow::{Context, Result};
use batter_config::{WorkerRoster, load_manifest};
use batter_scheduler::BuildManager;
use tracing::info;

/// Load and register the manifest against the worker roster.
pub fn load(manifest_path: &str, workers_path: &str) -> Result<BuildManager> {
    let manifest = load_manifest(manifest_path)
        .with_context(|| format!("Failed to load manifest: {}", manifest_path))?;
    let roster = WorkerRoster::load(workers_path)
        .with_context(|| format!("Failed to load worker roster: {}", workers_path))?;

    info!(
        targets = manifest.targets.len(),
        workers = roster.entries().len(),
        "Loaded configuration"
    );

    BuildManager::from_manifest(manifest, &roster)
        .with_context(|| format!("Invalid build configuration in {}", manifest_path))
}

pub fn validate(manifest_path: &str, workers_path: &str) -> Result<()> {
    let manager = load(manifest_path, workers_path)?;
    manager.warn_dangling_triggers();

    let unsupported: Vec<_> = manager
        .versions()
        .iter()
        .filter(|v| manager.worker_for(v).is_none())
        .collect();

    println!("Configuration is valid");
    println!("  targets:    {}", manager.targets().len());
    println!("  pollers:    {}", manager.pollers().len());
    println!("  schedulers: {}", manager.schedulers().len());
    println!("  builders:   {}", manager.builders().len());
    if !unsupported.is_empty() {
        println!("  versions without workers: {:?}", unsupported);
    }

    Ok(())
}
