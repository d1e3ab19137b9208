//! Rendering derived configuration as JSON.

use anyhow::Result;
use batter_scheduler::BuildManager;
use serde_json::{Value, json};

use crate::Section;

pub fn render(manifest_path: &str, workers_path: &str, section: Section) -> Result<()> {
    let manager = super::load(manifest_path, workers_path)?;
    let output = to_json(&manager, section)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn to_json(manager: &BuildManager, section: Section) -> Result<Value> {
    let value = match section {
        Section::Pollers => serde_json::to_value(manager.pollers())?,
        Section::Schedulers => serde_json::to_value(manager.schedulers())?,
        Section::Builders => serde_json::to_value(manager.builders())?,
        Section::All => json!({
            "pollers": manager.pollers(),
            "schedulers": manager.schedulers(),
            "builders": manager.builders(),
        }),
    };
    Ok(value)
}
