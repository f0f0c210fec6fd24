//! `worksmith config` — show the resolved configuration.

use std::path::Path;

use worksmith_config::EngineConfig;

pub fn run(path: Option<&Path>) -> anyhow::Result<()> {
    let config = EngineConfig::load(path)?;
    // Debug impl redacts secrets
    println!("{config:#?}");
    Ok(())
}
