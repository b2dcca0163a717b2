//! Configuration commands.

use anyhow::{Context, Result};
use packet_core::config::PacketConfig;

pub fn cmd_show(config: &PacketConfig) -> Result<()> {
    let text = config
        .to_toml_string()
        .context("failed to render configuration")?;
    println!("# {}", PacketConfig::file_path().display());
    print!("{text}");
    Ok(())
}

pub fn cmd_init() -> Result<()> {
    let path = PacketConfig::write_default_if_missing().context("failed to write default config")?;
    println!("{}", path.display());
    Ok(())
}
