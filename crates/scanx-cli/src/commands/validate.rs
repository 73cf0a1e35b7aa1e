//! Validate command implementation.

use anyhow::Result;
use scanx_core::{Config, ScanSettings};

/// Validate the configuration and print the effective scan settings.
pub fn run(config: &Config) -> Result<()> {
    config.validate()?;

    let settings = ScanSettings::from_config(&config.scan);
    println!("Configuration is valid");
    println!("  scan_cap: {}", settings.scan_cap());
    println!("  max_pooled_buffers: {}", config.scan.max_pooled_buffers);
    println!(
        "  log: {} ({:?})",
        config.monitoring.log_level.as_directive(),
        config.monitoring.log_format
    );
    Ok(())
}
