//! Prometheus textfile output.
//!
//! A packaging run is a batch job, so metrics are written once at the end
//! for a node exporter textfile collector to pick up.

use anyhow::{Context, Result};
use prometheus::{Encoder, TextEncoder};
use std::path::Path;

/// Encode every pipeline metric in the Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let registry = avpackager_core::metrics::registry().context("Failed to build metrics registry")?;
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

/// Write the metrics to `path`, replacing it atomically.
pub fn write_textfile(path: &Path) -> Result<()> {
    let text = encode_metrics()?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, text).with_context(|| format!("Failed to write {:?}", tmp))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to move metrics to {:?}", path))?;
    Ok(())
}
