//! Results files handed to external report renderers

use flowcheck_core::{Result, RunRecord};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Write records as a pretty-printed JSON array, creating parent directories
pub async fn write_records(path: &Path, records: &[RunRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).await?;
    debug!("Wrote {} record(s) to {:?}", records.len(), path);
    Ok(())
}

/// Read a results file written by [`write_records`]
pub async fn read_records(path: &Path) -> Result<Vec<RunRecord>> {
    let content = fs::read_to_string(path).await?;
    let records: Vec<RunRecord> = serde_json::from_str(&content)?;
    debug!("Loaded {} record(s) from {:?}", records.len(), path);
    Ok(records)
}
