//! Plot discovery in the staging directory
//!
//! Scans the staging directory for finished plots. The size floor guards
//! against picking up a plot that is still being written: the upstream
//! plotter creates the file at its final name and fills it in place.

use crate::error::Result;
use crate::models::Plot;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// List every qualifying plot in the staging directory
///
/// A plot qualifies when its file name matches `pattern` and its size is
/// strictly greater than `min_bytes`. Files that vanish between the
/// directory read and the metadata call are skipped. The result is sorted
/// by file name so repeated scans of an unchanged directory are stable.
pub fn scan(dir: &Path, pattern: &Regex, min_bytes: u64) -> Result<Vec<Plot>> {
    let mut plots = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        if !pattern.is_match(&name) {
            continue;
        }

        // The entry may have been moved or deleted since read_dir.
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(plot = %name, error = %e, "Plot vanished mid-scan");
                continue;
            }
        };

        if !metadata.is_file() {
            continue;
        }

        if metadata.len() <= min_bytes {
            debug!(
                plot = %name,
                bytes = metadata.len(),
                min_bytes,
                "Skipping undersized plot"
            );
            continue;
        }

        plots.push(Plot::new(name, entry.path(), metadata.len()));
    }

    plots.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(plots)
}

/// First qualifying plot, or None when the staging directory has nothing
/// ready to process
pub fn next_plot(dir: &Path, pattern: &Regex, min_bytes: u64) -> Result<Option<Plot>> {
    let mut plots = scan(dir, pattern, min_bytes)?;
    if plots.is_empty() {
        debug!(dir = %dir.display(), "No plots to process, will check again soon");
        return Ok(None);
    }
    Ok(Some(plots.remove(0)))
}
