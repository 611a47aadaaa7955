use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::metadata::Site;

pub fn discover_media(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut media = Vec::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Skip hidden files such as editor swap files
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(false);
        if hidden || !path.is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                media.push(path.to_path_buf());
            }
        }
    }

    // Sort by path for consistent ordering
    media.sort();

    Ok(media)
}

/// Media under the per-site directories of the corpus root. Missing site
/// directories are skipped.
pub fn discover_sites(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut media = Vec::new();
    for site in Site::ALL {
        let dir = root.join(site.as_str());
        if !dir.is_dir() {
            tracing::debug!(site = %site, "No directory for site");
            continue;
        }
        media.extend(discover_media(&dir, extensions)?);
    }
    media.sort();
    Ok(media)
}
