use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;

/// Enumerates image files in `dir` by extension allow-list.
///
/// Returns paths sorted lexicographically so a run's enumeration
/// order (and therefore its failures) is reproducible. Subdirectories
/// are not descended into.
pub fn scan_images(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut paths = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if matches!(&ext, Some(e) if IMAGE_EXTENSIONS.contains(&e.as_str())) {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}
