//! Checkpoint directory handling.
//!
//! Every stage writes into its own directory under the build folder. Before a
//! stage runs, its directory is wiped and (for stages 2 and 3) seeded with a
//! copy of the previous checkpoint.

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use poshdocset_shared::{DocsetError, Result};

/// Delete `dir` if it exists and create it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| DocsetError::io(dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| DocsetError::io(dir, e))?;
    debug!(path = %dir.display(), "reset directory");
    Ok(())
}

/// Recursively copy the contents of `src` into `dest`. Returns the number of
/// files copied.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            DocsetError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| DocsetError::validation(format!("{}: {e}", entry.path().display())))?;
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| DocsetError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| DocsetError::io(&target, e))?;
            copied += 1;
        }
    }

    debug!(from = %src.display(), to = %dest.display(), files = copied, "copied tree");
    Ok(copied)
}

/// Reset `dest` and fill it with a copy of `src`.
pub fn reset_copy(src: &Path, dest: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Err(DocsetError::validation(format!(
            "checkpoint {} does not exist",
            src.display()
        )));
    }
    reset_dir(dest)?;
    copy_tree(src, dest)
}
