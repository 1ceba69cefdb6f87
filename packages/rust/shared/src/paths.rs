//! Path helpers for staging-tree relative paths.
//!
//! Paths stored in the content TOC and the search index are relative to a
//! staging root and always use `/` separators, so they survive being copied
//! between checkpoint directories and land verbatim in the docset index.

use std::path::{Component, Path};

use crate::error::{DocsetError, Result};

/// Join the normal components of `path` with `/`.
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Express `path` relative to `base` as a `/`-separated string.
pub fn relative_to(path: &Path, base: &Path) -> Result<String> {
    let rel = path.strip_prefix(base).map_err(|_| {
        DocsetError::validation(format!(
            "{} is not inside {}",
            path.display(),
            base.display()
        ))
    })?;
    Ok(to_slash_path(rel))
}
