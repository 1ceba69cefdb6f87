//! Theme stylesheet relinking.
//!
//! Pages load their theme from absolute, site-rooted URLs. Each such
//! `<link rel="stylesheet">` is pointed at a local copy under
//! `<host>/<theme path>` and reported as a [`ThemeResource`] to download.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use kuchiki::NodeRef;
use tracing::debug;

use poshdocset_shared::paths::to_slash_path;
use poshdocset_shared::{Result, RunConfig, ThemeResource};

/// Rewrites theme stylesheet links for one site.
#[derive(Debug, Clone)]
pub struct ThemeLinker {
    config: RunConfig,
}

impl ThemeLinker {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// If `href` is a theme stylesheet, the resource it maps to.
    pub fn resource_for(&self, href: &str) -> Result<Option<ThemeResource>> {
        let site_path = href.trim().trim_start_matches('/');
        if !site_path.starts_with(&self.config.theme_prefix) {
            return Ok(None);
        }

        let url = self.config.site_url(site_path)?;
        // Cache-busting queries and fragments do not belong in a file name.
        let file_part = site_path
            .split(['?', '#'])
            .next()
            .unwrap_or(site_path);

        Ok(Some(ThemeResource {
            url: url.to_string(),
            path: format!("{}/{file_part}", self.config.host()),
        }))
    }

    /// Relink every theme stylesheet in `<head>` relative to `doc_path`
    /// (itself relative to the staging root). Returns the resources found.
    pub fn relink(&self, document: &NodeRef, doc_path: &Path) -> Result<HashSet<ThemeResource>> {
        let doc_dir = doc_path.parent().unwrap_or_else(|| Path::new(""));
        let mut resources = HashSet::new();

        let links: Vec<_> = match document.select("head link") {
            Ok(selection) => selection.collect(),
            Err(()) => return Ok(resources),
        };

        for link in links {
            let mut attributes = link.attributes.borrow_mut();
            let is_stylesheet = attributes
                .get("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")));
            if !is_stylesheet {
                continue;
            }
            let Some(href) = attributes.get("href").map(str::to_string) else {
                continue;
            };
            let Some(resource) = self.resource_for(&href)? else {
                continue;
            };

            let local = relative_href(Path::new(&resource.path), doc_dir);
            debug!(%href, %local, "relinking theme stylesheet");
            attributes.insert("href", local);
            resources.insert(resource);
        }

        Ok(resources)
    }
}

/// `/`-separated path from `from_dir` to `target`, both relative to the same root.
pub fn relative_href(target: &Path, from_dir: &Path) -> String {
    let rel = pathdiff::diff_paths(target, from_dir).unwrap_or_else(|| PathBuf::from(target));
    to_slash_path(&rel)
}
