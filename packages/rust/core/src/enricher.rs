//! Stage 3: download theme stylesheets, render the start page, fetch the
//! module icon.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, instrument};

use poshdocset_crawler::{FetchMode, Fetcher, PageRenderer, SessionFactory};
use poshdocset_rewriter::{RewriteContext, rewrite_start_page};
use poshdocset_shared::{DocsetError, Result, RunConfig, ThemeResource};

/// What stage 3 added to the staging tree.
#[derive(Debug, Clone, Default)]
pub struct EnrichSummary {
    /// Stylesheets downloaded, start page ones included.
    pub stylesheets: usize,
    /// Start page module links pointed at local files.
    pub start_page_links: usize,
    /// Render attempts needed for the start page.
    pub render_attempts: u32,
    pub icon_bytes: u64,
}

/// Populate `staging_root` with everything the rewritten pages reference but
/// stage 1 did not download. Any failed fetch aborts the stage.
#[instrument(skip_all, fields(staging = %staging_root.display(), resources = resources.len()))]
pub async fn enrich<F: SessionFactory>(
    config: &RunConfig,
    fetcher: &Fetcher,
    renderer: &PageRenderer<F>,
    ctx: &RewriteContext,
    resources: &HashSet<ThemeResource>,
    staging_root: &Path,
) -> Result<EnrichSummary> {
    let mut summary = EnrichSummary::default();

    // Sorted so repeated runs issue requests in the same order.
    let mut sorted: Vec<&ThemeResource> = resources.iter().collect();
    sorted.sort();
    for resource in sorted {
        fetch_resource(fetcher, resource, staging_root).await?;
        summary.stylesheets += 1;
    }

    let rendered = renderer.render(&config.start_page_url).await?;
    summary.render_attempts = rendered.attempts;

    let start_rel = config.start_page_rel();
    let page = rewrite_start_page(&rendered.html, &start_rel, ctx)?;
    summary.start_page_links = page.links_rewritten;

    let mut start_resources: Vec<&ThemeResource> = page.resources.iter().collect();
    start_resources.sort();
    for resource in start_resources {
        fetch_resource(fetcher, resource, staging_root).await?;
        summary.stylesheets += 1;
    }

    let start_path = staging_root.join(&start_rel);
    if let Some(parent) = start_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DocsetError::io(parent, e))?;
    }
    std::fs::write(&start_path, page.html.as_bytes())
        .map_err(|e| DocsetError::io(&start_path, e))?;
    debug!(path = %start_path.display(), links = page.links_rewritten, "wrote start page");

    let icon_url = config.module_icon_url()?;
    let icon_path = staging_root.join(config.module_icon_rel());
    summary.icon_bytes = fetcher.fetch(&icon_url, &icon_path, FetchMode::Binary).await?;

    info!(
        stylesheets = summary.stylesheets,
        start_page_links = summary.start_page_links,
        render_attempts = summary.render_attempts,
        "enrichment completed"
    );
    Ok(summary)
}

async fn fetch_resource(fetcher: &Fetcher, resource: &ThemeResource, staging_root: &Path) -> Result<u64> {
    let url = url::Url::parse(&resource.url)
        .map_err(|e| DocsetError::parse(format!("invalid resource URL {}: {e}", resource.url)))?;
    let dest = staging_root.join(&resource.path);
    fetcher.fetch(&url, &dest, FetchMode::Text).await
}
