//! TOC-driven crawler.
//!
//! The crawler fetches the site's `toc.json`, walks the module → command
//! hierarchy, and downloads every page into the staging tree. Unlike a link
//! follower it only ever visits URLs the TOC names.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};
use url::Url;

use poshdocset_shared::paths::relative_to;
use poshdocset_shared::{
    CommandRecord, ContentToc, DocsetError, ModuleRecord, Result, RunConfig, TocDocument, TocNode,
    is_reserved_label,
};

use crate::fetcher::{FetchMode, Fetcher};

// ---------------------------------------------------------------------------
// CrawlResult
// ---------------------------------------------------------------------------

/// Summary of a completed crawl operation.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// Module index pages downloaded.
    pub modules: usize,
    /// Command pages downloaded.
    pub commands: usize,
    /// TOC children skipped because their label is reserved.
    pub reserved_skipped: usize,
    /// Total duration of the crawl.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// TocCrawler
// ---------------------------------------------------------------------------

/// Sequential crawler over the module reference TOC.
pub struct TocCrawler<'a> {
    config: &'a RunConfig,
    fetcher: &'a Fetcher,
}

impl<'a> TocCrawler<'a> {
    pub fn new(config: &'a RunConfig, fetcher: &'a Fetcher) -> Self {
        Self { config, fetcher }
    }

    /// Download the TOC and every page it lists into `staging_root`.
    ///
    /// Any fetch failure aborts the crawl.
    #[instrument(skip_all, fields(toc_url = %self.config.toc_url))]
    pub async fn crawl(&self, staging_root: &Path) -> Result<(CrawlResult, ContentToc)> {
        let start_time = Instant::now();

        debug!("downloading TOC");
        let document: TocDocument = self.fetcher.get_json(&self.config.toc_url).await?;
        let modules = document.modules()?;

        info!(modules = modules.len(), "starting crawl");

        let content_dir = staging_root.join(self.config.content_dir());
        let mut toc = ContentToc::new();
        let mut reserved_skipped = 0;

        for node in modules {
            let module_dir = content_dir.join(&node.toc_title);
            let (record, skipped) = self.crawl_module(node, &module_dir, staging_root).await?;
            reserved_skipped += skipped;
            toc.insert(record);
        }

        let result = CrawlResult {
            modules: toc.len(),
            commands: toc.command_count(),
            reserved_skipped,
            duration: start_time.elapsed(),
        };

        info!(
            modules = result.modules,
            commands = result.commands,
            reserved_skipped = result.reserved_skipped,
            duration_ms = result.duration.as_millis(),
            "crawl completed"
        );

        Ok((result, toc))
    }

    async fn crawl_module(
        &self,
        node: &TocNode,
        module_dir: &Path,
        staging_root: &Path,
    ) -> Result<(ModuleRecord, usize)> {
        let name = node.toc_title.trim();
        let index_path = module_dir.join(format!("{name}.html"));

        debug!(module = name, dest = %index_path.display(), "downloading module index page");
        self.download_page(node, &index_path).await?;

        let mut record = ModuleRecord::new(name, relative_to(&index_path, staging_root)?);
        let mut skipped = 0;

        for child in &node.children {
            let command = child.toc_title.trim();
            if is_reserved_label(command) {
                debug!(module = name, label = command, "skipping reserved TOC entry");
                skipped += 1;
                continue;
            }

            let page_path = module_dir.join(format!("{command}.html"));
            debug!(module = name, command, dest = %page_path.display(), "downloading command page");
            self.download_page(child, &page_path).await?;

            record.push_command(CommandRecord {
                name: command.to_string(),
                path: relative_to(&page_path, staging_root)?,
            });
        }

        Ok((record, skipped))
    }

    async fn download_page(&self, node: &TocNode, dest: &Path) -> Result<()> {
        let url = self.page_url(node)?;
        self.fetcher.fetch(&url, dest, FetchMode::Text).await?;
        Ok(())
    }

    /// Resolve a TOC href against the TOC URL and pin the version.
    fn page_url(&self, node: &TocNode) -> Result<Url> {
        let href = node.href.as_deref().ok_or_else(|| {
            DocsetError::parse(format!("TOC entry {} has no href", node.toc_title))
        })?;
        let joined = self
            .config
            .toc_url
            .join(href)
            .map_err(|e| DocsetError::parse(format!("invalid TOC href {href}: {e}")))?;
        Ok(self.config.versioned(&joined))
    }
}
