//! End-to-end build: TOC → download → rewrite → enrich → index → archive.
//!
//! Each stage reads the previous checkpoint under the build folder and writes
//! its own, so a failed stage never touches earlier output.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use poshdocset_crawler::{ChromeSessionFactory, Fetcher, PageRenderer, SessionFactory, TocCrawler};
use poshdocset_rewriter::{RewriteContext, rewrite_tree};
use poshdocset_shared::{ContentToc, DocsetError, Result, RunConfig};

use crate::enricher::{self, EnrichSummary};
use crate::indexer::{self, IndexSummary};
use crate::packager;
use crate::tree;

/// Content map written by stage 1 and read back by `--local` runs.
pub const CONTENT_TOC_FILE: &str = "content_toc.json";

/// Result of a full build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub archive_path: PathBuf,
    pub modules: usize,
    pub commands: usize,
    /// Theme stylesheets collected from module and command pages.
    pub resources: usize,
    pub index: IndexSummary,
    /// Stage 3 downloads and start page render effort.
    pub enrichment: EnrichSummary,
    pub archive_sha256: String,
    pub archive_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Run the full build with a Chrome-backed start page renderer.
pub async fn build_docset(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<BuildResult> {
    build_docset_with(config, ChromeSessionFactory::new(config), progress).await
}

/// Run the full build with the given render session factory.
///
/// In temporary mode the build folder is removed afterwards, whether or not
/// the build succeeded.
#[instrument(skip_all, fields(version = %config.version, build_dir = %config.build_dir.display()))]
pub async fn build_docset_with<F: SessionFactory>(
    config: &RunConfig,
    factory: F,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let result = run_stages(config, factory, progress).await;

    if config.temporary && config.build_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(&config.build_dir) {
            warn!(path = %config.build_dir.display(), error = %e, "failed to remove temporary build folder");
        }
    }

    let result = result?;
    progress.done(&result);
    Ok(result)
}

async fn run_stages<F: SessionFactory>(
    config: &RunConfig,
    factory: F,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();
    let started_at = Utc::now();
    info!(local = config.local, temporary = config.temporary, "starting docset build");

    let fetcher = Fetcher::new(config)?;
    let ctx = RewriteContext::from_config(config)?;

    // --- Stage 1: Download ---
    let downloaded = config.downloaded_dir();
    let toc = if config.local {
        progress.phase("Reusing downloaded pages");
        load_content_toc(config)?
    } else {
        progress.phase("Downloading module and command pages");
        tree::reset_dir(&downloaded)?;
        let (_crawl, toc) = TocCrawler::new(config, &fetcher).crawl(&downloaded).await?;
        save_content_toc(config, &toc)?;
        toc
    };

    // --- Stage 2: Rewrite ---
    progress.phase("Rewriting pages");
    let rewritten = config.rewritten_dir();
    tree::reset_copy(&downloaded, &rewritten)?;
    let rewrite = rewrite_tree(&rewritten, &ctx)?;

    // --- Stage 3: Enrich ---
    progress.phase("Downloading stylesheets and start page");
    let enriched = config.enriched_dir();
    tree::reset_copy(&rewritten, &enriched)?;
    let renderer = PageRenderer::new(factory, config.render_retry_pause);
    let enrichment =
        enricher::enrich(config, &fetcher, &renderer, &ctx, &rewrite.resources, &enriched).await?;

    // --- Stage 4: Package ---
    progress.phase("Packaging docset");
    packager::lay_out_docset(config, &enriched)?;

    progress.phase("Building search index");
    let index = indexer::build_index(&toc, &config.index_db_path()).await?;

    progress.phase("Writing archive");
    let archive = packager::write_archive(config)?;

    let result = BuildResult {
        archive_path: archive.path,
        modules: toc.len(),
        commands: toc.command_count(),
        resources: rewrite.resources.len(),
        index,
        enrichment,
        archive_sha256: archive.sha256,
        archive_bytes: archive.size_bytes,
        started_at,
        elapsed: start.elapsed(),
    };

    info!(
        archive = %result.archive_path.display(),
        modules = result.modules,
        commands = result.commands,
        indexed = result.index.inserted,
        elapsed_ms = result.elapsed.as_millis(),
        "docset build complete"
    );

    Ok(result)
}

fn content_toc_path(config: &RunConfig) -> PathBuf {
    config.build_dir.join(CONTENT_TOC_FILE)
}

fn save_content_toc(config: &RunConfig, toc: &ContentToc) -> Result<()> {
    let path = content_toc_path(config);
    let json = serde_json::to_string_pretty(toc)
        .map_err(|e| DocsetError::validation(format!("JSON serialization failed: {e}")))?;
    std::fs::write(&path, json).map_err(|e| DocsetError::io(&path, e))
}

fn load_content_toc(config: &RunConfig) -> Result<ContentToc> {
    let path = content_toc_path(config);
    require_dir(&config.downloaded_dir())?;
    let content = std::fs::read_to_string(&path).map_err(|e| DocsetError::io(&path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| DocsetError::parse(format!("{}: {e}", path.display())))
}

fn require_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(DocsetError::validation(format!(
            "{} does not exist; run once without --local first",
            dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{START_PAGE, StaticFactory, run_config, temp_root};
    use poshdocset_shared::EntryType;
    use poshdocset_storage::SearchIndex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOC: &str = r#"{"items":[{"toc_title":"Reference","children":[
        {"toc_title":"Microsoft.PowerShell.Core","href":"../Microsoft.PowerShell.Core/Microsoft.PowerShell.Core",
         "children":[
            {"toc_title":"About","href":"../Microsoft.PowerShell.Core/About/about"},
            {"toc_title":"Get-Help","href":"../Microsoft.PowerShell.Core/Get-Help"},
            {"toc_title":"Microsoft.PowerShell.Core","href":"../Microsoft.PowerShell.Core/Microsoft.PowerShell.Core"}
         ]}
    ]}]}"#;

    const COMMAND_PAGE: &str = r#"<html><head>
        <link rel="stylesheet" href="/_themes/docs.theme/master/en-us/_themes/styles/main.css">
        <script src="/_themes/site.js"></script>
        </head><body>
        <nav class="doc-outline" role="navigation">outline</nav>
        <a data-linktype="relative-path" href="Get-Command?view=powershell-6">Get-Command</a>
        </body></html>"#;

    async fn mount(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mock_site() -> MockServer {
        let server = MockServer::start().await;
        mount(&server, "/en-us/powershell/module/psdocs/toc.json", TOC).await;
        mount(
            &server,
            "/en-us/powershell/module/Microsoft.PowerShell.Core/Microsoft.PowerShell.Core",
            COMMAND_PAGE,
        )
        .await;
        mount(&server, "/en-us/powershell/module/Microsoft.PowerShell.Core/Get-Help", COMMAND_PAGE).await;
        mount(
            &server,
            "/_themes/docs.theme/master/en-us/_themes/styles/main.css",
            "body {}",
        )
        .await;
        mount(&server, "/en-us/media/toolbars/module.svg", "<svg/>").await;
        server
    }

    #[tokio::test]
    async fn full_build_produces_archive_and_index() {
        let server = mock_site().await;
        let root = temp_root("pipeline");
        let config = run_config(&server.uri(), &root, &root.join("static"));

        let result = build_docset_with(&config, StaticFactory::new(START_PAGE), &SilentProgress)
            .await
            .expect("build");

        assert_eq!(result.modules, 1);
        assert_eq!(result.commands, 2);
        assert_eq!(result.resources, 1);
        assert_eq!(result.index.inserted, 2);
        assert!(result.index.failed.is_empty());
        assert!(result.archive_path.is_file());
        assert_eq!(result.archive_path, config.archive_dir().join("Powershell.tgz"));
        assert_eq!(
            result.archive_bytes,
            std::fs::metadata(&result.archive_path).unwrap().len()
        );
        assert_eq!(result.enrichment.stylesheets, 2);
        assert_eq!(result.enrichment.render_attempts, 1);
        assert_eq!(result.enrichment.icon_bytes, 6);

        let index = SearchIndex::open_readonly(&config.index_db_path()).await.unwrap();
        let module = index.lookup("Microsoft.PowerShell.Core").await.unwrap();
        assert_eq!(module.len(), 1);
        assert_eq!(module[0].entry_type, EntryType::Module);
        let help = index.lookup("Get-Help").await.unwrap();
        assert_eq!(
            help[0].path,
            "127.0.0.1/en-us/powershell/module/Microsoft.PowerShell.Core/Get-Help.html"
        );

        let page = std::fs::read_to_string(config.documents_dir().join(&help[0].path)).unwrap();
        assert!(page.contains(r#"href="Get-Command.html""#));
        assert!(!page.contains("doc-outline"));
        assert!(page.contains("../../../../_themes/docs.theme/master/en-us/_themes/styles/main.css"));

        assert!(config.documents_dir().join(config.start_page_rel()).is_file());
        assert!(config.documents_dir().join(config.module_icon_rel()).is_file());
        assert!(config.build_dir.join(CONTENT_TOC_FILE).is_file());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn local_build_reuses_downloaded_checkpoint() {
        let server = mock_site().await;
        let root = temp_root("pipeline_local");
        let config = run_config(&server.uri(), &root, &root.join("static"));
        build_docset_with(&config, StaticFactory::new(START_PAGE), &SilentProgress)
            .await
            .unwrap();

        let mut local = config.clone();
        local.local = true;
        let result = build_docset_with(&local, StaticFactory::new(START_PAGE), &SilentProgress)
            .await
            .expect("local build");
        assert_eq!(result.modules, 1);
        assert_eq!(result.index.inserted, 2);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn local_build_without_checkpoint_fails() {
        let root = temp_root("pipeline_no_checkpoint");
        let mut config = run_config("http://127.0.0.1:1", &root, &root.join("static"));
        config.local = true;

        let err = build_docset_with(&config, StaticFactory::new(START_PAGE), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DocsetError::Validation { .. }));
    }

    #[tokio::test]
    async fn temporary_build_folder_is_removed() {
        let server = mock_site().await;
        let root = temp_root("pipeline_temp");
        let mut config = run_config(&server.uri(), &root, &root.join("static"));
        config.temporary = true;
        config.build_dir = root.join("scratch");

        let result = build_docset_with(&config, StaticFactory::new(START_PAGE), &SilentProgress)
            .await
            .unwrap();
        assert!(result.archive_path.is_file());
        assert!(!config.build_dir.exists());

        let _ = std::fs::remove_dir_all(&root);
    }
}
