//! HTML rewriting for offline viewing.
//!
//! Each rewrite is text in, text out: the source is parsed into a private
//! DOM, a fixed sequence of passes runs over it, and the result is
//! pretty-printed.
//!
//! 1. [`links`]: point internal links at downloaded files
//! 2. [`chrome`]: strip navigation, search, footers, and head scripts
//! 3. [`stylesheet`]: relink theme stylesheets and collect them for download
//! 4. [`serialize`]: deterministic indented output

pub mod chrome;
pub mod links;
pub mod serialize;
pub mod stylesheet;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use poshdocset_shared::paths::relative_to;
use poshdocset_shared::{DocsetError, Result, RunConfig, ThemeResource};

pub use chrome::{ElementPattern, PAGE_CHROME, START_PAGE_HEADER};
pub use links::{
    DocsLinkClassifier, LinkAction, LinkClassifier, LinkContext, StartPageLinkClassifier,
};
pub use serialize::to_pretty_html;
pub use stylesheet::{ThemeLinker, relative_href};

/// Selector for links between module and command pages.
const RELATIVE_LINK_SELECTOR: &str = r#"a[data-linktype="relative-path"]"#;

/// Selector for the start page's module table.
const START_TABLE_SELECTOR: &str = "table.api-search-results.standalone";

/// Attribute carrying the module name on start page links.
const TITLE_ATTRIBUTE: &str = "ms.title";

// ---------------------------------------------------------------------------
// Context and results
// ---------------------------------------------------------------------------

/// Everything the passes need to know about the site, built once per run.
pub struct RewriteContext {
    classifier: Box<dyn LinkClassifier + Send + Sync>,
    start_classifier: StartPageLinkClassifier,
    theme: ThemeLinker,
    module_icon: PathBuf,
}

impl RewriteContext {
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        Ok(Self {
            classifier: Box::new(DocsLinkClassifier::new(
                &config.version_query_prefix,
                &config.version_param,
            )?),
            start_classifier: StartPageLinkClassifier::new(&config.version_query_prefix)?,
            theme: ThemeLinker::new(config),
            module_icon: config.module_icon_rel(),
        })
    }

    /// Replace the link classifier used for module and command pages.
    pub fn with_classifier(mut self, classifier: impl LinkClassifier + Send + Sync + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }
}

/// Output of rewriting one document.
#[derive(Debug, Clone, Default)]
pub struct RewrittenPage {
    pub html: String,
    pub resources: HashSet<ThemeResource>,
    pub links_rewritten: usize,
    pub chrome_removed: usize,
}

/// Totals for a whole checkpoint tree.
#[derive(Debug, Clone, Default)]
pub struct TreeRewrite {
    pub pages: usize,
    pub links_rewritten: usize,
    pub resources: HashSet<ThemeResource>,
}

// ---------------------------------------------------------------------------
// Module and command pages
// ---------------------------------------------------------------------------

/// Rewrite a module or command page. `doc_path` is relative to the staging root.
pub fn rewrite_page(html: &str, doc_path: &Path, ctx: &RewriteContext) -> Result<RewrittenPage> {
    let document = kuchiki::parse_html().one(html);

    let links_rewritten =
        rewrite_links(&document, RELATIVE_LINK_SELECTOR, ctx.classifier.as_ref())?;

    let mut chrome_removed = chrome::remove_matching(&document, PAGE_CHROME);
    chrome_removed += chrome::remove_head_scripts(&document);

    let resources = ctx.theme.relink(&document, doc_path)?;

    Ok(RewrittenPage {
        html: to_pretty_html(&document),
        resources,
        links_rewritten,
        chrome_removed,
    })
}

// ---------------------------------------------------------------------------
// Start page
// ---------------------------------------------------------------------------

/// Rewrite the rendered start page. `doc_path` is relative to the staging root.
///
/// Fails if the page has no module table, which usually means the render
/// returned before the page's scripts filled it in.
pub fn rewrite_start_page(
    html: &str,
    doc_path: &Path,
    ctx: &RewriteContext,
) -> Result<RewrittenPage> {
    let document = kuchiki::parse_html().one(html);

    let table = select_nodes(&document, START_TABLE_SELECTOR)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            DocsetError::parse(format!(
                "start page has no {START_TABLE_SELECTOR} element"
            ))
        })?;

    let links_rewritten =
        rewrite_links(&table, "a", &ctx.start_classifier)?;

    let doc_dir = doc_path.parent().unwrap_or_else(|| Path::new(""));
    let icon_href = relative_href(&ctx.module_icon, doc_dir);
    for image in select_nodes(&table, "img")? {
        if let Some(element) = image.as_element() {
            let mut attributes = element.attributes.borrow_mut();
            if attributes.get("alt") == Some("Module") {
                attributes.insert("src", icon_href.clone());
            }
        }
    }

    let mut chrome_removed = chrome::remove_matching(&document, PAGE_CHROME);
    chrome_removed += chrome::remove_matching(&document, &[START_PAGE_HEADER]);
    chrome_removed += chrome::remove_head_scripts(&document);
    chrome_removed += chrome::remove_deferred_body_scripts(&document);

    let resources = ctx.theme.relink(&document, doc_path)?;

    Ok(RewrittenPage {
        html: to_pretty_html(&document),
        resources,
        links_rewritten,
        chrome_removed,
    })
}

// ---------------------------------------------------------------------------
// Tree walk
// ---------------------------------------------------------------------------

/// Rewrite every `*.html` file under `root` in place.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn rewrite_tree(root: &Path, ctx: &RewriteContext) -> Result<TreeRewrite> {
    let mut summary = TreeRewrite::default();

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            DocsetError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let is_html = entry.path().extension().is_some_and(|ext| ext == "html");
        if entry.file_type().is_file() && is_html {
            files.push(entry.into_path());
        }
    }
    files.sort();

    for file in files {
        let rel = relative_to(&file, root)?;
        let source = std::fs::read_to_string(&file).map_err(|e| DocsetError::io(&file, e))?;
        let page = rewrite_page(&source, Path::new(&rel), ctx)?;
        std::fs::write(&file, page.html.as_bytes()).map_err(|e| DocsetError::io(&file, e))?;

        debug!(
            page = %rel,
            links = page.links_rewritten,
            chrome = page.chrome_removed,
            stylesheets = page.resources.len(),
            "rewrote page"
        );
        summary.pages += 1;
        summary.links_rewritten += page.links_rewritten;
        summary.resources.extend(page.resources);
    }

    info!(
        pages = summary.pages,
        links_rewritten = summary.links_rewritten,
        stylesheets = summary.resources.len(),
        "rewrite completed"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn select_nodes(root: &NodeRef, selector: &str) -> Result<Vec<NodeRef>> {
    root.select(selector)
        .map(|selection| selection.map(|el| el.as_node().clone()).collect())
        .map_err(|()| DocsetError::parse(format!("invalid selector: {selector}")))
}

/// Apply `classifier` to every anchor under `root` matching `selector`.
/// Returns how many hrefs changed.
fn rewrite_links(
    root: &NodeRef,
    selector: &str,
    classifier: &dyn LinkClassifier,
) -> Result<usize> {
    let mut rewritten = 0;

    for node in select_nodes(root, selector)? {
        let Some(element) = node.as_element() else {
            continue;
        };
        let text = node.text_contents();
        let mut attributes = element.attributes.borrow_mut();
        let Some(href) = attributes.get("href").map(str::to_string) else {
            continue;
        };
        let title = attributes.get(TITLE_ATTRIBUTE).map(str::to_string);

        let action = classifier.classify(&LinkContext {
            href: &href,
            text: text.trim(),
            title: title.as_deref(),
        });
        match action {
            LinkAction::Rewrite(target) if target != href => {
                debug!(from = %href, to = %target, "link rewrite");
                attributes.insert("href", target);
                rewritten += 1;
            }
            LinkAction::Rewrite(_) | LinkAction::Unchanged => {}
        }
    }

    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use poshdocset_shared::{AppConfig, RunOverrides};
    use scraper::{Html, Selector};

    fn config() -> RunConfig {
        RunConfig::resolve(&AppConfig::default(), RunOverrides::default()).unwrap()
    }

    fn ctx() -> RewriteContext {
        RewriteContext::from_config(&config()).unwrap()
    }

    fn attr_values(html: &str, selector: &str, attr: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        let sel = Selector::parse(selector).unwrap();
        doc.select(&sel)
            .filter_map(|el| el.value().attr(attr).map(str::to_string))
            .collect()
    }

    const COMMAND_PAGE: &str = r#"<!DOCTYPE html>
<html><head>
<script src="/analytics.js"></script>
<link rel="stylesheet" href="/_themes/docs.theme/master/en-us/_themes/styles/main.css">
<title>Get-Help</title>
</head><body>
<ul class="breadcrumbs" role="navigation"><li>Docs</li></ul>
<div class="sidebar" role="navigation">sidebar</div>
<main>
<a data-linktype="relative-path" href="./?view=powershell-6">Microsoft.PowerShell.Core</a>
<a data-linktype="relative-path" href="Get-Process?view=powershell-6">Get-Process</a>
<a data-linktype="relative-path" href="about/about_Aliases?view=powershell-6">about_Aliases</a>
<a href="Get-Command?view=powershell-6">external</a>
<pre><code>Get-Help -Name Get-Process
    -Full</code></pre>
</main>
<div class="container footerContainer">footer</div>
</body></html>"#;

    #[test]
    fn command_page_rewrite() {
        let doc_path = Path::new(
            "docs.microsoft.com/en-us/powershell/module/Microsoft.PowerShell.Core/Get-Help.html",
        );
        let page = rewrite_page(COMMAND_PAGE, doc_path, &ctx()).unwrap();

        let hrefs = attr_values(&page.html, "a", "href");
        assert_eq!(
            hrefs,
            [
                "./Microsoft.PowerShell.Core.html",
                "Get-Process.html",
                "about/about_Aliases?view=powershell-6",
                "Get-Command?view=powershell-6",
            ]
        );
        assert_eq!(page.links_rewritten, 2);

        assert!(!page.html.contains("sidebar"));
        assert!(!page.html.contains("footer"));
        assert!(!page.html.contains("breadcrumbs"));
        assert!(!page.html.contains("analytics.js"));
        assert!(page.html.contains("Get-Help -Name Get-Process\n    -Full"));

        assert_eq!(page.resources.len(), 1);
        let resource = page.resources.iter().next().unwrap();
        assert_eq!(
            resource.url,
            "https://docs.microsoft.com/_themes/docs.theme/master/en-us/_themes/styles/main.css"
        );
        assert_eq!(
            attr_values(&page.html, "link", "href"),
            ["../../../../_themes/docs.theme/master/en-us/_themes/styles/main.css"]
        );
    }

    struct NeverRewrite;

    impl LinkClassifier for NeverRewrite {
        fn classify(&self, _link: &LinkContext<'_>) -> LinkAction {
            LinkAction::Unchanged
        }
    }

    #[test]
    fn classifier_is_pluggable() {
        let ctx = ctx().with_classifier(NeverRewrite);
        let page = rewrite_page(COMMAND_PAGE, Path::new("a/b.html"), &ctx).unwrap();
        assert_eq!(page.links_rewritten, 0);
        assert!(attr_values(&page.html, "a", "href").contains(&"Get-Process?view=powershell-6".to_string()));
    }

    #[test]
    fn page_rewrite_keeps_template_content() {
        let page = rewrite_page(
            "<html><body><template><p>tpl</p></template><main>body</main></body></html>",
            Path::new("a/b.html"),
            &ctx(),
        )
        .unwrap();
        assert!(page.html.contains("tpl"));
        assert!(page.html.contains("<p>"));
    }

    const START_PAGE: &str = r#"<html><head>
<script>boot()</script>
<link rel="stylesheet" href="/_themes/docs.theme/master/en-us/_themes/styles/main.css">
</head><body>
<div data-bi-name="header" id="headerAreaHolder">header</div>
<table class="api-search-results standalone"><tbody>
<tr><td><img src="/en-us/media/toolbars/module.svg" alt="Module"></td>
<td><a href="Microsoft.PowerShell.Core/?view=powershell-6" ms.title="Microsoft.PowerShell.Core">Microsoft.PowerShell.Core</a></td></tr>
<tr><td><a href="https://example.com/">no title</a></td></tr>
</tbody></table>
<script async defer src="/telemetry.js"></script>
<script src="/keep.js"></script>
</body></html>"#;

    #[test]
    fn start_page_rewrite() {
        let config = config();
        let page = rewrite_start_page(START_PAGE, &config.start_page_rel(), &ctx()).unwrap();

        let hrefs = attr_values(&page.html, "a", "href");
        assert_eq!(
            hrefs,
            [
                "Microsoft.PowerShell.Core/Microsoft.PowerShell.Core.html",
                "https://example.com/",
            ]
        );
        assert_eq!(
            attr_values(&page.html, "img", "src"),
            ["media/toolbars/module.svg"]
        );
        assert!(!page.html.contains("headerAreaHolder"));
        assert!(!page.html.contains("boot()"));
        assert!(!page.html.contains("telemetry.js"));
        assert!(page.html.contains("keep.js"));
        assert_eq!(
            attr_values(&page.html, "link", "href"),
            ["../_themes/docs.theme/master/en-us/_themes/styles/main.css"]
        );
        assert_eq!(page.resources.len(), 1);
    }

    #[test]
    fn start_page_without_table_is_parse_error() {
        let err = rewrite_start_page(
            "<html><body><p>loading…</p></body></html>",
            Path::new("docs.microsoft.com/en-us/index.html"),
            &ctx(),
        )
        .unwrap_err();
        assert!(matches!(err, DocsetError::Parse { .. }));
    }

    #[test]
    fn tree_rewrite_collects_resources() {
        let root = std::env::temp_dir().join(format!("poshdocset-rewrite-{}", uuid::Uuid::now_v7()));
        let module_dir = root.join("docs.microsoft.com/en-us/powershell/module/Microsoft.PowerShell.Core");
        std::fs::create_dir_all(&module_dir).unwrap();
        std::fs::write(module_dir.join("Get-Help.html"), COMMAND_PAGE).unwrap();
        std::fs::write(module_dir.join("Get-Command.html"), COMMAND_PAGE).unwrap();
        std::fs::write(module_dir.join("notes.txt"), "untouched").unwrap();

        let summary = rewrite_tree(&root, &ctx()).unwrap();
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.links_rewritten, 4);
        assert_eq!(summary.resources.len(), 1);

        let rewritten = std::fs::read_to_string(module_dir.join("Get-Help.html")).unwrap();
        assert!(rewritten.contains("Get-Process.html"));
        assert_eq!(std::fs::read_to_string(module_dir.join("notes.txt")).unwrap(), "untouched");

        let _ = std::fs::remove_dir_all(&root);
    }
}
