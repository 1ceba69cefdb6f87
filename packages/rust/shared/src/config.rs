//! Application configuration for poshdocset.
//!
//! User config lives at `~/.poshdocset/poshdocset.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DocsetError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "poshdocset.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".poshdocset";

/// Content versions the documentation site publishes.
pub const SUPPORTED_VERSIONS: &[&str] = &["3.0", "4.0", "5.0", "5.1", "6"];

// ---------------------------------------------------------------------------
// Config structs (matching poshdocset.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Documentation site layout.
    #[serde(default)]
    pub site: SiteConfig,

    /// Headless browser settings for the start page.
    #[serde(default)]
    pub renderer: RendererConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Content version to build.
    #[serde(default = "default_version")]
    pub version: String,

    /// Directory receiving the build folder and the `versions/` archives.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Docset bundle name (`<name>.docset`).
    #[serde(default = "default_docset_name")]
    pub docset_name: String,

    /// Final archive extension.
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,

    /// Directory holding `Info.plist`, `DASH_LICENSE`, and the icons.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            output_dir: default_output_dir(),
            docset_name: default_docset_name(),
            archive_extension: default_archive_extension(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_version() -> String {
    "6".into()
}
fn default_output_dir() -> String {
    ".".into()
}
fn default_docset_name() -> String {
    "Powershell".into()
}
fn default_archive_extension() -> String {
    "tgz".into()
}
fn default_static_dir() -> String {
    "static".into()
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Root URL of the module reference.
    #[serde(default = "default_content_root")]
    pub content_root: String,

    /// TOC document path under the content root.
    #[serde(default = "default_toc_path")]
    pub toc_path: String,

    /// Query key/value prefix the version is appended to.
    #[serde(default = "default_version_query_prefix")]
    pub version_query_prefix: String,

    /// Path prefix identifying theme stylesheets.
    #[serde(default = "default_theme_prefix")]
    pub theme_prefix: String,

    /// Locale segment of the start page and module icon.
    #[serde(default = "default_locale")]
    pub locale: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            toc_path: default_toc_path(),
            version_query_prefix: default_version_query_prefix(),
            theme_prefix: default_theme_prefix(),
            locale: default_locale(),
        }
    }
}

fn default_content_root() -> String {
    "https://docs.microsoft.com/en-us/powershell/module/".into()
}
fn default_toc_path() -> String {
    "psdocs/toc.json".into()
}
fn default_version_query_prefix() -> String {
    "view=powershell-".into()
}
fn default_theme_prefix() -> String {
    "_themes/docs.theme/master/en-us/_themes".into()
}
fn default_locale() -> String {
    "en-us".into()
}

/// `[renderer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Chrome/Chromium executable; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    /// Pause between discarding a broken session and retrying.
    #[serde(default = "default_retry_pause_ms")]
    pub retry_pause_ms: u64,

    /// Navigation timeout.
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            executable: None,
            retry_pause_ms: default_retry_pause_ms(),
            timeout_secs: default_render_timeout(),
        }
    }
}

fn default_retry_pause_ms() -> u64 {
    2000
}
fn default_render_timeout() -> u64 {
    60
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// CLI-level overrides applied on top of [`AppConfig`].
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub version: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub browser: Option<PathBuf>,
    pub temporary: bool,
    pub local: bool,
}

/// Immutable parameters of one build, constructed once and passed by
/// reference to every stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Content version, e.g. `6`.
    pub version: String,
    /// Query string selecting the version, e.g. `view=powershell-6`.
    pub version_param: String,
    /// Prefix of `version_param` without the version, used by link patterns.
    pub version_query_prefix: String,
    pub content_root: Url,
    pub toc_url: Url,
    pub start_page_url: Url,
    pub theme_prefix: String,
    pub locale: String,
    pub docset_name: String,
    pub archive_extension: String,
    pub output_dir: PathBuf,
    /// Root of the checkpoint directories.
    pub build_dir: PathBuf,
    pub static_dir: PathBuf,
    pub temporary: bool,
    pub local: bool,
    pub browser: Option<PathBuf>,
    pub render_retry_pause: Duration,
    pub render_timeout: Duration,
    pub http_timeout: Duration,
    pub max_redirects: usize,
}

impl RunConfig {
    /// Merge the config file with CLI overrides and derive every site URL.
    pub fn resolve(app: &AppConfig, overrides: RunOverrides) -> Result<Self> {
        let version = overrides
            .version
            .unwrap_or_else(|| app.defaults.version.clone());
        if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
            return Err(DocsetError::validation(format!(
                "version {version} is not one of {}",
                SUPPORTED_VERSIONS.join(", ")
            )));
        }
        if overrides.local && overrides.temporary {
            return Err(DocsetError::validation(
                "--local reuses an existing build folder and cannot be combined with --temporary",
            ));
        }

        let mut root = app.site.content_root.trim().to_string();
        if !root.ends_with('/') {
            root.push('/');
        }
        let content_root = Url::parse(&root)
            .map_err(|e| DocsetError::config(format!("invalid content root {root}: {e}")))?;
        if content_root.host_str().is_none() {
            return Err(DocsetError::config(format!(
                "content root {root} has no host"
            )));
        }

        let version_param = format!("{}{version}", app.site.version_query_prefix);
        let mut toc_url = content_root
            .join(&app.site.toc_path)
            .map_err(|e| DocsetError::config(format!("invalid TOC path: {e}")))?;
        toc_url.set_query(Some(&version_param));
        let mut start_page_url = content_root.clone();
        start_page_url.set_query(Some(&version_param));

        let output_dir = overrides
            .output_dir
            .unwrap_or_else(|| PathBuf::from(&app.defaults.output_dir));
        let build_dir = if overrides.temporary {
            std::env::temp_dir().join(format!("poshdocset-{}", uuid::Uuid::now_v7()))
        } else {
            output_dir.join(format!("_build_{version}"))
        };

        Ok(Self {
            version_query_prefix: app.site.version_query_prefix.clone(),
            version_param,
            version,
            toc_url,
            start_page_url,
            content_root,
            theme_prefix: app.site.theme_prefix.trim_matches('/').to_string(),
            locale: app.site.locale.clone(),
            docset_name: app.defaults.docset_name.clone(),
            archive_extension: app.defaults.archive_extension.trim_start_matches('.').to_string(),
            output_dir,
            build_dir,
            static_dir: overrides
                .static_dir
                .unwrap_or_else(|| PathBuf::from(&app.defaults.static_dir)),
            temporary: overrides.temporary,
            local: overrides.local,
            browser: overrides
                .browser
                .or_else(|| app.renderer.executable.as_ref().map(PathBuf::from)),
            render_retry_pause: Duration::from_millis(app.renderer.retry_pause_ms),
            render_timeout: Duration::from_secs(app.renderer.timeout_secs),
            http_timeout: Duration::from_secs(app.http.timeout_secs),
            max_redirects: app.http.max_redirects,
        })
    }

    /// Host of the content root, used as the top staging directory.
    pub fn host(&self) -> &str {
        self.content_root.host_str().unwrap_or_default()
    }

    /// Scheme, host, and port of the content root without a trailing slash.
    pub fn origin(&self) -> String {
        self.content_root.origin().ascii_serialization()
    }

    /// `<host>/<content root path segments>` relative to a staging root.
    pub fn content_dir(&self) -> PathBuf {
        let mut dir = PathBuf::from(self.host());
        if let Some(segments) = self.content_root.path_segments() {
            for segment in segments.filter(|s| !s.is_empty()) {
                dir.push(segment);
            }
        }
        dir
    }

    /// Replace the query of `url` with the version parameter.
    pub fn versioned(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.set_query(Some(&self.version_param));
        url
    }

    /// Absolute URL of a site-relative path such as a theme stylesheet.
    pub fn site_url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}", self.origin(), path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| DocsetError::parse(format!("invalid URL {raw}: {e}")))
    }

    /// Start page location relative to a staging root.
    pub fn start_page_rel(&self) -> PathBuf {
        PathBuf::from(self.host()).join(&self.locale).join("index.html")
    }

    fn module_icon_site_path(&self) -> String {
        format!("{}/media/toolbars/module.svg", self.locale)
    }

    /// Module icon location relative to a staging root.
    pub fn module_icon_rel(&self) -> PathBuf {
        PathBuf::from(self.host()).join(self.module_icon_site_path())
    }

    /// Remote URL of the module icon.
    pub fn module_icon_url(&self) -> Result<Url> {
        self.site_url(&self.module_icon_site_path())
    }

    pub fn downloaded_dir(&self) -> PathBuf {
        self.build_dir.join("_1_downloaded")
    }

    pub fn rewritten_dir(&self) -> PathBuf {
        self.build_dir.join("_2_rewritten")
    }

    pub fn enriched_dir(&self) -> PathBuf {
        self.build_dir.join("_3_enriched")
    }

    pub fn packaged_dir(&self) -> PathBuf {
        self.build_dir.join("_4_packaged")
    }

    /// `<packaged>/<Name>.docset`.
    pub fn docset_dir(&self) -> PathBuf {
        self.packaged_dir()
            .join(format!("{}.docset", self.docset_name))
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.docset_dir().join("Contents").join("Resources")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.resources_dir().join("Documents")
    }

    pub fn index_db_path(&self) -> PathBuf {
        self.resources_dir().join("docSet.dsidx")
    }

    /// `<output>/versions/<version>`.
    pub fn archive_dir(&self) -> PathBuf {
        self.output_dir.join("versions").join(&self.version)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.poshdocset/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocsetError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.poshdocset/poshdocset.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsetError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocsetError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocsetError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DocsetError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocsetError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
