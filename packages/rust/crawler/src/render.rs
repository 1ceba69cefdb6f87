//! Headless page rendering for JavaScript-driven pages.
//!
//! The start page only lists modules after client-side scripts have run, so
//! it goes through a browser session instead of the plain [`Fetcher`].
//! [`PageRenderer`] wraps any [`SessionFactory`] with a bounded retry: a
//! dropped connection on the first attempt discards the session, pauses,
//! opens a fresh one, and tries once more.
//!
//! [`Fetcher`]: crate::fetcher::Fetcher

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use poshdocset_shared::{DocsetError, Result, RunConfig};

// ---------------------------------------------------------------------------
// Session seam
// ---------------------------------------------------------------------------

/// Why a single page load failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderFailure {
    /// The connection to the browser or the site dropped; worth one retry.
    Transient(String),
    /// Anything else.
    Fatal(String),
}

impl RenderFailure {
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Fatal(m) => m,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A live browser able to load pages.
#[allow(async_fn_in_trait)]
pub trait RenderSession {
    /// Navigate to `url` and return the fully rendered document.
    async fn load(&mut self, url: &Url) -> std::result::Result<String, RenderFailure>;

    /// Release the browser. Errors are logged, not returned.
    async fn close(&mut self);
}

/// Opens new [`RenderSession`]s.
#[allow(async_fn_in_trait)]
pub trait SessionFactory {
    type Session: RenderSession;

    async fn acquire(&self) -> Result<Self::Session>;
}

// ---------------------------------------------------------------------------
// Retry state machine
// ---------------------------------------------------------------------------

/// States of one render call.
#[derive(Debug)]
enum RenderAttempt {
    Fresh,
    FailedOnce(String),
    Retrying,
    Success(String),
    Fatal(DocsetError),
}

/// A rendered document plus how much effort it took.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub html: String,
    pub attempts: u32,
    pub session_resets: u32,
}

/// Renders pages through a [`SessionFactory`] with one transient retry.
pub struct PageRenderer<F: SessionFactory> {
    factory: F,
    retry_pause: Duration,
}

impl<F: SessionFactory> PageRenderer<F> {
    pub fn new(factory: F, retry_pause: Duration) -> Self {
        Self {
            factory,
            retry_pause,
        }
    }

    /// Render `url`, opening and closing a session around the call.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn render(&self, url: &Url) -> Result<Rendered> {
        let mut session = self.factory.acquire().await?;
        let mut state = RenderAttempt::Fresh;
        let mut attempts = 0;
        let mut session_resets = 0;

        loop {
            state = match state {
                RenderAttempt::Fresh => {
                    attempts += 1;
                    match session.load(url).await {
                        Ok(html) => RenderAttempt::Success(html),
                        Err(RenderFailure::Transient(message)) => {
                            RenderAttempt::FailedOnce(message)
                        }
                        Err(RenderFailure::Fatal(message)) => {
                            RenderAttempt::Fatal(render_error(url, message, false))
                        }
                    }
                }
                RenderAttempt::FailedOnce(message) => {
                    warn!(error = %message, pause_ms = self.retry_pause.as_millis(), "render connection dropped, restarting session");
                    session.close().await;
                    tokio::time::sleep(self.retry_pause).await;
                    session = self.factory.acquire().await?;
                    session_resets += 1;
                    RenderAttempt::Retrying
                }
                RenderAttempt::Retrying => {
                    attempts += 1;
                    match session.load(url).await {
                        Ok(html) => RenderAttempt::Success(html),
                        Err(failure) => RenderAttempt::Fatal(render_error(
                            url,
                            failure.message().to_string(),
                            failure.is_transient(),
                        )),
                    }
                }
                RenderAttempt::Success(html) => {
                    session.close().await;
                    info!(attempts, bytes = html.len(), "page rendered");
                    return Ok(Rendered {
                        html,
                        attempts,
                        session_resets,
                    });
                }
                RenderAttempt::Fatal(err) => {
                    session.close().await;
                    return Err(err);
                }
            };
        }
    }
}

fn render_error(url: &Url, message: String, transient: bool) -> DocsetError {
    DocsetError::Render {
        url: url.to_string(),
        message,
        transient,
    }
}

// ---------------------------------------------------------------------------
// Chrome implementation
// ---------------------------------------------------------------------------

/// Launches headless Chrome/Chromium through the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromeSessionFactory {
    executable: Option<PathBuf>,
    timeout: Duration,
}

impl ChromeSessionFactory {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            executable: config.browser.clone(),
            timeout: config.render_timeout,
        }
    }
}

impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    async fn acquire(&self) -> Result<ChromeSession> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(self.timeout)
            .arg("--no-first-run")
            .arg("--disable-extensions");
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        let browser_config = builder
            .build()
            .map_err(|e| DocsetError::config(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            DocsetError::Render {
                url: String::new(),
                message: format!("failed to launch browser: {e}"),
                transient: false,
            }
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        debug!("browser session started");
        Ok(ChromeSession {
            browser,
            handler: handler_task,
            timeout: self.timeout,
        })
    }
}

/// One running browser process.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    timeout: Duration,
}

impl ChromeSession {
    async fn load_page(&mut self, url: &Url) -> std::result::Result<String, CdpError> {
        let page = self.browser.new_page(url.as_str()).await?;
        page.wait_for_navigation().await?;
        let html = page.content().await?;
        if let Err(e) = page.close().await {
            debug!(error = %e, "failed to close page");
        }
        Ok(html)
    }
}

impl RenderSession for ChromeSession {
    async fn load(&mut self, url: &Url) -> std::result::Result<String, RenderFailure> {
        match tokio::time::timeout(self.timeout, self.load_page(url)).await {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(e)) => Err(classify(e)),
            Err(_) => Err(RenderFailure::Transient(format!(
                "navigation timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "browser wait failed");
        }
        self.handler.abort();
    }
}

/// Connection-level CDP failures are retryable; protocol errors are not.
fn classify(error: CdpError) -> RenderFailure {
    match error {
        CdpError::Ws(_) | CdpError::Io(_) | CdpError::NoResponse | CdpError::Timeout => {
            RenderFailure::Transient(error.to_string())
        }
        other => RenderFailure::Fatal(other.to_string()),
    }
}
