//! GET-to-disk primitive shared by every download in the pipeline.

use std::path::Path;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use poshdocset_shared::{DocsetError, Result, RunConfig};

/// User-Agent string for every request.
const USER_AGENT: &str = concat!("poshdocset/", env!("CARGO_PKG_VERSION"));

/// Write buffer size for binary downloads.
const CHUNK_SIZE: usize = 32 * 1024;

/// How a response body is written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Raw bytes, streamed in chunks.
    Binary,
    /// Body decoded to UTF-8 text.
    Text,
}

/// Thin wrapper over a configured HTTP client. Every call is attempted once.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Build the HTTP client from the run's HTTP settings.
    pub fn new(config: &RunConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| DocsetError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn get(&self, url: &Url) -> Result<Response> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| DocsetError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocsetError::Network(format!("{url}: HTTP {status}")));
        }
        Ok(response)
    }

    /// GET `url` and write the body to `dest`, creating parent directories
    /// and overwriting any existing file. Returns the number of bytes written.
    pub async fn fetch(&self, url: &Url, dest: &Path, mode: FetchMode) -> Result<u64> {
        debug!(%url, dest = %dest.display(), ?mode, "fetching");

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DocsetError::io(parent, e))?;
        }

        let mut response = self.get(url).await?;

        match mode {
            FetchMode::Binary => {
                let file = tokio::fs::File::create(dest)
                    .await
                    .map_err(|e| DocsetError::io(dest, e))?;
                let mut writer = tokio::io::BufWriter::with_capacity(CHUNK_SIZE, file);
                let mut written = 0u64;

                while let Some(chunk) = response
                    .chunk()
                    .await
                    .map_err(|e| DocsetError::Network(format!("{url}: body read failed: {e}")))?
                {
                    writer
                        .write_all(&chunk)
                        .await
                        .map_err(|e| DocsetError::io(dest, e))?;
                    written += chunk.len() as u64;
                }
                writer.flush().await.map_err(|e| DocsetError::io(dest, e))?;
                Ok(written)
            }
            FetchMode::Text => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| DocsetError::Network(format!("{url}: body read failed: {e}")))?;
                tokio::fs::write(dest, body.as_bytes())
                    .await
                    .map_err(|e| DocsetError::io(dest, e))?;
                Ok(body.len() as u64)
            }
        }
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let body = self
            .get(url)
            .await?
            .text()
            .await
            .map_err(|e| DocsetError::Network(format!("{url}: body read failed: {e}")))?;

        serde_json::from_str(&body).map_err(|e| DocsetError::parse(format!("{url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poshdocset_shared::{AppConfig, RunOverrides};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        let run = RunConfig::resolve(&AppConfig::default(), RunOverrides::default()).unwrap();
        Fetcher::new(&run).unwrap()
    }

    fn temp_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("poshdocset-fetch-{}", uuid::Uuid::now_v7()))
    }

    #[tokio::test]
    async fn binary_fetch_writes_exact_bytes() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        Mock::given(method("GET"))
            .and(path("/media/module.svg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let dest = dir.join("nested").join("module.svg");
        let url = Url::parse(&format!("{}/media/module.svg", server.uri())).unwrap();

        let written = fetcher().fetch(&url, &dest, FetchMode::Binary).await.unwrap();
        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn text_fetch_overwrites_existing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>é</html>"))
            .mount(&server)
            .await;

        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("page.html");
        std::fs::write(&dest, "stale content that is longer").unwrap();

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        fetcher().fetch(&url, &dest, FetchMode::Text).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "<html>é</html>");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn non_success_status_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = fetcher()
            .fetch(&url, &dir.join("missing.html"), FetchMode::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, DocsetError::Network(_)));
        assert!(err.to_string().contains("404"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn get_json_reports_parse_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/toc.json", server.uri())).unwrap();
        let err = fetcher()
            .get_json::<serde_json::Value>(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, DocsetError::Parse { .. }));
    }
}
