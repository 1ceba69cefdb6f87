//! Helpers shared by the stage tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use url::Url;
use uuid::Uuid;

use poshdocset_crawler::{RenderFailure, RenderSession, SessionFactory};
use poshdocset_shared::{AppConfig, Result, RunConfig, RunOverrides};

pub const START_PAGE: &str = r#"<!DOCTYPE html>
<html><head>
<link rel="stylesheet" href="/_themes/docs.theme/master/en-us/_themes/styles/main.css">
<script src="/_themes/site.js"></script>
</head><body>
<div data-bi-name="header" id="headerAreaHolder">Site header</div>
<table class="api-search-results standalone"><tbody>
<tr><td><img src="/en-us/media/toolbars/module.svg" alt="Module">
<a href="Microsoft.PowerShell.Core/?view=powershell-6" ms.title="Microsoft.PowerShell.Core">Microsoft.PowerShell.Core</a></td></tr>
</tbody></table>
<script async defer src="/_themes/late.js"></script>
</body></html>"#;

pub fn temp_root(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("poshdocset_{label}_{}", Uuid::now_v7()))
}

/// A run pointed at a mock server, building under `output`.
pub fn run_config(server_uri: &str, output: &Path, static_dir: &Path) -> RunConfig {
    let mut app = AppConfig::default();
    app.site.content_root = format!("{server_uri}/en-us/powershell/module/");
    app.renderer.retry_pause_ms = 0;
    RunConfig::resolve(
        &app,
        RunOverrides {
            output_dir: Some(output.to_path_buf()),
            static_dir: Some(static_dir.to_path_buf()),
            ..RunOverrides::default()
        },
    )
    .expect("resolve test config")
}

/// Renders every URL as the same document and records what was asked for.
#[derive(Clone)]
pub struct StaticFactory {
    html: String,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl StaticFactory {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            requested: Arc::default(),
        }
    }
}

pub struct StaticSession {
    factory: StaticFactory,
}

impl RenderSession for StaticSession {
    async fn load(&mut self, url: &Url) -> std::result::Result<String, RenderFailure> {
        self.factory.requested.lock().unwrap().push(url.to_string());
        Ok(self.factory.html.clone())
    }

    async fn close(&mut self) {}
}

impl SessionFactory for StaticFactory {
    type Session = StaticSession;

    async fn acquire(&self) -> Result<StaticSession> {
        Ok(StaticSession {
            factory: self.clone(),
        })
    }
}
