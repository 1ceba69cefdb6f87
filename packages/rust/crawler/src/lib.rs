//! Downloading side of the docset build.
//!
//! This crate provides:
//! - [`fetcher`]: GET-to-disk primitive with binary and text modes
//! - [`engine`]: TOC-driven crawler producing the [`ContentToc`]
//! - [`render`]: headless browser rendering with a bounded retry
//!
//! [`ContentToc`]: poshdocset_shared::ContentToc

pub mod engine;
pub mod fetcher;
pub mod render;

pub use engine::{CrawlResult, TocCrawler};
pub use fetcher::{FetchMode, Fetcher};
pub use render::{
    ChromeSession, ChromeSessionFactory, PageRenderer, RenderFailure, RenderSession, Rendered,
    SessionFactory,
};
