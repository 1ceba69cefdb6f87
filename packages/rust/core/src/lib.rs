//! Build pipeline for the PowerShell docset.
//!
//! This crate ties the crawler, rewriter, and search index together into the
//! staged build driven by [`pipeline::build_docset`].

pub mod enricher;
pub mod indexer;
pub mod packager;
pub mod pipeline;
pub mod tree;

#[cfg(test)]
mod test_support;

pub use enricher::{EnrichSummary, enrich};
pub use indexer::{
    IndexCandidate, IndexSummary, IndexWriter, build_index, index_candidates, insert_candidates,
};
pub use packager::{ArchiveMeta, info_plist, lay_out_docset, write_archive};
pub use pipeline::{
    BuildResult, CONTENT_TOC_FILE, ProgressReporter, SilentProgress, build_docset,
    build_docset_with,
};
