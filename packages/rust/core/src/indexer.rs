//! Search index construction from the crawled content map.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use poshdocset_shared::{ContentToc, EntryType, Result};
use poshdocset_storage::{InsertOutcome, SearchIndex};

/// One row the indexer will try to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCandidate {
    pub name: String,
    pub entry_type: EntryType,
    pub path: String,
}

/// Aggregated insert outcomes for one index build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub inserted: usize,
    pub skipped: usize,
    /// `(name, reason)` for every insert that failed.
    pub failed: Vec<(String, String)>,
}

impl IndexSummary {
    fn record(&mut self, name: &str, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Inserted => self.inserted += 1,
            InsertOutcome::SkippedDuplicate => {
                debug!(name, "index entry already present, skipped");
                self.skipped += 1;
            }
            InsertOutcome::Failed(reason) => {
                warn!(name, %reason, "index insert failed");
                self.failed.push((name.to_string(), reason));
            }
        }
    }
}

/// Destination of index rows.
#[allow(async_fn_in_trait)]
pub trait IndexWriter {
    async fn insert_unique(&self, name: &str, entry_type: EntryType, path: &str) -> InsertOutcome;
}

impl IndexWriter for SearchIndex {
    async fn insert_unique(&self, name: &str, entry_type: EntryType, path: &str) -> InsertOutcome {
        SearchIndex::insert_unique(self, name, entry_type, path).await
    }
}

/// Rows in insertion order: each module, then its commands. A command named
/// exactly like its module is left out.
pub fn index_candidates(toc: &ContentToc) -> Vec<IndexCandidate> {
    let mut candidates = Vec::with_capacity(toc.len() + toc.command_count());

    for module in toc.modules() {
        candidates.push(IndexCandidate {
            name: module.name.clone(),
            entry_type: EntryType::Module,
            path: module.index.clone(),
        });

        for command in &module.commands {
            if command.name == module.name {
                continue;
            }
            candidates.push(IndexCandidate {
                name: command.name.clone(),
                entry_type: EntryType::Cmdlet,
                path: command.path.clone(),
            });
        }
    }

    candidates
}

/// Build a fresh index at `db_path`, replacing any existing file.
///
/// Individual insert failures are counted, never returned.
#[instrument(skip_all, fields(db = %db_path.display(), modules = toc.len()))]
pub async fn build_index(toc: &ContentToc, db_path: &Path) -> Result<IndexSummary> {
    let index = SearchIndex::create(db_path).await?;

    index.begin().await?;
    let summary = insert_candidates(&index, index_candidates(toc)).await;
    index.commit().await?;

    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        "search index built"
    );
    Ok(summary)
}

/// Insert every candidate in order. A failed insert is recorded and the
/// remaining candidates still go in.
pub async fn insert_candidates<W: IndexWriter>(
    writer: &W,
    candidates: Vec<IndexCandidate>,
) -> IndexSummary {
    let mut summary = IndexSummary::default();
    for candidate in candidates {
        let outcome = writer
            .insert_unique(&candidate.name, candidate.entry_type, &candidate.path)
            .await;
        summary.record(&candidate.name, outcome);
    }
    summary
}
