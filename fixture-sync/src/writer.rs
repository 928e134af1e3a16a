//! Re-chunks intermediate shards into fixed-size, normalized page files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::{
    normalize::JsonNormalizer,
    report::{Phase, RunReporter, Stopwatch},
    result::Entry,
    shard::ShardPath,
    store::IntermediateStore,
};

pub const DEFAULT_PAGE_SIZE: usize = 100;
const PAGE_DIGITS: usize = 7;

/// Which existing pages a finalization may remove.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PurgeScope {
    /// Every page under the target root, before any shard is written. Only safe when the whole
    /// existing corpus was read back into the intermediates.
    #[default]
    All,
    /// Only the pages of a shard that is about to be rewritten from a readable intermediate.
    RewrittenShards,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShardOutcome {
    pub pages_written: usize,
    pub pages_failed: usize,
}

/// `0000000.json`, `0000001.json`, ...
pub fn page_file_name(index: usize) -> String {
    format!("{index:0width$}.json", width = PAGE_DIGITS)
}

pub fn is_page_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(".json"))
        .is_some_and(|stem| stem.len() == PAGE_DIGITS && stem.bytes().all(|b| b.is_ascii_digit()))
}

/// Splits entries into pages of `page_size`; only the last page may be shorter.
pub fn chunk_pages(entries: &[Entry], page_size: usize) -> Vec<&[Entry]> {
    entries.chunks(page_size.max(1)).collect()
}

pub struct PageWriter {
    target: PathBuf,
    page_size: usize,
    normalizer: Box<dyn JsonNormalizer>,
    scope: PurgeScope,
}

impl PageWriter {
    pub fn new(
        target: impl Into<PathBuf>,
        page_size: usize,
        normalizer: Box<dyn JsonNormalizer>,
    ) -> Self {
        PageWriter {
            target: target.into(),
            page_size: page_size.max(1),
            normalizer,
            scope: PurgeScope::default(),
        }
    }

    pub fn with_purge_scope(mut self, scope: PurgeScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn purge_scope(&self) -> PurgeScope {
        self.scope
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn shard_dir(&self, shard: &ShardPath) -> PathBuf {
        self.target.join(shard.to_path_buf())
    }

    /// Removes previously written page files below the target root. Other files are left alone.
    pub fn purge(&self, reporter: &mut RunReporter) -> usize {
        remove_pages(WalkDir::new(&self.target), reporter)
    }

    /// Removes the page files of one shard, leaving every other shard untouched.
    pub fn purge_shard(&self, shard: &ShardPath, reporter: &mut RunReporter) -> usize {
        remove_pages(WalkDir::new(self.shard_dir(shard)).max_depth(1), reporter)
    }

    /// Reads one intermediate shard file and writes its pages. Any failure is confined to the
    /// page (or, for an unreadable intermediate, the shard) it happened in.
    pub fn finalize_shard(
        &self,
        shard: &ShardPath,
        intermediate: &Path,
        reporter: &mut RunReporter,
    ) -> ShardOutcome {
        let mut outcome = ShardOutcome::default();

        let watch = Stopwatch::start();
        let loaded = IntermediateStore::load_file(intermediate);
        reporter.record(Phase::Read, watch);

        let entries = match loaded {
            Ok(entries) => entries,
            Err(err) => {
                reporter.errors += 1;
                warn!("{err}, skipping shard {shard}");
                return outcome;
            }
        };

        if self.scope == PurgeScope::RewrittenShards {
            self.purge_shard(shard, reporter);
        }

        let dir = self.shard_dir(shard);
        for (index, page) in chunk_pages(&entries, self.page_size).into_iter().enumerate() {
            if self.write_page(&dir, index, page, reporter) {
                outcome.pages_written += 1;
            } else {
                outcome.pages_failed += 1;
            }
        }

        info!(
            "finalized {shard}: {} entries, {} pages written, {} failed",
            entries.len(),
            outcome.pages_written,
            outcome.pages_failed
        );
        outcome
    }

    fn write_page(
        &self,
        dir: &Path,
        index: usize,
        page: &[Entry],
        reporter: &mut RunReporter,
    ) -> bool {
        let path = dir.join(page_file_name(index));

        let watch = Stopwatch::start();
        let normalized = self.normalizer.normalize(page);
        reporter.record(Phase::Check, watch);

        let text = match normalized {
            Ok(text) => text,
            Err(err) => {
                reporter.errors += 1;
                warn!("could not normalize {}: {err}", path.display());
                return false;
            }
        };

        let watch = Stopwatch::start();
        let written = fs::create_dir_all(dir).and_then(|()| fs::write(&path, text));
        reporter.record(Phase::Write, watch);

        match written {
            Ok(()) => {
                reporter.written += page.len() as u64;
                reporter.pages += 1;
                true
            }
            Err(err) => {
                reporter.errors += 1;
                warn!("failed to write {}: {err}", path.display());
                false
            }
        }
    }
}

fn remove_pages(walk: WalkDir, reporter: &mut RunReporter) -> usize {
    let mut removed = 0;
    for entry in walk
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_page_file(e.path()))
    {
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(err) => {
                reporter.errors += 1;
                warn!("failed to remove {}: {err}", entry.path().display());
            }
        }
    }
    removed
}
