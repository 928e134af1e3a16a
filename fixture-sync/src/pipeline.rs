//! The run driver. Owns every piece of per-run state and threads header sets through
//! identity dedup, classification, routing and the intermediate store, then finalizes pages.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::{
    classify::{Classification, ClassifierAdapter},
    config::{OutputConfig, PipelineConfig},
    dedup::{Admission, CorpusDeduplicator},
    detector::Detector,
    headers::HeaderSet,
    identity::build_key,
    normalize::JsonNormalizer,
    report::{Phase, RunReporter, Stopwatch},
    result::Entry,
    shard::ShardPath,
    sources::{discover_sources, FileSource, SourceAdapter, SourceFormat},
    store::IntermediateStore,
    utils::files::FileSelection,
    writer::{is_page_file, PageWriter, PurgeScope},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    Duplicate,
    SemanticDuplicate,
    DetectionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stored(ShardPath),
    Skipped(SkipReason),
}

pub struct Pipeline {
    deduplicator: CorpusDeduplicator,
    classifier: ClassifierAdapter,
    store: IntermediateStore,
    writer: PageWriter,
    reporter: RunReporter,
}

impl Pipeline {
    pub fn new(
        output: &OutputConfig,
        detector: Box<dyn Detector>,
        normalizer: Box<dyn JsonNormalizer>,
    ) -> Self {
        Pipeline {
            deduplicator: CorpusDeduplicator::new(),
            classifier: ClassifierAdapter::new(detector),
            store: IntermediateStore::new(&output.workdir),
            writer: PageWriter::new(&output.target, output.page_size, normalizer),
            reporter: RunReporter::new(),
        }
    }

    /// Limits which existing pages the finalization may remove.
    pub fn with_purge_scope(mut self, scope: PurgeScope) -> Self {
        self.writer = self.writer.with_purge_scope(scope);
        self
    }

    /// Makes the work directory and target root usable. A fresh run starts from an empty work
    /// directory; a resumed one seeds both dedup maps from the intermediates already there.
    pub fn prepare(&mut self, resume: bool) -> Result<()> {
        if resume {
            self.seed_from_intermediates();
        } else {
            self.store
                .reset()
                .context("Failed to prepare the work directory")?;
        }

        fs::create_dir_all(self.writer.target()).with_context(|| {
            format!(
                "Failed to create target directory {}",
                self.writer.target().display()
            )
        })?;
        Ok(())
    }

    fn seed_from_intermediates(&mut self) {
        let mut seeded = 0;
        for (shard, path) in self.store.list_shards() {
            let entries = match IntermediateStore::load_file(&path) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("{err}, not seeding from shard {shard}");
                    continue;
                }
            };
            let origin = path.display().to_string();
            for entry in entries {
                self.classifier.remember(&entry.result);
                if self.deduplicator.seed(build_key(&entry.headers), &origin) {
                    seeded += 1;
                }
            }
        }
        info!("resuming with {seeded} entries from {}", self.store.root().display());
    }

    /// Drains every source in order. Sources that are not ready or fail to open are skipped.
    pub fn ingest(&mut self, sources: Vec<Box<dyn SourceAdapter>>) {
        let total = sources.len();
        let width = sources
            .iter()
            .map(|source| source.name().len())
            .max()
            .unwrap_or_default();

        for (index, mut source) in sources.into_iter().enumerate() {
            let digits = total.to_string().len();
            let label = format!("[{:>digits$}/{total}]", index + 1);
            self.ingest_source(source.as_mut(), &label, width);
        }
    }

    pub fn ingest_source(&mut self, source: &mut dyn SourceAdapter, label: &str, width: usize) {
        if !source.is_ready(label) {
            return;
        }

        let stream = match source.headers(label, width) {
            Ok(stream) => stream,
            Err(err) => {
                self.reporter.errors += 1;
                warn!("{label} {err}");
                return;
            }
        };

        let origin = source.name().to_string();
        let (mut seen, mut stored) = (0u64, 0u64);
        for item in stream {
            let headers = match item {
                Ok(headers) => headers,
                Err(err) => {
                    self.reporter.errors += 1;
                    warn!("{label} {err}");
                    continue;
                }
            };
            seen += 1;
            if let Outcome::Stored(_) = self.process(&origin, headers) {
                stored += 1;
            }
        }
        info!("{label} {origin:<width$} {seen} read, {stored} stored");
    }

    /// One header set through the whole ingest path.
    pub fn process(&mut self, origin: &str, headers: HeaderSet) -> Outcome {
        self.reporter.processed += 1;

        if headers.is_empty() {
            self.reporter.skipped += 1;
            debug!(origin, "empty header set skipped");
            return Outcome::Skipped(SkipReason::Empty);
        }

        let watch = Stopwatch::start();
        for (canonical, prefixed) in headers.conflicting_variants() {
            warn!(
                origin,
                user_agent = headers.user_agent().unwrap_or_default(),
                "both {canonical} and {prefixed} are present"
            );
        }
        let admission = self
            .deduplicator
            .admit(build_key(&headers), origin, &mut self.reporter);
        self.reporter.record(Phase::Check, watch);

        if let Admission::Duplicate { .. } = admission {
            return Outcome::Skipped(SkipReason::Duplicate);
        }

        match self.classifier.classify(&headers, &mut self.reporter) {
            Classification::Accepted(result) => {
                let shard = ShardPath::route(&result);
                debug!(origin, %shard, "entry stored");
                self.store
                    .append(&shard, Entry { headers, result }, &mut self.reporter);
                Outcome::Stored(shard)
            }
            Classification::Duplicate(_) => Outcome::Skipped(SkipReason::SemanticDuplicate),
            Classification::Failed(_) => Outcome::Skipped(SkipReason::DetectionFailed),
        }
    }

    pub fn finalize(&mut self) {
        finalize_store(&self.store, &self.writer, &mut self.reporter);
    }

    pub fn reporter(&self) -> &RunReporter {
        &self.reporter
    }

    pub fn into_reporter(self) -> RunReporter {
        self.reporter
    }
}

/// Writes pages re-chunked from every intermediate. With [`PurgeScope::All`] every existing page
/// is removed first; otherwise only the shards being rewritten lose their old pages.
fn finalize_store(store: &IntermediateStore, writer: &PageWriter, reporter: &mut RunReporter) {
    if writer.purge_scope() == PurgeScope::All {
        let removed = writer.purge(reporter);
        if removed > 0 {
            info!(
                "removed {removed} existing pages from {}",
                writer.target().display()
            );
        }
    }

    let shards = store.list_shards();
    info!("finalizing {} shards", shards.len());
    for (shard, path) in shards {
        writer.finalize_shard(&shard, &path, reporter);
    }
}

/// The fixtures already persisted under `target`, read back as JSON sources.
pub fn existing_corpus(target: &Path) -> Result<Vec<FileSource>> {
    if !target.is_dir() {
        return Ok(Vec::new());
    }
    let sources = FileSelection::new(target.to_path_buf(), vec![], vec![])
        .filter(|entry| entry.file_type().is_file() && is_page_file(entry.path()))
        .try_into_iter()?
        .map(|entry| FileSource::new(entry.into_path(), SourceFormat::Json))
        .collect();
    Ok(sources)
}

/// Reads the existing corpus and every source, then writes the final pages.
pub fn run(
    config: &PipelineConfig,
    detector: Box<dyn Detector>,
    normalizer: Box<dyn JsonNormalizer>,
) -> Result<RunReporter> {
    config.validate()?;

    let mut sources: Vec<Box<dyn SourceAdapter>> = Vec::new();
    if !config.skip_existing {
        let existing = existing_corpus(&config.output.target)?;
        info!("{} existing fixture pages found", existing.len());
        for source in existing {
            sources.push(Box::new(source));
        }
    }
    let discovered = discover_sources(config.source_selection())?;
    info!(
        "{} sources found in {}",
        discovered.len(),
        config.resources.display()
    );
    for source in discovered {
        sources.push(Box::new(source));
    }

    // Without the existing corpus in the intermediates, a full purge would drop every shard this
    // run never touched.
    let scope = if config.skip_existing {
        PurgeScope::RewrittenShards
    } else {
        PurgeScope::All
    };
    let mut pipeline =
        Pipeline::new(&config.output, detector, normalizer).with_purge_scope(scope);
    pipeline.prepare(config.resume)?;
    pipeline.ingest(sources);
    pipeline.finalize();

    Ok(pipeline.into_reporter())
}

/// Rewrites the pages from the intermediates of an earlier run without reading any source. Shards
/// without an intermediate keep their pages.
pub fn finalize_only(
    output: &OutputConfig,
    normalizer: Box<dyn JsonNormalizer>,
) -> Result<RunReporter> {
    output.validate()?;
    if !output.workdir.is_dir() {
        bail!(
            "Work directory {} does not exist, nothing to finalize",
            output.workdir.display()
        );
    }

    let store = IntermediateStore::new(&output.workdir);
    let writer = PageWriter::new(&output.target, output.page_size, normalizer)
        .with_purge_scope(PurgeScope::RewrittenShards);
    let mut reporter = RunReporter::new();
    finalize_store(&store, &writer, &mut reporter);
    Ok(reporter)
}
