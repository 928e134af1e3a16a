use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use crate::{
    detector::{devices::DeviceRegistry, rules::RuleDetector, rules::RuleLoader, Detector},
    normalize::{JsonNormalizer, SchemaNormalizer},
    utils::files::FileSelection,
    writer::DEFAULT_PAGE_SIZE,
};

#[derive(clap::Args, Clone, Debug)]
pub struct OutputArgs {
    /// Root of the fixture tree that pages are written to
    #[arg(long, env = "FIXTURE_SYNC_TARGET", default_value = "tests/data")]
    pub target: PathBuf,

    /// Directory holding the per-shard intermediate files between runs
    #[arg(long, env = "FIXTURE_SYNC_WORKDIR", default_value = ".fixture-sync/work")]
    pub workdir: PathBuf,

    /// JSON schema the pages are validated and ordered against. The bundled fixture schema is
    /// used when omitted
    #[arg(long, env = "FIXTURE_SYNC_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Number of entries per page file
    #[arg(long, env = "FIXTURE_SYNC_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

#[derive(clap::Args, Clone, Debug)]
pub struct RewriteArgs {
    /// Directory containing the harvested sources (json, yaml, txt and log files)
    #[arg(long, env = "FIXTURE_SYNC_RESOURCES")]
    pub resources: PathBuf,

    /// One or more glob patterns a source path must match
    #[arg(short, long)]
    pub include: Vec<String>,

    /// One or more glob patterns to exclude from the sources
    #[arg(short, long, alias = "ignore")]
    pub exclude: Vec<String>,

    /// YAML detection rules. The bundled rule set is used when omitted
    #[arg(long, env = "FIXTURE_SYNC_RULES")]
    pub rules: Option<PathBuf>,

    /// Keep the intermediate files of an interrupted run and continue from them
    #[arg(long, default_value = "false")]
    pub resume: bool,

    /// Do not read the fixtures already present under the target before the sources
    #[arg(long, default_value = "false")]
    pub skip_existing: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(clap::Args, Clone, Debug)]
pub struct FinalizeArgs {
    #[command(flatten)]
    pub output: OutputArgs,
}

/// Where and how pages are written. Shared by every command.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub target: PathBuf,
    pub workdir: PathBuf,
    pub schema: Option<PathBuf>,
    pub page_size: usize,
}

impl OutputConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("Page size must be at least 1");
        }
        if self.target.exists() && !self.target.is_dir() {
            bail!("Target {} is not a directory", self.target.display());
        }
        ensure_disjoint(&self.workdir, &self.target, "target")
    }

    /// Loads the schema once. Failure is fatal to the run: no page can be written without it.
    pub fn build_normalizer(&self) -> Result<Box<dyn JsonNormalizer>> {
        let normalizer = match &self.schema {
            Some(path) => SchemaNormalizer::from_path(path),
            None => SchemaNormalizer::embedded(),
        }
        .context("Failed to initialize the fixture normalizer")?;
        Ok(Box::new(normalizer))
    }
}

impl From<OutputArgs> for OutputConfig {
    fn from(args: OutputArgs) -> Self {
        OutputConfig {
            target: args.target,
            workdir: args.workdir,
            schema: args.schema,
            page_size: args.page_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub resources: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub rules: Option<PathBuf>,
    pub resume: bool,
    pub skip_existing: bool,
    pub output: OutputConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.resources.is_dir() {
            bail!("Resources directory {} does not exist", self.resources.display());
        }
        ensure_disjoint(&self.output.workdir, &self.resources, "resources directory")?;
        self.output.validate()
    }

    pub fn source_selection(&self) -> FileSelection {
        FileSelection::new(
            self.resources.clone(),
            self.include.clone(),
            self.exclude.clone(),
        )
    }

    pub fn build_detector(&self) -> Result<Box<dyn Detector>> {
        let loader = match &self.rules {
            Some(path) => RuleLoader::from_file(path),
            None => RuleLoader::embedded(),
        };
        let rules = loader
            .load()
            .context("Failed to load the detection rules")?;
        Ok(Box::new(RuleDetector::new(rules, DeviceRegistry::new())))
    }
}

impl From<RewriteArgs> for PipelineConfig {
    fn from(args: RewriteArgs) -> Self {
        PipelineConfig {
            resources: args.resources,
            include: args.include,
            exclude: args.exclude,
            rules: args.rules,
            resume: args.resume,
            skip_existing: args.skip_existing,
            output: args.output.into(),
        }
    }
}

/// The work directory is wiped by a fresh run, so it may not contain, or sit inside, a directory
/// the run reads from or writes to.
fn ensure_disjoint(workdir: &Path, other: &Path, role: &str) -> Result<()> {
    let (resolved, resolved_other) = (resolve(workdir)?, resolve(other)?);
    if resolved.starts_with(&resolved_other) || resolved_other.starts_with(&resolved) {
        bail!(
            "Work directory {} overlaps the {role} {}",
            workdir.display(),
            other.display()
        );
    }
    Ok(())
}

/// Absolute and symlink-free. Trailing components that do not exist yet are appended to the
/// canonical form of their deepest existing ancestor.
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = env::current_dir()
        .context("Failed to read the current directory")?
        .join(path);

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return Ok(missing
                .into_iter()
                .rev()
                .fold(canonical, |resolved, name| resolved.join(name)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return Ok(absolute.clone()),
        }
    }
}
