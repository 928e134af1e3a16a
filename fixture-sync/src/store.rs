//! Append-friendly intermediate store: one JSON array per shard under the work directory.

use std::{
    collections::{hash_map, HashMap},
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{
    error::StoreError,
    report::{Phase, RunReporter, Stopwatch},
    result::Entry,
    shard::ShardPath,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    NotStarted,
    /// Prior entries were read from disk (or there were none)
    Loaded,
    /// In memory, not yet on disk
    Appended,
    Flushed,
}

struct ShardBuffer {
    entries: Vec<Entry>,
    state: ShardState,
}

pub struct IntermediateStore {
    root: PathBuf,
    buffers: HashMap<ShardPath, ShardBuffer>,
}

impl IntermediateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        IntermediateStore {
            root: root.into(),
            buffers: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drops everything a previous run left behind.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.buffers.clear();
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|source| StoreError::Write {
                path: self.root.clone(),
                source,
            })?;
        }
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Write {
            path: self.root.clone(),
            source,
        })
    }

    /// `<root>/<deviceManufacturer>/<deviceType>/<clientManufacturer>/<clientType>.json`
    pub fn shard_file(&self, shard: &ShardPath) -> PathBuf {
        let [device_manufacturer, device_type, client_manufacturer, client_type] =
            shard.segments();
        self.root
            .join(device_manufacturer)
            .join(device_type)
            .join(client_manufacturer)
            .join(format!("{client_type}.json"))
    }

    pub fn state(&self, shard: &ShardPath) -> ShardState {
        self.buffers
            .get(shard)
            .map(|buffer| buffer.state)
            .unwrap_or(ShardState::NotStarted)
    }

    /// Appends one entry and writes the whole shard list back. Read and write failures are
    /// counted and logged; they never abort the run.
    pub fn append(&mut self, shard: &ShardPath, entry: Entry, reporter: &mut RunReporter) {
        let path = self.shard_file(shard);

        let buffer = match self.buffers.entry(shard.clone()) {
            hash_map::Entry::Occupied(slot) => slot.into_mut(),
            hash_map::Entry::Vacant(slot) => {
                let entries = load_existing(&path, reporter);
                slot.insert(ShardBuffer {
                    entries,
                    state: ShardState::Loaded,
                })
            }
        };

        buffer.entries.push(entry);
        buffer.state = ShardState::Appended;

        let watch = Stopwatch::start();
        match write_entries(&path, &buffer.entries) {
            Ok(()) => buffer.state = ShardState::Flushed,
            Err(err) => {
                reporter.errors += 1;
                warn!("{err}");
            }
        }
        reporter.record(Phase::Write, watch);
    }

    /// Every intermediate file with the shard it belongs to. Order across shards is unspecified.
    pub fn list_shards(&self) -> Vec<(ShardPath, PathBuf)> {
        if !self.root.exists() {
            return Vec::new();
        }

        WalkDir::new(&self.root)
            .min_depth(4)
            .max_depth(4)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let shard = shard_from_file(&self.root, e.path());
                if shard.is_none() {
                    debug!("ignoring {} in work directory", e.path().display());
                }
                shard.map(|shard| (shard, e.into_path()))
            })
            .collect()
    }

    pub fn load_file(path: &Path) -> Result<Vec<Entry>, StoreError> {
        let content = fs::read(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn shard_from_file(root: &Path, path: &Path) -> Option<ShardPath> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = relative.iter().map(|part| part.to_str());
    let device_manufacturer = parts.next()??;
    let device_type = parts.next()??;
    let client_manufacturer = parts.next()??;
    let client_type = Path::new(parts.next()??).file_stem()?.to_str()?;

    Some(ShardPath::from_segments([
        device_manufacturer,
        device_type,
        client_manufacturer,
        client_type,
    ]))
}

fn load_existing(path: &Path, reporter: &mut RunReporter) -> Vec<Entry> {
    if !path.exists() {
        return Vec::new();
    }

    let watch = Stopwatch::start();
    let loaded = IntermediateStore::load_file(path);
    reporter.record(Phase::Read, watch);

    match loaded {
        Ok(entries) => entries,
        Err(err) => {
            reporter.errors += 1;
            warn!("{err}, starting the shard from scratch");
            Vec::new()
        }
    }
}

fn write_entries(path: &Path, entries: &[Entry]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let content = serde_json::to_vec(entries).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}
