//! Source adapters: anything that yields header sets.
//!
//! File sources are picked by extension. Each one is read once; a second call to
//! [`SourceAdapter::headers`] fails with [`SourceError::Exhausted`].

pub mod json;
pub mod log;
pub mod text;
pub mod yaml;

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::Result;
use tracing::{info, warn};

use crate::{error::SourceError, headers::HeaderSet, utils::files::FileSelection};

/// Header sets of one source. An `Err` item is a read failure inside the source and ends it.
pub type HeaderStream = Box<dyn Iterator<Item = Result<HeaderSet, SourceError>>>;

pub trait SourceAdapter {
    fn name(&self) -> &str;

    /// Precondition check before reading. `label` only decorates log lines.
    fn is_ready(&self, label: &str) -> bool;

    /// A finite, lazy, non-restartable stream of header sets. `width` pads the source name in
    /// progress messages so consecutive sources line up.
    fn headers(&mut self, label: &str, width: usize) -> Result<HeaderStream, SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Yaml,
    Text,
    Log,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "json" => Some(SourceFormat::Json),
            "yaml" | "yml" => Some(SourceFormat::Yaml),
            "txt" => Some(SourceFormat::Text),
            "log" => Some(SourceFormat::Log),
            _ => None,
        }
    }
}

pub struct FileSource {
    name: String,
    path: PathBuf,
    format: SourceFormat,
    consumed: bool,
}

impl FileSource {
    pub fn new(path: PathBuf, format: SourceFormat) -> Self {
        FileSource {
            name: path.display().to_string(),
            path,
            format,
            consumed: false,
        }
    }

    /// Picks the adapter by extension; `None` for files no adapter understands.
    pub fn for_path(path: PathBuf) -> Option<Self> {
        let format = SourceFormat::from_path(&path)?;
        Some(Self::new(path, format))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }
}

impl SourceAdapter for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self, label: &str) -> bool {
        match self.path.metadata() {
            Ok(meta) if meta.is_file() && meta.len() > 0 => true,
            Ok(_) => {
                info!("{label} {} is empty, skipping", self.name);
                false
            }
            Err(err) => {
                warn!("{label} {} is not readable: {err}", self.name);
                false
            }
        }
    }

    fn headers(&mut self, label: &str, width: usize) -> Result<HeaderStream, SourceError> {
        if self.consumed {
            return Err(SourceError::Exhausted(self.name.clone()));
        }
        self.consumed = true;

        info!("{label} {:<width$} reading", self.name);
        match self.format {
            SourceFormat::Json => json::read_headers(&self.path),
            SourceFormat::Yaml => yaml::read_headers(&self.path),
            SourceFormat::Text => text::read_headers(&self.path),
            SourceFormat::Log => log::read_headers(&self.path),
        }
    }
}

/// The lines of a file, split on `\n` and decoded lossily so a malformed byte only garbles its own
/// line. The first I/O error is yielded once and ends the stream.
pub fn read_lines(
    path: &Path,
) -> Result<impl Iterator<Item = Result<String, SourceError>>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let path = path.to_path_buf();
    let mut failed = false;
    let lines = BufReader::new(file)
        .split(b'\n')
        .map_while(move |chunk| {
            if failed {
                return None;
            }
            Some(match chunk {
                Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(source) => {
                    failed = true;
                    Err(SourceError::Read {
                        path: path.clone(),
                        source,
                    })
                }
            })
        });
    Ok(lines)
}

/// Every readable source below the selection's directory, in path order.
pub fn discover_sources(selection: FileSelection) -> Result<Vec<FileSource>> {
    let sources = selection
        .filter(|entry| entry.file_type().is_file())
        .try_into_iter()?
        .filter_map(|entry| FileSource::for_path(entry.into_path()))
        .collect::<Vec<_>>();
    Ok(sources)
}
