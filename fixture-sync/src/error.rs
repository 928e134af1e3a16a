use std::{io, path::PathBuf};

use thiserror::Error;

/// Raised by a detector for a single header set. Never fatal to a run.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("header set is empty")]
    EmptyHeaders,
    #[error("header {name} contains control characters")]
    MalformedHeader { name: String },
    #[error("none of the inspected headers are present")]
    NoUsableHeader,
}

#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("failed to encode page: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("page violates the fixture schema: {}", messages.join("; "))]
    SchemaViolation { messages: Vec<String> },
    #[error("page is empty")]
    EmptyPage,
}

/// The normalizer could not be initialized. Fatal: no page can be written without it.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("could not read schema {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("schema {origin} is not valid JSON: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("schema {origin} failed to compile: {message}")]
    Compile { origin: String, message: String },
}

#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("could not read rules {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rules {origin} are not valid YAML: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("rule {index} in section {section} has an invalid pattern: {source}")]
    Pattern {
        section: &'static str,
        index: usize,
        #[source]
        source: regex::Error,
    },
    #[error("rule {index} in section {section} sets unknown field {field}")]
    UnknownField {
        section: &'static str,
        index: usize,
        field: String,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt intermediate file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode entries for {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("source {0} has already been consumed")]
    Exhausted(String),
}

/// Error surfaced by a command, carrying the process exit code.
pub struct CommandError {
    pub inner: anyhow::Error,
    pub exit_code: i32,
}

impl From<anyhow::Error> for CommandError {
    fn from(inner: anyhow::Error) -> Self {
        Self {
            inner,
            exit_code: 1,
        }
    }
}
