//! The source registry: which endpoints to read and what they declare.
//!
//! The registry is a YAML document with an optional `settings:` block and a
//! `sources:` list. A default registry is compiled into the binary; `--config`
//! points at a replacement file.
//!
//! ```yaml
//! settings:
//!   max_articles: 250
//! sources:
//!   - name: CP24
//!     endpoint: https://www.cp24.com/feed
//!     category: local
//!     location: Toronto
//! ```

use crate::config::Settings;
use crate::models::{Source, SourceKind};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_REGISTRY: &str = include_str!("../config/sources.yaml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid registry YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("source #{index}: {reason}")]
    InvalidSource { index: usize, reason: String },
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    sources: Vec<Source>,
}

/// Immutable list of sources for one run.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn feeds(&self) -> impl Iterator<Item = &Source> {
        self.sources().iter().filter(|s| s.kind == SourceKind::Feed)
    }

    pub fn apis(&self) -> impl Iterator<Item = &Source> {
        self.sources().iter().filter(|s| s.kind == SourceKind::Api)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Load the registry and settings from `path`, or the built-in default.
pub fn load(path: Option<&Path>) -> Result<(SourceRegistry, Settings), ConfigError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "Loading source registry");
            from_yaml(&text)
        }
        None => {
            info!("Loading built-in source registry");
            from_yaml(DEFAULT_REGISTRY)
        }
    }
}

/// Parse and validate a registry document.
///
/// Entries with a blank name or endpoint are rejected. A repeated endpoint is
/// dropped with a warning, since the endpoint is the source's identity.
pub fn from_yaml(text: &str) -> Result<(SourceRegistry, Settings), ConfigError> {
    let file: RegistryFile = serde_yaml::from_str(text)?;

    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(file.sources.len());
    for (index, mut source) in file.sources.into_iter().enumerate() {
        source.name = source.name.trim().to_string();
        source.endpoint = source.endpoint.trim().to_string();
        source.category = source.category.trim().to_string();
        source.location = source
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());

        if source.name.is_empty() {
            return Err(ConfigError::InvalidSource {
                index,
                reason: "empty name".to_string(),
            });
        }
        if source.endpoint.is_empty() {
            return Err(ConfigError::InvalidSource {
                index,
                reason: format!("{} has an empty endpoint", source.name),
            });
        }
        if !seen.insert(source.endpoint.clone()) {
            warn!(name = %source.name, endpoint = %source.endpoint, "Duplicate endpoint; skipping source");
            continue;
        }
        sources.push(source);
    }

    Ok((SourceRegistry::new(sources), file.settings.sanitized()))
}
