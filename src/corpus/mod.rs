//! Static reference material sampled into every generation prompt.
//!
//! Two ordered, read-only lists: hooks (opening lines) and example posts.
//! A custom corpus can be loaded from TOML; otherwise the built-in one is
//! used.

pub mod builtin;
pub mod sampler;

pub use sampler::Sampler;

use rand::Rng;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

const HOOK_SEPARATOR: &str = "\n* ";
const EXAMPLE_SEPARATOR: &str = "\n\n****\nNEW EXAMPLE:\n\n";

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to read corpus file {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("Corpus file {path} is not valid TOML: {reason}")]
    Parse { path: String, reason: String },
    #[error("Corpus section `{section}` is empty")]
    EmptySection { section: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Corpus {
    pub hooks: Vec<String>,
    pub examples: Vec<String>,
}

/// One request's worth of sampled reference material, ready for the prompt.
#[derive(Debug, Clone)]
pub struct SampledCorpus {
    pub hooks: String,
    pub examples: String,
}

impl Corpus {
    pub fn builtin() -> Self {
        Self {
            hooks: builtin::HOOKS.iter().map(|s| s.to_string()).collect(),
            examples: builtin::EXAMPLES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path_str = path.as_ref().display().to_string();
        let raw = fs::read_to_string(path.as_ref()).map_err(|e| CorpusError::Read {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            CorpusError::Parse { reason, .. } => CorpusError::Parse {
                path: path_str,
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CorpusError> {
        let corpus: Corpus = toml::from_str(raw).map_err(|e| CorpusError::Parse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        corpus.validate()?;
        Ok(corpus)
    }

    fn validate(&self) -> Result<(), CorpusError> {
        if self.hooks.iter().all(|h| h.trim().is_empty()) {
            return Err(CorpusError::EmptySection { section: "hooks" });
        }
        if self.examples.iter().all(|e| e.trim().is_empty()) {
            return Err(CorpusError::EmptySection {
                section: "examples",
            });
        }
        Ok(())
    }

    /// Samples hooks and examples independently and renders both blocks.
    pub fn sample<R: Rng + ?Sized>(&self, sampler: &Sampler, rng: &mut R) -> SampledCorpus {
        let hooks = sampler.sample(&self.hooks, rng);
        let examples = sampler.sample(&self.examples, rng);
        SampledCorpus {
            hooks: hooks.join(HOOK_SEPARATOR),
            examples: examples.join(EXAMPLE_SEPARATOR),
        }
    }
}
