//! Settings shared by the compiler, the interpreter and the event
//! dispatcher, read from a TOML file:
//!
//! ```toml
//! version = 3
//! lenient_parens = true
//!
//! [limits]
//! max_steps = 100000
//! max_call_depth = 64
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::CompilerOptions;
use crate::events::DispatcherConfig;
use crate::runtime::vm_bc::InterpreterConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Interpreter resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_steps: usize,
    pub max_call_depth: usize,
    pub max_stack_size: usize,
    pub max_chunk_pieces: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 256,
            max_stack_size: 10_000,
            max_chunk_pieces: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LingoConfig {
    /// Director version, e.g. 3 for D3 movies.
    pub version: u16,
    /// Unset means "lenient below version 4".
    pub lenient_parens: Option<bool>,
    pub limits: Limits,
}

impl Default for LingoConfig {
    fn default() -> Self {
        Self {
            version: 4,
            lenient_parens: None,
            limits: Limits::default(),
        }
    }
}

impl LingoConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        let mut options = CompilerOptions::for_version(self.version);
        if let Some(lenient) = self.lenient_parens {
            options.lenient_parens = lenient;
        }
        options
    }

    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            max_steps: self.limits.max_steps,
            max_call_depth: self.limits.max_call_depth,
            max_stack_size: self.limits.max_stack_size,
            max_chunk_pieces: self.limits.max_chunk_pieces,
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            version: self.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = LingoConfig::from_toml_str("").unwrap();
        assert_eq!(config, LingoConfig::default());
        assert!(!config.compiler_options().lenient_parens);
    }

    #[test]
    fn test_d3_is_lenient_unless_overridden() {
        let config = LingoConfig::from_toml_str("version = 3").unwrap();
        assert!(config.compiler_options().lenient_parens);

        let config = LingoConfig::from_toml_str("version = 3\nlenient_parens = false").unwrap();
        assert!(!config.compiler_options().lenient_parens);
    }

    #[test]
    fn test_partial_limits() {
        let config = LingoConfig::from_toml_str("[limits]\nmax_steps = 50").unwrap();
        let vm = config.interpreter_config();
        assert_eq!(vm.max_steps, 50);
        assert_eq!(vm.max_call_depth, Limits::default().max_call_depth);
    }

    #[test]
    fn test_chunk_piece_limit() {
        let config = LingoConfig::from_toml_str("[limits]\nmax_chunk_pieces = 12").unwrap();
        assert_eq!(config.interpreter_config().max_chunk_pieces, 12);
        assert_eq!(
            LingoConfig::default().interpreter_config().max_chunk_pieces,
            100_000
        );
    }

    #[test]
    fn test_bad_toml() {
        let err = LingoConfig::from_toml_str("version = \"four\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = LingoConfig::load(Path::new("/nonexistent/lingo.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
