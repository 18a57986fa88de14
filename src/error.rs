//! Error types for the simulation kernel.
//!
//! This module provides the crate's error type for fallible operations
//! that sit *outside* a running step — scenario file loading, ahead-of-use
//! path/condition compilation, registry misconfiguration reported back to
//! a caller that asked for it directly. A running `step` never returns
//! `Result`: per the error taxonomy, only a missing base-currency country
//! is fatal, and that is represented as a normal (if mostly empty)
//! `StepResult`, not a propagated error.
//!
//! # Examples
//!
//! ```
//! use econ_kernel::{KernelError, ScenarioFile};
//!
//! let result = ScenarioFile::from_file("nonexistent.yaml");
//! match result {
//!     Ok(_) => println!("scenario loaded"),
//!     Err(KernelError::ConfigFileRead(e)) => {
//!         println!("failed to read scenario file: {}", e);
//!     }
//!     Err(e) => println!("other error: {}", e),
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// The crate's error type for operations outside the kernel's `step` contract.
#[derive(Debug)]
pub enum KernelError {
    /// Error occurred while reading a scenario file.
    ConfigFileRead(io::Error),

    /// Error occurred while parsing YAML.
    YamlParse(String),

    /// Error occurred while parsing TOML.
    TomlParse(String),

    /// Scenario file has an unsupported extension.
    UnsupportedConfigFormat(String),

    /// Scenario or config validation failed.
    ValidationError(String),

    /// Error occurred while writing output files.
    IoError(io::Error),

    /// Error occurred while serializing JSON output.
    JsonSerialize(String),

    /// A dotted path does not resolve, or the target type is incompatible
    /// with the requested operation (§7 `PathError`).
    PathError(String),

    /// A condition expression failed to parse (§7 `ExpressionError`).
    ExpressionError(String),

    /// A reducer type or implementation name is not registered
    /// (§7 `ConfigurationError`).
    ConfigurationError(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::ConfigFileRead(e) => write!(f, "failed to read scenario file: {}", e),
            KernelError::YamlParse(msg) => write!(f, "failed to parse YAML: {}", msg),
            KernelError::TomlParse(msg) => write!(f, "failed to parse TOML: {}", msg),
            KernelError::UnsupportedConfigFormat(ext) => write!(
                f,
                "unsupported scenario file format: '{}'. Use .yaml, .yml, .toml or .json",
                ext
            ),
            KernelError::ValidationError(msg) => write!(f, "validation failed: {}", msg),
            KernelError::IoError(e) => write!(f, "I/O error: {}", e),
            KernelError::JsonSerialize(msg) => write!(f, "failed to serialize JSON: {}", msg),
            KernelError::PathError(msg) => write!(f, "path error: {}", msg),
            KernelError::ExpressionError(msg) => write!(f, "expression error: {}", msg),
            KernelError::ConfigurationError(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl StdError for KernelError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            KernelError::ConfigFileRead(e) | KernelError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for KernelError {
    fn from(err: io::Error) -> Self {
        KernelError::IoError(err)
    }
}

/// Type alias for `Result` with `KernelError`.
pub type Result<T> = std::result::Result<T, KernelError>;
