//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while loading, parsing, or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file's extension/content did not parse as YAML or TOML.
    #[error("failed to parse config file {path}: {message}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Parser's error message.
        message: String,
    },

    /// A required field failed `validator` or custom semantic validation.
    #[error("invalid configuration field '{field}': {message}")]
    InvalidField {
        /// Dotted field path, e.g. `"cache.ttl_ms"`.
        field: String,
        /// Human-readable description.
        message: String,
    },

    /// A limit the source config expresses ambiguously (two conflicting
    /// defaults depending on code path) must instead be a single configured
    /// value; the gateway refuses to guess.
    #[error("'{field}' is ambiguous or missing: {message}")]
    AmbiguousLimit {
        /// The field in question (e.g. `"registry.max_models"`).
        field: String,
        /// Why it is ambiguous.
        message: String,
    },

    /// An environment variable override referenced a key that does not
    /// exist in the schema.
    #[error("unknown environment override '{key}'")]
    UnknownOverride {
        /// The unrecognized `GATEWAY_*` variable name.
        key: String,
    },

    /// The file watcher used for hot reload could not be established.
    #[error("failed to watch config file {path}: {message}")]
    Watch {
        /// Path that could not be watched.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
}

/// Convenience alias for this crate's fallible operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
