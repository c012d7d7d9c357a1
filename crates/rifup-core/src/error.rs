//! Error types for lifecycle operations.
//!
//! All errors implement `std::error::Error` via `thiserror`. The
//! taxonomy mirrors how failures propagate through the engine:
//! configuration problems are recorded on the interface record and
//! never surface here, dependency-query and transition failures abort
//! the request, and best-effort failures (addon scripts, absent
//! executors) are logged at the call site instead of being raised.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations.
pub type IfupResult<T> = Result<T, IfupError>;

/// Errors that can occur while resolving or changing interface state.
#[derive(Debug, Error)]
pub enum IfupError {
    /// A child process could not be spawned at all.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// The command line that failed to start.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A phase command or executor exited nonzero.
    #[error("command '{command}' exited with status {code}")]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// The exit code (-1 when terminated by a signal).
        code: i32,
    },

    /// A child process outlived the configured timeout and was killed.
    #[error("command '{command}' timed out after {timeout}s")]
    CommandTimeout {
        /// The command line that was killed.
        command: String,
        /// The configured timeout in seconds.
        timeout: u64,
    },

    /// Querying an interface's dependents through its executors failed.
    #[error("dependency query failed for interface '{iface}'")]
    DependencyQuery {
        /// The interface whose query failed.
        iface: String,
        /// The underlying execution error.
        #[source]
        source: Box<IfupError>,
    },

    /// Templates can only be inherited from, never transitioned.
    #[error("interface '{iface}' is a template and cannot be brought up or down")]
    Template {
        /// The offending interface name.
        iface: String,
    },

    /// A requested interface has no stanza in the collection.
    #[error("interface '{iface}' is not defined")]
    UnknownInterface {
        /// The requested interface name.
        iface: String,
    },

    /// The per-interface state lock could not be acquired.
    #[error("could not lock {path}: {source}")]
    Lock {
        /// The lock file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A state or configuration file could not be read.
    #[error("could not read {path}: {source}")]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The state file could not be written.
    #[error("could not write {path}: {source}")]
    Write {
        /// The file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl IfupError {
    /// Creates a spawn error.
    pub fn spawn(command: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            command: command.into(),
            source,
        }
    }

    /// Creates a nonzero-exit error.
    pub fn command_failed(command: impl Into<String>, code: i32) -> Self {
        Self::CommandFailed {
            command: command.into(),
            code,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(command: impl Into<String>, timeout: u64) -> Self {
        Self::CommandTimeout {
            command: command.into(),
            timeout,
        }
    }

    /// Creates a template-transition error.
    pub fn template(iface: impl Into<String>) -> Self {
        Self::Template {
            iface: iface.into(),
        }
    }

    /// Creates an unknown-interface error.
    pub fn unknown_interface(iface: impl Into<String>) -> Self {
        Self::UnknownInterface {
            iface: iface.into(),
        }
    }
}
