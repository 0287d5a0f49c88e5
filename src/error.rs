use thiserror::Error;

use crate::path_util::PathRejection;

/// Unified result type for all fallible operations in zipkeeper.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A source or destination path failed safety validation. The whole
    /// configuration update carrying it is rejected.
    #[error("invalid path '{path}': {reason}")]
    PathRejected { path: String, reason: PathRejection },

    /// A backup run was requested while another run holds the run lock.
    #[error("another backup run is already in progress")]
    RunInProgress,

    #[error("backup frequency must be at least one minute")]
    ZeroFrequency,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize configuration: {0}")]
    SerializeConfig(#[from] toml::ser::Error),

    #[error("failed to parse configuration: {0}")]
    ParseConfig(#[from] toml::de::Error),
}
