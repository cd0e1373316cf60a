//! Server configuration.

use std::path::PathBuf;

/// Startup configuration, passed explicitly to the router.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory sample identifiers are resolved against.
    pub staging_dir: PathBuf,
    /// Upper bound on concurrently running pipelines.
    pub workers: usize,
    /// Return the escaped error chain to clients on internal errors.
    pub expose_diagnostics: bool,
}

impl ServerConfig {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("/tmp/"),
            workers: 4,
            expose_diagnostics: false,
        }
    }
}
