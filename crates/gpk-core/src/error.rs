//! Error types for the install engine.

use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes, used in log fields and tests.
pub mod codes {
    pub const MANIFEST_MISSING: &str = "MANIFEST_MISSING";
    pub const UNKNOWN_REMOTE: &str = "UNKNOWN_REMOTE";
    pub const UNKNOWN_BASE: &str = "UNKNOWN_BASE";
    pub const UNKNOWN_REF: &str = "UNKNOWN_REF";
    pub const REMOTE_MISSING: &str = "REMOTE_MISSING";
    pub const VERIFICATION_FAILURE: &str = "VERIFICATION_FAILURE";
    pub const PLACEMENT_CONFLICT: &str = "PLACEMENT_CONFLICT";
    pub const DUPLICATE_DEPENDENCY: &str = "DUPLICATE_DEPENDENCY";
    pub const UNKNOWN_SCRIPT: &str = "UNKNOWN_SCRIPT";
    pub const LINK_CONFLICT: &str = "LINK_CONFLICT";
    pub const GIT_ERROR: &str = "GIT_ERROR";
    pub const MANIFEST_PARSE: &str = "MANIFEST_PARSE";
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Core error type for gpk operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no package.json found from {start}")]
    ManifestMissing { start: PathBuf },

    #[error("unknown remote alias '{alias}'")]
    UnknownRemote { alias: String },

    #[error("relative file:// remote used without a base directory")]
    UnknownBase,

    #[error("no ref matching '{reference}' on remote")]
    UnknownRef { reference: String },

    #[error("dependency '{name}' resolves to no git remote")]
    RemoteMissing { name: String },

    #[error("signature verification failed for '{reference}'")]
    VerificationFailure { reference: String },

    #[error("cannot place '{name}': conflicting install at {path}")]
    PlacementConflict { name: String, path: PathBuf },

    #[error("'{name}' is listed in both dependencies and devDependencies")]
    DuplicateDependency { name: String },

    #[error("no script named '{name}' in package.json")]
    UnknownScript { name: String },

    #[error("refusing to replace {path}: it does not link to this package")]
    LinkConflict { path: PathBuf },

    #[error("git {stage} failed: {stderr}")]
    Git { stage: &'static str, stderr: String },

    #[error("failed to parse {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable code for this error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ManifestMissing { .. } => codes::MANIFEST_MISSING,
            Self::UnknownRemote { .. } => codes::UNKNOWN_REMOTE,
            Self::UnknownBase => codes::UNKNOWN_BASE,
            Self::UnknownRef { .. } => codes::UNKNOWN_REF,
            Self::RemoteMissing { .. } => codes::REMOTE_MISSING,
            Self::VerificationFailure { .. } => codes::VERIFICATION_FAILURE,
            Self::PlacementConflict { .. } => codes::PLACEMENT_CONFLICT,
            Self::DuplicateDependency { .. } => codes::DUPLICATE_DEPENDENCY,
            Self::UnknownScript { .. } => codes::UNKNOWN_SCRIPT,
            Self::LinkConflict { .. } => codes::LINK_CONFLICT,
            Self::Git { .. } => codes::GIT_ERROR,
            Self::ManifestParse { .. } => codes::MANIFEST_PARSE,
            Self::Io(_) => codes::IO_ERROR,
        }
    }

    /// Build a git subprocess error for the given stage.
    #[must_use]
    pub fn git(stage: &'static str, stderr: impl Into<String>) -> Self {
        Self::Git {
            stage,
            stderr: stderr.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
