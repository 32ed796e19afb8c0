//! Core domain models: channels, artifacts and credentials
//!
//! A [`Channel`] is one independent publication target with its own staging
//! directory, archive directory and publication ledger. An [`Artifact`] is one
//! media file waiting in a channel's staging directory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque credential bundle for a channel's publish account
///
/// The scheduler never interprets these values; they are passed through to the
/// publish backend unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// OAuth client identifier
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Account email the uploads are performed as
    pub account_email: String,
}

/// Visibility of a published artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Publicly visible
    #[default]
    Public,
    /// Reachable by link only
    Unlisted,
    /// Visible to the owning account only
    Private,
}

impl Visibility {
    /// Wire representation expected by publish backends
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independent publication target
///
/// Channels are statically configured at process start and never created or
/// destroyed at runtime. The directory layout under the channel root is:
///
/// ```text
/// <root>/<name>/pending/              staging artifacts
/// <root>/<name>/archive/              published artifacts
/// <root>/<name>/upload_history.txt    publication ledger
/// ```
#[derive(Debug, Clone)]
pub struct Channel {
    /// Unique channel name
    pub name: String,

    /// Staging directory scanned for pending artifacts
    pub pending_dir: PathBuf,

    /// Archive directory artifacts are moved to on successful publish
    pub archive_dir: PathBuf,

    /// Path of the append-only publication ledger
    pub ledger_path: PathBuf,

    /// Publish account credentials
    pub credentials: Credentials,
}

impl Channel {
    /// Create a channel rooted at `<root>/<name>`
    pub fn new(root: &Path, name: impl Into<String>, credentials: Credentials) -> Self {
        let name = name.into();
        let base = root.join(&name);
        Self {
            pending_dir: base.join("pending"),
            archive_dir: base.join("archive"),
            ledger_path: base.join("upload_history.txt"),
            name,
            credentials,
        }
    }

    /// Create the channel's directory layout eagerly
    ///
    /// Absence of these directories after initialization is treated as an
    /// unrecoverable setup error by the scheduler.
    pub async fn ensure_layout(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.pending_dir).await?;
        tokio::fs::create_dir_all(&self.archive_dir).await?;
        if let Some(parent) = self.ledger_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Stable artifact identifier used for ordering and claim-set membership
///
/// Derived from the artifact's full path so that identically named files in
/// different channels never collide in the process-wide claim set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Derive an identifier from an artifact path
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One media file pending publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Stable identifier (claim-set key)
    pub id: ArtifactId,

    /// Current location in the staging directory
    pub path: PathBuf,

    /// File name, used for ordering, titles and ledger entries
    pub file_name: String,
}

impl Artifact {
    /// Build an artifact from a staged file path
    ///
    /// Returns `None` for paths without a final file-name component.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            id: ArtifactId::from_path(&path),
            path,
            file_name,
        })
    }

    /// Human-facing title: the file stem with underscores turned into spaces
    pub fn title(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name.clone());
        stem.replace('_', " ")
    }

    /// Destination path inside an archive directory
    pub fn archive_path(&self, archive_dir: &Path) -> PathBuf {
        archive_dir.join(&self.file_name)
    }
}
