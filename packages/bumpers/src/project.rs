//! Project identity.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use sha2::{Digest, Sha256};

/// The project a hook runs in.
///
/// State and cache entries are partitioned by [`Project::id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    id: String,
    root: PathBuf,
}

impl Project {
    /// Identify a project by its root directory.
    ///
    /// The ID is derived from the canonical path, so symlinked or relative
    /// spellings of the same directory share state.
    #[tracing::instrument]
    pub fn from_root(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("resolve project root: {root:?}"))?;
        Ok(Self {
            id: project_id(&root),
            root,
        })
    }

    /// A project with an explicit ID.
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// The first 16 hex digits of the SHA-256 of the path.
fn project_id(root: &Path) -> String {
    let digest = Sha256::digest(root.to_string_lossy().as_bytes());
    let mut id = format!("{digest:x}");
    id.truncate(16);
    id
}
