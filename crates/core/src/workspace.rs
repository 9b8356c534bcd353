//! Per-book temporary workspace.
//!
//! Each book generation gets a directory namespaced by its random id,
//! holding the cover PNG and every relocated image until packaging. The
//! directory is scoped as a resource: dropping the [`Workspace`] deletes
//! it on every exit path, success or failure, so aborted requests leave
//! nothing behind. Workspaces are never shared or reused across requests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::Result;

/// A private scratch directory for one book generation.
#[derive(Debug)]
pub struct Workspace {
    id: String,
    dir: TempDir,
}

impl Workspace {
    /// Creates a fresh workspace with a new book id.
    pub fn create() -> Result<Self> {
        let id = Uuid::new_v4().simple().to_string();
        let dir = tempfile::Builder::new().prefix(&format!("bindery-{}", id)).tempdir()?;
        Ok(Self { id, dir })
    }

    /// The book id namespacing this workspace.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The workspace directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the cover image lives inside this workspace.
    pub fn cover_path(&self) -> PathBuf {
        self.dir.path().join("cover.png")
    }
}
