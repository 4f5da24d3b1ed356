//! Scratch files written by tools and read back by parsers

use std::io::ErrorKind;
use std::path::Path;

use tempfile::TempPath;
use uuid::Uuid;

use crate::error::ScanError;

/// A uniquely named file in the temp dir, removed when dropped.
///
/// Created before the tool runs so that concurrent invocations of the same
/// tool never share an output path.
#[derive(Debug)]
pub struct ScratchArtifact {
    path: TempPath,
    owner: Uuid,
}

impl ScratchArtifact {
    pub fn create(tool: &str, suffix: &str, owner: Uuid) -> Result<Self, ScanError> {
        let file = tempfile::Builder::new()
            .prefix(&format!("scanforge-{}-", tool))
            .suffix(suffix)
            .tempfile()
            .map_err(|source| ScanError::Artifact {
                path: std::env::temp_dir(),
                source,
            })?;
        let path = file.into_temp_path();
        tracing::debug!(path = %path.display(), %owner, "Created scratch artifact");
        Ok(Self { path, owner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path as an argv token
    pub fn arg(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Contents written by the tool, or `None` if the file is gone or empty
    pub fn read(&self) -> Result<Option<String>, ScanError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(None),
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ScanError::Artifact {
                path: self.path.to_path_buf(),
                source,
            }),
        }
    }

    /// Like [`read`](Self::read), but an unreadable artifact is logged and
    /// treated as empty so records already parsed from stdout survive.
    pub fn contents(&self) -> Option<String> {
        self.read().unwrap_or_else(|e| {
            tracing::warn!(owner = %self.owner, "{}", e);
            None
        })
    }
}

impl Drop for ScratchArtifact {
    fn drop(&mut self) {
        // TempPath removes the file itself; this only reports the outcome.
        if self.path.exists() {
            tracing::debug!(path = %self.path.display(), "Removing scratch artifact");
        }
    }
}
