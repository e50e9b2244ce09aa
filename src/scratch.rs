//! # Scratch Workspaces
//!
//! Every transcription request stages its upload inside a private temporary
//! directory that is destroyed when the request finishes, whether it
//! succeeded or failed. The staged file is named from a generated token plus
//! a sanitized extension; the client-supplied filename is never used as a
//! path segment and is kept only for logging.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// An exclusively-owned temporary directory holding one staged upload.
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    pub fn create() -> Result<Self> {
        let dir = TempDir::new().context("failed to create scratch workspace")?;
        debug!(path = %dir.path().display(), "Created scratch workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the uploaded bytes verbatim into the workspace under an opaque
    /// generated name, returning the staged path.
    pub fn stage_upload(&self, bytes: &[u8], client_filename: Option<&str>) -> Result<PathBuf> {
        let staged_name = match safe_extension(client_filename) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.dir.path().join(staged_name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to stage upload at {}", path.display()))?;
        Ok(path)
    }

    /// Remove the workspace. Removal failure is logged as a warning and
    /// otherwise swallowed; it must never change an already-determined
    /// response.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Cleaned up scratch workspace"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to clean up scratch workspace")
            }
        }
    }
}

/// Extension of the client filename reduced to a short lowercase
/// alphanumeric token, or `None` when nothing usable remains.
fn safe_extension(client_filename: Option<&str>) -> Option<String> {
    let ext = Path::new(client_filename?).extension()?.to_str()?;
    let cleaned: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ignores_client_filename_for_path() {
        let workspace = ScratchWorkspace::create().unwrap();
        let staged = workspace
            .stage_upload(b"RIFF", Some("../../etc/passwd.wav"))
            .unwrap();

        assert!(staged.starts_with(workspace.path()));
        let name = staged.file_name().unwrap().to_str().unwrap();
        assert!(!name.contains("passwd"));
        assert!(name.ends_with(".wav"));
        assert_eq!(std::fs::read(&staged).unwrap(), b"RIFF");
        workspace.cleanup();
    }

    #[test]
    fn test_cleanup_removes_workspace() {
        let workspace = ScratchWorkspace::create().unwrap();
        let root = workspace.path().to_path_buf();
        workspace.stage_upload(b"data", Some("clip.mp3")).unwrap();
        assert!(root.exists());

        workspace.cleanup();
        assert!(!root.exists());
    }

    #[test]
    fn test_safe_extension_sanitizes() {
        assert_eq!(safe_extension(Some("audio.WAV")), Some("wav".to_string()));
        assert_eq!(safe_extension(Some("a.m4a")), Some("m4a".to_string()));
        assert_eq!(safe_extension(Some("archive.tar.gz")), Some("gz".to_string()));
        assert_eq!(safe_extension(Some("noextension")), None);
        assert_eq!(safe_extension(Some("dots..")), None);
        assert_eq!(safe_extension(None), None);
    }
}
