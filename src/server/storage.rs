//! On-disk layout of the service: `uploads/` for stored PDFs and
//! `outputs/<job id>/` for conversion results.

use crate::error::Pdf2ImgError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`.
///
/// Path separators become word breaks, runs of whitespace become a single
/// `_`, anything else outside the allowed set is dropped, and leading or
/// trailing dots and underscores are stripped. `../../etc/passwd` becomes
/// `etc_passwd`. The result may be empty.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// `true` for a single, non-special path component.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

pub struct Storage {
    uploads: PathBuf,
    outputs: PathBuf,
}

impl Storage {
    /// Create (if needed) the `uploads/` and `outputs/` directories.
    pub async fn open(data_dir: &Path) -> Result<Self, Pdf2ImgError> {
        let uploads = data_dir.join("uploads");
        let outputs = data_dir.join("outputs");
        for dir in [&uploads, &outputs] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Pdf2ImgError::io(dir, e))?;
        }
        Ok(Self { uploads, outputs })
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs
    }

    /// Store an uploaded document under a collision-free handle
    /// `<uuid>_<sanitised name>` and return the handle.
    pub async fn save_upload(&self, original_name: &str, data: &[u8]) -> Result<String, Pdf2ImgError> {
        let mut safe = secure_filename(original_name);
        if safe.is_empty() {
            safe = "document.pdf".to_string();
        }
        let handle = format!("{}_{}", Uuid::new_v4().simple(), safe);
        let path = self.uploads.join(&handle);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| Pdf2ImgError::io(&path, e))?;
        info!("Stored upload '{}' as {} ({} bytes)", original_name, handle, data.len());
        Ok(handle)
    }

    /// Path of a stored upload, or `None` if the handle is not a plain name.
    pub fn upload_path(&self, handle: &str) -> Option<PathBuf> {
        is_plain_file_name(handle).then(|| self.uploads.join(handle))
    }

    /// Allocate a fresh job id. The directory is created by the conversion.
    pub fn new_job(&self) -> (String, PathBuf) {
        let id = Uuid::new_v4().to_string();
        let dir = self.outputs.join(&id);
        (id, dir)
    }

    /// Path of a produced file, or `None` if either component is unsafe.
    pub fn output_file(&self, job_id: &str, file_name: &str) -> Option<PathBuf> {
        (is_plain_file_name(job_id) && is_plain_file_name(file_name))
            .then(|| self.outputs.join(job_id).join(file_name))
    }

    /// Remove a job directory and everything in it.
    pub async fn discard_job(&self, job_dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(job_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {}: {}", job_dir.display(), e);
            }
        }
    }

    /// Delete every stored upload and job output. Returns how many entries
    /// were removed.
    pub async fn purge(&self) -> Result<usize, Pdf2ImgError> {
        let mut removed = 0;
        for dir in [&self.uploads, &self.outputs] {
            let mut entries = tokio::fs::read_dir(dir)
                .await
                .map_err(|e| Pdf2ImgError::io(dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Pdf2ImgError::io(dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Pdf2ImgError::io(&path, e))?;
                let result = if file_type.is_dir() {
                    tokio::fs::remove_dir_all(&path).await
                } else {
                    tokio::fs::remove_file(&path).await
                };
                result.map_err(|e| Pdf2ImgError::io(&path, e))?;
                debug!("Removed {}", path.display());
                removed += 1;
            }
        }
        info!("Cleanup removed {} entries", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn secure_filename_strips_traversal() {
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("My cool report.pdf"), "My_cool_report.pdf");
        assert_eq!(secure_filename("C:\\Users\\me\\scan.pdf"), "C_Users_me_scan.pdf");
        assert_eq!(secure_filename("résumé.pdf"), "rsum.pdf");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn plain_file_names() {
        assert!(is_plain_file_name("page_1.png"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("a/b.png"));
        assert!(!is_plain_file_name("a\\b.png"));
    }

    #[tokio::test]
    async fn upload_handles_are_unique_and_resolvable() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();

        let a = storage.save_upload("doc.pdf", b"%PDF-1.4").await.unwrap();
        let b = storage.save_upload("doc.pdf", b"%PDF-1.4").await.unwrap();
        assert_ne!(a, b);
        assert!(a.ends_with("_doc.pdf"));

        let path = storage.upload_path(&a).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.4");
        assert!(storage.upload_path("../secret").is_none());
    }

    #[tokio::test]
    async fn purge_empties_both_areas() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        storage.save_upload("doc.pdf", b"%PDF").await.unwrap();
        let (_, job_dir) = storage.new_job();
        std::fs::create_dir_all(&job_dir).unwrap();
        std::fs::write(job_dir.join("page_1.png"), b"png").unwrap();

        assert_eq!(storage.purge().await.unwrap(), 2);
        assert_eq!(std::fs::read_dir(storage.uploads_dir()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(storage.outputs_dir()).unwrap().count(), 0);
    }
}
