//! ZIP packaging of converted page images.

use crate::error::Pdf2ImgError;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write `files` into a deflate-compressed archive at `zip_path`.
///
/// Entries are named after each file's base name, in the order given. A
/// partially written archive is removed on failure.
pub fn bundle(files: &[PathBuf], zip_path: &Path) -> Result<PathBuf, Pdf2ImgError> {
    let result = write_archive(files, zip_path);
    if result.is_err() {
        let _ = std::fs::remove_file(zip_path);
    }
    result?;
    info!("Bundled {} file(s) into {}", files.len(), zip_path.display());
    Ok(zip_path.to_path_buf())
}

fn write_archive(files: &[PathBuf], zip_path: &Path) -> Result<(), Pdf2ImgError> {
    let archive_err = |detail: String| Pdf2ImgError::ArchiveFailed {
        path: zip_path.to_path_buf(),
        detail,
    };

    let out = File::create(zip_path).map_err(|e| Pdf2ImgError::io(zip_path, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| archive_err(format!("unusable entry name: {}", path.display())))?;
        zip.start_file(name, options)
            .map_err(|e| archive_err(e.to_string()))?;
        let mut src = File::open(path).map_err(|e| Pdf2ImgError::io(path, e))?;
        std::io::copy(&mut src, &mut zip).map_err(|e| Pdf2ImgError::io(path, e))?;
        debug!("Added {} to archive", name);
    }

    zip.finish().map_err(|e| archive_err(e.to_string()))?;
    Ok(())
}
