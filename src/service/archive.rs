use crate::error::app_error::AppError;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A file to place in the export archive.
#[derive(Debug)]
pub struct ArchiveFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Packs QR images under `qr_codes/` and photos under `photos/`.
/// Blocking; run it on the blocking pool.
pub fn build_zip(qr_codes: &[ArchiveFile], photos: &[ArchiveFile]) -> Result<Vec<u8>, AppError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for (folder, files) in [("qr_codes", qr_codes), ("photos", photos)] {
        zip.add_directory(format!("{folder}/"), options)
            .map_err(|e| AppError::archive("Failed to add folder", e))?;
        for file in files {
            zip.start_file(format!("{folder}/{}", file.name), options)
                .map_err(|e| AppError::archive("Failed to add file", e))?;
            zip.write_all(&file.bytes)
                .map_err(|e| AppError::storage("Failed to write archive entry", e))?;
        }
    }

    let cursor = zip.finish().map_err(|e| AppError::archive("Failed to finish archive", e))?;
    Ok(cursor.into_inner())
}
