// crates/core/src/archive.rs
//! Zip packaging for multi-part outputs.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::OpError;

/// One file to pack, stored in the archive under `name`.
pub(crate) struct ZipEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Build a zip archive at `dest` containing the given entries in order.
///
/// The zip writer is synchronous, so the whole job runs on the blocking pool.
pub(crate) async fn build_zip(entries: Vec<ZipEntry>, dest: PathBuf) -> Result<(), OpError> {
    tokio::task::spawn_blocking(move || build_zip_blocking(&entries, &dest))
        .await
        .map_err(|e| OpError::internal(format!("zip task panicked: {e}")))?
}

fn build_zip_blocking(entries: &[ZipEntry], dest: &PathBuf) -> Result<(), OpError> {
    let file = File::create(dest).map_err(|e| OpError::io(dest, e))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|e| OpError::internal(format!("failed to open zip entry {}: {e}", entry.name)))?;
        let mut source = File::open(&entry.path).map_err(|e| OpError::io(&entry.path, e))?;
        io::copy(&mut source, &mut writer).map_err(|e| OpError::io(&entry.path, e))?;
    }

    let mut inner = writer
        .finish()
        .map_err(|e| OpError::internal(format!("failed to finalize zip: {e}")))?;
    inner.flush().map_err(|e| OpError::io(dest, e))?;
    Ok(())
}
