use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::StoreError;

/// File holding the current QR fallback image.
///
/// Updates write a sibling temp file and rename it over the old one, so a
/// crash mid-write leaves either the old image or the new one, never a
/// truncated file.
#[derive(Clone, Debug)]
pub struct QrSlot {
    path: PathBuf,
}

impl QrSlot {
    /// Creates a slot backed by `path`. Nothing is touched until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the image file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the stored image.
    pub fn store(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;

        info!(path = %self.path.display(), bytes = bytes.len(), "QR image updated");
        Ok(())
    }

    /// Reads the stored image, `None` if no QR image has been received yet.
    pub fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
