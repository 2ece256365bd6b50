//! Resolution of request targets against the document root.

use std::ffi::OsString;
use std::fs::{self, File};
use std::ops::Deref;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::http::error::RequestError;

/// Permission bit granting read access to others.
const S_IROTH: u32 = 0o004;

/// A resolved file, mapped read-only into memory.
///
/// The descriptor is closed as soon as the mapping exists; dropping the
/// value unmaps the region.
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    map: Option<Mmap>,
}

impl MappedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |map| map.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Deref for MappedFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}

/// Joins the document root and the target by plain concatenation.
pub fn real_path(doc_root: &Path, url: &str) -> PathBuf {
    let mut real = OsString::from(doc_root.as_os_str());
    real.push(url);
    PathBuf::from(real)
}

/// Resolves `url` under `doc_root` and maps the file.
///
/// Fails with `NotFound` when the path does not exist, `Forbidden` when it
/// is not world-readable and `IsDirectory` for directories. A zero-length
/// file resolves without a mapping.
pub fn resolve(doc_root: &Path, url: &str) -> Result<MappedFile, RequestError> {
    let path = real_path(doc_root, url);

    let metadata = fs::metadata(&path).map_err(|_| RequestError::NotFound)?;

    if metadata.permissions().mode() & S_IROTH == 0 {
        return Err(RequestError::Forbidden);
    }

    if metadata.is_dir() {
        return Err(RequestError::IsDirectory);
    }

    if metadata.len() == 0 {
        return Ok(MappedFile { path, map: None });
    }

    let file = File::open(&path).map_err(RequestError::internal)?;
    // SAFETY: read-only mapping that is never handed out mutably. Truncating
    // the file while it is mapped would fault readers.
    let map = unsafe { Mmap::map(&file) }.map_err(RequestError::internal)?;
    drop(file);

    Ok(MappedFile { path, map: Some(map) })
}
