//! Device link files backing evicted transforms.
//!
//! Files are named `<prefix>_temp.<pid><counter>.icc` inside one directory.
//! The counter is shared by every directory in the process, so contexts
//! pointing at the same directory never pick the same name, and a file
//! that already exists is never overwritten.
//!
//! Files are not deleted when a transform is dropped; [`DeviceLinkDir::sweep`]
//! clears leftovers of earlier processes at start-up.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use crate::engine::{ProfileHandle, TransformFlags, TransformHandle};
use crate::{IccError, IccResult};

static COUNTER: AtomicU32 = AtomicU32::new(0);

// Names skipped because another writer got there first.
const MAX_NAME_ATTEMPTS: u32 = 64;

/// Directory and naming scheme of device link files.
#[derive(Debug)]
pub struct DeviceLinkDir {
    dir: PathBuf,
    prefix: String,
}

impl DeviceLinkDir {
    /// Uses `dir` with file names starting with `<prefix>_temp.`.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stem(&self) -> String {
        format!("{}_temp.", self.prefix)
    }

    /// Fresh file path, unique within this process.
    pub fn next_path(&self) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        self.dir.join(format!("{}{}{}.icc", self.stem(), std::process::id(), n))
    }

    /// Collapses `transform` into a device link and writes it to a fresh path.
    pub fn export(&self, transform: &TransformHandle) -> IccResult<PathBuf> {
        let link = transform.to_device_link(TransformFlags::empty())?;
        let data = link
            .save_to_vec()
            .ok_or_else(|| IccError::serialization(&self.dir, "engine could not serialize the link"))?;
        let path = self.create(&data)?;
        debug!(path = %path.display(), "device link written");
        Ok(path)
    }

    /// Writes `data` to a path nobody has used yet.
    fn create(&self, data: &[u8]) -> IccResult<PathBuf> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.next_path();
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(IccError::serialization(&path, e.to_string())),
            };
            if let Err(e) = file.write_all(data) {
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(IccError::serialization(&path, e.to_string()));
            }
            return Ok(path);
        }
        Err(IccError::serialization(&self.dir, "no free device link name"))
    }

    /// Whether `name` was written by this process.
    fn is_own(&self, name: &str) -> bool {
        name.strip_prefix(&self.stem())
            .is_some_and(|rest| rest.starts_with(&std::process::id().to_string()))
    }

    /// Files of this naming scheme currently in the directory.
    pub fn files(&self) -> IccResult<Vec<PathBuf>> {
        let stem = self.stem();
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&stem));
            if matches && entry.file_type()?.is_file() {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    /// Files of this naming scheme left by other processes.
    ///
    /// Names starting with the current process id are kept, since other
    /// contexts of this process may still rely on them.
    pub fn stale_files(&self) -> IccResult<Vec<PathBuf>> {
        let mut files = self.files()?;
        files.retain(|path| {
            !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| self.is_own(name))
        });
        Ok(files)
    }

    /// Deletes the stale files of this naming scheme; returns how many went.
    pub fn sweep(&self) -> IccResult<usize> {
        let files = self.stale_files()?;
        for path in &files {
            fs::remove_file(path)?;
        }
        debug!(dir = %self.dir.display(), removed = files.len(), "device link sweep");
        Ok(files.len())
    }
}

/// Reads a device link file back into an engine profile.
pub fn import(path: &Path) -> IccResult<ProfileHandle> {
    let data = fs::read(path).map_err(|e| IccError::serialization(path, e.to_string()))?;
    ProfileHandle::open(&data).map_err(|e| IccError::serialization(path, e.to_string()))
}
