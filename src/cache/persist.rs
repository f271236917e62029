// Locked, atomic whole-file writes
use crate::error::{Result, SsoError};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exclusive advisory lock on `<file>.lock`, released on drop
pub(crate) struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

pub(crate) fn acquire_lock(path: &Path) -> Result<FileLock> {
    let lock_path = lock_path(path);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| {
            SsoError::Persistence(format!("open lock {}: {}", lock_path.display(), e))
        })?;
    file.lock_exclusive().map_err(|e| {
        SsoError::Persistence(format!("acquire lock {}: {}", lock_path.display(), e))
    })?;
    Ok(FileLock { file })
}

/// Replace `path` with `bytes`: parent dirs are created, the data goes to a
/// temp file in the same directory and is renamed over the target while
/// holding the lock.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| {
        SsoError::Persistence(format!("Unable to create directory {}: {}", parent.display(), e))
    })?;

    let _lock = acquire_lock(path)?;

    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("cache"),
        std::process::id()
    ));

    {
        let mut file = File::create(&tmp)
            .map_err(|e| SsoError::Persistence(format!("create {}: {}", tmp.display(), e)))?;
        file.write_all(bytes)
            .map_err(|e| SsoError::Persistence(format!("write {}: {}", tmp.display(), e)))?;
        file.sync_all()
            .map_err(|e| SsoError::Persistence(format!("sync {}: {}", tmp.display(), e)))?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))
            .map_err(|e| SsoError::Persistence(format!("chmod {}: {}", tmp.display(), e)))?;
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        SsoError::Persistence(format!(
            "rename {} -> {}: {}",
            tmp.display(),
            path.display(),
            e
        ))
    })
}
