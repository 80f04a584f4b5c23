//! Durable file helpers: atomic replace and advisory locking.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace `path` with `bytes` atomically.
///
/// Writes a temp file in the same directory, fsyncs it, renames it over the
/// target, then fsyncs the directory so the rename itself is durable. Readers
/// see either the old document or the new one, never a torn write.
pub fn write_atomic(
    path: &Path,
    bytes: &[u8],
) -> io::Result<()>
{
    let dir = match path.parent()
    {
        Some(p) if !p
            .as_os_str()
            .is_empty() =>
        {
            p
        }
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file()
        .sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)?;

    let _ = sync_dir(dir);
    Ok(())
}

/// Run `f` while holding an exclusive advisory lock on `lock_path`
pub fn with_exclusive_lock<T, E>(
    lock_path: &Path,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<io::Error>,
{
    let mut lock = fd_lock::RwLock::new(open_lock_file(lock_path)?);
    let _guard = lock.write()?;
    f()
}

/// Run `f` while holding a shared advisory lock on `lock_path`
pub fn with_shared_lock<T, E>(
    lock_path: &Path,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<io::Error>,
{
    let lock = fd_lock::RwLock::new(open_lock_file(lock_path)?);
    let _guard = lock.read()?;
    f()
}

fn open_lock_file(lock_path: &Path) -> io::Result<File>
{
    if let Some(parent) = lock_path.parent()
        && !parent
            .as_os_str()
            .is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
}

/// Cross-platform directory fsync helper.
#[cfg(unix)]
fn sync_dir(p: &Path) -> io::Result<()>
{
    use std::os::unix::fs::OpenOptionsExt;
    let f = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECTORY)
        .open(p)?;
    f.sync_all()
}

#[cfg(windows)]
fn sync_dir(_p: &Path) -> io::Result<()>
{
    // Windows does not expose a reliable directory fsync; best-effort no-op.
    Ok(())
}
