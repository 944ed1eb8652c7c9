//! Locked, atomic replacement of small text files.
//!
//! Every read-modify-write cycle on a configuration file goes through
//! [`FileLock::acquire`] and [`write_atomic`]: the lock serializes concurrent
//! invocations, and the temp-file-then-rename write means a reader only ever
//! sees the old or the new content.

use anyhow::{Context, Result, bail};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use crate::ui::prelude::*;

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive advisory lock on a sidecar `.<name>.lock` file next to the target.
///
/// The lock lives on a separate inode because the target itself is replaced by
/// rename. It is released when the guard is dropped.
pub struct FileLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl FileLock {
    pub fn acquire(target: &Path, timeout: Duration) -> Result<Self> {
        let path = lock_path(&resolve_target(target)?)?;
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("opening lock file {}", path.display()))?;

        let deadline = Instant::now() + timeout;
        loop {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => {
                    emit(
                        Level::Debug,
                        "lock.acquired",
                        &format!("Locked {}", path.display()),
                        None,
                    );
                    return Ok(Self { _lock: lock, path });
                }
                Err((f, errno)) if errno == Errno::EWOULDBLOCK => {
                    if Instant::now() >= deadline {
                        bail!(
                            "timed out after {:?} waiting for lock on {}",
                            timeout,
                            target.display()
                        );
                    }
                    file = f;
                    thread::sleep(RETRY_INTERVAL);
                }
                Err((_, errno)) => {
                    return Err(anyhow::Error::new(errno))
                        .with_context(|| format!("locking {}", path.display()));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Follow symlinks so the lock and the replacement land next to the real
/// file and the link itself stays in place. A target that does not exist yet
/// is used as given.
fn resolve_target(target: &Path) -> Result<PathBuf> {
    match fs::canonicalize(target) {
        Ok(real) => Ok(real),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(target.to_path_buf()),
        Err(e) => Err(e).with_context(|| format!("resolving {}", target.display())),
    }
}

fn lock_path(target: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .with_context(|| format!("{} has no file name", target.display()))?;
    let mut lock_name = std::ffi::OsString::from(".");
    lock_name.push(name);
    lock_name.push(".lock");
    Ok(target.with_file_name(lock_name))
}

/// Replace `target` with `contents` via a temp file in the same directory.
/// The existing file's permissions are carried over.
pub fn write_atomic(target: &Path, contents: &str) -> Result<()> {
    let resolved = resolve_target(target)?;
    let target = resolved.as_path();
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .context("writing temporary file")?;

    if let Ok(meta) = fs::metadata(target) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .context("copying permissions to temporary file")?;
    }
    tmp.as_file().sync_all().context("syncing temporary file")?;
    tmp.persist(target)
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {}", target.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_file_sits_next_to_target() {
        let p = lock_path(Path::new("/usr/local/panel/conf/panel.config")).unwrap();
        assert_eq!(p, PathBuf::from("/usr/local/panel/conf/.panel.config.lock"));
    }

    #[test]
    fn second_lock_times_out_while_first_is_held() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("panel.config");
        fs::write(&target, "ssl=no\n").unwrap();

        let first = FileLock::acquire(&target, Duration::from_secs(1)).unwrap();
        let second = FileLock::acquire(&target, Duration::from_millis(120));
        assert!(second.is_err());

        drop(first);
        assert!(FileLock::acquire(&target, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn write_atomic_replaces_content_and_keeps_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let target = dir.path().join("notifications.ini");
        fs::write(&target, "cpu=90\n").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();

        write_atomic(&target, "cpu=80\n").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "cpu=80\n");
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn write_through_symlink_updates_the_real_file() {
        let dir = tempdir().unwrap();
        let real_dir = dir.path().join("conf");
        fs::create_dir(&real_dir).unwrap();
        let real = real_dir.join("panel.config");
        fs::write(&real, "a=0\n").unwrap();
        let link = dir.path().join("panel.config");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let lock = FileLock::acquire(&link, Duration::from_secs(1)).unwrap();
        assert_eq!(lock.path(), real_dir.canonicalize().unwrap().join(".panel.config.lock"));
        write_atomic(&link, "a=1\n").unwrap();
        drop(lock);

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "a=1\n");
        assert_eq!(fs::read_to_string(&link).unwrap(), "a=1\n");
    }
}
