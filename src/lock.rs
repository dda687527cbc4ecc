//! File locking and atomic writes for the planner data directory.
//!
//! Every read-modify-write of `planner.json` and every append to
//! `activity.jsonl` happens while holding an exclusive lock on a sidecar
//! `.lock` file next to the data file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// How long a command waits for another dayplan process to finish.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Exclusive lock on a data file's sidecar, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Lock `data_file` through its sidecar, waiting at most `timeout_ms`.
    pub fn for_data_file(data_file: &Path, timeout_ms: u64) -> Result<Self> {
        Self::acquire(&sidecar_path(data_file), timeout_ms)
    }

    /// Wait up to `timeout_ms` for an exclusive lock on `path`.
    fn acquire(path: &Path, timeout_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(err) if !is_contended(&err) => return Err(Error::Io(err)),
                Err(_) if Instant::now() >= deadline => {
                    tracing::warn!(path = %path.display(), timeout_ms, "lock wait timed out");
                    return Err(Error::LockFailed(path.to_path_buf()));
                }
                Err(_) => std::thread::sleep(RETRY_INTERVAL),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn is_contended(err: &io::Error) -> bool {
    // Windows surfaces sharing (32) and lock (33) violations as raw OS errors.
    err.kind() == io::ErrorKind::WouldBlock
        || (cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33)))
}

/// `planner.json` -> `planner.json.lock`.
pub fn sidecar_path(data_file: &Path) -> PathBuf {
    let mut name = data_file.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Replace `path` by writing a pid-suffixed sibling and renaming it over.
///
/// Does not lock; callers coordinate through [`FileLock`].
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(format!(".{}.tmp", std::process::id()));
    let staging = PathBuf::from(staging);

    let mut file = File::create(&staging)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&staging, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn second_holder_times_out_until_first_drops() {
        let temp_dir = TempDir::new().unwrap();
        let data_file = temp_dir.path().join("activity.jsonl");

        let held = FileLock::for_data_file(&data_file, 1000).unwrap();
        assert!(temp_dir.path().join("activity.jsonl.lock").exists());
        assert!(matches!(
            FileLock::for_data_file(&data_file, 50),
            Err(Error::LockFailed(_))
        ));

        drop(held);
        assert!(FileLock::for_data_file(&data_file, 50).is_ok());
    }

    #[test]
    fn write_atomic_replaces_contents_and_leaves_no_staging_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("nested").join("planner.json");

        write_atomic(&file_path, b"{\"tasks\":[]}").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"tasks\":[]}");

        write_atomic(&file_path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{}");

        let names: Vec<_> = fs::read_dir(file_path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("planner.json")]);
    }

    #[test]
    fn sidecar_appends_lock_suffix() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/.dayplan/planner.json")),
            PathBuf::from("/tmp/.dayplan/planner.json.lock")
        );
    }

    #[test]
    fn one_holder_at_a_time() {
        let temp_dir = TempDir::new().unwrap();
        let data_file = temp_dir.path().join("planner.json");

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let in_lock = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let in_lock = Arc::clone(&in_lock);
                let max_concurrent = Arc::clone(&max_concurrent);
                let data_file = data_file.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let _lock = FileLock::for_data_file(&data_file, 5000).unwrap();
                    let current = in_lock.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(current, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    in_lock.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }
}
