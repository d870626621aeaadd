//! Advisory lock files for the history store.
//!
//! A lock is a JSON file `<resource>.lock` holding the owner's PID and start
//! time. It is published with a hard link so the file appears complete or not
//! at all. Locks whose owner is no longer running are stale and get reclaimed.
//!
//! Reclaiming and releasing never delete the lock path directly. The file is
//! first renamed to a private name and only deleted if it still holds the
//! contents the caller expected; otherwise it is linked back into place.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Metadata stored in a lock file to identify the owning process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub started: String,
}

/// Errors from acquiring or verifying a lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{} is locked by process {} (since {})", path.display(), info.pid, info.started)]
    Held { path: PathBuf, info: LockInfo },

    #[error("Lock {} is no longer owned by this process", path.display())]
    Lost { path: PathBuf },

    #[error("Lock file {} is unreadable; remove it if no smig process is running", path.display())]
    Malformed { path: PathBuf },

    #[error("Lock file I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Get the lock file path for a given resource.
///
/// The lock path is the original path with `.lock` appended.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut lock = path.as_os_str().to_owned();
    lock.push(".lock");
    PathBuf::from(lock)
}

/// Read lock info if the lock file exists and the owning PID is still alive.
///
/// Returns `None` if the lock file is missing, malformed, or the PID is dead.
pub fn read_lock(path: &Path) -> Option<LockInfo> {
    let info = read_lock_file(&lock_path_for(path))?;
    is_pid_alive(info.pid).then_some(info)
}

fn read_lock_file(lock_path: &Path) -> Option<LockInfo> {
    let contents = fs::read_to_string(lock_path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Read a lock file strictly: missing is `None`, unparseable is an error.
fn load_lock_file(lock_path: &Path) -> Result<Option<LockInfo>, LockError> {
    let contents = match fs::read_to_string(lock_path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LockError::Io {
                path: lock_path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|_| LockError::Malformed {
            path: lock_path.to_path_buf(),
        })
}

/// Attempts at publishing before giving up to a competing acquirer.
const MAX_ATTEMPTS: usize = 3;

/// An acquired lock; released when dropped.
#[derive(Debug)]
pub struct AdvisoryLock {
    lock_path: PathBuf,
    info: LockInfo,
}

impl AdvisoryLock {
    /// Acquire the lock guarding `path`.
    ///
    /// A lock naming a dead process is reclaimed. A live owner yields
    /// [`LockError::Held`] and a lock file that does not parse yields
    /// [`LockError::Malformed`]; callers should report either rather than
    /// retry.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let lock_path = lock_path_for(path);
        let info = LockInfo {
            pid: std::process::id(),
            started: chrono::Utc::now().to_rfc3339(),
        };
        let io_err = |source: io::Error| LockError::Io {
            path: lock_path.clone(),
            source,
        };

        let mut last_owner = None;
        for _ in 0..MAX_ATTEMPTS {
            match publish(&lock_path, &info) {
                Ok(()) => {
                    debug!(lock = %lock_path.display(), "acquired lock");
                    return Ok(Self { lock_path, info });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(source) => return Err(io_err(source)),
            }

            // Gone between our publish and this read: just try again.
            let Some(owner) = load_lock_file(&lock_path)? else {
                continue;
            };
            if is_pid_alive(owner.pid) {
                return Err(LockError::Held {
                    path: lock_path,
                    info: owner,
                });
            }

            match take_if_matches(&lock_path, &owner).map_err(io_err)? {
                Take::Taken => {
                    warn!(lock = %lock_path.display(), pid = owner.pid, "removed stale lock")
                }
                Take::Absent => {}
                Take::Replaced(current) => {
                    return Err(LockError::Held {
                        path: lock_path,
                        info: current,
                    })
                }
            }
            last_owner = Some(owner);
        }

        Err(LockError::Held {
            info: load_lock_file(&lock_path)
                .ok()
                .flatten()
                .or(last_owner)
                .unwrap_or(LockInfo {
                    pid: 0,
                    started: "unknown".to_string(),
                }),
            path: lock_path,
        })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Check that the lock file still names this process.
    pub fn verify(&self) -> Result<(), LockError> {
        match read_lock_file(&self.lock_path) {
            Some(current) if current == self.info => Ok(()),
            _ => Err(LockError::Lost {
                path: self.lock_path.clone(),
            }),
        }
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        match take_if_matches(&self.lock_path, &self.info) {
            Ok(Take::Taken) => debug!(lock = %self.lock_path.display(), "released lock"),
            Ok(_) => warn!(lock = %self.lock_path.display(), "lock was taken over before release"),
            Err(e) => warn!(lock = %self.lock_path.display(), error = %e, "could not release lock"),
        }
    }
}

/// Outcome of [`take_if_matches`].
#[derive(Debug, PartialEq, Eq)]
enum Take {
    /// The file held the expected contents and has been deleted.
    Taken,
    /// There was no lock file.
    Absent,
    /// Someone else's lock was there; it has been put back.
    Replaced(LockInfo),
}

/// Delete the lock file only if it still holds `expected`.
///
/// The file is renamed to a name private to this process before it is read,
/// so a lock published by another process in the meantime is never deleted
/// by mistake: it is hard-linked back instead.
fn take_if_matches(lock_path: &Path, expected: &LockInfo) -> io::Result<Take> {
    let mut grave = lock_path.as_os_str().to_owned();
    grave.push(format!(".{}.stale", std::process::id()));
    let grave = PathBuf::from(grave);

    match fs::rename(lock_path, &grave) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Take::Absent),
        Err(e) => return Err(e),
    }

    let found = read_lock_file(&grave);
    if found.as_ref() == Some(expected) {
        fs::remove_file(&grave)?;
        return Ok(Take::Taken);
    }

    // Not what we expected; put it back. If a third process has published
    // meanwhile the displaced owner will see `Lost` on its next verify.
    let restored = fs::hard_link(&grave, lock_path).or_else(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            Ok(())
        } else {
            Err(e)
        }
    });
    let _ = fs::remove_file(&grave);
    restored?;
    Ok(Take::Replaced(found.unwrap_or(LockInfo {
        pid: 0,
        started: "unknown".to_string(),
    })))
}

/// Write `info` to a private temp file and hard-link it into place.
///
/// `hard_link` fails with `AlreadyExists` when the lock is taken, and a
/// successful link exposes fully written contents.
fn publish(lock_path: &Path, info: &LockInfo) -> io::Result<()> {
    let mut temp = lock_path.as_os_str().to_owned();
    temp.push(format!(".{}.tmp", info.pid));
    let temp = PathBuf::from(temp);

    let json = serde_json::to_string(info).map_err(io::Error::other)?;
    let result = (|| {
        let mut file = fs::File::create(&temp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::hard_link(&temp, lock_path)
    })();
    let _ = fs::remove_file(&temp);
    result
}

/// Check whether a process with the given PID is still running.
///
/// Uses `kill(pid, 0)` which checks for process existence without sending a signal.
/// Returns `true` if the process exists (including ones owned by another user, which yield EPERM).
#[cfg(unix)]
pub(crate) fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    // SAFETY: kill with signal 0 only checks process existence, no signal is sent.
    let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if ret == 0 {
        return true;
    }
    // EPERM means the process exists but belongs to another user
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub(crate) fn is_pid_alive(_pid: u32) -> bool {
    false
}
