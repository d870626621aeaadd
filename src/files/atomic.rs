//! Crash-safe whole-file rewrites.
//!
//! Content goes to a sibling temp file which is flushed to disk and then
//! renamed over the target, so readers see either the old or the new file
//! and never a torn one.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

/// Get the temp path used while rewriting `path`.
///
/// The temp path is the original path with `.tmp` appended.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    PathBuf::from(temp)
}

/// Atomically replace `path` with `contents`.
///
/// On failure before the rename the temp file is removed and `path` keeps its
/// previous contents. Once the rename succeeds the write is reported as done;
/// a failed directory flush after that is logged, not returned.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    write_atomic_with(path, contents, sync_parent)
}

fn write_atomic_with(
    path: &Path,
    contents: &[u8],
    sync_dir: fn(&Path) -> io::Result<()>,
) -> io::Result<()> {
    let temp = temp_path_for(path);

    let staged = (|| {
        let mut file = File::create(&temp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, path)
    })();
    if let Err(e) = staged {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    // `path` already holds the new contents here.
    if let Err(e) = sync_dir(path) {
        warn!(path = %path.display(), error = %e, "directory flush failed after rename");
    }
    Ok(())
}

/// Flush the directory entry for `path` so the rename survives a crash.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => File::open(".")?.sync_all(),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
