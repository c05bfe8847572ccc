//! Cross-process guard around the display.
//!
//! The in-process session is already serialised, but two push2-sync processes
//! would still interleave frames on the same endpoint. The holder writes its
//! pid into the lock file so a second instance can say who owns the display.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("display is in use by another push2-sync instance (pid {0})")]
    Held(u32),
    #[error("display is in use by another push2-sync instance")]
    HeldUnknown,
    #[error("could not determine lock file path")]
    NoPath,
    #[error("lock file error: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive claim on the display for this process. Released when dropped.
#[derive(Debug)]
pub struct DisplayLock {
    _file: File,
    path: PathBuf,
}

impl DisplayLock {
    /// Claim the display at the default lock path
    pub fn acquire() -> Result<Self, LockError> {
        let path = ProjectDirs::from("", "", "push2-sync")
            .map(|dirs| dirs.config_dir().join("display.lock"))
            .ok_or(LockError::NoPath)?;
        Self::acquire_at(&path)
    }

    /// Claim the display using the lock file at `path`
    pub fn acquire_at(path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // no truncate: a losing instance still needs to read the holder's pid
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock().is_err() {
            return Err(holder(&mut file).map_or(LockError::HeldUnknown, LockError::Held));
        }

        file.set_len(0)?;
        file.rewind()?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }
}

/// Pid recorded by the current holder, if readable
fn holder(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

impl Drop for DisplayLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("push2-sync-{}", std::process::id()))
            .join(format!("{name}.lock"))
    }

    #[test]
    fn records_holder_pid() {
        let path = lock_path("pid");
        let _lock = DisplayLock::acquire_at(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn second_claim_names_holder() {
        let path = lock_path("contended");
        let _lock = DisplayLock::acquire_at(&path).unwrap();
        match DisplayLock::acquire_at(&path).unwrap_err() {
            LockError::Held(pid) => assert_eq!(pid, std::process::id()),
            // platforms with mandatory locks refuse the read
            LockError::HeldUnknown => {},
            e => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn drop_releases_display() {
        let path = lock_path("released");
        drop(DisplayLock::acquire_at(&path).unwrap());
        assert!(!path.exists());
        let _lock = DisplayLock::acquire_at(&path).unwrap();
    }

    #[test]
    fn stale_pid_is_replaced() {
        let path = lock_path("stale");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "4294967295\nleftover bytes from a longer file\n").unwrap();
        let _lock = DisplayLock::acquire_at(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format!("{}\n", std::process::id()));
    }
}
