//! Scoped output redirection.
//!
//! [`OutputRedirect::apply`] saves a copy of a descriptor, points the descriptor
//! at a file and hands back a guard. [`OutputRedirect::restore`] puts the original
//! back; dropping the guard does the same on a best-effort basis.

use crate::error::ShellError;
use crate::parser::RedirectSpec;
use log::{debug, warn};
use nix::fcntl::{FcntlArg, fcntl};
use nix::unistd::dup2;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Permission bits for files created by a redirection (before umask).
const CREATE_MODE: u32 = 0o644;

#[derive(Debug)]
pub struct OutputRedirect {
    fd: RawFd,
    saved: Option<OwnedFd>,
    target: PathBuf,
}

impl OutputRedirect {
    /// Redirects `fd` into the file named by `spec`.
    ///
    /// The file is opened write-only, created if missing and truncated if present.
    /// If it cannot be opened, `fd` is left untouched.
    pub fn apply(fd: RawFd, spec: &RedirectSpec) -> Result<Self, ShellError> {
        let file = open_target(&spec.path)?;

        flush_std_streams();
        let saved = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(0)).map_err(ShellError::Redirect)?;
        // SAFETY: F_DUPFD_CLOEXEC returned a fresh descriptor that nothing else owns.
        let saved = unsafe { OwnedFd::from_raw_fd(saved) };

        dup2(file.as_raw_fd(), fd).map_err(ShellError::Redirect)?;
        debug!("fd {} redirected to {}", fd, spec.path.display());

        Ok(Self {
            fd,
            saved: Some(saved),
            target: spec.path.clone(),
        })
    }

    /// Points the descriptor back at what it referred to before [`apply`](Self::apply).
    pub fn restore(mut self) -> Result<(), ShellError> {
        self.restore_saved()
    }

    fn restore_saved(&mut self) -> Result<(), ShellError> {
        let Some(saved) = self.saved.take() else {
            return Ok(());
        };
        flush_std_streams();
        dup2(saved.as_raw_fd(), self.fd).map_err(ShellError::Redirect)?;
        debug!("fd {} restored from {}", self.fd, self.target.display());
        Ok(())
    }
}

impl Drop for OutputRedirect {
    fn drop(&mut self) {
        if let Err(e) = self.restore_saved() {
            warn!("could not restore fd {}: {}", self.fd, e);
        }
    }
}

fn open_target(path: &Path) -> Result<std::fs::File, ShellError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(CREATE_MODE)
        .open(path)
        .map_err(|source| ShellError::RedirectionOpenFailed {
            path: path.to_path_buf(),
            source,
        })
}

fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::fs::File;

    // Work on a private descriptor so the test harness's stdout stays untouched.
    fn scratch_fd(dir: &Path) -> File {
        File::create(dir.join("original.txt")).expect("create original")
    }

    fn write_fd(fd: RawFd, text: &str) {
        // SAFETY: the descriptor stays open for the duration of the write and
        // ManuallyDrop keeps the temporary File from closing it.
        let mut file = std::mem::ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
        file.write_all(text.as_bytes()).expect("write");
    }

    #[test]
    fn test_redirect_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let original = scratch_fd(dir.path());
        let fd = original.as_raw_fd();
        let spec = RedirectSpec {
            path: dir.path().join("out.txt"),
        };

        write_fd(fd, "before\n");
        let guard = OutputRedirect::apply(fd, &spec).expect("apply");
        write_fd(fd, "redirected\n");
        guard.restore().expect("restore");
        write_fd(fd, "after\n");

        assert_eq!(fs::read_to_string(&spec.path).unwrap(), "redirected\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("original.txt")).unwrap(),
            "before\nafter\n"
        );
    }

    #[test]
    fn test_target_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let original = scratch_fd(dir.path());
        let spec = RedirectSpec {
            path: dir.path().join("out.txt"),
        };
        fs::write(&spec.path, "old contents that are longer\n").unwrap();

        let guard = OutputRedirect::apply(original.as_raw_fd(), &spec).unwrap();
        write_fd(original.as_raw_fd(), "new\n");
        drop(guard);

        assert_eq!(fs::read_to_string(&spec.path).unwrap(), "new\n");
    }

    #[test]
    fn test_open_failure_leaves_fd_alone() {
        let dir = tempfile::tempdir().unwrap();
        let original = scratch_fd(dir.path());
        let spec = RedirectSpec {
            path: dir.path().join("missing-dir").join("out.txt"),
        };

        let err = OutputRedirect::apply(original.as_raw_fd(), &spec).unwrap_err();
        assert!(matches!(err, ShellError::RedirectionOpenFailed { .. }));

        write_fd(original.as_raw_fd(), "still here\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("original.txt")).unwrap(),
            "still here\n"
        );
    }
}
