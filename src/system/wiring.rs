// src/system/wiring.rs

use crate::system::signals::ProcessRole;
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::unistd::{close, dup2};
use std::fs::OpenOptions;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use thiserror::Error;

const STDIN_FD: RawFd = libc::STDIN_FILENO;
const STDOUT_FD: RawFd = libc::STDOUT_FILENO;

#[derive(Error, Debug)]
pub enum WiringError {
    #[error("Could not create a pipe: {0}")]
    Pipe(#[source] Errno),
    #[error("Could not open redirect target '{path}': {source}")]
    RedirectTarget {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// How the children of one dispatch call are connected to each other and to files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WiringPlan {
    /// A single foreground child with the shell's own descriptors.
    None,
    /// Two foreground children; the first one's stdout feeds the second one's stdin.
    PipeToNext,
    /// A single foreground child whose stdout is the target file.
    RedirectToFile { path: PathBuf, mode: u32 },
    /// A single background child that is never waited for.
    Detach,
}

/// The descriptors one child takes over as its stdin and stdout.
///
/// Both are owned by the parent until the child has been forked, then dropped.
#[derive(Debug, Default)]
pub struct StageEndpoints {
    pub stdin: Option<OwnedFd>,
    pub stdout: Option<OwnedFd>,
}

impl StageEndpoints {
    pub fn iter(&self) -> impl Iterator<Item = &OwnedFd> {
        self.stdin.iter().chain(self.stdout.iter())
    }
}

impl WiringPlan {
    pub fn stage_count(&self) -> usize {
        match self {
            Self::PipeToNext => 2,
            Self::None | Self::RedirectToFile { .. } | Self::Detach => 1,
        }
    }

    pub fn role(&self) -> ProcessRole {
        match self {
            Self::Detach => ProcessRole::Background,
            Self::None | Self::PipeToNext | Self::RedirectToFile { .. } => ProcessRole::Foreground,
        }
    }

    /// Whether the parent blocks until its children terminate.
    pub fn waits(&self) -> bool {
        !matches!(self, Self::Detach)
    }

    /// Opens every endpoint the plan needs, one `StageEndpoints` per stage, in fork order.
    ///
    /// Everything opened here is owned; if a later step fails, dropping the
    /// returned value closes it.
    pub fn open(&self) -> Result<Vec<StageEndpoints>, WiringError> {
        match self {
            Self::None | Self::Detach => Ok(vec![StageEndpoints::default()]),
            Self::PipeToNext => {
                let (read, write) = cloexec_pipe().map_err(WiringError::Pipe)?;
                log::debug!(
                    "Opened pipe (read: {}, write: {}).",
                    read.as_raw_fd(),
                    write.as_raw_fd()
                );
                Ok(vec![
                    StageEndpoints {
                        stdin: None,
                        stdout: Some(write),
                    },
                    StageEndpoints {
                        stdin: Some(read),
                        stdout: None,
                    },
                ])
            }
            Self::RedirectToFile { path, mode } => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    // Content past the end of the new output is kept.
                    .truncate(false)
                    .mode(*mode)
                    .open(path)
                    .map_err(|source| WiringError::RedirectTarget {
                        path: path.display().to_string(),
                        source,
                    })?;
                log::debug!("Opened redirect target '{}'.", path.display());
                Ok(vec![StageEndpoints {
                    stdin: None,
                    stdout: Some(OwnedFd::from(file)),
                }])
            }
        }
    }
}

/// Descriptor moves a child performs between fork and exec.
///
/// `foreign` lists endpoints the parent still holds for other stages; the
/// child closes them so a pipe reader never waits on a writer it owns itself.
#[derive(Debug)]
pub struct ChildDescriptors<'a> {
    stdin: Option<BorrowedFd<'a>>,
    stdout: Option<BorrowedFd<'a>>,
    foreign: Vec<BorrowedFd<'a>>,
}

impl<'a> ChildDescriptors<'a> {
    pub fn new(
        endpoints: &'a StageEndpoints,
        foreign: impl IntoIterator<Item = BorrowedFd<'a>>,
    ) -> Self {
        Self {
            stdin: endpoints.stdin.as_ref().map(AsFd::as_fd),
            stdout: endpoints.stdout.as_ref().map(AsFd::as_fd),
            foreign: foreign.into_iter().collect(),
        }
    }

    /// Leaves the child's standard descriptors as inherited.
    pub fn inherit() -> Self {
        Self {
            stdin: None,
            stdout: None,
            foreign: Vec::new(),
        }
    }

    pub fn foreign(&self) -> &[BorrowedFd<'a>] {
        &self.foreign
    }

    /// Applies the moves in the current process. Only meant for a freshly forked
    /// child: it rewires fd 0 and 1 and allocates nothing.
    pub fn apply(&self) -> Result<(), Errno> {
        if let Some(fd) = self.stdin {
            move_onto(fd, STDIN_FD)?;
        }
        if let Some(fd) = self.stdout {
            move_onto(fd, STDOUT_FD)?;
        }
        for fd in &self.foreign {
            close(fd.as_raw_fd())?;
        }
        Ok(())
    }
}

/// Creates a pipe whose ends are closed on exec, so a program forked from
/// another thread never inherits a writer that keeps the reader waiting.
#[cfg(not(target_vendor = "apple"))]
fn cloexec_pipe() -> Result<(OwnedFd, OwnedFd), Errno> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
}

#[cfg(target_vendor = "apple")]
fn cloexec_pipe() -> Result<(OwnedFd, OwnedFd), Errno> {
    let (read, write) = nix::unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}

/// Duplicates `source` onto `target` and closes the original.
///
/// `dup2` leaves the close-on-exec flag off the new descriptor.
fn move_onto(source: BorrowedFd<'_>, target: RawFd) -> Result<(), Errno> {
    let raw = source.as_raw_fd();
    if raw == target {
        // Already in place; closing it would undo the wiring.
        fcntl(raw, FcntlArg::F_SETFD(FdFlag::empty()))?;
        return Ok(());
    }
    dup2(raw, target)?;
    close(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::{Read, Write};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn test_stage_counts_and_roles() {
        assert_eq!(WiringPlan::None.stage_count(), 1);
        assert_eq!(WiringPlan::PipeToNext.stage_count(), 2);
        assert_eq!(WiringPlan::Detach.role(), ProcessRole::Background);
        assert_eq!(WiringPlan::PipeToNext.role(), ProcessRole::Foreground);
        assert!(!WiringPlan::Detach.waits());
        assert!(WiringPlan::None.waits());
    }

    #[test]
    fn test_pipe_plan_hands_write_end_to_first_stage() {
        // --- Execute ---
        let mut stages = WiringPlan::PipeToNext.open().unwrap();
        assert_eq!(stages.len(), 2);
        let reader = stages.pop().unwrap();
        let writer = stages.pop().unwrap();

        assert!(writer.stdin.is_none());
        assert!(reader.stdout.is_none());

        // --- Assert: bytes written on stage one's stdout arrive on stage two's stdin ---
        let mut write_end = File::from(writer.stdout.unwrap());
        write_end.write_all(b"through the pipe").unwrap();
        drop(write_end);

        let mut received = String::new();
        File::from(reader.stdin.unwrap())
            .read_to_string(&mut received)
            .unwrap();
        assert_eq!(received, "through the pipe");
    }

    #[test]
    fn test_pipe_endpoints_are_closed_on_exec() {
        // A program forked elsewhere in the process must not inherit either end.
        let stages = WiringPlan::PipeToNext.open().unwrap();

        for fd in stages.iter().flat_map(StageEndpoints::iter) {
            let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFD).unwrap();
            assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
        }
    }

    #[test]
    fn test_redirect_plan_creates_missing_file_with_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("created.txt");
        let plan = WiringPlan::RedirectToFile {
            path: path.clone(),
            mode: 0o600,
        };

        let stages = plan.open().unwrap();

        assert_eq!(stages.len(), 1);
        assert!(path.exists());
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_redirect_plan_does_not_truncate() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let path = dir.path().join("seeded.txt");
        fs::write(&path, "abcdefgh\n").unwrap();
        let plan = WiringPlan::RedirectToFile {
            path: path.clone(),
            mode: 0o644,
        };

        // --- Execute ---
        let mut stages = plan.open().unwrap();
        let endpoints = stages.pop().unwrap();
        let mut file = File::from(endpoints.stdout.unwrap());
        file.write_all(b"hi\n").unwrap();
        drop(file);

        // --- Assert ---
        assert_eq!(fs::read_to_string(&path).unwrap(), "hi\ndefgh\n");
    }

    #[test]
    fn test_redirect_plan_reports_unopenable_target() {
        let dir = tempdir().unwrap();
        let plan = WiringPlan::RedirectToFile {
            path: dir.path().join("missing-dir").join("out.txt"),
            mode: 0o644,
        };

        let result = plan.open();

        assert!(matches!(result, Err(WiringError::RedirectTarget { .. })));
    }

    #[test]
    fn test_child_descriptors_collect_foreign_endpoints() {
        let stages = WiringPlan::PipeToNext.open().unwrap();
        let (first, rest) = stages.split_first().unwrap();

        let descriptors = ChildDescriptors::new(
            first,
            rest.iter()
                .flat_map(StageEndpoints::iter)
                .map(AsFd::as_fd),
        );

        assert_eq!(descriptors.foreign().len(), 1);
        assert!(ChildDescriptors::inherit().foreign().is_empty());
    }
}
