// src/system/launcher.rs
#![allow(unsafe_code)]

use crate::constants::EXEC_FAILURE_STATUS;
use crate::system::signals::{self, ProcessRole};
use crate::system::wiring::ChildDescriptors;
use nix::errno::Errno;
use nix::unistd::{ForkResult, Pid, fork, write};
use std::ffi::{CString, c_char};
use std::iter;
use std::os::fd::AsFd;

const CHILD_SIGNALS_FAILED: &str = concat!(t!("child.error.signals"), "\n");

/// A program and its argument vector, fully prepared before forking.
///
/// The child side of a fork must not allocate, so the C strings, the
/// null-terminated pointer array handed to `execvp` and every diagnostic the
/// child could print are built here, in the parent.
#[derive(Debug)]
pub struct ExecImage {
    name: String,
    argv: Vec<CString>,
    /// Points into `argv`; the heap buffers of a `CString` never move.
    argv_ptrs: Vec<*const c_char>,
    rejected: Option<Errno>,
    exec_failure: String,
    wiring_failure: String,
}

impl ExecImage {
    pub fn new(command: &[String]) -> Self {
        let name = command.first().cloned().unwrap_or_default();

        // A token with an interior NUL can never reach execvp; the child reports
        // it like any other failed exec.
        let (argv, rejected) = match command
            .iter()
            .map(|token| CString::new(token.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(argv) if argv.is_empty() => (argv, Some(Errno::ENOENT)),
            Ok(argv) => (argv, None),
            Err(_) => (Vec::new(), Some(Errno::EINVAL)),
        };

        let exec_failure = if name.is_empty() {
            format!("{}: ", t!("exec.error.empty"))
        } else {
            format!(t!("exec.error.failed"), name = name)
        };
        let wiring_failure = format!(t!("child.error.wiring"), name = name);
        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(iter::once(std::ptr::null()))
            .collect();

        Self {
            name,
            argv,
            argv_ptrs,
            rejected,
            exec_failure,
            wiring_failure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    pub fn is_runnable(&self) -> bool {
        self.rejected.is_none()
    }

    /// Replaces the current process image. Only returns on failure.
    fn replace_process(&self) -> Errno {
        if let Some(errno) = self.rejected {
            return errno;
        }
        match self.argv_ptrs.first() {
            Some(program) if !program.is_null() => {
                // SAFETY: `argv_ptrs` is null-terminated and every entry points
                // into `argv`, which lives as long as `self`.
                unsafe { libc::execvp(*program, self.argv_ptrs.as_ptr()) };
                Errno::last()
            }
            _ => Errno::ENOENT,
        }
    }
}

/// Forks a child that runs `image` with the dispositions of `role` and the
/// given descriptor wiring.
///
/// Returns the child's pid in the parent. The child never returns: it either
/// becomes the requested program or exits with `EXEC_FAILURE_STATUS`.
pub fn spawn(
    image: &ExecImage,
    role: ProcessRole,
    descriptors: &ChildDescriptors<'_>,
) -> Result<Pid, Errno> {
    // SAFETY: until exec or `_exit`, the child only installs signal
    // dispositions, moves descriptors and writes bytes prepared by the parent.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => {
            log::debug!("Forked {:?} child {} for '{}'.", role, child, image.name());
            Ok(child)
        }
        ForkResult::Child => run_child(image, role, descriptors),
    }
}

fn run_child(image: &ExecImage, role: ProcessRole, descriptors: &ChildDescriptors<'_>) -> ! {
    if signals::reset_child_policy(role).is_err() {
        report(&[CHILD_SIGNALS_FAILED]);
        terminate();
    }

    if let Err(errno) = descriptors.apply() {
        report(&[image.wiring_failure.as_str(), errno.desc(), "\n"]);
        terminate();
    }

    let errno = image.replace_process();
    report(&[image.exec_failure.as_str(), errno.desc(), "\n"]);
    terminate()
}

/// Writes straight to fd 2, bypassing the std stderr lock another thread of
/// the parent may have held at fork time.
fn report(parts: &[&str]) {
    let stderr = std::io::stderr();
    for part in parts {
        // Nothing useful can be done about a failed diagnostic write.
        let _ = write(stderr.as_fd(), part.as_bytes());
    }
}

fn terminate() -> ! {
    // SAFETY: `_exit` skips atexit handlers and stdio flushing, so buffers
    // inherited from the parent are never written twice.
    unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_image_keeps_program_and_arguments_in_order() {
        let image = ExecImage::new(&tokens(&["wc", "-l", "notes.txt"]));

        assert_eq!(image.name(), "wc");
        assert!(image.is_runnable());
        let argv: Vec<&str> = image.argv().iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(argv, ["wc", "-l", "notes.txt"]);
    }

    #[test]
    fn test_exec_pointer_array_is_built_before_fork() {
        let image = ExecImage::new(&tokens(&["wc", "-l"]));

        assert_eq!(image.argv_ptrs.len(), 3);
        assert_eq!(image.argv_ptrs.last(), Some(&std::ptr::null()));
        for (ptr, arg) in image.argv_ptrs.iter().zip(image.argv()) {
            assert_eq!(*ptr, arg.as_ptr());
        }
    }

    #[test]
    fn test_failure_diagnostic_names_the_program() {
        let image = ExecImage::new(&tokens(&["nonexistentcmd123"]));

        assert!(image.exec_failure.contains("nonexistentcmd123"));
        assert!(image.wiring_failure.contains("nonexistentcmd123"));
    }

    #[test]
    fn test_empty_command_is_not_runnable() {
        let image = ExecImage::new(&[]);

        assert!(!image.is_runnable());
        assert_eq!(image.name(), "");
        assert_eq!(image.replace_process(), Errno::ENOENT);
    }

    #[test]
    fn test_interior_nul_is_rejected_before_fork() {
        let image = ExecImage::new(&tokens(&["echo", "bad\0token"]));

        assert!(!image.is_runnable());
        assert!(image.argv().is_empty());
        // Rejected images report without ever calling execvp.
        assert_eq!(image.replace_process(), Errno::EINVAL);
    }
}
