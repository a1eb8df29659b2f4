// src/system/signals.rs
#![allow(unsafe_code)]

use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Could not install the {} disposition: {source}", .signal.as_str())]
pub struct SignalError {
    /// The signal whose disposition could not be changed.
    pub signal: Signal,
    #[source]
    pub source: Errno,
}

/// The part a process plays around one dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// The long-lived launcher itself.
    Shell,
    /// A child the shell will wait for. It must die on an interrupt.
    Foreground,
    /// A detached child started by `&`.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ignore,
    Default,
}

impl Disposition {
    fn handler(self) -> SigHandler {
        match self {
            Self::Ignore => SigHandler::SigIgn,
            Self::Default => SigHandler::SigDfl,
        }
    }
}

const SHELL_POLICY: &[(Signal, Disposition)] = &[
    (Signal::SIGINT, Disposition::Ignore),
    (Signal::SIGCHLD, Disposition::Ignore),
];

const FOREGROUND_POLICY: &[(Signal, Disposition)] = &[
    (Signal::SIGINT, Disposition::Default),
    (Signal::SIGCHLD, Disposition::Default),
];

const BACKGROUND_POLICY: &[(Signal, Disposition)] = &[
    (Signal::SIGINT, Disposition::Ignore),
    (Signal::SIGCHLD, Disposition::Default),
];

/// The signal dispositions a process installs for its role.
///
/// The table is fixed per role, so the same call is made at shell startup and
/// inside every child between fork and exec. Applying a policy only touches
/// the process signal table and allocates nothing, which keeps it usable in a
/// freshly forked child.
#[derive(Debug, Clone, Copy)]
pub struct SignalPolicy {
    entries: &'static [(Signal, Disposition)],
}

impl SignalPolicy {
    pub fn for_role(role: ProcessRole) -> Self {
        let entries = match role {
            ProcessRole::Shell => SHELL_POLICY,
            ProcessRole::Foreground => FOREGROUND_POLICY,
            ProcessRole::Background => BACKGROUND_POLICY,
        };
        Self { entries }
    }

    pub fn entries(&self) -> &'static [(Signal, Disposition)] {
        self.entries
    }

    pub fn disposition(&self, signal: Signal) -> Option<Disposition> {
        self.entries
            .iter()
            .find(|(s, _)| *s == signal)
            .map(|(_, d)| *d)
    }

    /// Installs every disposition of the policy, stopping at the first failure.
    pub fn apply(&self) -> Result<(), SignalError> {
        let mut mask = SigSet::empty();
        mask.add(Signal::SIGINT);

        for (signal, disposition) in self.entries {
            let action = SigAction::new(disposition.handler(), SaFlags::SA_RESTART, mask);
            // SAFETY: only SIG_IGN and SIG_DFL are installed; no Rust handler
            // ever runs in signal context.
            unsafe { sigaction(*signal, &action) }.map_err(|source| SignalError {
                signal: *signal,
                source,
            })?;
        }
        Ok(())
    }
}

/// Makes the calling process immune to interrupts and lets the kernel reap its
/// children without an explicit wait.
pub fn install_shell_policy() -> Result<(), SignalError> {
    log::debug!("Installing shell signal policy.");
    SignalPolicy::for_role(ProcessRole::Shell).apply()
}

/// Restores the dispositions a child of the given role runs its program with.
pub fn reset_child_policy(role: ProcessRole) -> Result<(), SignalError> {
    SignalPolicy::for_role(role).apply()
}
