// src/core/orchestrator.rs

use crate::core::router::Invocation;
use crate::system::launcher::{self, ExecImage};
use crate::system::signals::ProcessRole;
use crate::system::wiring::{ChildDescriptors, StageEndpoints, WiringError, WiringPlan};
use nix::errno::Errno;
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use std::collections::VecDeque;
use std::os::fd::AsFd;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that leave the shell without a child to isolate them in.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Wiring(#[from] WiringError),
    #[error("Could not fork a process for '{command}': {source}")]
    Fork {
        command: String,
        #[source]
        source: Errno,
    },
    #[error("Redirect operator is missing its target file.")]
    MissingRedirectTarget,
}

/// One child to create: what it runs, its signal role and the endpoints it takes over.
#[derive(Debug)]
struct Stage {
    image: ExecImage,
    role: ProcessRole,
    endpoints: StageEndpoints,
}

/// A forked child the parent may still have to wait for.
#[derive(Debug)]
struct Launched {
    pid: Pid,
    name: String,
}

/// Translates an invocation into its wiring plan and the commands, one per stage.
fn plan_for(
    invocation: Invocation,
    redirect_mode: u32,
) -> Result<(WiringPlan, Vec<Vec<String>>), DispatchError> {
    let planned = match invocation {
        Invocation::Regular { command } => (WiringPlan::None, vec![command]),
        Invocation::Background { command } => (WiringPlan::Detach, vec![command]),
        Invocation::Pipe { writer, reader } => (WiringPlan::PipeToNext, vec![writer, reader]),
        Invocation::Redirect { command, target } => {
            let path = target.ok_or(DispatchError::MissingRedirectTarget)?;
            (
                WiringPlan::RedirectToFile {
                    path: PathBuf::from(path),
                    mode: redirect_mode,
                },
                vec![command],
            )
        }
    };
    Ok(planned)
}

/// Runs an invocation end to end: open endpoints, fork every stage, wait if the
/// plan is a foreground one.
///
/// `Ok(false)` means a wait failed; the failure has been reported and the
/// caller may carry on. Child exit statuses never influence the result.
pub fn orchestrate(invocation: Invocation, redirect_mode: u32) -> Result<bool, DispatchError> {
    let (plan, commands) = plan_for(invocation, redirect_mode)?;
    debug_assert_eq!(commands.len(), plan.stage_count());

    let role = plan.role();
    let stages: Vec<Stage> = commands
        .iter()
        .zip(plan.open()?)
        .map(|(command, endpoints)| Stage {
            image: ExecImage::new(command),
            role,
            endpoints,
        })
        .collect();

    let launched = launch_all(stages)?;

    if !plan.waits() {
        for child in &launched {
            log::debug!("'{}' (pid {}) left running in the background.", child.name, child.pid);
        }
        return Ok(true);
    }
    Ok(reap_all(&launched))
}

/// Forks the stages in order.
///
/// Each stage's endpoints are dropped right after its fork, so the parent's
/// copy of a pipe's write end is already closed when the reader is forked. A
/// child closes every endpoint still reserved for a later stage.
fn launch_all(stages: Vec<Stage>) -> Result<Vec<Launched>, DispatchError> {
    let mut pending: VecDeque<Stage> = stages.into();
    let mut launched = Vec::with_capacity(pending.len());

    while let Some(stage) = pending.pop_front() {
        let foreign = pending
            .iter()
            .flat_map(|later| later.endpoints.iter())
            .map(AsFd::as_fd);
        let descriptors = ChildDescriptors::new(&stage.endpoints, foreign);

        let pid = launcher::spawn(&stage.image, stage.role, &descriptors).map_err(|source| {
            DispatchError::Fork {
                command: stage.image.name().to_string(),
                source,
            }
        })?;

        launched.push(Launched {
            pid,
            name: stage.image.name().to_string(),
        });
    }

    Ok(launched)
}

/// Waits for every child in fork order, stopping at the first failed wait.
fn reap_all(launched: &[Launched]) -> bool {
    launched.iter().all(wait_for)
}

fn wait_for(child: &Launched) -> bool {
    loop {
        match waitpid(child.pid, None) {
            Ok(status) => {
                log::debug!("'{}' (pid {}) finished: {:?}", child.name, child.pid, status);
                return true;
            }
            Err(Errno::EINTR) => continue,
            // Already reaped by the kernel under the shell's SIGCHLD policy.
            Err(Errno::ECHILD) => {
                log::debug!("'{}' (pid {}) was reaped automatically.", child.name, child.pid);
                return true;
            }
            Err(errno) => {
                log::warn!("Waiting for pid {} failed: {}", child.pid, errno);
                eprintln!(
                    t!("wait.error.failed"),
                    name = child.name,
                    pid = child.pid,
                    reason = errno.desc()
                );
                return false;
            }
        }
    }
}
