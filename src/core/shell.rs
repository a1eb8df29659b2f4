// src/core/shell.rs

use crate::constants::REDIRECT_FILE_MODE;
use crate::core::orchestrator::{self, DispatchError};
use crate::core::router;
use crate::system::signals::{self, SignalError};

/// Settings that stay fixed for the lifetime of a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOptions {
    /// Permission bits requested when `>` creates its target.
    pub redirect_mode: u32,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            redirect_mode: REDIRECT_FILE_MODE,
        }
    }
}

/// The dispatch entry point for callers that already hold tokenized command lines.
///
/// ```no_run
/// use jobline::{Shell, ShellOptions};
///
/// let shell = Shell::startup(ShellOptions::default())?;
/// let tokens = ["ls", "|", "wc", "-l"].map(String::from).to_vec();
/// assert!(shell.dispatch(tokens)?);
/// shell.teardown();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Shell {
    options: ShellOptions,
}

impl Shell {
    /// Creates a shell without touching the process signal table.
    ///
    /// Foreground children are still waited for explicitly. Background
    /// children are not: without the auto-reap policy of [`Shell::startup`]
    /// each one stays a zombie until the embedding process reaps it.
    pub fn new(options: ShellOptions) -> Self {
        Self { options }
    }

    /// Installs the shell signal policy and creates the shell. Call once per process.
    pub fn startup(options: ShellOptions) -> Result<Self, SignalError> {
        signals::install_shell_policy()?;
        Ok(Self::new(options))
    }

    pub fn options(&self) -> &ShellOptions {
        &self.options
    }

    /// Runs one command line.
    ///
    /// Returns `Ok(true)` once orchestration finished, whatever the commands'
    /// exit statuses were, and `Ok(false)` after a reported wait failure.
    /// `Err` is reserved for failures the shell cannot survive.
    pub fn dispatch(&self, tokens: Vec<String>) -> Result<bool, DispatchError> {
        log::debug!("Dispatching tokens: {:?}", tokens);
        let invocation = router::route(tokens);
        log::debug!("Selected {:?} shape.", invocation.shape());
        orchestrator::orchestrate(invocation, self.options.redirect_mode)
    }

    /// Ends the shell. Nothing is held beyond a dispatch call, so there is nothing to release.
    pub fn teardown(self) {
        log::debug!("Shell torn down.");
    }
}

/// Installs the shell signal policy for the current process.
pub fn startup() -> Result<(), SignalError> {
    signals::install_shell_policy()
}

/// Counterpart of [`startup`]; nothing to undo.
pub fn teardown() {}

/// Dispatches the first `count` tokens with default options.
///
/// Failures the shell cannot survive (an unopenable redirect target, a failed
/// pipe or fork) are reported on stderr and terminate the process with status 1.
pub fn process_arglist(count: usize, mut arglist: Vec<String>) -> bool {
    arglist.truncate(count);
    match Shell::new(ShellOptions::default()).dispatch(arglist) {
        Ok(succeeded) => succeeded,
        Err(e) => {
            eprintln!("{}: {}", t!("cli.error.label"), e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_options_use_permissive_mode() {
        assert_eq!(ShellOptions::default().redirect_mode, 0o777);
    }

    #[test]
    fn test_dispatch_regular_command() {
        let shell = Shell::new(ShellOptions::default());
        assert!(shell.dispatch(tokens(&["echo", "hi"])).unwrap());
    }

    #[test]
    fn test_process_arglist_honours_count() {
        // Only `true` is considered; the redirect after it is beyond the count.
        assert!(process_arglist(1, tokens(&["true", ">"])));
    }
}
