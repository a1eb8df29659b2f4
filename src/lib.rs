//! A minimal job launcher: one tokenized command line, at most one `|`, `>` or
//! `&` operator, executed with fork, descriptor wiring and exec.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod system;

pub use crate::core::orchestrator::DispatchError;
pub use crate::core::shell::{Shell, ShellOptions, process_arglist, startup, teardown};
pub use crate::system::signals::SignalError;
