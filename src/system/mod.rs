//! # System Interaction Layer
//!
//! Thin wrappers over the process primitives the orchestrator is built from.
//!
//! ## Modules
//!
//! - **`signals`**: the signal dispositions each process role runs with, applied
//!   once at shell startup and once in every child before exec.
//! - **`wiring`**: pipe and redirect-target endpoints owned by the parent, and the
//!   descriptor moves a child performs before exec.
//! - **`launcher`**: fork a child, apply its role and wiring, replace its image,
//!   and report an exec failure from inside the child.

pub mod launcher;
pub mod signals;
pub mod wiring;
