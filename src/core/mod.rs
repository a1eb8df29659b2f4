// src/core/mod.rs

pub mod orchestrator;
pub mod router;
pub mod shell;
