#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![forbid(unsafe_code)]

//! Glint driver: the compile pipeline over the front end, checker, binding
//! mapper and SPIR-V generator, its runtime lifecycle and failure reports.

pub mod compile;
pub mod report;
pub mod runtime;

pub use compile::{compile_with, Compilation, CompileFailure, CompileResult, State};
pub use report::render_report;
pub use runtime::{
    compile, is_running, shutdown_compiler, startup_compiler, startup_compiler_with, Compiler,
    Runtime, ToolchainInitError,
};
