#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![forbid(unsafe_code)]

pub mod binding;
pub mod builtins;
mod checker;
pub mod consteval;
pub mod layout;
pub mod profile;
pub mod tir;
pub mod types;

#[cfg(test)]
mod checker_tests;

pub use binding::map_bindings;
pub use checker::{TypeChecker, TypeError};
pub use profile::{CapabilityProfile, CapabilityProfileBuilder, Limits, ProfileError};
pub use tir::Program;
