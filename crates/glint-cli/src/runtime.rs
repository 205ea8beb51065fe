//! Compiler runtime lifecycle.
//!
//! [`Runtime::startup`] validates a capability profile and hands back a
//! [`Runtime`] owning an immutable, shareable [`Compiler`]. The free
//! functions below wrap one process-wide runtime for hosts that want the
//! `startup_compiler` / `compile` / `shutdown_compiler` call sequence.
//!
//! Shutdown is the caller's job: the runtime does not know which compile is
//! the last one.

use std::fmt;
use std::sync::Arc;

use glint_types::{CapabilityProfile, ProfileError};
use parking_lot::RwLock;

use crate::compile::{compile_with, CompileFailure, CompileResult};

/// The runtime could not start; no compilation can proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainInitError {
    InvalidProfile(ProfileError),
    AlreadyRunning,
}

impl fmt::Display for ToolchainInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolchainInitError::InvalidProfile(e) => write!(f, "toolchain init failed: {}", e),
            ToolchainInitError::AlreadyRunning => {
                write!(f, "toolchain init failed: the compiler runtime is already running")
            }
        }
    }
}

impl std::error::Error for ToolchainInitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToolchainInitError::InvalidProfile(e) => Some(e),
            ToolchainInitError::AlreadyRunning => None,
        }
    }
}

/// A started compiler. Holds no per-call state, so one instance may serve
/// any number of threads.
#[derive(Debug)]
pub struct Compiler {
    profile: CapabilityProfile,
}

impl Compiler {
    pub fn profile(&self) -> &CapabilityProfile {
        &self.profile
    }

    /// Compile one compute shader. `debug_name` only appears in failure
    /// reports.
    pub fn compile(&self, source: &str, debug_name: &str) -> CompileResult {
        compile_with(&self.profile, source, debug_name)
    }
}

/// An explicit runtime context.
#[derive(Debug, Clone)]
pub struct Runtime {
    compiler: Arc<Compiler>,
}

impl Runtime {
    pub fn startup(profile: CapabilityProfile) -> Result<Runtime, ToolchainInitError> {
        profile.validate().map_err(ToolchainInitError::InvalidProfile)?;
        log::debug!(
            "compiler runtime started (max work group size {:?})",
            profile.max_work_group_size()
        );
        Ok(Runtime {
            compiler: Arc::new(Compiler { profile }),
        })
    }

    pub fn compiler(&self) -> Arc<Compiler> {
        Arc::clone(&self.compiler)
    }

    pub fn compile(&self, source: &str, debug_name: &str) -> CompileResult {
        self.compiler.compile(source, debug_name)
    }

    pub fn shutdown(self) {
        log::debug!("compiler runtime shut down");
    }
}

static RUNTIME: RwLock<Option<Runtime>> = parking_lot::const_rwlock(None);

/// Start the process-wide runtime with the default profile.
pub fn startup_compiler() -> bool {
    startup_compiler_with(CapabilityProfile::default())
}

/// Start the process-wide runtime. Returns `false` when the profile is
/// rejected or a runtime is already running.
pub fn startup_compiler_with(profile: CapabilityProfile) -> bool {
    match try_startup(profile) {
        Ok(()) => true,
        Err(e) => {
            log::error!("{}", e);
            false
        }
    }
}

fn try_startup(profile: CapabilityProfile) -> Result<(), ToolchainInitError> {
    let mut slot = RUNTIME.write();
    if slot.is_some() {
        return Err(ToolchainInitError::AlreadyRunning);
    }
    *slot = Some(Runtime::startup(profile)?);
    Ok(())
}

/// Stop the process-wide runtime. Without a running runtime this only logs
/// a warning.
pub fn shutdown_compiler() {
    match RUNTIME.write().take() {
        Some(runtime) => runtime.shutdown(),
        None => log::warn!("shutdown_compiler called without a running compiler runtime"),
    }
}

pub fn is_running() -> bool {
    RUNTIME.read().is_some()
}

/// Compile with the process-wide runtime.
pub fn compile(source: &str, debug_name: &str) -> CompileResult {
    // Clone the handle so the lock is not held while compiling.
    let compiler = RUNTIME.read().as_ref().map(Runtime::compiler);
    match compiler {
        Some(c) => c.compile(source, debug_name),
        None => CompileResult::Failure(CompileFailure::not_running(debug_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn compiler_is_shareable() {
        assert_send_sync::<Compiler>();
        assert_send_sync::<Runtime>();
    }

    #[test]
    fn invalid_profile_fails_startup() {
        let profile = CapabilityProfile::builder()
            .max_compute_work_group_size_x(0)
            .build();
        let err = Runtime::startup(profile).unwrap_err();
        assert!(matches!(err, ToolchainInitError::InvalidProfile(ref e) if e.field == "max_compute_work_group_size_x"));
        assert!(err.to_string().starts_with("toolchain init failed"));
    }

    #[test]
    fn independent_runtimes_do_not_interfere() {
        let small = Runtime::startup(
            CapabilityProfile::builder()
                .max_compute_work_group_size_x(64)
                .build(),
        )
        .unwrap();
        let large = Runtime::startup(CapabilityProfile::default()).unwrap();
        let src = "layout(local_size_x = 128) in;\nvoid main() {}\n";
        assert!(!small.compile(src, "wide").is_success());
        assert!(large.compile(src, "wide").is_success());
        small.shutdown();
        assert!(large.compile(src, "wide").is_success());
    }

    #[test]
    fn threads_share_one_compiler() {
        let runtime = Runtime::startup(CapabilityProfile::default()).unwrap();
        let src = "layout(local_size_x = 4) in;\nshared float t[4];\nvoid main() { t[gl_LocalInvocationIndex] = 1.0; }\n";
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = runtime.compiler();
                std::thread::spawn(move || c.compile(src, "t.comp"))
            })
            .collect();
        let results: Vec<CompileResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(CompileResult::is_success));
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
