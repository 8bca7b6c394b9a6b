//! Launch command resolution.
//!
//! Resolution order, first success wins:
//! 1. absolute paths are returned unchanged
//! 2. lookup on the executable search path (`PATH`)
//! 3. a regular file of that name relative to the working directory
//! 4. the original command, unresolved
//!
//! Resolution never fails. A command that cannot be found surfaces later as
//! a connection error when the backend process is spawned.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

/// Resolves backend launch commands to executable paths.
#[derive(Debug, Clone, Default)]
pub struct CommandResolver {
    search_path: Option<OsString>,
    cwd: Option<PathBuf>,
}

impl CommandResolver {
    /// Resolver using the process `PATH` and current directory.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    fn search_path(&self) -> Option<OsString> {
        self.search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))
    }

    fn cwd(&self) -> Option<PathBuf> {
        self.cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }

    pub fn resolve(&self, command: &str) -> String {
        if Path::new(command).is_absolute() {
            return command.to_string();
        }

        let cwd = self.cwd();

        if let Some(cwd) = &cwd {
            match which::which_in(command, self.search_path(), cwd) {
                Ok(path) => {
                    debug!(command = %command, path = %path.display(), "Resolved command on PATH");
                    return path.to_string_lossy().into_owned();
                }
                Err(e) => debug!(command = %command, error = %e, "Command not found on PATH"),
            }

            let local = cwd.join(command);
            if local.is_file() {
                debug!(
                    command = %command,
                    path = %local.display(),
                    "Resolved command relative to working directory"
                );
                return local.to_string_lossy().into_owned();
            }
            debug!(
                command = %command,
                cwd = %cwd.display(),
                "Command not found relative to working directory"
            );
        } else {
            debug!(command = %command, "Working directory unavailable, skipping lookup");
        }

        warn!(command = %command, "Could not resolve command, using it unchanged");
        command.to_string()
    }

    /// [`resolve`](Self::resolve) on the blocking pool. Lookups stat the filesystem.
    pub async fn resolve_async(&self, command: &str) -> String {
        let resolver = self.clone();
        let owned = command.to_string();
        match tokio::task::spawn_blocking(move || resolver.resolve(&owned)).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(command = %command, error = %e, "Command resolution task failed, using it unchanged");
                command.to_string()
            }
        }
    }
}

/// Resolve a command with the process environment.
pub fn resolve_command(command: &str) -> String {
    CommandResolver::new().resolve(command)
}
