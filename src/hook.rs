//! Save hooks: external side effects run after a persisted edit.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::error::HookError;

/// A hook invoked synchronously after a successful save with
/// `(files, user, message, extra_args)`.
pub type SaveHook = Box<dyn Fn(&str, &str, &str, &[String]) -> Result<(), HookError> + Send + Sync>;

/// Builds a [`SaveHook`] that runs an external command with positional
/// arguments `(files, user, message, extra...)`.
///
/// The executable is resolved on the search path now, so a missing
/// command fails at configuration time rather than on the first save.
/// The returned hook blocks until the command exits, capturing stdout
/// and stderr in full; a non-zero exit or launch failure is an error
/// with the captured stderr attached.
pub fn command_hook(command: &str) -> Result<SaveHook, HookError> {
    let resolved = find_in_path(command).ok_or_else(|| HookError::NotFound {
        command: command.to_string(),
    })?;
    let name = command.to_string();
    Ok(Box::new(move |files, user, message, extra| {
        info!(command = %name, files, user, "executing save hook");
        let output = Command::new(&resolved)
            .arg(files)
            .arg(user)
            .arg(message)
            .args(extra)
            .output()
            .map_err(|e| HookError::Launch {
                command: name.clone(),
                source: e,
            })?;
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                info!(command = %name, "save hook output: {}", stdout.trim());
            }
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(command = %name, status = %output.status, "save hook failed: {stderr}");
            Err(HookError::NonZeroExit {
                command: name.clone(),
                status: output.status.to_string(),
                stderr,
            })
        }
    }))
}

/// Resolves a command the way a shell would: names containing a path
/// separator are taken as-is, anything else is searched on `PATH`.
fn find_in_path(command: &str) -> Option<PathBuf> {
    let direct = Path::new(command);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}
