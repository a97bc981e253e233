//! Replacement of the running executable.
//!
//! The new image is first copied next to the target so the final step is a
//! rename within one filesystem. Windows keeps the running image locked, so
//! it is moved aside first and restored if the final move fails.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::UpdateError;

const TEMP_NAME: &str = ".minly-update.tmp";
const CHECK_NAME: &str = ".minly-write-check";

/// Replace `target` with the file at `new_image`.
pub fn replace_executable(target: &Path, new_image: &Path) -> Result<(), UpdateError> {
    let parent = parent_of(target)?;
    let tmp_path = parent.join(TEMP_NAME);

    fs::copy(new_image, &tmp_path)
        .map_err(|e| denied_or(e, parent, "copy new executable to", &tmp_path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(new_image)
            .map(|m| m.permissions().mode() & 0o7777)
            .unwrap_or(0o755);
        // Whatever the archive recorded, the result must stay executable.
        let mode = mode | 0o100;
        if let Err(e) = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(mode)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(UpdateError::fs("set permissions on", &tmp_path, e));
        }
    }

    swap_into_place(target, &tmp_path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })
}

#[cfg(not(windows))]
fn swap_into_place(target: &Path, tmp_path: &Path) -> Result<(), UpdateError> {
    fs::rename(tmp_path, target).map_err(|e| denied_or(e, target, "replace", target))
}

#[cfg(windows)]
fn swap_into_place(target: &Path, tmp_path: &Path) -> Result<(), UpdateError> {
    let old_path = old_image_path(target);
    let _ = fs::remove_file(&old_path);

    fs::rename(target, &old_path)
        .map_err(|e| denied_or(e, target, "move aside", target))?;

    if let Err(e) = fs::rename(tmp_path, target) {
        if let Err(restore) = fs::rename(&old_path, target) {
            warn!(
                path = %target.display(),
                error = %restore,
                "failed to restore previous executable"
            );
        }
        return Err(denied_or(e, target, "replace", target));
    }

    // The running image stays locked until exit; removal is best effort.
    if let Err(e) = fs::remove_file(&old_path) {
        warn!(path = %old_path.display(), error = %e, "previous executable left in place");
    }
    Ok(())
}

#[cfg_attr(not(windows), allow(dead_code))]
fn old_image_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".old");
    target.with_file_name(name)
}

/// Fail early when the directory holding `target` is not writable.
pub fn check_write_permission(target: &Path) -> Result<(), UpdateError> {
    let parent = parent_of(target)?;
    let check_path = parent.join(CHECK_NAME);
    match fs::File::create(&check_path) {
        Ok(_) => {
            if let Err(e) = fs::remove_file(&check_path) {
                warn!(path = %check_path.display(), error = %e, "failed to remove write check file");
            }
            Ok(())
        }
        Err(e) => Err(denied_or(e, parent, "write to", parent)),
    }
}

fn parent_of(target: &Path) -> Result<&Path, UpdateError> {
    target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| {
            UpdateError::fs(
                "determine parent directory of",
                target,
                io::Error::new(io::ErrorKind::NotFound, "no parent directory"),
            )
        })
}

fn denied_or(e: io::Error, dir: &Path, action: &'static str, path: &Path) -> UpdateError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        UpdateError::PermissionDenied(format!(
            "permission denied writing to {}. Try running with elevated privileges.",
            dir.display()
        ))
    } else {
        UpdateError::fs(action, path, e)
    }
}
