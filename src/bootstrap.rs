//! One-time directory bootstrap, run before the accept loop starts.
//!
//! Creates the depot root and one directory per department. On unix each
//! department directory is group-owned by the department's authorization
//! group with mode 0o770; a missing group or a failed chown is a warning,
//! since the daemon may be running unprivileged in development.

use crate::department::Department;
use anyhow::{Context, Result};
use std::path::Path;

pub fn setup_directories(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("create depot root {}", root.display()))?;
    for dept in Department::ALL {
        let dir = root.join(dept.dir_name());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create department directory {}", dir.display()))?;
        apply_department_ownership(&dir, dept);
    }
    Ok(())
}

#[cfg(unix)]
fn apply_department_ownership(dir: &Path, dept: Department) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o770)) {
        eprintln!("warning: could not set mode of {}: {e}", dir.display());
    }
    match crate::identity::group_gid(dept.group()) {
        Some(gid) => {
            if let Err(e) = std::os::unix::fs::chown(dir, None, Some(gid)) {
                eprintln!("warning: could not set group of {}: {e}", dir.display());
            }
        }
        None => eprintln!(
            "warning: group '{}' not found, directory permissions may be incorrect",
            dept.group()
        ),
    }
}

#[cfg(not(unix))]
fn apply_department_ownership(_dir: &Path, _dept: Department) {}
