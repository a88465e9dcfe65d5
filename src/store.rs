//! On-disk layout and write serialization for received files.
//!
//! A [`Depot`] owns the base directory, one subdirectory per department, and
//! the storage guard: a per-department async mutex serializing the whole
//! create, write, attribute sequence of an upload. Two uploads into the same
//! department never interleave; uploads into different departments proceed
//! concurrently.

use crate::department::Department;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

pub struct Depot {
    root: PathBuf,
    guards: [Mutex<()>; 2],
}

impl Depot {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Depot {
            root: root.into(),
            guards: [Mutex::new(()), Mutex::new(())],
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn department_dir(&self, department: Department) -> PathBuf {
        self.root.join(department.dir_name())
    }

    /// Full destination path for a stored base name.
    pub fn destination(&self, department: Department, base_name: &str) -> PathBuf {
        self.department_dir(department).join(base_name)
    }

    /// Acquire the storage guard for one department. Held across the entire
    /// create, write, attribute sequence; released by dropping the guard on
    /// any exit path.
    pub async fn lock(&self, department: Department) -> MutexGuard<'_, ()> {
        self.guards[department.index()].lock().await
    }

    /// Finalize a completed payload: set file ownership to the uploader
    /// (best-effort, a failure is returned as a warning string) and write
    /// the required `.owner` attribution sidecar next to it.
    ///
    /// Must be called with the department's storage guard held.
    pub fn finalize(&self, dest: &Path, username: &str, uid: u32) -> io::Result<Option<String>> {
        let warning = set_owner(dest, uid)
            .err()
            .map(|e| format!("could not set owner of {}: {e}", dest.display()));
        std::fs::write(sidecar_path(dest), username.as_bytes())?;
        Ok(warning)
    }
}

/// Attribution sidecar path: the destination path with `.owner` appended.
pub fn sidecar_path(dest: &Path) -> PathBuf {
    let mut os = dest.as_os_str().to_os_string();
    os.push(".owner");
    PathBuf::from(os)
}

#[cfg(unix)]
fn set_owner(path: &Path, uid: u32) -> io::Result<()> {
    std::os::unix::fs::chown(path, Some(uid), None)
}

#[cfg(not(unix))]
fn set_owner(_path: &Path, _uid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "file ownership is not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn sidecar_sits_next_to_destination() {
        let dest = Path::new("/srv/depot/Manufacturing/report.pdf");
        assert_eq!(
            sidecar_path(dest),
            Path::new("/srv/depot/Manufacturing/report.pdf.owner")
        );
    }

    #[test]
    fn destination_is_scoped_to_department() {
        let depot = Depot::new("/srv/depot");
        assert_eq!(
            depot.destination(Department::Distribution, "manifest.csv"),
            Path::new("/srv/depot/Distribution/manifest.csv")
        );
    }

    #[test]
    fn finalize_writes_attribution_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let depot = Depot::new(dir.path());
        std::fs::create_dir_all(depot.department_dir(Department::Manufacturing)).unwrap();
        let dest = depot.destination(Department::Manufacturing, "a.bin");
        std::fs::write(&dest, b"payload").unwrap();

        // chown to our own uid cannot fail; any warning is tolerated here
        // since the test may run on a platform without ownership support.
        let _warning = depot.finalize(&dest, "alice", current_uid()).unwrap();

        let owner = std::fs::read(sidecar_path(&dest)).unwrap();
        assert_eq!(owner, b"alice");
    }

    #[tokio::test]
    async fn guard_serializes_same_department_writers() {
        let depot = Arc::new(Depot::new("/srv/depot"));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4u32 {
            let depot = depot.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = depot.lock(Department::Manufacturing).await;
                order.lock().unwrap().push((i, "enter"));
                tokio::task::yield_now().await;
                order.lock().unwrap().push((i, "exit"));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Every enter must be immediately followed by the same task's exit.
        let order = order.lock().unwrap();
        for pair in order.chunks(2) {
            assert_eq!(pair[0].0, pair[1].0);
            assert_eq!(pair[0].1, "enter");
            assert_eq!(pair[1].1, "exit");
        }
    }

    #[cfg(unix)]
    fn current_uid() -> u32 {
        unsafe { libc::getuid() }
    }

    #[cfg(not(unix))]
    fn current_uid() -> u32 {
        0
    }
}
