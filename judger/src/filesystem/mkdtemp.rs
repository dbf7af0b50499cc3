use std::{
    fs::Permissions,
    io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use tokio::{
    fs,
    runtime::{Handle, RuntimeFlavor},
    task,
};
use uuid::Uuid;

/// A uniquely named scratch directory, removed with all its content on drop
///
/// Removal finishes before [`Drop`] returns, so once the owner goes out of
/// scope (on success, error or unwinding) the directory no longer exists.
/// On a multi-thread runtime the worker hands its other tasks off while
/// removing.
#[derive(Debug)]
pub struct MkdTemp(PathBuf);

fn remove_dir(path: &Path) {
    log::trace!("removing scratch directory {}", path.to_string_lossy());
    if let Err(err) = std::fs::remove_dir_all(path) {
        if err.kind() != io::ErrorKind::NotFound {
            log::warn!(
                "Fail to remove scratch directory {}: {}",
                path.to_string_lossy(),
                err
            );
        }
    }
}

impl Drop for MkdTemp {
    fn drop(&mut self) {
        let multi_thread = Handle::try_current()
            .map(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
            .unwrap_or(false);
        match multi_thread {
            true => task::block_in_place(|| remove_dir(&self.0)),
            false => remove_dir(&self.0),
        }
    }
}

impl MkdTemp {
    /// create a scratch directory under `root` which only its owner can write
    pub async fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Self::new_inner(root.as_ref(), 0o755).await
    }
    /// create a scratch directory under `root` which any sandbox identity can write
    pub async fn shared(root: impl AsRef<Path>) -> io::Result<Self> {
        Self::new_inner(root.as_ref(), 0o777).await
    }
    async fn new_inner(root: &Path, mode: u32) -> io::Result<Self> {
        fs::create_dir_all(root).await?;
        let path = root.join(format!("judger-{}", Uuid::new_v4().simple()));
        fs::create_dir(&path).await?;
        // from here on the guard owns the directory, a failing chmod still removes it
        let dir = Self(path);
        fs::set_permissions(&dir.0, Permissions::from_mode(mode)).await?;
        Ok(dir)
    }
    pub fn get_path(&self) -> &Path {
        self.0.as_path()
    }
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.0.join(name)
    }
}
