use std::{
    io,
    path::{Component, Path, PathBuf},
};

use tokio::fs;

/// Remote object store holding problem sources and testcases
///
/// Keys are `/` separated relative paths such as `aplusb/testcases/1/1.in`.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn download_file(&self, key: &str) -> io::Result<Vec<u8>>;
    async fn upload_file(&self, key: &str, local: &Path) -> io::Result<()>;
}

/// [`Storage`] backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
    fn resolve(&self, key: &str) -> io::Result<PathBuf> {
        let key = Path::new(key);
        if key
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key {}", key.to_string_lossy()),
            ));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait::async_trait]
impl Storage for LocalStorage {
    async fn download_file(&self, key: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(key)?;
        log::trace!("download {}", path.to_string_lossy());
        fs::read(path).await
    }
    async fn upload_file(&self, key: &str, local: &Path) -> io::Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        log::trace!("upload {} to {}", local.to_string_lossy(), path.to_string_lossy());
        fs::copy(local, path).await.map(|_| ())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn round_trip() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(root.path().join("bucket"));
        let local = root.path().join("1.in");
        std::fs::write(&local, "1 1\n").unwrap();

        storage
            .upload_file("aplusb/testcases/1/1.in", &local)
            .await
            .unwrap();
        let content = storage
            .download_file("aplusb/testcases/1/1.in")
            .await
            .unwrap();
        assert_eq!(content, b"1 1\n");

        let missing = storage.download_file("aplusb/testcases/1/2.in").await;
        assert_eq!(missing.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn reject_escaping_key() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(root.path());
        for key in ["../etc/passwd", "/etc/passwd", "a/../../b"] {
            let err = storage.download_file(key).await.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{}", key);
        }
    }
}
