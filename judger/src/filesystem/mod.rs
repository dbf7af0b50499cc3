use std::{
    fs::Permissions,
    io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use tokio::{
    fs,
    io::{AsyncReadExt, AsyncWriteExt},
};

mod mkdtemp;

pub use mkdtemp::MkdTemp;

/// create (or truncate) an empty file with the given permission bits
pub async fn touch(path: impl AsRef<Path>, mode: u32) -> io::Result<()> {
    fs::write(path.as_ref(), b"").await?;
    fs::set_permissions(path.as_ref(), Permissions::from_mode(mode)).await
}

/// read at most `limit` bytes from the start of a file
///
/// Invalid utf-8 is replaced, trailing whitespace trimmed.
pub async fn read_head(path: impl AsRef<Path>, limit: usize) -> io::Result<String> {
    let file = fs::File::open(path.as_ref()).await?;
    let mut buf = Vec::with_capacity(limit.min(4096));
    file.take(limit as u64).read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).trim_end().to_owned())
}

/// read a diagnostic file (stderr of a sandboxed program) into a trimmed string
pub async fn read_trimmed(path: impl AsRef<Path>) -> io::Result<String> {
    let buf = fs::read(path.as_ref()).await?;
    Ok(String::from_utf8_lossy(&buf).trim().to_owned())
}

/// read a diagnostic file as is, invalid utf-8 replaced
pub async fn read_lossy(path: impl AsRef<Path>) -> io::Result<String> {
    let buf = fs::read(path.as_ref()).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// remove a file, treating an already missing file as success
pub async fn remove_file(path: impl AsRef<Path>) -> io::Result<()> {
    match fs::remove_file(path.as_ref()).await {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        x => x,
    }
}

pub async fn exists(path: impl AsRef<Path>) -> bool {
    fs::try_exists(path.as_ref()).await.unwrap_or(false)
}

/// unique sibling of `path` to stage its next content in
fn part_of(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.part", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

/// write a file so that readers see either nothing or the whole content
pub async fn write_atomic(path: impl AsRef<Path>, content: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let part = part_of(path);

    let written = async {
        let mut file = fs::File::create(&part).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        fs::rename(&part, path).await
    }
    .await;
    if written.is_err() {
        remove_file(&part).await.ok();
    }
    written
}

/// Copy `src` over `dst` with `mode` set
///
/// Readers of `dst` see the previous file or the complete copy with its
/// final mode, never anything in between.
pub async fn publish(src: impl AsRef<Path>, dst: impl AsRef<Path>, mode: u32) -> io::Result<()> {
    let dst = dst.as_ref();
    let part = part_of(dst);

    let published = async {
        fs::copy(src.as_ref(), &part).await?;
        fs::set_permissions(&part, Permissions::from_mode(mode)).await?;
        fs::rename(&part, dst).await
    }
    .await;
    if published.is_err() {
        remove_file(&part).await.ok();
    }
    published
}
