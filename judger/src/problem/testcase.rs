use std::path::{Path, PathBuf};

use tokio::fs;

use super::Storage;
use crate::{
    error::Error,
    filesystem,
    sandbox::Program,
    verdict::RunResult,
};

/// A named input/answer pair stored under a base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub base: PathBuf,
    pub input_file: PathBuf,
    pub answer_file: PathBuf,
}

impl TestCase {
    pub fn new(name: impl Into<String>, base: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let base = base.into();
        Self {
            input_file: base.join(format!("{}.in", name)),
            answer_file: base.join(format!("{}.ans", name)),
            name,
            base,
        }
    }
    pub async fn check_input(&self) -> Result<(), Error> {
        match filesystem::exists(&self.input_file).await {
            true => Ok(()),
            false => Err(Error::TestCase(format!("missing input of {}", self.name))),
        }
    }
    /// both files must be present before the testcase can be judged
    pub async fn check_present(&self) -> Result<(), Error> {
        self.check_input().await?;
        match filesystem::exists(&self.answer_file).await {
            true => Ok(()),
            false => Err(Error::TestCase(format!("missing answer of {}", self.name))),
        }
    }
    pub async fn write_in(&self, content: &[u8]) -> Result<(), Error> {
        fs::create_dir_all(&self.base).await?;
        fs::write(&self.input_file, content).await?;
        Ok(())
    }
    pub async fn write_ans(&self, content: &[u8]) -> Result<(), Error> {
        fs::create_dir_all(&self.base).await?;
        fs::write(&self.answer_file, content).await?;
        Ok(())
    }
    /// Generate the input with `generator`
    ///
    /// On failure (a non-accepted result or an error) neither file is left behind.
    pub async fn gen_in(&self, generator: &Program, args: &[String]) -> Result<RunResult, Error> {
        self.clear().await;
        self.write_in(b"").await?;
        let outcome = generator.generate(args, &self.input_file).await;
        self.rollback(outcome).await
    }
    /// Generate the answer by running `generator` on the input
    ///
    /// On failure (a non-accepted result or an error) neither file is left behind.
    pub async fn gen_ans(&self, generator: &Program) -> Result<RunResult, Error> {
        self.check_input().await?;
        self.write_ans(b"").await?;
        let outcome = generator.solve(&self.input_file, &self.answer_file).await;
        self.rollback(outcome).await
    }
    async fn rollback(&self, outcome: Result<RunResult, Error>) -> Result<RunResult, Error> {
        match &outcome {
            Ok(result) if result.verdict.is_accepted() => {}
            _ => self.clear().await,
        }
        outcome
    }
    /// Fetch whichever file is missing from `<remote>/<name>.in|.ans`
    pub async fn ensure(&self, remote: &str, storage: &dyn Storage) -> Result<(), Error> {
        fs::create_dir_all(&self.base).await?;
        for (path, extension) in [(&self.input_file, "in"), (&self.answer_file, "ans")] {
            if filesystem::exists(path).await {
                continue;
            }
            let key = format!("{}/{}.{}", remote, self.name, extension);
            fetch(storage, &key, path).await?;
        }
        Ok(())
    }
    /// Fetch the input from an arbitrary key, replacing any local input
    pub async fn download_in(&self, key: &str, storage: &dyn Storage) -> Result<(), Error> {
        fs::create_dir_all(&self.base).await?;
        fetch(storage, key, &self.input_file).await
    }
    pub async fn upload(&self, remote: &str, storage: &dyn Storage) -> Result<(), Error> {
        self.check_present().await?;
        for (path, extension) in [(&self.input_file, "in"), (&self.answer_file, "ans")] {
            let key = format!("{}/{}.{}", remote, self.name, extension);
            storage.upload_file(&key, path).await.map_err(|err| {
                Error::System(format!("fail to upload {}: {}", key, err))
            })?;
        }
        Ok(())
    }
    /// remove both files, never fails
    pub async fn clear(&self) {
        for path in [&self.input_file, &self.answer_file] {
            if let Err(err) = filesystem::remove_file(path).await {
                log::warn!("Fail to remove {}: {}", path.to_string_lossy(), err);
            }
        }
    }
}

async fn fetch(storage: &dyn Storage, key: &str, path: &Path) -> Result<(), Error> {
    let content = storage
        .download_file(key)
        .await
        .map_err(|err| Error::TestCase(format!("fail to download {}: {}", key, err)))?;
    filesystem::write_atomic(path, &content).await?;
    Ok(())
}
