use std::{path::PathBuf, sync::Arc};

use tokio::fs;

use crate::{
    error::Error,
    langs::Langs,
    sandbox::{Jail, Program, Role, COMPILE_TIME},
};

mod storage;
mod testcase;

pub use storage::{LocalStorage, Storage};
pub use testcase::TestCase;

/// Where a problem keeps its programs and testcases, locally and remotely
///
/// | what          | local                                      | remote                      |
/// |---------------|--------------------------------------------|-----------------------------|
/// | program       | `<root>/<base>/<name>.<ext>` (compiled)    | `<base>/<name>` (source)    |
/// | testcase      | `<root>/<base>/testcases/<version>/<n>.in` | `<base>/testcases/<version>/<n>.in` |
#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    base: String,
    root: PathBuf,
    jail: Jail,
    langs: Arc<Langs>,
}

impl Problem {
    /// `base` defaults to the problem name
    pub fn new(
        jail: Jail,
        langs: Arc<Langs>,
        root: impl Into<PathBuf>,
        name: impl Into<String>,
        base: Option<String>,
    ) -> Self {
        let name = name.into();
        Self {
            base: base.unwrap_or_else(|| name.clone()),
            name,
            root: root.into(),
            jail,
            langs,
        }
    }
    pub fn local_base(&self) -> PathBuf {
        self.root.join(&self.base)
    }
    pub fn jail(&self) -> &Jail {
        &self.jail
    }
    pub fn remote_base(&self) -> &str {
        &self.base
    }
    pub fn local_testcases_base(&self, version: u32) -> PathBuf {
        self.local_base()
            .join("testcases")
            .join(version.to_string())
    }
    pub fn remote_testcases_base(&self, version: u32) -> String {
        format!("{}/testcases/{}", self.base, version)
    }
    pub fn testcase(&self, version: u32, name: &str) -> TestCase {
        TestCase::new(name, self.local_testcases_base(version))
    }
    /// a program of this problem, its artifact named `<name>.<compiled extension>`
    pub fn program(&self, role: Role, name: &str, lang: &str) -> Result<Program, Error> {
        let profile = self.langs.get(lang)?;
        let file = format!("{}.{}", name, profile.extension);
        Ok(Program::new(
            self.jail.clone(),
            role,
            profile,
            self.local_base(),
            Some(file),
        ))
    }
    pub fn checker(&self, name: &str, lang: &str) -> Result<Program, Error> {
        self.program(Role::Checker, name, lang)
    }
    pub fn validator(&self, name: &str, lang: &str) -> Result<Program, Error> {
        self.program(Role::Validator, name, lang)
    }
    pub fn generator(&self, name: &str, lang: &str) -> Result<Program, Error> {
        self.program(Role::Generator, name, lang)
    }
    pub async fn ensure_problem(&self) -> Result<(), Error> {
        fs::create_dir_all(self.local_base()).await?;
        Ok(())
    }
    pub async fn ensure_testcases_base(&self, version: u32) -> Result<(), Error> {
        fs::create_dir_all(self.local_testcases_base(version)).await?;
        Ok(())
    }
    /// Compile `program` from the remote source `<base>/<name>` unless its artifact is cached
    ///
    /// Returns whether a compile happened.
    pub async fn ensure_program(
        &self,
        program: &Program,
        name: &str,
        storage: &dyn Storage,
    ) -> Result<bool, Error> {
        if program.exists().await {
            return Ok(false);
        }
        let key = format!("{}/{}", self.base, name);
        log::debug!("fetching source of {} from {}", program.file(), key);
        let source = storage
            .download_file(&key)
            .await
            .map_err(|err| Error::System(format!("fail to download {}: {}", key, err)))?;
        self.ensure_problem().await?;
        program
            .compile(&String::from_utf8_lossy(&source), COMPILE_TIME)
            .await?;
        Ok(true)
    }
}
