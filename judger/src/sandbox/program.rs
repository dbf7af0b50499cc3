use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;

use super::{FileBinding, Jail, Limit, RunArgs, RunArgsBuilder};
use crate::{
    error::Error,
    filesystem::{self, touch},
    langs::LangProfile,
    verdict::{RunResult, Verdict},
};

/// memory every compile step gets (MiB)
const COMPILE_MEMORY: u64 = 1024;
/// default time budget of every compile step (seconds)
pub const COMPILE_TIME: u64 = 16;

/// What a [`Program`] is for, which decides how much it is trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Submission,
    Checker,
    Validator,
    Generator,
}

impl Role {
    /// trusted programs run as the compiler identity with a writable working directory
    pub fn trusted(&self) -> bool {
        !matches!(self, Role::Submission)
    }
    /// artifacts of these roles are cached by the problem and outlive a judge
    pub fn retains_artifact(&self) -> bool {
        matches!(self, Role::Checker | Role::Validator)
    }
}

/// A compiled (or to be compiled) program of some language
#[derive(Debug, Clone)]
pub struct Program {
    role: Role,
    profile: Arc<LangProfile>,
    dir: PathBuf,
    file: String,
    command: String,
    args: Vec<String>,
    jail: Jail,
}

impl Program {
    /// `file` defaults to a random name with the language's compiled extension
    pub fn new(
        jail: Jail,
        role: Role,
        profile: Arc<LangProfile>,
        dir: impl Into<PathBuf>,
        file: Option<String>,
    ) -> Self {
        let file = file.unwrap_or_else(|| {
            format!("{}.{}", uuid::Uuid::new_v4().simple(), profile.extension)
        });
        let (command, args) = profile.bind_execute(&file);
        Self {
            role,
            profile,
            dir: dir.into(),
            file,
            command,
            args,
            jail,
        }
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn file(&self) -> &str {
        &self.file
    }
    pub fn full_path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
    pub fn jail(&self) -> &Jail {
        &self.jail
    }
    pub async fn exists(&self) -> bool {
        filesystem::exists(self.full_path()).await
    }
    /// the artifact mounted read-only under its own name
    pub fn binding(&self) -> FileBinding {
        FileBinding::read_only(self.full_path(), self.file.clone())
    }
    /// invocation of the artifact, with the artifact mounted and trust decided by the role
    pub fn run_args(&self, work_dir: &Path, limit: Limit) -> RunArgsBuilder {
        RunArgsBuilder::default()
            .work_dir(work_dir)
            .bindings(vec![self.binding()])
            .trusted(self.role.trusted())
            .command(self.command.clone())
            .args(self.args.clone())
            .limit(limit)
    }
    /// same as [`Program::run_args`] with `extra` appended to the execute arguments
    pub fn run_args_with(&self, work_dir: &Path, limit: Limit, extra: &[String]) -> RunArgsBuilder {
        let args = self.args.iter().chain(extra).cloned().collect();
        self.run_args(work_dir, limit).args(args)
    }
    pub async fn run(&self, args: RunArgs) -> Result<RunResult, Error> {
        self.jail.run(args).await
    }
    /// Compile `code` into the artifact
    ///
    /// Every step runs trusted in one shared scratch directory. The new
    /// artifact replaces the old one atomically. On failure no artifact is
    /// left behind, even one from an earlier compile.
    pub async fn compile(&self, code: &str, max_time: u64) -> Result<(), Error> {
        let target = self.full_path();
        let compiled = self.compile_inner(code, max_time, &target).await;
        if compiled.is_err() {
            if let Err(err) = filesystem::remove_file(&target).await {
                log::warn!("Fail to remove stale {}: {}", target.to_string_lossy(), err);
            }
        }
        compiled
    }
    async fn compile_inner(&self, code: &str, max_time: u64, target: &Path) -> Result<(), Error> {
        fs::create_dir_all(&self.dir).await?;

        let dir = self.jail.shared_scratch().await?;
        let out = dir.join("compile");
        let err = dir.join("compile.err");
        fs::write(dir.join(&self.profile.source), code).await?;
        touch(&out, 0o666).await?;
        touch(&err, 0o666).await?;

        for step in &self.profile.compile {
            let args = RunArgsBuilder::default()
                .work_dir(dir.get_path())
                .trusted(true)
                .command(step.command.clone())
                .args(step.bind(&self.profile.source))
                .limit(Limit::new(max_time, COMPILE_MEMORY))
                .stdout(&out)
                .stderr(&err)
                .build()?;
            let result = self.jail.run(args).await?;
            if !result.verdict.is_accepted() {
                let message = filesystem::read_lossy(&err).await?;
                log::debug!("compile step `{}` failed: {}", step.command, result.verdict);
                return Err(Error::Compile(compile_message(result.verdict, message)));
            }
        }

        let artifact = dir.join(self.profile.artifact());
        if !filesystem::exists(&artifact).await {
            log::debug!("compiler left no {}", self.profile.artifact());
            let message = filesystem::read_lossy(&err).await?;
            return Err(Error::Compile(compile_message(Verdict::Accepted, message)));
        }
        filesystem::publish(&artifact, target, 0o775).await?;
        log::trace!("compiled {}", target.to_string_lossy());
        Ok(())
    }
    /// remove the artifact unless the role keeps it cached
    pub async fn clear(&self) -> Result<(), Error> {
        if self.role.retains_artifact() {
            return Ok(());
        }
        filesystem::remove_file(self.full_path()).await?;
        Ok(())
    }
}

fn compile_message(verdict: Verdict, stderr: String) -> String {
    if !stderr.is_empty() {
        return stderr;
    }
    match verdict {
        Verdict::TimeLimitExceeded => "Time limit exceeded when compiling",
        Verdict::MemoryLimitExceeded => "Memory limit exceeded when compiling",
        _ => "Something is wrong, but nothing is reported",
    }
    .to_owned()
}
