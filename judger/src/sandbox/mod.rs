use std::{
    ffi::OsString,
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::filesystem::MkdTemp;

mod nsjail;
mod process;
mod program;
#[cfg(test)]
pub(crate) mod testing;
mod usage;

pub use nsjail::NsJail;
pub use program::{Program, Role, COMPILE_TIME};
pub use usage::Usage;

pub mod prelude {
    pub use super::{
        BindMode, FileBinding, Jail, Limit, NsJail, Program, Role, RunArgs, RunArgsBuilder,
        Settings, Supervisor,
    };
}

/// Resource ceilings declared for one invocation
///
/// Trusted as given, callers validate time in `[1, 16]` seconds and memory in `[32, 2048]` MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    /// seconds of cpu time
    pub time: u64,
    /// MiB of memory
    pub memory: u64,
}

impl Limit {
    /// budget of programs shipped with a problem (validator, generator)
    pub const AUXILIARY: Limit = Limit {
        time: 15,
        memory: 1024,
    };

    pub fn new(time: u64, memory: u64) -> Self {
        Self { time, memory }
    }
    pub fn doubled(&self) -> Self {
        Self {
            time: self.time * 2,
            memory: self.memory * 2,
        }
    }
    /// wall clock after which the supervisor kills the process
    pub fn wall(&self) -> Duration {
        Duration::from_secs(self.time * 2 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    ReadOnly,
    ReadWrite,
}

impl BindMode {
    pub fn flag(&self) -> &'static str {
        match self {
            BindMode::ReadOnly => "-R",
            BindMode::ReadWrite => "-B",
        }
    }
}

/// A host file mounted into the sandbox working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBinding {
    pub src: PathBuf,
    /// name inside the sandbox working directory
    pub dst: String,
    pub mode: BindMode,
}

impl FileBinding {
    pub fn read_only(src: impl Into<PathBuf>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            mode: BindMode::ReadOnly,
        }
    }
    pub fn read_write(src: impl Into<PathBuf>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            mode: BindMode::ReadWrite,
        }
    }
}

/// Everything one sandboxed invocation needs
#[derive(derive_builder::Builder, Debug, Clone)]
#[builder(pattern = "owned")]
pub struct RunArgs {
    #[builder(setter(into))]
    pub work_dir: PathBuf,
    #[builder(default)]
    pub bindings: Vec<FileBinding>,
    #[builder(default)]
    pub trusted: bool,
    #[builder(setter(into))]
    pub command: String,
    #[builder(default)]
    pub args: Vec<String>,
    pub limit: Limit,
    #[builder(default, setter(into, strip_option))]
    pub stdin: Option<PathBuf>,
    #[builder(default, setter(into, strip_option))]
    pub stdout: Option<PathBuf>,
    #[builder(default, setter(into, strip_option))]
    pub stderr: Option<PathBuf>,
}

/// A fully prepared supervisor invocation
pub struct Jailed {
    pub args: Vec<OsString>,
    pub stdin: Option<std::fs::File>,
    pub stdout: Option<std::fs::File>,
    pub stderr: Option<std::fs::File>,
    /// where the supervisor writes its usage report
    pub usage: PathBuf,
    /// wall clock the supervisor enforces itself
    pub wall: Duration,
}

/// The isolation supervisor
///
/// Implementations block until the supervised process exited or was killed.
#[async_trait::async_trait]
pub trait Supervisor: Debug + Send + Sync {
    async fn supervise(&self, jailed: Jailed) -> std::io::Result<()>;
}

/// Host side settings of the sandbox
#[derive(Debug, Clone)]
pub struct Settings {
    /// root of every scratch directory
    pub temp: PathBuf,
    pub compiler_uid: u32,
    pub compiler_gid: u32,
    pub runner_uid: u32,
    pub runner_gid: u32,
    /// names of environment variables forwarded into the sandbox
    pub env: Vec<String>,
    /// rlimit_fsize in MiB
    pub output_limit: u64,
    /// bytes kept of stdout and checker output in a report
    pub report_limit: usize,
    /// host runs the unified cgroup v2 hierarchy
    pub cgroup_v2: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temp: PathBuf::from(".temp"),
            compiler_uid: 1500,
            compiler_gid: 1500,
            runner_uid: 1501,
            runner_gid: 1501,
            env: vec!["PATH".to_owned(), "LANG".to_owned(), "LC_ALL".to_owned()],
            output_limit: 64,
            report_limit: 1024,
            cgroup_v2: true,
        }
    }
}

/// Handle to the sandbox: a supervisor plus the settings every invocation shares
#[derive(Debug, Clone)]
pub struct Jail {
    supervisor: Arc<dyn Supervisor>,
    settings: Arc<Settings>,
}

impl Jail {
    pub fn new(supervisor: Arc<dyn Supervisor>, settings: Settings) -> Self {
        Self {
            supervisor,
            settings: Arc::new(settings),
        }
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    /// a fresh scratch directory only the judge can write
    pub async fn scratch(&self) -> std::io::Result<MkdTemp> {
        MkdTemp::new(&self.settings.temp).await
    }
    /// a fresh scratch directory the sandboxed identity can write
    pub async fn shared_scratch(&self) -> std::io::Result<MkdTemp> {
        MkdTemp::shared(&self.settings.temp).await
    }
    pub fn temp(&self) -> &Path {
        &self.settings.temp
    }
}
