use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    io,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::{process::Command, time};

use super::{FileBinding, Jailed, Limit, RunArgs, Settings, Supervisor};

/// mount point of the working directory inside the sandbox
pub static APP_DIR: &str = "/app";
/// host directories mounted read-only into every sandbox
static SYSTEM_DIRS: [&str; 7] = ["/bin", "/lib", "/lib64", "/usr", "/sbin", "/dev", "/etc"];
/// extra headroom the runtime gets on top of the declared memory (MiB)
const MEMORY_SLACK: u64 = 32;
const PIDS_MAX: u64 = 64;

pub trait Argument {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>>;
}

#[derive(Default)]
pub struct ArgFactory {
    args: Vec<Cow<'static, OsStr>>,
}

impl ArgFactory {
    pub fn add(mut self, arg: impl Argument) -> Self {
        self.args.extend(arg.get_args());
        self
    }

    pub fn build(self) -> Vec<OsString> {
        self.args.into_iter().map(|x| x.into_owned()).collect()
    }
}

fn flag(flag: &'static str) -> Cow<'static, OsStr> {
    Cow::Borrowed(OsStr::new(flag))
}

fn owned(value: impl Into<OsString>) -> Cow<'static, OsStr> {
    Cow::Owned(value.into())
}

fn mount(src: &Path, dst: &str) -> Cow<'static, OsStr> {
    let mut value = OsString::from(src);
    value.push(":");
    value.push(dst);
    Cow::Owned(value)
}

/// identity, chroot and the report files of the supervisor
pub struct BaseArg<'a> {
    pub root: &'a Path,
    pub uid: u32,
    pub gid: u32,
    pub log: &'a Path,
    pub usage: &'a Path,
}

impl<'a> Argument for BaseArg<'a> {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>> {
        vec![
            flag("-Mo"),
            flag("--chroot"),
            owned(self.root),
            flag("--user"),
            owned(self.uid.to_string()),
            flag("--group"),
            owned(self.gid.to_string()),
            flag("--log"),
            owned(self.log),
            flag("--usage"),
            owned(self.usage),
        ]
        .into_iter()
    }
}

pub struct SystemMountArg;

impl Argument for SystemMountArg {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>> {
        SYSTEM_DIRS
            .into_iter()
            .flat_map(|dir| [flag("-R"), flag(dir)])
    }
}

/// the working directory, writable only for trusted programs
pub struct WorkDirArg<'a> {
    pub work_dir: &'a Path,
    pub trusted: bool,
}

impl<'a> Argument for WorkDirArg<'a> {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>> {
        let mode = match self.trusted {
            true => "-B",
            false => "-R",
        };
        [flag(mode), mount(self.work_dir, APP_DIR)].into_iter()
    }
}

pub struct BindingArg<'a> {
    pub bindings: &'a [FileBinding],
}

impl<'a> Argument for BindingArg<'a> {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>> {
        self.bindings
            .iter()
            .flat_map(|binding| {
                [
                    flag(binding.mode.flag()),
                    mount(&binding.src, &format!("{}/{}", APP_DIR, binding.dst)),
                ]
            })
            .collect::<Vec<_>>()
            .into_iter()
    }
}

pub struct CwdArg;

impl Argument for CwdArg {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>> {
        [flag("-D"), flag(APP_DIR)].into_iter()
    }
}

pub struct CGroupVersionArg {
    pub v2: bool,
}

impl Argument for CGroupVersionArg {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>> {
        match self.v2 {
            true => vec![flag("--use_cgroupv2")],
            false => Vec::new(),
        }
        .into_iter()
    }
}

pub struct LimitArg {
    pub limit: Limit,
    /// MiB
    pub output_limit: u64,
}

impl Argument for LimitArg {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>> {
        let Limit { time, memory } = self.limit;
        vec![
            flag("--cgroup_pids_max"),
            owned(PIDS_MAX.to_string()),
            flag("--cgroup_cpu_ms_per_sec"),
            flag("1000"),
            flag("--cgroup_mem_max"),
            owned(((memory + MEMORY_SLACK) * 1024 * 1024).to_string()),
            flag("--time_limit"),
            owned((time * 2 + 1).to_string()),
            flag("--rlimit_cpu"),
            owned((time + 1).to_string()),
            flag("--rlimit_as"),
            flag("inf"),
            flag("--rlimit_stack"),
            owned((memory + MEMORY_SLACK).max(256).to_string()),
            flag("--rlimit_fsize"),
            owned(self.output_limit.to_string()),
        ]
        .into_iter()
    }
}

pub struct EnvArg<'a> {
    pub env: &'a [String],
}

impl<'a> Argument for EnvArg<'a> {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>> {
        self.env
            .iter()
            .flat_map(|name| [flag("-E"), owned(name)])
            .collect::<Vec<_>>()
            .into_iter()
    }
}

pub struct InnerProcessArg<'a> {
    pub command: &'a str,
    pub args: &'a [String],
}

impl<'a> Argument for InnerProcessArg<'a> {
    fn get_args(self) -> impl Iterator<Item = Cow<'static, OsStr>> {
        [flag("--"), owned(self.command)]
            .into_iter()
            .chain(self.args.iter().map(owned).collect::<Vec<_>>())
    }
}

/// Build the supervisor command line of one invocation
///
/// `root` becomes the chroot, `info` receives the `log` and `usage` files.
pub fn build_args(settings: &Settings, args: &RunArgs, root: &Path, info: &Path) -> Vec<OsString> {
    let (uid, gid) = match args.trusted {
        true => (settings.compiler_uid, settings.compiler_gid),
        false => (settings.runner_uid, settings.runner_gid),
    };
    ArgFactory::default()
        .add(BaseArg {
            root,
            uid,
            gid,
            log: &info.join("log"),
            usage: &info.join("usage"),
        })
        .add(SystemMountArg)
        .add(WorkDirArg {
            work_dir: &args.work_dir,
            trusted: args.trusted,
        })
        .add(BindingArg {
            bindings: &args.bindings,
        })
        .add(CwdArg)
        .add(CGroupVersionArg {
            v2: settings.cgroup_v2,
        })
        .add(LimitArg {
            limit: args.limit,
            output_limit: settings.output_limit,
        })
        .add(EnvArg {
            env: &settings.env,
        })
        .add(InnerProcessArg {
            command: &args.command,
            args: &args.args,
        })
        .build()
}

/// The nsjail binary as [`Supervisor`]
#[derive(Debug, Clone)]
pub struct NsJail {
    runtime: PathBuf,
    /// how long past its own wall limit nsjail may take before it's considered stalled
    grace: Duration,
}

impl NsJail {
    pub fn new(runtime: impl Into<PathBuf>) -> Self {
        Self {
            runtime: runtime.into(),
            grace: Duration::from_secs(5),
        }
    }
}

fn stdio(file: Option<std::fs::File>) -> Stdio {
    file.map(Stdio::from).unwrap_or_else(Stdio::null)
}

#[async_trait::async_trait]
impl Supervisor for NsJail {
    async fn supervise(&self, jailed: Jailed) -> io::Result<()> {
        let mut cmd = Command::new(&self.runtime);
        cmd.kill_on_drop(true);
        cmd.stdin(stdio(jailed.stdin));
        cmd.stdout(stdio(jailed.stdout));
        cmd.stderr(stdio(jailed.stderr));
        cmd.args(&jailed.args);

        log::trace!("spawn nsjail with args: {:?}", jailed.args);
        let mut child = cmd.spawn()?;

        match time::timeout(jailed.wall + self.grace, child.wait()).await {
            Ok(status) => {
                let status = status?;
                log::trace!("nsjail exited with {}", status);
                Ok(())
            }
            Err(_) => {
                if let Err(err) = child.kill().await {
                    log::warn!("Fail to kill stalled nsjail: {}", err);
                }
                Err(io::Error::new(io::ErrorKind::TimedOut, "supervisor stalled"))
            }
        }
    }
}
