//! Scripted stand-in for the isolation supervisor
//!
//! Nothing is isolated: the handler decides what the "process" printed,
//! which files it left in the working directory, and what usage it reported.

use std::{
    ffi::OsString,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use super::{Jail, Jailed, Settings, Supervisor, Usage};

/// one recorded supervisor invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub args: Vec<OsString>,
}

impl Call {
    fn strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|x| x.to_string_lossy().into_owned())
            .collect()
    }
    /// command and arguments after `--`
    pub fn inner(&self) -> Vec<String> {
        let args = self.strings();
        match args.iter().position(|x| x == "--") {
            Some(pos) => args[pos + 1..].to_vec(),
            None => vec![],
        }
    }
    pub fn command(&self) -> String {
        self.inner().first().cloned().unwrap_or_default()
    }
    pub fn args(&self) -> Vec<String> {
        self.inner().into_iter().skip(1).collect()
    }
    /// value following the first occurrence of `flag`
    pub fn value(&self, flag: &str) -> Option<String> {
        let args = self.strings();
        let pos = args.iter().position(|x| x == flag)?;
        args.get(pos + 1).cloned()
    }
    /// mounts before `--` as (mode, src, dst)
    pub fn mounts(&self) -> Vec<(String, String, String)> {
        let args = self.strings();
        let end = args.iter().position(|x| x == "--").unwrap_or(args.len());
        args[..end]
            .windows(2)
            .filter(|x| x[0] == "-R" || x[0] == "-B")
            .filter_map(|x| {
                let (src, dst) = x[1].split_once(':')?;
                Some((x[0].clone(), src.to_owned(), dst.to_owned()))
            })
            .collect()
    }
    pub fn trusted(&self) -> bool {
        self.mounts()
            .iter()
            .any(|(mode, _, dst)| mode == "-B" && dst == "/app")
    }
    /// host path of a file named `name` inside the working directory
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim_start_matches("./");
        let mounts = self.mounts();
        let target = format!("/app/{}", name);
        if let Some((_, src, _)) = mounts.iter().find(|(_, _, dst)| *dst == target) {
            return Some(PathBuf::from(src));
        }
        mounts
            .iter()
            .find(|(_, _, dst)| dst == "/app")
            .map(|(_, src, _)| Path::new(src).join(name))
    }
    pub fn read(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.resolve(name)?).ok()
    }
    /// content of the artifact the command starts (`./x.bin` or the first argument of an interpreter)
    pub fn program(&self) -> Option<String> {
        self.inner()
            .iter()
            .filter(|x| x.starts_with("./") || !x.starts_with('/'))
            .find_map(|x| self.read(x))
            .map(|x| String::from_utf8_lossy(&x).into_owned())
    }
}

pub struct Script {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub report: String,
    /// files written into the working directory (or the binding of that name)
    pub files: Vec<(String, Vec<u8>)>,
}

pub fn report(usage: &Usage) -> String {
    format!(
        "exit_code {}\nsignal {}\nreal_time {}\nuser_time {}\nsys_time 0\nmemory {}\noom_killed {}\n",
        usage.exit_code,
        usage.signal.unwrap_or_default(),
        usage.real_time,
        usage.cpu_time,
        usage.memory,
        usage.oom_killed as u8
    )
}

impl Script {
    pub fn usage(usage: Usage) -> Self {
        Self {
            stdout: vec![],
            stderr: vec![],
            report: report(&usage),
            files: vec![],
        }
    }
    pub fn exit(exit_code: i32) -> Self {
        Self::usage(Usage {
            exit_code,
            real_time: 12,
            cpu_time: 10,
            memory: 1024,
            ..Default::default()
        })
    }
    pub fn signal(signal: i32) -> Self {
        Self::usage(Usage {
            exit_code: 128 + signal,
            signal: Some(signal),
            real_time: 12,
            cpu_time: 10,
            memory: 1024,
            ..Default::default()
        })
    }
    pub fn stdout(mut self, stdout: impl Into<Vec<u8>>) -> Self {
        self.stdout = stdout.into();
        self
    }
    pub fn stderr(mut self, stderr: impl Into<Vec<u8>>) -> Self {
        self.stderr = stderr.into();
        self
    }
    pub fn report(mut self, report: impl Into<String>) -> Self {
        self.report = report.into();
        self
    }
    pub fn file(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.push((name.into(), content.into()));
        self
    }
}

type Handler = dyn Fn(&Call, &[u8]) -> io::Result<Script> + Send + Sync;

pub struct Scripted {
    handler: Box<Handler>,
    calls: Mutex<Vec<Call>>,
}

impl std::fmt::Debug for Scripted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scripted").finish_non_exhaustive()
    }
}

impl Scripted {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Supervisor for Scripted {
    async fn supervise(&self, jailed: Jailed) -> io::Result<()> {
        let call = Call {
            args: jailed.args.clone(),
        };
        self.calls.lock().unwrap().push(call.clone());

        let mut input = Vec::new();
        if let Some(mut stdin) = jailed.stdin {
            stdin.read_to_end(&mut input)?;
        }
        let script = (self.handler)(&call, &input)?;

        if let Some(mut stdout) = jailed.stdout {
            stdout.write_all(&script.stdout)?;
        }
        if let Some(mut stderr) = jailed.stderr {
            stderr.write_all(&script.stderr)?;
        }
        for (name, content) in script.files {
            let path = call
                .resolve(&name)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name))?;
            std::fs::write(path, content)?;
        }
        std::fs::write(&jailed.usage, script.report)
    }
}

/// a [`Jail`] whose scratch directories live under `root`
pub fn scripted<F>(root: &Path, handler: F) -> (Jail, Arc<Scripted>)
where
    F: Fn(&Call, &[u8]) -> io::Result<Script> + Send + Sync + 'static,
{
    let supervisor = Arc::new(Scripted {
        handler: Box::new(handler),
        calls: Mutex::new(vec![]),
    });
    let settings = Settings {
        temp: root.join(".temp"),
        ..Default::default()
    };
    (Jail::new(supervisor.clone(), settings), supervisor)
}

/// whether every scratch directory was removed
pub fn scratch_is_empty(jail: &Jail) -> bool {
    match std::fs::read_dir(jail.temp()) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

const COMPILERS: [&str; 3] = ["/usr/bin/gcc", "/usr/bin/g++", "/bin/cp"];

/// A tiny world in which compilers copy the source to the artifact and the
/// artifact is a one line script:
///
/// - `sum`: print the sum of the integers on stdin
/// - `echo <text>`: print text
/// - `args`: print the arguments
/// - `exit <code>`, `segv`, `spin`, `sleep`, `oom`
/// - `check`: compare `out` with `ans`, exit 1 on mismatch
/// - `check-crash`: checker failure, exit 3
/// - `check-partial`: partial score, exit 7
/// - `reject`: report `bad input` on stderr and exit 1
///
/// Sources starting with `compile-error` fail to compile.
pub fn world(call: &Call, stdin: &[u8]) -> io::Result<Script> {
    let command = call.command();
    if call.trusted() && COMPILERS.contains(&command.as_str()) {
        return compile(call);
    }
    let program = call.program().unwrap_or_default();
    let line = program.lines().next().unwrap_or_default().trim();
    let (op, rest) = line.split_once(' ').unwrap_or((line, ""));

    Ok(match op {
        "sum" => {
            let sum: i64 = String::from_utf8_lossy(stdin)
                .split_whitespace()
                .filter_map(|x| x.parse::<i64>().ok())
                .sum();
            Script::exit(0).stdout(format!("{}\n", sum))
        }
        "echo" => Script::exit(0).stdout(format!("{}\n", rest)),
        "args" => Script::exit(0).stdout(format!("{}\n", call.args().join(" "))),
        "exit" => Script::exit(rest.parse().unwrap_or(1)),
        "segv" => Script::signal(libc::SIGSEGV),
        "spin" => Script::usage(Usage {
            exit_code: 128 + libc::SIGKILL,
            signal: Some(libc::SIGKILL),
            real_time: 400_000,
            cpu_time: 200_000,
            memory: 1024,
            ..Default::default()
        }),
        "sleep" => Script::usage(Usage {
            exit_code: 128 + libc::SIGKILL,
            signal: Some(libc::SIGKILL),
            real_time: 400_000,
            cpu_time: 5,
            memory: 1024,
            ..Default::default()
        }),
        "oom" => Script::usage(Usage {
            exit_code: 128 + libc::SIGKILL,
            signal: Some(libc::SIGKILL),
            real_time: 30,
            cpu_time: 20,
            memory: 4096 * 1024,
            oom_killed: true,
        }),
        "check" => {
            let read = |name| {
                call.read(name)
                    .map(|x| String::from_utf8_lossy(&x).trim().to_owned())
                    .unwrap_or_default()
            };
            let (out, ans) = (read("out"), read("ans"));
            match out == ans {
                true => Script::exit(0).file("result", format!("ok answer is '{}'", ans)),
                false => Script::exit(1).file(
                    "result",
                    format!("wrong answer expected '{}', found '{}'", ans, out),
                ),
            }
        }
        "check-crash" => Script::exit(3).file("result", "checker is broken"),
        "check-partial" => Script::exit(7).file("result", "points 0.5"),
        "reject" => Script::exit(1).stderr("bad input"),
        _ => Script::exit(0),
    })
}

fn compile(call: &Call) -> io::Result<Script> {
    let args = call.args();
    let (source, target) = match call.command().as_str() {
        "/bin/cp" => (args[0].clone(), args[1].clone()),
        _ => {
            let pos = args.iter().position(|x| x == "-o").unwrap_or_default();
            (args[args.len() - 1].clone(), args[pos + 1].clone())
        }
    };
    let code = call.read(&source).unwrap_or_default();
    if code.starts_with(b"compile-error") {
        return Ok(Script::exit(1).stderr(format!("{}:1:1: error: expected ';'", source)));
    }
    if code.starts_with(b"compile-oom") {
        return Ok(Script::usage(Usage {
            exit_code: 1,
            real_time: 30,
            cpu_time: 20,
            memory: 1,
            oom_killed: true,
            ..Default::default()
        }));
    }
    Ok(Script::exit(0).file(target, code))
}
