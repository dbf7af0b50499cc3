use std::{collections::BTreeMap, path::Path, str::FromStr};

use tokio::fs;

use super::Limit;
use crate::{
    error::Error,
    verdict::{RunResult, Verdict},
};

/// Resource usage reported by the supervisor after an invocation
///
/// The report holds one `key value` pair per line:
///
/// | key          | unit | required |
/// |--------------|------|----------|
/// | `exit_code`  |      | yes      |
/// | `signal`     |      | no, `0` is none |
/// | `real_time`  | ms   | yes      |
/// | `user_time`  | ms   | one of user/sys |
/// | `sys_time`   | ms   | one of user/sys |
/// | `memory`     | KiB  | yes      |
/// | `oom_killed` | 0/1  | no       |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub exit_code: i32,
    pub signal: Option<i32>,
    /// ms
    pub real_time: u64,
    /// user and system time, ms
    pub cpu_time: u64,
    /// peak, KiB
    pub memory: u64,
    pub oom_killed: bool,
}

fn malformed(reason: impl std::fmt::Display) -> Error {
    Error::System(format!("malformed usage report: {}", reason))
}

struct Fields<'a>(BTreeMap<&'a str, &'a str>);

impl<'a> Fields<'a> {
    fn get<T: FromStr>(&self, key: &str) -> Result<Option<T>, Error> {
        self.0
            .get(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| malformed(format!("`{}` is not a valid {}", value, key)))
            })
            .transpose()
    }
    fn require<T: FromStr>(&self, key: &str) -> Result<T, Error> {
        self.get(key)?
            .ok_or_else(|| malformed(format!("missing {}", key)))
    }
}

impl Usage {
    pub fn from_raw(raw: &str) -> Result<Self, Error> {
        let fields = Fields(
            raw.lines()
                .filter_map(|line| line.trim().split_once(' '))
                .map(|(key, value)| (key.trim(), value.trim()))
                .collect(),
        );

        let user_time: Option<u64> = fields.get("user_time")?;
        let sys_time: Option<u64> = fields.get("sys_time")?;
        if user_time.is_none() && sys_time.is_none() {
            return Err(malformed("missing cpu time"));
        }

        Ok(Self {
            exit_code: fields.require("exit_code")?,
            signal: fields
                .get::<i32>("signal")?
                .filter(|signal| *signal != 0),
            real_time: fields.require("real_time")?,
            cpu_time: user_time.unwrap_or_default() + sys_time.unwrap_or_default(),
            memory: fields.require("memory")?,
            oom_killed: fields.get::<u8>("oom_killed")?.unwrap_or_default() != 0,
        })
    }
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = fs::read_to_string(path.as_ref())
            .await
            .map_err(|err| malformed(format!("fail to read report: {}", err)))?;
        Self::from_raw(&raw)
    }
    /// classify the usage against the declared limit
    ///
    /// The first matching rule wins:
    /// 1. killed by the oom killer, or peak memory above the limit: [`Verdict::MemoryLimitExceeded`]
    /// 2. wall clock above twice the limit, cpu time above the limit, or `SIGXCPU`:
    ///    [`Verdict::TimeLimitExceeded`] when cpu time reached the limit, [`Verdict::IdlenessLimitExceeded`] otherwise
    /// 3. non-zero exit code or any signal: [`Verdict::RuntimeError`]
    pub fn verdict(&self, limit: &Limit) -> Verdict {
        let time_limit = limit.time * 1000;
        if self.oom_killed || self.memory > limit.memory * 1024 {
            return Verdict::MemoryLimitExceeded;
        }
        if self.real_time > time_limit * 2
            || self.cpu_time > time_limit
            || self.signal == Some(libc::SIGXCPU)
        {
            return match self.cpu_time >= time_limit {
                true => Verdict::TimeLimitExceeded,
                false => Verdict::IdlenessLimitExceeded,
            };
        }
        if self.exit_code != 0 || self.signal.is_some() {
            return Verdict::RuntimeError;
        }
        Verdict::Accepted
    }
    pub fn into_result(self, limit: &Limit) -> RunResult {
        RunResult {
            verdict: self.verdict(limit),
            time: self.cpu_time,
            real_time: self.real_time,
            memory: self.memory,
            exit_code: self.exit_code,
            signal: self.signal,
            message: None,
            report: None,
        }
    }
}
