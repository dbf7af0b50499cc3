use std::{ops::RangeInclusive, path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};

use super::runner::{RunOptions, Runner};
use crate::{
    error::Error,
    langs::Langs,
    problem::{Problem, Storage},
    sandbox::{Jail, Limit, Program, Role, COMPILE_TIME},
    verdict::{RunResult, Verdict},
};

/// accepted `max_time` (seconds)
pub const TIME_RANGE: RangeInclusive<u64> = 1..=16;
/// accepted `max_memory` (MiB)
pub const MEMORY_RANGE: RangeInclusive<u64> = 32..=2048;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct CodeInfo {
    pub name: String,
    pub lang: String,
}

fn default_lang() -> String {
    "cpp".to_owned()
}

fn default_true() -> bool {
    true
}

/// A submission to judge against some testcases of a problem
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JudgeTask {
    pub id: String,
    pub problem: String,
    pub version: u32,
    /// seconds
    pub max_time: u64,
    /// MiB
    pub max_memory: u64,
    pub checker: CodeInfo,
    #[serde(default)]
    pub cases: Vec<String>,
    #[serde(default = "default_lang")]
    pub lang: String,
    pub code: String,
    #[serde(default = "default_true")]
    pub return_report: bool,
    #[serde(default)]
    pub test_all_cases: bool,
}

impl JudgeTask {
    pub fn limit(&self) -> Result<Limit, Error> {
        if !TIME_RANGE.contains(&self.max_time) {
            return Err(Error::System(format!(
                "max_time {} out of {:?}",
                self.max_time, TIME_RANGE
            )));
        }
        if !MEMORY_RANGE.contains(&self.max_memory) {
            return Err(Error::System(format!(
                "max_memory {} out of {:?}",
                self.max_memory, MEMORY_RANGE
            )));
        }
        Ok(Limit::new(self.max_time, self.max_memory))
    }
}

/// aggregate of a finished judge
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub verdict: Verdict,
    /// max cpu time over the cases, ms
    pub time: u64,
    /// max memory over the cases, KiB
    pub memory: u64,
}

/// Progress notification of a judge
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct JudgeMessage {
    pub id: String,
    pub verdict: Verdict,
    /// 1-based index into the cases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

impl JudgeMessage {
    fn new(id: &str, verdict: Verdict) -> Self {
        Self {
            id: id.to_owned(),
            verdict,
            case: None,
            message: None,
            result: None,
            summary: None,
        }
    }
}

/// Judge submissions of every problem under one root
pub struct Judge {
    jail: Jail,
    langs: Arc<Langs>,
    problems: PathBuf,
    submissions: PathBuf,
}

impl Judge {
    pub fn new(
        jail: Jail,
        langs: Arc<Langs>,
        problems: impl Into<PathBuf>,
        submissions: impl Into<PathBuf>,
    ) -> Self {
        Self {
            jail,
            langs,
            problems: problems.into(),
            submissions: submissions.into(),
        }
    }
    /// Compile the submission, run it over every case and report progress through `notify`
    ///
    /// Failures scoped to the submission or one case are reported (and returned
    /// as verdict), only failures of the judge itself are errors.
    pub async fn judge<F>(
        &self,
        task: &JudgeTask,
        storage: &dyn Storage,
        mut notify: F,
    ) -> Result<Verdict, Error>
    where
        F: FnMut(JudgeMessage),
    {
        let limit = task.limit()?;
        let profile = self.langs.get(&task.lang)?;
        let problem = Problem::new(
            self.jail.clone(),
            self.langs.clone(),
            &self.problems,
            &task.problem,
            None,
        );
        let submission = Arc::new(Program::new(
            self.jail.clone(),
            Role::Submission,
            profile,
            &self.submissions,
            None,
        ));

        log::info!("judging {} on {}", task.id, task.problem);
        notify(JudgeMessage::new(&task.id, Verdict::Compiling));
        let outcome = self
            .judge_compiled(task, &problem, submission.clone(), limit, storage, &mut notify)
            .await;
        if let Err(err) = submission.clear().await {
            log::warn!("Fail to remove artifact of {}: {}", task.id, err);
        }
        outcome
    }
    async fn judge_compiled<F>(
        &self,
        task: &JudgeTask,
        problem: &Problem,
        submission: Arc<Program>,
        limit: Limit,
        storage: &dyn Storage,
        notify: &mut F,
    ) -> Result<Verdict, Error>
    where
        F: FnMut(JudgeMessage),
    {
        match submission.compile(&task.code, COMPILE_TIME).await {
            Ok(()) => {}
            Err(Error::Compile(message)) => {
                notify(JudgeMessage {
                    message: Some(message),
                    ..JudgeMessage::new(&task.id, Verdict::CompileError)
                });
                return Ok(Verdict::CompileError);
            }
            Err(err) => return Err(err),
        }

        problem.ensure_testcases_base(task.version).await?;
        let checker = problem.checker(&task.checker.name, &task.checker.lang)?;
        problem
            .ensure_program(&checker, &task.checker.name, storage)
            .await?;

        let mut runner = Runner::new(submission, Arc::new(checker), limit);
        let remote = problem.remote_testcases_base(task.version);
        let options = RunOptions {
            return_report: task.return_report,
        };
        let mut summary = Summary {
            verdict: Verdict::Accepted,
            time: 0,
            memory: 0,
        };

        for (index, name) in task.cases.iter().enumerate() {
            let testcase = problem.testcase(task.version, name);
            let outcome = match testcase.ensure(&remote, storage).await {
                Ok(()) => runner.run(&testcase, options).await,
                Err(err) => Err(err),
            };

            let mut message = JudgeMessage::new(&task.id, Verdict::Accepted);
            message.case = Some(index + 1);
            match outcome {
                Ok(result) => {
                    summary.time = summary.time.max(result.time);
                    summary.memory = summary.memory.max(result.memory);
                    message.verdict = result.verdict;
                    message.result = Some(result);
                }
                Err(Error::TestCase(reason)) => {
                    log::warn!("testcase {} of {}: {}", name, task.problem, reason);
                    message.verdict = Verdict::TestCaseError;
                    message.message = Some(reason);
                }
                Err(err) => return Err(err),
            }

            let verdict = message.verdict;
            notify(message);
            if !verdict.is_accepted() {
                if summary.verdict.is_accepted() {
                    summary.verdict = verdict;
                }
                if !task.test_all_cases {
                    break;
                }
            }
        }
        runner.clear();

        log::info!("judged {}: {}", task.id, summary.verdict);
        notify(JudgeMessage {
            summary: Some(summary),
            ..JudgeMessage::new(&task.id, Verdict::Finished)
        });
        Ok(summary.verdict)
    }
}
