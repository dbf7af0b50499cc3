use std::path::Path;

use crate::{
    error::Error,
    sandbox::prelude::*,
    verdict::{RunResult, Verdict},
};

/// positional arguments of a testlib style checker
pub static CHECKER_ARGS: [&str; 4] = ["in", "out", "ans", "result"];

/// testlib exit code for a failure of the checker itself
const EXIT_FAIL: i32 = 3;
/// testlib exit code for partial score
const EXIT_POINTS: i32 = 7;

/// Host files a checker is shown
pub struct CheckFiles<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub answer: &'a Path,
    /// the only file the checker may write
    pub result: &'a Path,
}

impl Program {
    /// Run the checker over one output
    ///
    /// The returned result describes the checker process, map it with [`verdict`].
    pub async fn check(&self, files: CheckFiles<'_>, limit: Limit) -> Result<RunResult, Error> {
        debug_assert_eq!(self.role(), Role::Checker);
        let work_dir = self.jail().scratch().await?;
        let extra: Vec<String> = CHECKER_ARGS.iter().map(|x| x.to_string()).collect();

        let mut bindings = vec![self.binding()];
        bindings.extend([
            FileBinding::read_only(files.input, "in"),
            FileBinding::read_only(files.output, "out"),
            FileBinding::read_only(files.answer, "ans"),
            FileBinding::read_write(files.result, "result"),
        ]);
        let args = self
            .run_args_with(work_dir.get_path(), limit, &extra)
            .bindings(bindings)
            .build()?;
        self.run(args).await
    }
}

/// Verdict of the submission given how its checker ended
pub fn verdict(checker: &RunResult) -> Verdict {
    match checker.verdict {
        Verdict::Accepted => Verdict::Accepted,
        _ if checker.exit_code == EXIT_FAIL => Verdict::JudgeError,
        _ if checker.exit_code == EXIT_POINTS => Verdict::Point,
        Verdict::RuntimeError => Verdict::WrongAnswer,
        verdict => verdict,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn checker(verdict: Verdict, exit_code: i32) -> RunResult {
        RunResult {
            verdict,
            time: 1,
            real_time: 1,
            memory: 1,
            exit_code,
            signal: None,
            message: None,
            report: None,
        }
    }

    #[test]
    fn testlib_exit_codes() {
        assert_eq!(verdict(&checker(Verdict::Accepted, 0)), Verdict::Accepted);
        assert_eq!(
            verdict(&checker(Verdict::RuntimeError, 1)),
            Verdict::WrongAnswer
        );
        assert_eq!(
            verdict(&checker(Verdict::RuntimeError, 2)),
            Verdict::WrongAnswer
        );
        assert_eq!(
            verdict(&checker(Verdict::RuntimeError, 3)),
            Verdict::JudgeError
        );
        assert_eq!(verdict(&checker(Verdict::RuntimeError, 7)), Verdict::Point);
    }

    #[test]
    fn checker_limits_pass_through() {
        assert_eq!(
            verdict(&checker(Verdict::TimeLimitExceeded, 0)),
            Verdict::TimeLimitExceeded
        );
        assert_eq!(
            verdict(&checker(Verdict::MemoryLimitExceeded, 137)),
            Verdict::MemoryLimitExceeded
        );
    }
}
