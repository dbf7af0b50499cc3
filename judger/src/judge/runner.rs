use std::{path::PathBuf, sync::Arc};

use super::checker::{self, CheckFiles};
use crate::{
    error::Error,
    filesystem::{self, touch, MkdTemp},
    problem::TestCase,
    sandbox::prelude::*,
    verdict::{RunResult, Verdict},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// attach the heads of stdout and checker output to the result
    pub return_report: bool,
}

/// Run one submission against testcases and check its output
///
/// Scratch outputs live in one lazily created directory, removed by
/// [`Runner::clear`] (or when the runner drops).
pub struct Runner {
    submission: Arc<Program>,
    checker: Arc<Program>,
    limit: Limit,
    out_dir: Option<MkdTemp>,
}

impl Runner {
    pub fn new(submission: Arc<Program>, checker: Arc<Program>, limit: Limit) -> Self {
        Self {
            submission,
            checker,
            limit,
            out_dir: None,
        }
    }
    async fn make_write_file(&mut self, extension: &str) -> Result<PathBuf, Error> {
        let dir = match self.out_dir.take() {
            Some(dir) => dir,
            None => self.submission.jail().scratch().await?,
        };
        let path = dir.join(format!("{}.{}", uuid::Uuid::new_v4().simple(), extension));
        self.out_dir = Some(dir);
        touch(&path, 0o766).await?;
        Ok(path)
    }
    fn report_limit(&self) -> usize {
        self.submission.jail().settings().report_limit
    }
    pub async fn run(&mut self, testcase: &TestCase, options: RunOptions) -> Result<RunResult, Error> {
        testcase.check_present().await?;

        let run_dir = self.submission.jail().scratch().await?;
        let run_out = self.make_write_file("out").await?;
        let run_err = self.make_write_file("err").await?;

        let args = self
            .submission
            .run_args(run_dir.get_path(), self.limit)
            .stdin(&testcase.input_file)
            .stdout(&run_out)
            .stderr(&run_err)
            .build()?;
        let mut result = self.submission.run(args).await?;

        if options.return_report {
            result.report_mut().stdout = filesystem::read_head(&run_out, self.report_limit()).await?;
        }
        if result.verdict.is_accepted() {
            self.check(testcase, run_out, &mut result, options).await?;
        }
        Ok(result)
    }
    async fn check(
        &mut self,
        testcase: &TestCase,
        run_out: PathBuf,
        result: &mut RunResult,
        options: RunOptions,
    ) -> Result<(), Error> {
        let chk_out = self.make_write_file("chk").await?;
        let files = CheckFiles {
            input: &testcase.input_file,
            output: &run_out,
            answer: &testcase.answer_file,
            result: &chk_out,
        };
        let checked = self.checker.check(files, self.limit.doubled()).await?;
        result.verdict = checker::verdict(&checked);

        if result.verdict == Verdict::JudgeError || options.return_report {
            let checker_out = filesystem::read_head(&chk_out, self.report_limit()).await?;
            if result.verdict == Verdict::JudgeError {
                log::error!("Checker of {} failed: {}", testcase.name, checker_out);
                result.message = Some(checker_out.clone());
            }
            if options.return_report {
                result.report_mut().checker_out = checker_out;
            }
        }
        Ok(())
    }
    /// remove every scratch output, the runner stays usable
    pub fn clear(&mut self) {
        self.out_dir = None;
    }
}
