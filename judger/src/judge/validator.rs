use crate::{
    error::Error,
    filesystem,
    problem::TestCase,
    sandbox::prelude::*,
    verdict::RunResult,
};

impl Program {
    /// Feed a testcase input to the validator
    ///
    /// A rejected input is not an error: the result carries the verdict and
    /// the validator's stderr as message.
    pub async fn validate(&self, testcase: &TestCase) -> Result<RunResult, Error> {
        debug_assert_eq!(self.role(), Role::Validator);
        testcase.check_input().await?;

        let run_dir = self.jail().scratch().await?;
        let val_dir = self.jail().scratch().await?;
        let val_err = val_dir.join("val.err");

        let args = self
            .run_args(run_dir.get_path(), Limit::AUXILIARY)
            .stdin(&testcase.input_file)
            .stderr(&val_err)
            .build()?;
        let mut result = self.run(args).await?;
        if !result.verdict.is_accepted() {
            result.message = Some(filesystem::read_trimmed(&val_err).await?);
        }
        Ok(result)
    }
}
