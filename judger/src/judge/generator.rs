use std::path::Path;

use crate::{
    error::Error,
    filesystem,
    sandbox::prelude::*,
    verdict::RunResult,
};

impl Program {
    /// Run the generator with extra arguments, writing its stdout into `target`
    pub async fn generate(&self, args: &[String], target: &Path) -> Result<RunResult, Error> {
        self.generate_inner(args, None, target).await
    }
    /// Run the generator (usually a model solution) on `input`, writing its stdout into `target`
    pub async fn solve(&self, input: &Path, target: &Path) -> Result<RunResult, Error> {
        self.generate_inner(&[], Some(input), target).await
    }
    /// `target` is removed when the generator fails
    async fn generate_inner(
        &self,
        extra: &[String],
        stdin: Option<&Path>,
        target: &Path,
    ) -> Result<RunResult, Error> {
        debug_assert_eq!(self.role(), Role::Generator);
        let run_dir = self.jail().scratch().await?;
        let gen_dir = self.jail().scratch().await?;
        let gen_err = gen_dir.join("gen.err");

        let mut args = self
            .run_args_with(run_dir.get_path(), Limit::AUXILIARY, extra)
            .stdout(target)
            .stderr(&gen_err);
        if let Some(stdin) = stdin {
            args = args.stdin(stdin);
        }

        let outcome = async {
            let mut result = self.run(args.build()?).await?;
            if !result.verdict.is_accepted() {
                result.message = Some(filesystem::read_trimmed(&gen_err).await?);
            }
            Ok::<_, Error>(result)
        }
        .await;

        match &outcome {
            Ok(result) if result.verdict.is_accepted() => {}
            _ => {
                if let Err(err) = filesystem::remove_file(target).await {
                    log::warn!("Fail to remove {}: {}", target.to_string_lossy(), err);
                }
            }
        }
        outcome
    }
}
