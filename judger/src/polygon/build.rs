use super::{Action, BuildCode, BuildMessage, BuildTask, TestcaseConfig};
use crate::{
    error::Error,
    problem::{Problem, Storage, TestCase},
    sandbox::{Program, Role},
    verdict::RunResult,
};

enum Step {
    Continue,
    Stop,
}

fn serialize(result: &RunResult) -> String {
    toml::to_string(result).unwrap_or_else(|_| format!("{:?}", result))
}

/// Build every testcase of `task` and upload it to the remote testcase base
///
/// A compile error or a non-accepted step is reported through `notify`
/// and ends the build early without error.
pub async fn build<F>(
    task: &BuildTask,
    problem: &Problem,
    storage: &dyn Storage,
    mut notify: F,
) -> Result<(), Error>
where
    F: FnMut(BuildMessage),
{
    notify(BuildMessage::new(Action::Start));
    problem.ensure_problem().await?;
    problem.ensure_testcases_base(task.version).await?;

    let checker = problem.checker(&task.checker.fullname, &task.checker.language)?;
    let validator = problem.validator(&task.validator.fullname, &task.validator.language)?;
    let solution = problem.generator(&task.solution.fullname, &task.solution.language)?;
    let generators = task
        .generators
        .iter()
        .map(|code| Ok((code, problem.generator(&code.fullname, &code.language)?)))
        .collect::<Result<Vec<_>, Error>>()?;

    let programs = [
        (&task.checker, &checker),
        (&task.validator, &validator),
        (&task.solution, &solution),
    ]
    .into_iter()
    .chain(generators.iter().map(|(code, program)| (*code, program)));
    for (code, program) in programs {
        notify(BuildMessage::new(Action::Compile).name(&code.fullname));
        match problem.ensure_program(program, &code.fullname, storage).await {
            Ok(_) => {}
            Err(Error::Compile(message)) => {
                notify(
                    BuildMessage::new(Action::CompileError)
                        .name(&code.fullname)
                        .message(message),
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        }
    }

    let tools = Tools {
        problem,
        storage,
        validator: &validator,
        solution: (&task.solution, &solution),
        generators: &generators,
    };
    let remote = problem.remote_testcases_base(task.version);
    for (index, config) in task.testcases.iter().enumerate() {
        let testcase = problem.testcase(task.version, &(index + 1).to_string());
        let build = Build {
            index: index + 1,
            testcase: &testcase,
            notify: &mut notify,
        };
        let step = build.run(config, &tools).await?;
        if let Step::Stop = step {
            return Ok(());
        }
        notify(BuildMessage::new(Action::Upload).testcase(index + 1));
        testcase.upload(&remote, storage).await?;
    }

    notify(BuildMessage::new(Action::End));
    Ok(())
}

/// programs and collaborators shared by every testcase
struct Tools<'a> {
    problem: &'a Problem,
    storage: &'a dyn Storage,
    validator: &'a Program,
    solution: (&'a BuildCode, &'a Program),
    generators: &'a [(&'a BuildCode, Program)],
}

struct Build<'a, F> {
    index: usize,
    testcase: &'a TestCase,
    notify: &'a mut F,
}

impl<'a, F> Build<'a, F>
where
    F: FnMut(BuildMessage),
{
    fn check(&mut self, result: RunResult) -> Step {
        if result.verdict.is_accepted() {
            return Step::Continue;
        }
        log::error!("building testcase {}: {:?}", self.index, result);
        (self.notify)(
            BuildMessage::new(Action::Error)
                .testcase(self.index)
                .message(serialize(&result)),
        );
        Step::Stop
    }
    async fn run(mut self, config: &TestcaseConfig, tools: &Tools<'_>) -> Result<Step, Error> {
        match config {
            TestcaseConfig::File { filename, .. } => {
                (self.notify)(BuildMessage::new(Action::Download).testcase(self.index));
                let key = format!("{}/static/{}", tools.problem.remote_base(), filename);
                self.testcase.download_in(&key, tools.storage).await?;
            }
            TestcaseConfig::Generator {
                generator, args, ..
            } => {
                let (code, program) = tools
                    .generators
                    .iter()
                    .find(|(code, _)| code.id == *generator)
                    .ok_or_else(|| {
                        Error::System(format!(
                            "unexpected generator {} at testcase {}",
                            generator, self.index
                        ))
                    })?;
                (self.notify)(
                    BuildMessage::new(Action::GenIn)
                        .name(&code.fullname)
                        .testcase(self.index),
                );
                debug_assert_eq!(program.role(), Role::Generator);
                let result = self.testcase.gen_in(program, args).await?;
                if let Step::Stop = self.check(result) {
                    return Ok(Step::Stop);
                }
            }
        }

        (self.notify)(BuildMessage::new(Action::Validate).testcase(self.index));
        let result = tools.validator.validate(self.testcase).await?;
        if let Step::Stop = self.check(result) {
            return Ok(Step::Stop);
        }

        let (code, solution) = tools.solution;
        (self.notify)(
            BuildMessage::new(Action::GenAns)
                .name(&code.fullname)
                .testcase(self.index),
        );
        let result = self.testcase.gen_ans(solution).await?;
        Ok(self.check(result))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        langs::Langs,
        polygon::BuildTask,
        problem::LocalStorage,
        sandbox::testing::{scratch_is_empty, scripted, world},
    };

    const TASK: &str = r#"
        problem = "aplusb"
        version = 1
        checker = { id = 1, name = "chk", language = "cpp", fullname = "chk.cpp" }
        validator = { id = 2, name = "val", language = "cpp", fullname = "val.cpp" }
        solution = { id = 3, name = "std", language = "cpp", fullname = "std.cpp" }
        generators = [{ id = 4, name = "gen", language = "cpp", fullname = "gen.cpp" }]

        [[testcases]]
        type = "file"
        filename = "sample.in"

        [[testcases]]
        type = "generator"
        generator = 4
        args = ["10", "32"]
    "#;

    struct Env {
        root: tempfile::TempDir,
        problem: Problem,
        storage: LocalStorage,
    }

    fn env(sources: &[(&str, &str)]) -> Env {
        let root = tempfile::tempdir().unwrap();
        let (jail, _) = scripted(root.path(), world);
        let bucket = root.path().join("bucket");
        for (key, content) in sources {
            let path = bucket.join(key);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let problem = Problem::new(
            jail,
            Arc::new(Langs::builtin().unwrap()),
            root.path().join("problems"),
            "aplusb",
            None,
        );
        Env {
            storage: LocalStorage::new(bucket),
            problem,
            root,
        }
    }

    async fn run(env: &Env) -> Vec<BuildMessage> {
        let task: BuildTask = toml::from_str(TASK).unwrap();
        let mut messages = vec![];
        build(&task, &env.problem, &env.storage, |message| {
            messages.push(message)
        })
        .await
        .unwrap();
        messages
    }

    fn actions(messages: &[BuildMessage]) -> Vec<Action> {
        messages.iter().map(|x| x.action).collect()
    }

    #[tokio::test]
    async fn build_all() {
        let env = env(&[
            ("aplusb/chk.cpp", "check"),
            ("aplusb/val.cpp", "exit 0"),
            ("aplusb/std.cpp", "sum"),
            ("aplusb/gen.cpp", "args"),
            ("aplusb/static/sample.in", "1 2\n"),
        ]);
        let messages = run(&env).await;
        use Action::*;
        assert_eq!(
            actions(&messages),
            [
                Start, Compile, Compile, Compile, Compile, Download, Validate, GenAns, Upload,
                GenIn, Validate, GenAns, Upload, End
            ]
        );

        let bucket = env.root.path().join("bucket/aplusb/testcases/1");
        assert_eq!(std::fs::read_to_string(bucket.join("1.ans")).unwrap(), "3\n");
        assert_eq!(std::fs::read_to_string(bucket.join("2.in")).unwrap(), "10 32\n");
        assert_eq!(std::fs::read_to_string(bucket.join("2.ans")).unwrap(), "42\n");
        assert!(scratch_is_empty(env.problem.jail()));
    }

    #[tokio::test]
    async fn invalid_input_stops() {
        let env = env(&[
            ("aplusb/chk.cpp", "check"),
            ("aplusb/val.cpp", "reject"),
            ("aplusb/std.cpp", "sum"),
            ("aplusb/gen.cpp", "args"),
            ("aplusb/static/sample.in", "1 2\n"),
        ]);
        let messages = run(&env).await;
        let last = messages.last().unwrap();
        assert_eq!(last.action, Action::Error);
        assert_eq!(last.testcase, Some(1));
        assert!(last.message.as_ref().unwrap().contains("bad input"));
        assert!(!env
            .root
            .path()
            .join("bucket/aplusb/testcases/1/1.in")
            .exists());
    }

    #[tokio::test]
    async fn compile_error_stops() {
        let env = env(&[
            ("aplusb/chk.cpp", "check"),
            ("aplusb/val.cpp", "compile-error"),
            ("aplusb/std.cpp", "sum"),
            ("aplusb/gen.cpp", "args"),
        ]);
        let messages = run(&env).await;
        use Action::*;
        assert_eq!(actions(&messages), [Start, Compile, Compile, CompileError]);
        assert_eq!(messages[3].name.as_deref(), Some("val.cpp"));
    }
}
