use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Serialize};
use tikv_jemallocator::Jemalloc;

use judger::{
    init::{self, CONFIG},
    judge::{Judge, JudgeTask},
    langs::Langs,
    polygon::{self, BuildTask},
    problem::{LocalStorage, Problem},
    sandbox::{Jail, NsJail},
    Error,
};

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser)]
#[command(version, about = "Judge submissions and build testcases inside nsjail")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Judge a submission described by a task file
    Judge { task: PathBuf },
    /// Build and upload the testcases of a problem
    Build { task: PathBuf },
}

async fn load<T: DeserializeOwned>(path: &PathBuf) -> Result<T, Error> {
    let content = tokio::fs::read_to_string(path).await?;
    toml::from_str(&content).map_err(|err| {
        Error::System(format!("malformed task {}: {}", path.to_string_lossy(), err))
    })
}

fn print(message: &impl Serialize) {
    match toml::to_string(message) {
        Ok(text) => println!("{}", text),
        Err(err) => log::warn!("Fail to serialize message: {}", err),
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = CONFIG.get().ok_or_else(|| Error::System("config not loaded".to_owned()))?;

    let jail = Jail::new(
        Arc::new(NsJail::new(&config.nsjail.runtime)),
        config.settings(),
    );
    let mut langs = Langs::builtin()?;
    if let Some(path) = &config.runtime.langs {
        langs.extend_from_file(path).await?;
    }
    let langs = Arc::new(langs);
    let storage = LocalStorage::new(&config.storage.root);

    match cli.command {
        Command::Judge { task } => {
            let task: JudgeTask = load(&task).await?;
            let judge = Judge::new(
                jail,
                langs,
                &config.runtime.problems,
                &config.runtime.submissions,
            );
            let verdict = judge.judge(&task, &storage, |x| print(&x)).await?;
            log::info!("{} finished with {:?}", task.id, verdict);
        }
        Command::Build { task } => {
            let task: BuildTask = load(&task).await?;
            let problem = Problem::new(jail, langs, &config.runtime.problems, &task.problem, None);
            polygon::build(&task, &problem, &storage, |x| print(&x)).await?;
            log::info!("{} version {} built", task.problem, task.version);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init::new().await;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{} ({:?})", err, err.verdict());
            ExitCode::FAILURE
        }
    }
}
