use std::path::Path;

use tokio::fs;

use super::{nsjail::build_args, Jail, Jailed, RunArgs, Usage};
use crate::{error::Error, verdict::RunResult};

async fn open_read(path: &Path) -> Result<std::fs::File, Error> {
    let file = fs::File::open(path).await.map_err(|err| {
        Error::System(format!("fail to open {}: {}", path.to_string_lossy(), err))
    })?;
    Ok(file.into_std().await)
}

async fn open_write(path: &Path) -> Result<std::fs::File, Error> {
    let file = fs::File::create(path).await.map_err(|err| {
        Error::System(format!("fail to open {}: {}", path.to_string_lossy(), err))
    })?;
    Ok(file.into_std().await)
}

impl Jail {
    /// Run one command in a fresh sandbox and classify its usage
    ///
    /// Redirections are opened on the host before the sandbox starts,
    /// the chroot and the supervisor's report directory are removed before returning.
    pub async fn run(&self, args: RunArgs) -> Result<RunResult, Error> {
        let root = self
            .scratch()
            .await
            .map_err(|err| Error::System(format!("fail to create chroot: {}", err)))?;
        let info = self
            .scratch()
            .await
            .map_err(|err| Error::System(format!("fail to create report directory: {}", err)))?;

        let stdin = match &args.stdin {
            Some(path) => Some(open_read(path).await?),
            None => None,
        };
        let stdout = match &args.stdout {
            Some(path) => Some(open_write(path).await?),
            None => None,
        };
        let stderr = match &args.stderr {
            Some(path) => Some(open_write(path).await?),
            None => None,
        };

        let jailed = Jailed {
            args: build_args(self.settings(), &args, root.get_path(), info.get_path()),
            stdin,
            stdout,
            stderr,
            usage: info.join("usage"),
            wall: args.limit.wall(),
        };
        log::debug!("run `{}` in sandbox", args.command);
        self.supervisor
            .supervise(jailed)
            .await
            .map_err(|err| Error::System(format!("fail to run isolation supervisor: {}", err)))?;

        let usage = Usage::from_file(info.join("usage")).await?;
        log::trace!("usage of `{}`: {:?}", args.command, usage);
        Ok(usage.into_result(&args.limit))
    }
}
