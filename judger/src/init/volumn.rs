use std::path::Path;

use tokio::fs;

use super::config::{GlobalConfig, CONFIG};

/// directories the judger writes into
fn volumns(config: &GlobalConfig) -> [&Path; 4] {
    [
        config.runtime.temp.as_path(),
        config.runtime.problems.as_path(),
        config.runtime.submissions.as_path(),
        config.storage.root.as_path(),
    ]
}

pub async fn create(config: &GlobalConfig) -> std::io::Result<()> {
    for path in volumns(config) {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

pub async fn init() {
    let config = CONFIG.get().unwrap();
    if let Err(err) = create(config).await {
        log::error!("Unable to create working directories: {}", err);
        std::process::exit(1);
    }
}
