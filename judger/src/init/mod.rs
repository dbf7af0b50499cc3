//! Process-wide setup, run once before anything is judged

pub mod check;
pub mod config;
pub mod logger;
pub mod volumn;

pub use config::CONFIG;

/// Load config, setup logging, then abort unless the host can run nsjail
pub async fn new() {
    config::init().await;
    logger::init();
    check::init();
    volumn::init().await;
}
